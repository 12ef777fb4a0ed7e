use uuid::Uuid;

use super::{get_json, put_json, scan_all, scan_children, storage, Store, BOARDS, TASKS};
use crate::auth::User;
use crate::board::{Board, BoardView};
use crate::error::{KanbanError, Result};
use crate::placement::sort_tasks;
use crate::task::Task;

impl Store {
    /// Create a board. Slugs are unique within an account.
    pub fn create_board(&self, account_id: Uuid, slug: &str, title: &str) -> Result<Board> {
        let title = if title.trim().is_empty() { slug } else { title.trim() };
        let board = Board::new(account_id, slug, title)?;

        let wt = self.db().begin_write().map_err(storage)?;
        {
            let mut boards = wt.open_table(BOARDS).map_err(storage)?;
            let existing: Vec<Board> = scan_all(&boards)?;
            if existing
                .iter()
                .any(|b| b.account_id == account_id && b.slug == board.slug)
            {
                return Err(KanbanError::BoardExists(board.slug.clone()));
            }
            put_json(&mut boards, board.id.as_bytes(), &board)?;
        }
        wt.commit().map_err(storage)?;

        tracing::info!(board = %board.id, slug = %board.slug, "created board");
        Ok(board)
    }

    pub fn get_board(&self, board_id: Uuid) -> Result<Board> {
        let rt = self.db().begin_read().map_err(storage)?;
        let table = rt.open_table(BOARDS).map_err(storage)?;
        get_json(&table, board_id.as_bytes())?
            .ok_or_else(|| KanbanError::BoardNotFound(board_id.to_string()))
    }

    /// Boards of one account, ordered by slug.
    pub fn list_boards(&self, account_id: Uuid) -> Result<Vec<Board>> {
        let mut boards = self.list_all_boards()?;
        boards.retain(|b| b.account_id == account_id);
        Ok(boards)
    }

    pub fn list_all_boards(&self) -> Result<Vec<Board>> {
        let rt = self.db().begin_read().map_err(storage)?;
        let table = rt.open_table(BOARDS).map_err(storage)?;
        let mut boards: Vec<Board> = scan_all(&table)?;
        boards.sort_by(|a, b| a.slug.cmp(&b.slug).then(a.created_at.cmp(&b.created_at)));
        Ok(boards)
    }

    /// Look a board up on behalf of a user. Boards of other accounts are
    /// reported as missing.
    pub fn board_for_user(&self, user: &User, board_id: Uuid) -> Result<Board> {
        let board = self.get_board(board_id)?;
        if board.account_id != user.account_id {
            return Err(KanbanError::BoardNotFound(board_id.to_string()));
        }
        Ok(board)
    }

    /// Every task on a board, grouped by column in layout order.
    pub fn board_view(&self, board_id: Uuid) -> Result<BoardView> {
        let rt = self.db().begin_read().map_err(storage)?;
        let boards = rt.open_table(BOARDS).map_err(storage)?;
        let board: Board = get_json(&boards, board_id.as_bytes())?
            .ok_or_else(|| KanbanError::BoardNotFound(board_id.to_string()))?;
        let tasks_table = rt.open_table(TASKS).map_err(storage)?;
        let tasks: Vec<Task> = scan_children(&tasks_table, board_id)?;
        Ok(BoardView::build(self.layout(), board, tasks))
    }

    /// Every task on a board in board order: column rank, then placement.
    pub fn list_tasks(&self, board_id: Uuid) -> Result<Vec<Task>> {
        let rt = self.db().begin_read().map_err(storage)?;
        let boards = rt.open_table(BOARDS).map_err(storage)?;
        if boards.get(board_id.as_bytes().as_slice()).map_err(storage)?.is_none() {
            return Err(KanbanError::BoardNotFound(board_id.to_string()));
        }
        let table = rt.open_table(TASKS).map_err(storage)?;
        let mut tasks: Vec<Task> = scan_children(&table, board_id)?;
        sort_tasks(&mut tasks);
        let layout = self.layout();
        tasks.sort_by_key(|t| layout.rank(&t.column));
        Ok(tasks)
    }
}
