use redb::{Table, WriteTransaction};
use uuid::Uuid;

use super::{
    get_json, pair_key, put_json, remove_children, remove_key, scan_children, storage,
    Bytes, Store, ATTACHMENTS, BOARDS, COMMENTS, TASKS, TASK_INDEX, USERS,
};
use crate::attachment::Attachment;
use crate::auth::User;
use crate::board::Board;
use crate::comment::Comment;
use crate::error::{KanbanError, Result};
use crate::placement::{self, check_capacity, plan_insert, resolve_index, slots, Placement};
use crate::task::{NewTask, Task, TaskPatch};

impl Store {
    /// Create a task at the end of its column (the intake column by default).
    ///
    /// The occupancy count and the insert happen in one write transaction.
    pub fn create_task(
        &self,
        board_id: Uuid,
        input: NewTask,
        created_by: Option<Uuid>,
    ) -> Result<Task> {
        let column = self.layout().resolve(input.column.as_deref())?.clone();

        let wt = self.db().begin_write().map_err(storage)?;
        let task = {
            let board = load_board(&wt, board_id)?;
            check_assignees(&wt, &board, &input.assignees)?;

            let mut table = wt.open_table(TASKS).map_err(storage)?;
            let mut siblings: Vec<Task> = scan_children(&table, board_id)?;
            siblings.retain(|t| t.column == column.id);
            check_capacity(&column, siblings.len(), true)?;

            let slots = slots(&siblings, None);
            let plan = plan_insert(&slots, slots.len());
            renumber(&mut table, board_id, &siblings, &plan.renumbered)?;

            let task = Task::new(
                board_id,
                input,
                Placement {
                    column: column.id.clone(),
                    position: plan.position,
                },
                created_by,
            )?;
            put_json(&mut table, &pair_key(board_id, task.id), &task)?;
            let mut index = wt.open_table(TASK_INDEX).map_err(storage)?;
            index
                .insert(task.id.as_bytes().as_slice(), board_id.as_bytes().as_slice())
                .map_err(storage)?;
            task
        };
        wt.commit().map_err(storage)?;

        tracing::info!(board = %board_id, task = %task.id, column = %task.column, "created task");
        Ok(task)
    }

    pub fn get_task(&self, board_id: Uuid, task_id: Uuid) -> Result<Task> {
        let rt = self.db().begin_read().map_err(storage)?;
        let table = rt.open_table(TASKS).map_err(storage)?;
        get_json(&table, &pair_key(board_id, task_id))?
            .ok_or_else(|| KanbanError::TaskNotFound(task_id.to_string()))
    }

    /// Board id of a task, looked up through the task index.
    pub fn task_board(&self, task_id: Uuid) -> Result<Uuid> {
        let rt = self.db().begin_read().map_err(storage)?;
        let index = rt.open_table(TASK_INDEX).map_err(storage)?;
        let guard = index
            .get(task_id.as_bytes().as_slice())
            .map_err(storage)?
            .ok_or_else(|| KanbanError::TaskNotFound(task_id.to_string()))?;
        Uuid::from_slice(guard.value()).map_err(storage)
    }

    /// Tasks of one column in order.
    pub fn column_tasks(&self, board_id: Uuid, column: &str) -> Result<Vec<Task>> {
        let column = self.layout().get(column)?;
        let rt = self.db().begin_read().map_err(storage)?;
        let table = rt.open_table(TASKS).map_err(storage)?;
        let mut tasks: Vec<Task> = scan_children(&table, board_id)?;
        tasks.retain(|t| t.column == column.id);
        placement::sort_tasks(&mut tasks);
        Ok(tasks)
    }

    /// Edit non-placement fields. Concurrent edits are last-write-wins.
    pub fn update_task(&self, board_id: Uuid, task_id: Uuid, patch: TaskPatch) -> Result<Task> {
        let wt = self.db().begin_write().map_err(storage)?;
        let task = {
            if let Some(assignees) = &patch.assignees {
                let board = load_board(&wt, board_id)?;
                check_assignees(&wt, &board, assignees)?;
            }
            let mut table = wt.open_table(TASKS).map_err(storage)?;
            let key = pair_key(board_id, task_id);
            let mut task: Task = get_json(&table, &key)?
                .ok_or_else(|| KanbanError::TaskNotFound(task_id.to_string()))?;
            task.apply(patch)?;
            put_json(&mut table, &key, &task)?;
            task
        };
        wt.commit().map_err(storage)?;
        Ok(task)
    }

    /// Move a task to `to_column` at `to_position` (append when `None`).
    ///
    /// Entering a full column fails with `CapacityExceeded`; reordering
    /// inside a column never does. Any failure leaves both columns untouched.
    pub fn move_task(
        &self,
        board_id: Uuid,
        task_id: Uuid,
        to_column: &str,
        to_position: Option<i64>,
    ) -> Result<Task> {
        let dest = self.layout().get(to_column)?.clone();

        let wt = self.db().begin_write().map_err(storage)?;
        let (task, from) = {
            load_board(&wt, board_id)?;
            let mut table = wt.open_table(TASKS).map_err(storage)?;
            let all: Vec<Task> = scan_children(&table, board_id)?;
            let mut task = all
                .iter()
                .find(|t| t.id == task_id)
                .cloned()
                .ok_or_else(|| KanbanError::TaskNotFound(task_id.to_string()))?;
            let from = task.placement();
            let entering = task.column != dest.id;

            let others: Vec<Task> = all
                .into_iter()
                .filter(|t| t.column == dest.id && t.id != task_id)
                .collect();
            check_capacity(&dest, others.len(), entering)?;
            let index = resolve_index(&dest.id, to_position, others.len())?;
            let siblings = slots(&others, None);

            if !entering {
                let current = siblings
                    .iter()
                    .take_while(|&&(id, pos)| (pos, id) < task.sort_key())
                    .count();
                if current == index {
                    // Already there; dropping the transaction writes nothing.
                    return Ok(task);
                }
            }

            let plan = plan_insert(&siblings, index);
            renumber(&mut table, board_id, &others, &plan.renumbered)?;
            task.column = dest.id.clone();
            task.position = plan.position;
            task.updated_at = chrono::Utc::now();
            put_json(&mut table, &pair_key(board_id, task.id), &task)?;
            if plan.is_respace() {
                tracing::debug!(column = %dest.id, moved = plan.renumbered.len(), "respaced column");
            }
            (task, from)
        };
        wt.commit().map_err(storage)?;

        tracing::info!(
            board = %board_id,
            task = %task_id,
            from = %from.column,
            to = %task.column,
            position = task.position,
            "moved task"
        );
        Ok(task)
    }

    /// Delete a task with its comments and attachment rows. Returns the
    /// removed attachments so the caller can drop their blobs.
    pub fn delete_task(&self, board_id: Uuid, task_id: Uuid) -> Result<(Task, Vec<Attachment>)> {
        let wt = self.db().begin_write().map_err(storage)?;
        let (task, attachments) = {
            let mut table = wt.open_table(TASKS).map_err(storage)?;
            let key = pair_key(board_id, task_id);
            let task: Task = get_json(&table, &key)?
                .ok_or_else(|| KanbanError::TaskNotFound(task_id.to_string()))?;
            remove_key(&mut table, &key)?;

            let mut index = wt.open_table(TASK_INDEX).map_err(storage)?;
            remove_key(&mut index, task_id.as_bytes())?;
            let mut comments = wt.open_table(COMMENTS).map_err(storage)?;
            let removed: Vec<Comment> = remove_children(&mut comments, task_id)?;
            let mut attachments_table = wt.open_table(ATTACHMENTS).map_err(storage)?;
            let attachments: Vec<Attachment> = remove_children(&mut attachments_table, task_id)?;
            tracing::debug!(
                task = %task_id,
                comments = removed.len(),
                attachments = attachments.len(),
                "cascaded task delete"
            );
            (task, attachments)
        };
        wt.commit().map_err(storage)?;

        tracing::info!(board = %board_id, task = %task_id, "deleted task");
        Ok((task, attachments))
    }
}

fn load_board(wt: &WriteTransaction, board_id: Uuid) -> Result<Board> {
    let boards = wt.open_table(BOARDS).map_err(storage)?;
    get_json(&boards, board_id.as_bytes())?
        .ok_or_else(|| KanbanError::BoardNotFound(board_id.to_string()))
}

/// Every assignee must be a member of the board's account.
fn check_assignees(wt: &WriteTransaction, board: &Board, assignees: &[Uuid]) -> Result<()> {
    if assignees.is_empty() {
        return Ok(());
    }
    let users = wt.open_table(USERS).map_err(storage)?;
    for id in assignees {
        let user: Option<User> = get_json(&users, id.as_bytes())?;
        if user.map_or(true, |u| u.account_id != board.account_id) {
            return Err(KanbanError::InvalidInput(format!(
                "assignee {id} is not a member of this account"
            )));
        }
    }
    Ok(())
}

/// Write new positions for siblings listed in a respace plan.
fn renumber(
    table: &mut Table<'_, Bytes, Bytes>,
    board_id: Uuid,
    siblings: &[Task],
    renumbered: &[(Uuid, i64)],
) -> Result<()> {
    for &(id, position) in renumbered {
        let Some(task) = siblings.iter().find(|t| t.id == id) else {
            continue;
        };
        let mut task = task.clone();
        task.position = position;
        put_json(table, &pair_key(board_id, id), &task)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::POSITION_GAP;
    use crate::store::test_support::{fixture, Fixture};

    fn add(fx: &Fixture, column: &str, title: &str) -> Task {
        fx.store
            .create_task(fx.board.id, NewTask::titled(title).in_column(column), Some(fx.user.id))
            .unwrap()
    }

    fn titles(fx: &Fixture, column: &str) -> Vec<String> {
        fx.store
            .column_tasks(fx.board.id, column)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect()
    }

    #[test]
    fn create_defaults_to_intake_and_appends() {
        let fx = fixture();
        let a = fx
            .store
            .create_task(fx.board.id, NewTask::titled("a"), None)
            .unwrap();
        let b = fx
            .store
            .create_task(fx.board.id, NewTask::titled("b"), None)
            .unwrap();
        assert_eq!(a.column, "inbox");
        assert_eq!(a.position, POSITION_GAP);
        assert!(b.position > a.position);
        assert_eq!(titles(&fx, "inbox"), vec!["a", "b"]);
        assert_eq!(fx.store.task_board(a.id).unwrap(), fx.board.id);
    }

    #[test]
    fn create_into_full_column_rejected() {
        let fx = fixture();
        for t in ["t1", "t2", "t3"] {
            add(&fx, "today", t);
        }
        let err = fx
            .store
            .create_task(fx.board.id, NewTask::titled("t4").in_column("today"), None)
            .unwrap_err();
        assert!(matches!(err, KanbanError::CapacityExceeded { limit: 3, .. }));
        assert_eq!(titles(&fx, "today").len(), 3);
    }

    #[test]
    fn unknown_column_rejected() {
        let fx = fixture();
        let err = fx
            .store
            .create_task(fx.board.id, NewTask::titled("x").in_column("backlog"), None)
            .unwrap_err();
        assert!(err.is_invalid_destination());
    }

    #[test]
    fn full_column_rejects_incoming_move_and_keeps_order() {
        let fx = fixture();
        for t in ["t1", "t2", "t3"] {
            add(&fx, "today", t);
        }
        let t4 = add(&fx, "inbox", "t4");
        let before_inbox = titles(&fx, "inbox");

        let err = fx
            .store
            .move_task(fx.board.id, t4.id, "today", Some(0))
            .unwrap_err();
        assert!(matches!(err, KanbanError::CapacityExceeded { .. }));
        assert_eq!(titles(&fx, "today"), vec!["t1", "t2", "t3"]);
        assert_eq!(titles(&fx, "inbox"), before_inbox);
        assert_eq!(fx.store.get_task(fx.board.id, t4.id).unwrap(), t4);
    }

    #[test]
    fn reorder_inside_full_column_allowed() {
        let fx = fixture();
        add(&fx, "today", "t1");
        add(&fx, "today", "t2");
        let t3 = add(&fx, "today", "t3");
        fx.store
            .move_task(fx.board.id, t3.id, "today", Some(0))
            .unwrap();
        assert_eq!(titles(&fx, "today"), vec!["t3", "t1", "t2"]);
    }

    #[test]
    fn move_to_front_of_same_column() {
        let fx = fixture();
        add(&fx, "inbox", "A");
        add(&fx, "inbox", "B");
        let c = add(&fx, "inbox", "C");
        fx.store.move_task(fx.board.id, c.id, "inbox", Some(0)).unwrap();
        assert_eq!(titles(&fx, "inbox"), vec!["C", "A", "B"]);
    }

    #[test]
    fn move_into_empty_column() {
        let fx = fixture();
        add(&fx, "inbox", "x1");
        let x2 = add(&fx, "inbox", "x2");
        add(&fx, "inbox", "x3");
        let moved = fx.store.move_task(fx.board.id, x2.id, "doing", Some(0)).unwrap();
        assert_eq!(moved.column, "doing");
        assert_eq!(titles(&fx, "inbox"), vec!["x1", "x3"]);
        assert_eq!(titles(&fx, "doing"), vec!["x2"]);
    }

    #[test]
    fn delete_middle_then_insert_between() {
        let fx = fixture();
        add(&fx, "inbox", "a");
        let b = add(&fx, "inbox", "b");
        add(&fx, "inbox", "c");
        fx.store.delete_task(fx.board.id, b.id).unwrap();
        assert_eq!(titles(&fx, "inbox"), vec!["a", "c"]);

        let d = add(&fx, "doing", "d");
        fx.store.move_task(fx.board.id, d.id, "inbox", Some(1)).unwrap();
        assert_eq!(titles(&fx, "inbox"), vec!["a", "d", "c"]);
        assert!(matches!(
            fx.store.get_task(fx.board.id, b.id),
            Err(KanbanError::TaskNotFound(_))
        ));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let fx = fixture();
        let a = add(&fx, "inbox", "a");
        add(&fx, "inbox", "b");
        let err = fx
            .store
            .move_task(fx.board.id, a.id, "doing", Some(1))
            .unwrap_err();
        assert!(matches!(err, KanbanError::InvalidPosition { index: 1, max: 0, .. }));
        // Within the same column the mover is not counted.
        let err = fx
            .store
            .move_task(fx.board.id, a.id, "inbox", Some(2))
            .unwrap_err();
        assert!(err.is_invalid_destination());
        fx.store.move_task(fx.board.id, a.id, "inbox", Some(1)).unwrap();
        assert_eq!(titles(&fx, "inbox"), vec!["b", "a"]);
    }

    #[test]
    fn move_to_current_slot_is_noop() {
        let fx = fixture();
        add(&fx, "inbox", "a");
        let b = add(&fx, "inbox", "b");
        let same = fx.store.move_task(fx.board.id, b.id, "inbox", Some(1)).unwrap();
        assert_eq!(same, b);
        let appended = fx.store.move_task(fx.board.id, b.id, "inbox", None).unwrap();
        assert_eq!(appended.position, b.position);
    }

    #[test]
    fn repeated_front_inserts_respace_and_keep_order() {
        let fx = fixture();
        let mut expected = Vec::new();
        for i in 0..40 {
            let t = add(&fx, "doing", &format!("t{i}"));
            fx.store.move_task(fx.board.id, t.id, "doing", Some(0)).unwrap();
            expected.insert(0, format!("t{i}"));
        }
        // Wedge tasks between the first two so the gap runs out.
        for i in 0..40 {
            let t = add(&fx, "inbox", &format!("w{i}"));
            fx.store.move_task(fx.board.id, t.id, "doing", Some(1)).unwrap();
            expected.insert(1, format!("w{i}"));
        }
        assert_eq!(titles(&fx, "doing"), expected);
        assert_eq!(titles(&fx, "doing"), titles(&fx, "doing"));
    }

    #[test]
    fn update_keeps_placement() {
        let fx = fixture();
        let t = add(&fx, "inbox", "old");
        let patch = TaskPatch {
            title: Some("new".into()),
            tags: Some(vec!["Ops".into()]),
            assignees: Some(vec![fx.user.id]),
            ..TaskPatch::default()
        };
        let updated = fx.store.update_task(fx.board.id, t.id, patch).unwrap();
        assert_eq!(updated.title, "new");
        assert_eq!(updated.tags, vec!["ops"]);
        assert_eq!(updated.placement(), t.placement());
    }

    #[test]
    fn assignees_must_share_account() {
        let fx = fixture();
        let (_, stranger) = fx
            .store
            .create_account("Other", "x@example.com", None, "password123")
            .unwrap();
        let input = NewTask {
            assignees: vec![stranger.id],
            ..NewTask::titled("t")
        };
        let err = fx.store.create_task(fx.board.id, input, None).unwrap_err();
        assert!(matches!(err, KanbanError::InvalidInput(_)));
    }

    #[test]
    fn tasks_are_scoped_to_board() {
        let fx = fixture();
        let other = fx.store.create_board(fx.account.id, "side", "Side").unwrap();
        let t = add(&fx, "inbox", "mine");
        assert!(matches!(
            fx.store.get_task(other.id, t.id),
            Err(KanbanError::TaskNotFound(_))
        ));
        assert!(matches!(
            fx.store.move_task(other.id, t.id, "doing", None),
            Err(KanbanError::TaskNotFound(_))
        ));
    }
}
