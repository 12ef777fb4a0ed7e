pub mod account;
pub mod board;
pub mod config;
pub mod init;
pub mod serve;
pub mod task;

use anyhow::{bail, Context};
use kanban_core::board::{Account, Board};
use kanban_core::config::Config;
use kanban_core::task::Task;
use kanban_core::Store;
use std::path::Path;
use uuid::Uuid;

/// Load the project config and open its database.
pub fn open_store(root: &Path) -> anyhow::Result<Store> {
    let config = Config::load(root).context("failed to load config")?;
    Store::open_project(root, &config).context("failed to open database")
}

/// Pick an account by id. With no selector the only account is used.
pub fn resolve_account(store: &Store, selector: Option<&str>) -> anyhow::Result<Account> {
    if let Some(s) = selector {
        let id = Uuid::parse_str(s).with_context(|| format!("'{s}' is not an account id"))?;
        return Ok(store.get_account(id)?);
    }
    let mut accounts = store.list_accounts()?;
    match accounts.len() {
        0 => bail!("no accounts yet; run 'kanban account create' first"),
        1 => Ok(accounts.remove(0)),
        n => bail!("{n} accounts exist; pass --account <id>"),
    }
}

/// Find a board by id, or by slug when the slug is unique across accounts.
pub fn resolve_board(store: &Store, selector: &str) -> anyhow::Result<Board> {
    if let Ok(id) = Uuid::parse_str(selector) {
        return Ok(store.get_board(id)?);
    }
    let mut matches: Vec<Board> = store
        .list_all_boards()?
        .into_iter()
        .filter(|b| b.slug == selector)
        .collect();
    match matches.len() {
        0 => bail!("board '{selector}' not found"),
        1 => Ok(matches.remove(0)),
        n => bail!("{n} boards are named '{selector}'; use the board id"),
    }
}

/// Find a task on a board by full id or unique id prefix.
pub fn resolve_task(store: &Store, board: &Board, selector: &str) -> anyhow::Result<Task> {
    if let Ok(id) = Uuid::parse_str(selector) {
        return Ok(store.get_task(board.id, id)?);
    }
    let needle = selector.to_ascii_lowercase().replace('-', "");
    if needle.is_empty() {
        bail!("task id must not be empty");
    }
    let mut matches: Vec<Task> = store
        .list_tasks(board.id)?
        .into_iter()
        .filter(|t| t.id.simple().to_string().starts_with(&needle))
        .collect();
    match matches.len() {
        0 => bail!("task '{selector}' not found on board '{}'", board.slug),
        1 => Ok(matches.remove(0)),
        n => bail!("task prefix '{selector}' matches {n} tasks"),
    }
}
