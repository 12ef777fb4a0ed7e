//! Persistent storage for accounts, boards, tasks and their satellites using redb.
//!
//! # Table design
//!
//! Every table maps raw byte keys to JSON-encoded rows. Child rows use a
//! 32-byte composite key so one range scan returns all rows of a parent:
//!
//! ```text
//! tasks:        [ board_id: 16 bytes | task_id: 16 bytes ]
//! comments:     [ task_id:  16 bytes | comment_id: 16 bytes ]
//! attachments:  [ task_id:  16 bytes | attachment_id: 16 bytes ]
//! ```
//!
//! `task_index` maps a bare task id to its board id. `user_emails` maps a
//! normalized email to a user id. Sessions and invites are keyed by token.
//!
//! redb admits one write transaction at a time, and every placement
//! operation reads its siblings and writes the result inside a single write
//! transaction. A capacity count therefore cannot go stale before the write
//! that depends on it, and a rejected operation drops its transaction
//! without committing anything.

mod accounts;
mod boards;
mod comments;
mod tasks;

use std::path::Path;

use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::column::BoardLayout;
use crate::config::Config;
use crate::error::{KanbanError, Result};
use crate::paths;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

pub(crate) const ACCOUNTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("accounts");
pub(crate) const USERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("users");
pub(crate) const USER_EMAILS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("user_emails");
pub(crate) const SESSIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("sessions");
pub(crate) const INVITES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("invites");
pub(crate) const BOARDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("boards");
pub(crate) const TASKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tasks");
pub(crate) const TASK_INDEX: TableDefinition<&[u8], &[u8]> = TableDefinition::new("task_index");
pub(crate) const COMMENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("comments");
pub(crate) const ATTACHMENTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("attachments");

const ALL_TABLES: [TableDefinition<&[u8], &[u8]>; 10] = [
    ACCOUNTS,
    USERS,
    USER_EMAILS,
    SESSIONS,
    INVITES,
    BOARDS,
    TASKS,
    TASK_INDEX,
    COMMENTS,
    ATTACHMENTS,
];

type Bytes = &'static [u8];

// ---------------------------------------------------------------------------
// Key and codec helpers
// ---------------------------------------------------------------------------

pub(crate) fn storage(e: impl std::fmt::Display) -> KanbanError {
    KanbanError::Storage(e.to_string())
}

/// Composite key: parent id followed by child id.
pub(crate) fn pair_key(parent: Uuid, child: Uuid) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(parent.as_bytes());
    key[16..].copy_from_slice(child.as_bytes());
    key
}

/// Inclusive bounds covering every composite key under `parent`.
fn prefix_bounds(parent: Uuid) -> ([u8; 32], [u8; 32]) {
    let mut lo = [0u8; 32];
    lo[..16].copy_from_slice(parent.as_bytes());
    let mut hi = [0xffu8; 32];
    hi[..16].copy_from_slice(parent.as_bytes());
    (lo, hi)
}

pub(crate) fn get_json<T, Tbl>(table: &Tbl, key: &[u8]) -> Result<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<Bytes, Bytes>,
{
    match table.get(key).map_err(storage)? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

/// All rows stored under `parent` in a composite-keyed table, in key order.
pub(crate) fn scan_children<T, Tbl>(table: &Tbl, parent: Uuid) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<Bytes, Bytes>,
{
    let (lo, hi) = prefix_bounds(parent);
    let mut out = Vec::new();
    for entry in table
        .range(lo.as_slice()..=hi.as_slice())
        .map_err(storage)?
    {
        let (_, v) = entry.map_err(storage)?;
        out.push(serde_json::from_slice(v.value())?);
    }
    Ok(out)
}

/// Every row of a table, in key order.
pub(crate) fn scan_all<T, Tbl>(table: &Tbl) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<Bytes, Bytes>,
{
    let mut out = Vec::new();
    for entry in table.iter().map_err(storage)? {
        let (_, v) = entry.map_err(storage)?;
        out.push(serde_json::from_slice(v.value())?);
    }
    Ok(out)
}

pub(crate) fn put_json<T: Serialize>(
    table: &mut Table<'_, Bytes, Bytes>,
    key: &[u8],
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    table.insert(key, bytes.as_slice()).map_err(storage)?;
    Ok(())
}

pub(crate) fn remove_key(table: &mut Table<'_, Bytes, Bytes>, key: &[u8]) -> Result<bool> {
    Ok(table.remove(key).map_err(storage)?.is_some())
}

/// Remove every row under `parent`, returning the decoded rows.
pub(crate) fn remove_children<T: DeserializeOwned>(
    table: &mut Table<'_, Bytes, Bytes>,
    parent: Uuid,
) -> Result<Vec<T>> {
    let rows: Vec<T> = scan_children(&*table, parent)?;
    let (lo, hi) = prefix_bounds(parent);
    let mut keys: Vec<Vec<u8>> = Vec::with_capacity(rows.len());
    for entry in table
        .range(lo.as_slice()..=hi.as_slice())
        .map_err(storage)?
    {
        let (k, _) = entry.map_err(storage)?;
        keys.push(k.value().to_vec());
    }
    for key in &keys {
        table.remove(key.as_slice()).map_err(storage)?;
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Transactional store for the whole board domain.
pub struct Store {
    db: Database,
    layout: BoardLayout,
}

impl Store {
    /// Open or create the redb database at `path`.
    ///
    /// Creates every table up front so read transactions never see a
    /// missing table.
    pub fn open(path: &Path, layout: BoardLayout) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(storage)?;
        let wt = db.begin_write().map_err(storage)?;
        for table in ALL_TABLES {
            wt.open_table(table).map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        tracing::debug!(path = %path.display(), "opened kanban database");
        Ok(Self { db, layout })
    }

    /// Open the database of an initialized project using its configured layout.
    pub fn open_project(root: &Path, config: &Config) -> Result<Self> {
        if !paths::config_path(root).exists() {
            return Err(KanbanError::NotInitialized);
        }
        Self::open(&paths::database_path(root), config.board.clone())
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}
