use crate::column::{BoardLayout, ColumnDef};
use crate::error::Result;
use crate::paths;
use crate::placement::sort_tasks;
use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A team. Users and boards belong to exactly one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub account_id: Uuid,
    pub slug: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(account_id: Uuid, slug: impl Into<String>, title: impl Into<String>) -> Result<Self> {
        let slug = slug.into();
        paths::validate_slug(&slug)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            slug,
            title: title.into(),
            created_at: now,
            updated_at: now,
        })
    }
}

// ---------------------------------------------------------------------------
// BoardView
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ColumnView {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    pub count: usize,
    pub tasks: Vec<Task>,
}

/// A board with its tasks grouped into configured columns, each in order.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub board: Board,
    pub columns: Vec<ColumnView>,
}

impl BoardView {
    pub fn build(layout: &BoardLayout, board: Board, tasks: Vec<Task>) -> Self {
        let mut columns: Vec<ColumnView> = layout.columns.iter().map(empty_column).collect();
        for task in tasks {
            match columns.iter_mut().find(|c| c.id == task.column) {
                Some(col) => col.tasks.push(task),
                None => tracing::warn!(
                    task = %task.id,
                    column = %task.column,
                    "task sits in a column that is no longer configured"
                ),
            }
        }
        for col in &mut columns {
            sort_tasks(&mut col.tasks);
            col.count = col.tasks.len();
        }
        Self { board, columns }
    }

    pub fn column(&self, id: &str) -> Option<&ColumnView> {
        self.columns.iter().find(|c| c.id == id)
    }
}

fn empty_column(def: &ColumnDef) -> ColumnView {
    ColumnView {
        id: def.id.clone(),
        title: def.title.clone(),
        capacity: def.capacity,
        count: 0,
        tasks: Vec::new(),
    }
}
