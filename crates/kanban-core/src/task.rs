use crate::error::{KanbanError, Result};
use crate::placement::Placement;
use crate::types::Priority;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const MAX_TITLE_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub board_id: Uuid,
    pub column: String,
    pub position: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a task from validated input at the given placement.
    pub fn new(
        board_id: Uuid,
        input: NewTask,
        placement: Placement,
        created_by: Option<Uuid>,
    ) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            board_id,
            column: placement.column,
            position: placement.position,
            title: validate_title(&input.title)?,
            description: normalize_description(input.description),
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            tags: normalize_tags(input.tags),
            assignees: dedupe_ids(input.assignees),
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn placement(&self) -> Placement {
        Placement {
            column: self.column.clone(),
            position: self.position,
        }
    }

    /// Total order within a column: position, then id.
    pub fn sort_key(&self) -> (i64, Uuid) {
        (self.position, self.id)
    }

    /// Apply a field edit. Placement is never touched here.
    pub fn apply(&mut self, patch: TaskPatch) -> Result<()> {
        if let Some(title) = patch.title {
            self.title = validate_title(&title)?;
        }
        if let Some(description) = patch.description {
            self.description = normalize_description(description);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due) = patch.due_date {
            self.due_date = due;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(assignees) = patch.assignees {
            self.assignees = dedupe_ids(assignees);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Target column; the intake column when absent.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<Uuid>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

/// Partial update. `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub assignees: Option<Vec<Uuid>>,
}

fn double_option<'de, T, D>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(KanbanError::InvalidInput("title must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(KanbanError::InvalidInput(format!(
            "title is longer than {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}

/// Trim, lowercase and de-duplicate tags, keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn dedupe_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(column: &str, position: i64) -> Placement {
        Placement {
            column: column.to_string(),
            position,
        }
    }

    #[test]
    fn new_task_normalizes_fields() {
        let mut input = NewTask::titled("  Write release notes  ");
        input.tags = vec!["Docs".into(), " docs ".into(), "".into(), "release".into()];
        input.description = Some("   ".into());
        let task = Task::new(Uuid::new_v4(), input, placed("inbox", 1024), None).unwrap();

        assert_eq!(task.title, "Write release notes");
        assert_eq!(task.tags, vec!["docs", "release"]);
        assert!(task.description.is_none());
        assert_eq!(task.priority, Priority::Normal);
        assert_eq!(task.column, "inbox");
    }

    #[test]
    fn empty_title_rejected() {
        let err = Task::new(Uuid::new_v4(), NewTask::titled("  "), placed("inbox", 1), None)
            .unwrap_err();
        assert!(matches!(err, KanbanError::InvalidInput(_)));
    }

    #[test]
    fn overlong_title_rejected() {
        let title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(validate_title(&title).is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN)).is_ok());
    }

    #[test]
    fn patch_leaves_placement_alone() {
        let mut task =
            Task::new(Uuid::new_v4(), NewTask::titled("a"), placed("doing", 42), None).unwrap();
        task.apply(TaskPatch {
            title: Some("b".into()),
            priority: Some(Priority::Urgent),
            ..TaskPatch::default()
        })
        .unwrap();
        assert_eq!(task.title, "b");
        assert_eq!(task.priority, Priority::Urgent);
        assert_eq!(task.placement(), placed("doing", 42));
    }

    #[test]
    fn patch_null_clears_due_date() {
        let mut input = NewTask::titled("a");
        input.due_date = NaiveDate::from_ymd_opt(2026, 3, 1);
        let mut task = Task::new(Uuid::new_v4(), input, placed("inbox", 1), None).unwrap();

        let patch: TaskPatch = serde_json::from_str(r#"{"due_date": null}"#).unwrap();
        task.apply(patch).unwrap();
        assert!(task.due_date.is_none());

        let patch: TaskPatch = serde_json::from_str(r#"{"title": "c"}"#).unwrap();
        assert!(patch.due_date.is_none());
    }

    #[test]
    fn sort_key_breaks_ties_by_id() {
        let board = Uuid::new_v4();
        let a = Task::new(board, NewTask::titled("a"), placed("inbox", 5), None).unwrap();
        let b = Task::new(board, NewTask::titled("b"), placed("inbox", 5), None).unwrap();
        assert_ne!(a.sort_key(), b.sort_key());
        assert_eq!(a.sort_key().cmp(&b.sort_key()), a.id.cmp(&b.id));
    }
}
