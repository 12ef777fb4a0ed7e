use crate::error::{KanbanError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ColumnDef
// ---------------------------------------------------------------------------

/// One configured column. The set and order of columns is deployment
/// configuration shared by every board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub id: String,
    pub title: String,
    /// Maximum number of tasks the column may hold at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    /// New tasks land here when the caller names no column.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub intake: bool,
}

impl ColumnDef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            capacity: None,
            intake: false,
        }
    }

    pub fn with_capacity(mut self, limit: usize) -> Self {
        self.capacity = Some(limit);
        self
    }

    pub fn as_intake(mut self) -> Self {
        self.intake = true;
        self
    }
}

// ---------------------------------------------------------------------------
// BoardLayout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub columns: Vec<ColumnDef>,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            columns: vec![
                ColumnDef::new("inbox", "Inbox").as_intake(),
                ColumnDef::new("today", "Today").with_capacity(3),
                ColumnDef::new("doing", "Doing"),
                ColumnDef::new("done", "Done"),
            ],
        }
    }
}

impl BoardLayout {
    /// Look up a column by id, rejecting ids outside the configured set.
    pub fn get(&self, id: &str) -> Result<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| KanbanError::InvalidColumn(id.to_string()))
    }

    /// The intake column. Falls back to the first column if none is flagged.
    pub fn intake(&self) -> Result<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.intake)
            .or_else(|| self.columns.first())
            .ok_or_else(|| KanbanError::InvalidColumn("no columns configured".to_string()))
    }

    /// Resolve an optional column id to a column, defaulting to intake.
    pub fn resolve(&self, id: Option<&str>) -> Result<&ColumnDef> {
        match id {
            Some(id) => self.get(id),
            None => self.intake(),
        }
    }

    /// Index of the column in configured order, used to sort board-wide listings.
    pub fn rank(&self, id: &str) -> usize {
        self.columns
            .iter()
            .position(|c| c.id == id)
            .unwrap_or(self.columns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_has_single_limited_column() {
        let layout = BoardLayout::default();
        let limited: Vec<_> = layout
            .columns
            .iter()
            .filter(|c| c.capacity.is_some())
            .collect();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "today");
        assert_eq!(limited[0].capacity, Some(3));
    }

    #[test]
    fn resolve_defaults_to_intake() {
        let layout = BoardLayout::default();
        assert_eq!(layout.resolve(None).unwrap().id, "inbox");
        assert_eq!(layout.resolve(Some("done")).unwrap().id, "done");
    }

    #[test]
    fn unknown_column_is_rejected() {
        let layout = BoardLayout::default();
        let err = layout.get("archive").unwrap_err();
        assert!(matches!(err, KanbanError::InvalidColumn(ref c) if c == "archive"));
        assert!(err.is_invalid_destination());
    }

    #[test]
    fn rank_follows_configured_order() {
        let layout = BoardLayout::default();
        assert!(layout.rank("inbox") < layout.rank("today"));
        assert!(layout.rank("doing") < layout.rank("done"));
        assert_eq!(layout.rank("ghost"), layout.columns.len());
    }

    #[test]
    fn intake_falls_back_to_first_column() {
        let layout = BoardLayout {
            columns: vec![ColumnDef::new("a", "A"), ColumnDef::new("b", "B")],
        };
        assert_eq!(layout.intake().unwrap().id, "a");
    }
}
