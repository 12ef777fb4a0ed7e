use crate::column::BoardLayout;
use crate::task::Task;
use crate::types::Priority;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

/// Board-level task filter. Every set field must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    /// Case-insensitive substring over title and description.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub assignee: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Tasks due on or before this date. Tasks without a due date never match.
    #[serde(default)]
    pub due_before: Option<NaiveDate>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.q.as_deref().map_or(true, |q| q.trim().is_empty())
            && self.column.is_none()
            && self.tag.is_none()
            && self.assignee.is_none()
            && self.priority.is_none()
            && self.due_before.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_desc = task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_desc {
                return false;
            }
        }
        if let Some(column) = &self.column {
            if &task.column != column {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            let tag = tag.trim().to_lowercase();
            if !task.tags.contains(&tag) {
                return false;
            }
        }
        if let Some(assignee) = self.assignee {
            if !task.assignees.contains(&assignee) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(limit) = self.due_before {
            if !task.due_date.is_some_and(|d| d <= limit) {
                return false;
            }
        }
        true
    }

    /// Filter tasks and return them in board order: column order, then placement.
    pub fn apply(&self, layout: &BoardLayout, tasks: Vec<Task>) -> Vec<Task> {
        let mut out: Vec<Task> = tasks.into_iter().filter(|t| self.matches(t)).collect();
        out.sort_by_key(|t| (layout.rank(&t.column), t.sort_key()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::Placement;
    use crate::task::NewTask;

    fn task(column: &str, position: i64, title: &str) -> Task {
        Task::new(
            Uuid::nil(),
            NewTask::titled(title),
            Placement {
                column: column.into(),
                position,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn q_matches_title_or_description_ignoring_case() {
        let mut t = task("inbox", 1, "Fix LOGIN bug");
        let filter = TaskFilter {
            q: Some("login".into()),
            ..TaskFilter::default()
        };
        assert!(filter.matches(&t));

        let filter = TaskFilter {
            q: Some("oauth".into()),
            ..TaskFilter::default()
        };
        assert!(!filter.matches(&t));
        t.description = Some("Switch to OAuth callback".into());
        assert!(filter.matches(&t));
    }

    #[test]
    fn combined_fields_all_must_match() {
        let mut t = task("today", 1, "Ship");
        t.tags = vec!["release".into()];
        t.priority = Priority::High;
        t.due_date = NaiveDate::from_ymd_opt(2026, 5, 1);

        let filter = TaskFilter {
            tag: Some("Release".into()),
            priority: Some(Priority::High),
            due_before: NaiveDate::from_ymd_opt(2026, 5, 1),
            ..TaskFilter::default()
        };
        assert!(filter.matches(&t));

        let filter = TaskFilter {
            column: Some("done".into()),
            ..filter
        };
        assert!(!filter.matches(&t));
    }

    #[test]
    fn due_before_skips_undated() {
        let t = task("inbox", 1, "Someday");
        let filter = TaskFilter {
            due_before: NaiveDate::from_ymd_opt(2030, 1, 1),
            ..TaskFilter::default()
        };
        assert!(!filter.matches(&t));
    }

    #[test]
    fn apply_returns_board_order() {
        let layout = BoardLayout::default();
        let tasks = vec![
            task("done", 1, "d"),
            task("inbox", 20, "b"),
            task("today", 5, "c"),
            task("inbox", 10, "a"),
        ];
        let out = TaskFilter::default().apply(&layout, tasks);
        let titles: Vec<&str> = out.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c", "d"]);
        assert!(TaskFilter::default().is_empty());
    }
}
