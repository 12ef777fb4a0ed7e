//! Ordering rules for tasks inside a column.
//!
//! Positions are sparse `i64` keys. A column's tasks are ordered by
//! `(position, id)`, so equal positions still produce a stable sequence.
//! New keys are taken from the midpoint between the neighbours at the target
//! index; when two neighbours are adjacent integers the whole column is
//! respaced to multiples of [`POSITION_GAP`]. The store applies a plan inside
//! the same write transaction that read the siblings.

use crate::column::ColumnDef;
use crate::error::{KanbanError, Result};
use crate::task::Task;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distance between neighbours after a respace. Sixteen halvings fit in one gap.
pub const POSITION_GAP: i64 = 1 << 16;

/// Where a task sits: the column it occupies and its ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub column: String,
    pub position: i64,
}

/// A sibling's id and current position.
pub type Slot = (Uuid, i64);

/// Result of planning an insert: the new key, plus any siblings whose keys
/// must be rewritten first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan {
    pub position: i64,
    pub renumbered: Vec<Slot>,
}

impl InsertPlan {
    pub fn is_respace(&self) -> bool {
        !self.renumbered.is_empty()
    }
}

/// Sort tasks into column order.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by_key(Task::sort_key);
}

/// Sorted `(id, position)` slots for the tasks in one column, skipping `exclude`.
pub fn slots<'a>(tasks: impl IntoIterator<Item = &'a Task>, exclude: Option<Uuid>) -> Vec<Slot> {
    let mut out: Vec<Slot> = tasks
        .into_iter()
        .filter(|t| Some(t.id) != exclude)
        .map(|t| (t.id, t.position))
        .collect();
    out.sort_by_key(|&(id, position)| (position, id));
    out
}

/// Turn a requested index into a concrete one. `None` appends.
///
/// `len` is the size of the destination column without the moving task, so
/// valid indices are `0..=len`. Negative indices and anything past the end
/// are rejected.
pub fn resolve_index(column: &str, index: Option<i64>, len: usize) -> Result<usize> {
    let Some(requested) = index else {
        return Ok(len);
    };
    match usize::try_from(requested) {
        Ok(i) if i <= len => Ok(i),
        _ => Err(KanbanError::InvalidPosition {
            column: column.to_string(),
            index: requested,
            max: len,
        }),
    }
}

/// Reject a task entering a column that is already at its limit.
///
/// `occupants` counts tasks currently in the column, excluding the mover.
/// Reordering within a column never trips the limit.
pub fn check_capacity(column: &ColumnDef, occupants: usize, entering: bool) -> Result<()> {
    match column.capacity {
        Some(limit) if entering && occupants >= limit => Err(KanbanError::CapacityExceeded {
            column: column.id.clone(),
            limit,
        }),
        _ => Ok(()),
    }
}

/// Plan an insert at `index` into `siblings` (sorted, mover excluded).
pub fn plan_insert(siblings: &[Slot], index: usize) -> InsertPlan {
    let index = index.min(siblings.len());
    let before = index
        .checked_sub(1)
        .and_then(|i| siblings.get(i))
        .map(|s| s.1);
    let after = siblings.get(index).map(|s| s.1);

    if let Some(position) = key_between(before, after) {
        return InsertPlan {
            position,
            renumbered: Vec::new(),
        };
    }

    let mut renumbered = Vec::new();
    for (i, &(id, old)) in siblings.iter().enumerate() {
        let slot = if i < index { i } else { i + 1 };
        let new = spaced(slot);
        if new != old {
            renumbered.push((id, new));
        }
    }
    InsertPlan {
        position: spaced(index),
        renumbered,
    }
}

fn key_between(before: Option<i64>, after: Option<i64>) -> Option<i64> {
    match (before, after) {
        (None, None) => Some(POSITION_GAP),
        (Some(b), None) => b.checked_add(POSITION_GAP),
        (None, Some(a)) => a.checked_sub(POSITION_GAP),
        (Some(b), Some(a)) => {
            let span = a.checked_sub(b)?;
            (span >= 2).then(|| b + span / 2)
        }
    }
}

fn spaced(slot: usize) -> i64 {
    i64::try_from(slot)
        .ok()
        .and_then(|s| s.checked_add(1))
        .and_then(|s| s.checked_mul(POSITION_GAP))
        .unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        let mut v: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        v.sort();
        v
    }

    /// Apply a plan to an in-memory column and return it re-sorted.
    fn apply(column: &mut Vec<Slot>, mover: Uuid, plan: &InsertPlan) {
        for &(id, pos) in &plan.renumbered {
            if let Some(s) = column.iter_mut().find(|s| s.0 == id) {
                s.1 = pos;
            }
        }
        column.retain(|s| s.0 != mover);
        column.push((mover, plan.position));
        column.sort_by_key(|&(id, pos)| (pos, id));
    }

    fn strictly_ordered(column: &[Slot]) -> bool {
        column.windows(2).all(|w| w[0].1 < w[1].1)
    }

    #[test]
    fn empty_column_uses_baseline() {
        let plan = plan_insert(&[], 0);
        assert_eq!(plan.position, POSITION_GAP);
        assert!(!plan.is_respace());
    }

    #[test]
    fn append_goes_after_max() {
        let id = ids(2);
        let siblings = vec![(id[0], 10), (id[1], 500)];
        let plan = plan_insert(&siblings, 2);
        assert_eq!(plan.position, 500 + POSITION_GAP);
    }

    #[test]
    fn prepend_goes_before_min() {
        let id = ids(1);
        let plan = plan_insert(&[(id[0], 10)], 0);
        assert!(plan.position < 10);
    }

    #[test]
    fn insert_takes_midpoint() {
        let id = ids(2);
        let plan = plan_insert(&[(id[0], 100), (id[1], 200)], 1);
        assert_eq!(plan.position, 150);
        assert!(!plan.is_respace());
    }

    #[test]
    fn adjacent_neighbours_trigger_respace() {
        let id = ids(3);
        let siblings = vec![(id[0], 7), (id[1], 8), (id[2], 9)];
        let plan = plan_insert(&siblings, 1);
        assert!(plan.is_respace());
        assert_eq!(plan.position, 2 * POSITION_GAP);

        let mut column = siblings.clone();
        let mover = Uuid::new_v4();
        apply(&mut column, mover, &plan);
        let order: Vec<Uuid> = column.iter().map(|s| s.0).collect();
        assert_eq!(order, vec![id[0], mover, id[1], id[2]]);
        assert!(strictly_ordered(&column));
    }

    #[test]
    fn equal_positions_respace_in_tie_break_order() {
        let id = ids(2);
        let siblings = vec![(id[0], 5), (id[1], 5)];
        let plan = plan_insert(&siblings, 1);
        assert!(plan.is_respace());
        let mut column = siblings.clone();
        let mover = Uuid::new_v4();
        apply(&mut column, mover, &plan);
        let order: Vec<Uuid> = column.iter().map(|s| s.0).collect();
        assert_eq!(order, vec![id[0], mover, id[1]]);
    }

    #[test]
    fn append_near_overflow_respaces() {
        let id = ids(1);
        let plan = plan_insert(&[(id[0], i64::MAX - 1)], 1);
        assert!(plan.is_respace());
        assert_eq!(plan.renumbered, vec![(id[0], POSITION_GAP)]);
        assert_eq!(plan.position, 2 * POSITION_GAP);
    }

    #[test]
    fn move_to_front_within_column() {
        // [A, B, C] -> move C to 0 -> [C, A, B]
        let id = ids(3);
        let mut column = vec![
            (id[0], POSITION_GAP),
            (id[1], 2 * POSITION_GAP),
            (id[2], 3 * POSITION_GAP),
        ];
        let siblings: Vec<Slot> = column.iter().copied().filter(|s| s.0 != id[2]).collect();
        let plan = plan_insert(&siblings, 0);
        apply(&mut column, id[2], &plan);
        let order: Vec<Uuid> = column.iter().map(|s| s.0).collect();
        assert_eq!(order, vec![id[2], id[0], id[1]]);
    }

    #[test]
    fn thousands_of_inserts_keep_strict_order() {
        let first = ids(2);
        let mut column = vec![(first[0], POSITION_GAP), (first[1], 2 * POSITION_GAP)];
        for round in 0..5000 {
            let mover = Uuid::new_v4();
            // Always wedge into the same spot to exhaust the local gap quickly.
            let index = 1 + round % 2;
            let plan = plan_insert(&column, index);
            apply(&mut column, mover, &plan);
            assert!(strictly_ordered(&column), "order broke at round {round}");
            assert_eq!(column[index].0, mover);
        }
        assert_eq!(column.len(), 5002);
    }

    #[test]
    fn resolve_index_append_and_reject() {
        assert_eq!(resolve_index("inbox", None, 3).unwrap(), 3);
        assert_eq!(resolve_index("inbox", Some(3), 3).unwrap(), 3);
        assert_eq!(resolve_index("inbox", Some(0), 0).unwrap(), 0);
        let err = resolve_index("inbox", Some(4), 3).unwrap_err();
        assert!(matches!(
            err,
            KanbanError::InvalidPosition { index: 4, max: 3, .. }
        ));
        assert!(err.is_invalid_destination());
        let err = resolve_index("inbox", Some(-1), 3).unwrap_err();
        assert!(matches!(
            err,
            KanbanError::InvalidPosition { index: -1, max: 3, .. }
        ));
    }

    #[test]
    fn capacity_only_guards_entry() {
        let today = ColumnDef::new("today", "Today").with_capacity(3);
        assert!(check_capacity(&today, 2, true).is_ok());
        assert!(check_capacity(&today, 3, false).is_ok());
        let err = check_capacity(&today, 3, true).unwrap_err();
        assert!(matches!(
            err,
            KanbanError::CapacityExceeded { limit: 3, ref column } if column == "today"
        ));

        let inbox = ColumnDef::new("inbox", "Inbox");
        assert!(check_capacity(&inbox, 10_000, true).is_ok());
    }

    #[test]
    fn slots_excludes_mover_and_sorts() {
        let board = Uuid::new_v4();
        let mk = |pos: i64| {
            let mut t = Task::new(
                board,
                crate::task::NewTask::titled("t"),
                Placement {
                    column: "inbox".into(),
                    position: pos,
                },
                None,
            )
            .unwrap();
            t.position = pos;
            t
        };
        let tasks = vec![mk(30), mk(10), mk(20)];
        let s = slots(&tasks, Some(tasks[1].id));
        assert_eq!(s.iter().map(|s| s.1).collect::<Vec<_>>(), vec![20, 30]);
    }
}
