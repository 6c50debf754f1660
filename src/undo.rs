//! Apply history entries to the entity store.
//!
//! Semantics per kind:
//! - Project add/remove re-insert the stored snapshot in id order
//! - Task create inserts at the head; task delete restores the original index
//! - Toggles restore the completion time and points of the other state
//! - Updates write the `before` or `after` field set
//!
//! Only the store is touched. Points, streaks and achievements are derived
//! from it afterwards.

use tracing::debug;

use crate::history::{HistoryEntry, HistoryOp};
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Redo.
    Forward,
    /// Undo.
    Reverse,
}

/// Apply `entry` in `direction`. Returns false when the target no longer
/// exists in the store, in which case nothing changed.
pub fn apply(store: &mut EntityStore, entry: &HistoryEntry, direction: Direction) -> bool {
    let applied = match (&entry.op, direction) {
        (HistoryOp::ProjectAdd { project }, Direction::Forward)
        | (HistoryOp::ProjectRemove { project }, Direction::Reverse) => {
            store.insert_project(project.clone())
        }
        (HistoryOp::ProjectAdd { project }, Direction::Reverse)
        | (HistoryOp::ProjectRemove { project }, Direction::Forward) => {
            store.remove_project(project.id).is_some()
        }
        (
            HistoryOp::ProjectUpdate {
                project_id,
                before,
                after,
            },
            direction,
        ) => {
            let fields = match direction {
                Direction::Forward => after,
                Direction::Reverse => before,
            };
            store.set_project_fields(*project_id, fields)
        }
        (HistoryOp::TaskCreate { project_id, task }, Direction::Forward) => {
            store.insert_task(*project_id, 0, task.clone())
        }
        (HistoryOp::TaskCreate { project_id, task }, Direction::Reverse)
        | (HistoryOp::TaskDelete { project_id, task, .. }, Direction::Forward) => {
            store.delete_task(*project_id, task.id).is_some()
        }
        (
            HistoryOp::TaskDelete {
                project_id,
                index,
                task,
            },
            Direction::Reverse,
        ) => store.insert_task(*project_id, *index, task.clone()),
        (
            HistoryOp::TaskToggle {
                project_id,
                task_id,
                done,
                completed_at,
                points,
                previous_completed_at,
                previous_points,
            },
            direction,
        ) => match direction {
            Direction::Forward => {
                store.set_task_done(*project_id, *task_id, *done, *completed_at, *points)
            }
            Direction::Reverse => store.set_task_done(
                *project_id,
                *task_id,
                !*done,
                *previous_completed_at,
                *previous_points,
            ),
        },
        (
            HistoryOp::TaskUpdate {
                project_id,
                task_id,
                before,
                after,
            },
            direction,
        ) => {
            let fields = match direction {
                Direction::Forward => after,
                Direction::Reverse => before,
            };
            store.set_task_fields(*project_id, *task_id, fields)
        }
        (HistoryOp::TaskReorder { project_id, from, to }, Direction::Forward) => {
            store.move_task(*project_id, *from, *to)
        }
        (HistoryOp::TaskReorder { project_id, from, to }, Direction::Reverse) => {
            store.move_task(*project_id, *to, *from)
        }
    };

    debug!(
        kind = entry.op.kind(),
        ?direction,
        applied,
        "applied history entry"
    );
    applied
}
