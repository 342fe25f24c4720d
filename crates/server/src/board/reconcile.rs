//! Drag-end reconciliation: interprets a raw drag gesture against the latest
//! known snapshot and turns it into one canonical board mutation, or refuses.
//!
//! Blindly trusting gesture coordinates against a stale snapshot is the most
//! likely source of order corruption in a multi-client board, so a gesture is
//! only committed after the dragged entity and both containers are confirmed
//! to still exist.

use serde::{Deserialize, Serialize};

use super::snapshot::BoardSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragKind {
    Project,
    Task,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTarget {
    pub container_id: String,
    pub index: usize,
}

/// A completed drag gesture as reported by the client. `destination` is absent
/// when the entity was dropped outside any valid target.
#[derive(Debug, Clone, Deserialize)]
pub struct DragGesture {
    pub kind: DragKind,
    pub entity_id: String,
    pub source: DropTarget,
    pub destination: Option<DropTarget>,
}

/// The three canonical mutations a drag can resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BoardMutation {
    ReorderProject {
        project_id: String,
        to_index: usize,
    },
    ReorderTask {
        project_id: String,
        task_id: String,
        to_index: usize,
    },
    MoveTask {
        from_project_id: String,
        to_project_id: String,
        task_id: String,
        to_index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// No destination, or dropped back where it started: nothing to do.
    Aborted,
    /// The gesture references state that no longer exists; the caller must
    /// discard it and force a full snapshot refetch instead of mutating.
    Rejected,
    Commit(BoardMutation),
}

pub fn reconcile(gesture: &DragGesture, snapshot: &BoardSnapshot) -> DragOutcome {
    let destination = match &gesture.destination {
        Some(d) => d,
        None => return DragOutcome::Aborted,
    };

    if *destination == gesture.source {
        return DragOutcome::Aborted;
    }

    match gesture.kind {
        DragKind::Project => {
            if !snapshot.projects.contains_key(&gesture.entity_id) {
                return DragOutcome::Rejected;
            }
            DragOutcome::Commit(BoardMutation::ReorderProject {
                project_id: gesture.entity_id.clone(),
                to_index: destination.index,
            })
        }
        DragKind::Task => {
            let task = match snapshot.tasks.get(&gesture.entity_id) {
                Some(t) => t,
                None => return DragOutcome::Rejected,
            };
            if !snapshot.projects.contains_key(&gesture.source.container_id)
                || !snapshot.projects.contains_key(&destination.container_id)
            {
                return DragOutcome::Rejected;
            }
            // The task moved containers since the gesture started
            if task.project_id != gesture.source.container_id {
                return DragOutcome::Rejected;
            }

            if gesture.source.container_id == destination.container_id {
                DragOutcome::Commit(BoardMutation::ReorderTask {
                    project_id: destination.container_id.clone(),
                    task_id: gesture.entity_id.clone(),
                    to_index: destination.index,
                })
            } else {
                DragOutcome::Commit(BoardMutation::MoveTask {
                    from_project_id: gesture.source.container_id.clone(),
                    to_project_id: destination.container_id.clone(),
                    task_id: gesture.entity_id.clone(),
                    to_index: destination.index,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::snapshot::build;
    use crate::db::models::{Project, Task, TaskPriority, TaskStatus};

    fn project(id: &str, order_index: i64) -> Project {
        Project {
            id: id.into(),
            organization_id: "org-1".into(),
            title: format!("Project {id}"),
            order_index,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn task(id: &str, project_id: &str, order_index: i64) -> Task {
        Task {
            id: id.into(),
            project_id: project_id.into(),
            title: format!("Task {id}"),
            description: None,
            assignee_ids: vec![],
            eta: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::P2,
            tags: vec![],
            order_index,
            comment_count: 0,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn snapshot() -> BoardSnapshot {
        build(
            vec![project("P1", 0), project("P2", 1)],
            vec![task("T1", "P1", 0), task("T2", "P1", 1), task("T3", "P2", 0)],
        )
    }

    fn target(container: &str, index: usize) -> DropTarget {
        DropTarget {
            container_id: container.into(),
            index,
        }
    }

    #[test]
    fn missing_destination_aborts() {
        let gesture = DragGesture {
            kind: DragKind::Task,
            entity_id: "T1".into(),
            source: target("P1", 0),
            destination: None,
        };
        assert_eq!(reconcile(&gesture, &snapshot()), DragOutcome::Aborted);
    }

    #[test]
    fn dropping_in_place_aborts() {
        let gesture = DragGesture {
            kind: DragKind::Task,
            entity_id: "T1".into(),
            source: target("P1", 0),
            destination: Some(target("P1", 0)),
        };
        assert_eq!(reconcile(&gesture, &snapshot()), DragOutcome::Aborted);
    }

    #[test]
    fn project_drag_classifies_as_reorder_project() {
        let gesture = DragGesture {
            kind: DragKind::Project,
            entity_id: "P2".into(),
            source: target("board", 1),
            destination: Some(target("board", 0)),
        };
        assert_eq!(
            reconcile(&gesture, &snapshot()),
            DragOutcome::Commit(BoardMutation::ReorderProject {
                project_id: "P2".into(),
                to_index: 0,
            })
        );
    }

    #[test]
    fn same_column_drag_classifies_as_reorder_task() {
        let gesture = DragGesture {
            kind: DragKind::Task,
            entity_id: "T1".into(),
            source: target("P1", 0),
            destination: Some(target("P1", 1)),
        };
        assert_eq!(
            reconcile(&gesture, &snapshot()),
            DragOutcome::Commit(BoardMutation::ReorderTask {
                project_id: "P1".into(),
                task_id: "T1".into(),
                to_index: 1,
            })
        );
    }

    #[test]
    fn cross_column_drag_classifies_as_move_task() {
        let gesture = DragGesture {
            kind: DragKind::Task,
            entity_id: "T1".into(),
            source: target("P1", 0),
            destination: Some(target("P2", 1)),
        };
        assert_eq!(
            reconcile(&gesture, &snapshot()),
            DragOutcome::Commit(BoardMutation::MoveTask {
                from_project_id: "P1".into(),
                to_project_id: "P2".into(),
                task_id: "T1".into(),
                to_index: 1,
            })
        );
    }

    #[test]
    fn vanished_task_is_rejected() {
        let gesture = DragGesture {
            kind: DragKind::Task,
            entity_id: "T-deleted".into(),
            source: target("P1", 0),
            destination: Some(target("P2", 0)),
        };
        assert_eq!(reconcile(&gesture, &snapshot()), DragOutcome::Rejected);
    }

    #[test]
    fn vanished_destination_container_is_rejected() {
        let gesture = DragGesture {
            kind: DragKind::Task,
            entity_id: "T1".into(),
            source: target("P1", 0),
            destination: Some(target("P-deleted", 0)),
        };
        assert_eq!(reconcile(&gesture, &snapshot()), DragOutcome::Rejected);
    }

    #[test]
    fn task_that_already_moved_columns_is_rejected() {
        // Gesture claims T3 is in P1, but the snapshot has it in P2
        let gesture = DragGesture {
            kind: DragKind::Task,
            entity_id: "T3".into(),
            source: target("P1", 0),
            destination: Some(target("P1", 1)),
        };
        assert_eq!(reconcile(&gesture, &snapshot()), DragOutcome::Rejected);
    }

    #[test]
    fn vanished_project_drag_is_rejected() {
        let gesture = DragGesture {
            kind: DragKind::Project,
            entity_id: "P-deleted".into(),
            source: target("board", 0),
            destination: Some(target("board", 1)),
        };
        assert_eq!(reconcile(&gesture, &snapshot()), DragOutcome::Rejected);
    }
}
