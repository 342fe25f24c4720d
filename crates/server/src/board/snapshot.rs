//! Denormalized board read model assembled from persisted rows.
//!
//! The snapshot is the sole view the UI consumes and is rebuilt wholesale after
//! every mutation; incremental patching is never assumed correct across
//! clients.

use std::collections::HashMap;

use serde::Serialize;

use crate::db::models::{Project, Task};

/// A project column together with its ordered task ids.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectColumn {
    #[serde(flatten)]
    pub project: Project,
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub projects: HashMap<String, ProjectColumn>,
    pub tasks: HashMap<String, Task>,
    pub project_order: Vec<String>,
}

impl BoardSnapshot {
    pub fn task_order(&self, project_id: &str) -> Option<&[String]> {
        self.projects
            .get(project_id)
            .map(|column| column.task_ids.as_slice())
    }
}

/// Build the snapshot from raw rows. Rows are defensively re-sorted by
/// `order_index` (source query ordering is not trusted), and tasks referencing
/// a project that no longer exists are dropped rather than failing the build —
/// they are the residue of a concurrent delete racing this read.
pub fn build(mut projects: Vec<Project>, tasks: Vec<Task>) -> BoardSnapshot {
    projects.sort_by(|a, b| a.order_index.cmp(&b.order_index).then(a.id.cmp(&b.id)));

    let project_order: Vec<String> = projects.iter().map(|p| p.id.clone()).collect();

    let mut columns: HashMap<String, ProjectColumn> = projects
        .into_iter()
        .map(|project| {
            (
                project.id.clone(),
                ProjectColumn {
                    project,
                    task_ids: Vec::new(),
                },
            )
        })
        .collect();

    let mut task_map: HashMap<String, Task> = HashMap::new();
    let mut by_project: HashMap<String, Vec<(i64, String)>> = HashMap::new();
    for task in tasks {
        if !columns.contains_key(&task.project_id) {
            continue;
        }
        by_project
            .entry(task.project_id.clone())
            .or_default()
            .push((task.order_index, task.id.clone()));
        task_map.insert(task.id.clone(), task);
    }

    for (project_id, mut entries) in by_project {
        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        if let Some(column) = columns.get_mut(&project_id) {
            column.task_ids = entries.into_iter().map(|(_, id)| id).collect();
        }
    }

    BoardSnapshot {
        projects: columns,
        tasks: task_map,
        project_order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{TaskPriority, TaskStatus};

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

    #[test]
    fn projects_and_tasks_are_resorted_by_order_index() {
        let snapshot = build(
            vec![project("P2", 1), project("P1", 0)],
            vec![task("T3", "P1", 2), task("T1", "P1", 0), task("T2", "P1", 1)],
        );

        assert_eq!(snapshot.project_order, vec!["P1", "P2"]);
        assert_eq!(
            snapshot.task_order("P1").unwrap(),
            ["T1".to_string(), "T2".to_string(), "T3".to_string()]
        );
        assert!(snapshot.task_order("P2").unwrap().is_empty());
    }

    #[test]
    fn orphan_tasks_are_dropped_silently() {
        let snapshot = build(
            vec![project("P1", 0)],
            vec![task("T1", "P1", 0), task("T9", "gone", 0)],
        );

        assert!(snapshot.tasks.contains_key("T1"));
        assert!(!snapshot.tasks.contains_key("T9"));
        assert_eq!(snapshot.task_order("P1").unwrap().len(), 1);
    }

    #[test]
    fn empty_board_builds_empty_snapshot() {
        let snapshot = build(vec![], vec![]);
        assert!(snapshot.project_order.is_empty());
        assert!(snapshot.projects.is_empty());
        assert!(snapshot.tasks.is_empty());
    }
}
