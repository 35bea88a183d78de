//! Derived views: subtask roll-ups, project dependency graphs and impact
//! analysis.

use crate::filter::DependencyFilter;
use crate::model::{ProjectId, StatusCategory, Task, TaskDependency, TaskId, TaskStatus};
use crate::service::TaskGraphService;
use crate::store::{DependencyStore, TaskStore};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, instrument, warn};
use trellis_graph::DependencyGraph;

/// Which subtasks a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SummaryScope {
    /// Direct children only.
    #[default]
    Direct,
    /// Every descendant down to the maximum hierarchy depth.
    Recursive,
}

/// Progress roll-up over the subtasks of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskSummary {
    /// The parent task.
    pub parent_task_id: TaskId,
    /// Number of subtasks counted.
    pub total_subtasks: usize,
    /// Subtasks in a terminal status.
    pub completed_subtasks: usize,
    /// Subtasks in an active status.
    pub in_progress_subtasks: usize,
    /// Subtasks not started.
    pub todo_subtasks: usize,
    /// `completed / total * 100`, rounded to two decimals; `0.0` without subtasks.
    pub completion_percentage: f64,
    /// Sum of estimates.
    pub estimated_hours: f64,
    /// Sum of logged time.
    pub logged_hours: f64,
    /// Sum of `max(estimated - logged, 0)`.
    pub remaining_hours: f64,
}

impl SubtaskSummary {
    fn from_subtasks(parent_task_id: TaskId, subtasks: &[Task]) -> Self {
        let mut summary = Self {
            parent_task_id,
            total_subtasks: subtasks.len(),
            completed_subtasks: 0,
            in_progress_subtasks: 0,
            todo_subtasks: 0,
            completion_percentage: 0.0,
            estimated_hours: 0.0,
            logged_hours: 0.0,
            remaining_hours: 0.0,
        };

        for task in subtasks {
            match task.status.category() {
                StatusCategory::Terminal => summary.completed_subtasks += 1,
                StatusCategory::Active => summary.in_progress_subtasks += 1,
                StatusCategory::Pending => summary.todo_subtasks += 1,
            }
            let estimated = task.estimated_hours.unwrap_or(0.0);
            let logged = task.logged_hours.unwrap_or(0.0);
            summary.estimated_hours += estimated;
            summary.logged_hours += logged;
            summary.remaining_hours += (estimated - logged).max(0.0);
        }

        if summary.total_subtasks > 0 {
            #[allow(clippy::cast_precision_loss)]
            let ratio = summary.completed_subtasks as f64 / summary.total_subtasks as f64;
            summary.completion_percentage = (ratio * 10_000.0).round() / 100.0;
        }
        summary
    }
}

/// A task in a [`ProjectDependencyGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGraphNode {
    /// The task.
    pub task_id: TaskId,
    /// Task key.
    pub key: String,
    /// Task title.
    pub title: String,
    /// Task status.
    pub status: TaskStatus,
    /// Longest chain of blockers in front of the task.
    pub level: usize,
}

/// Dependency graph of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDependencyGraph {
    /// The project.
    pub project_id: ProjectId,
    /// One node per project task, ordered by level then key.
    pub nodes: Vec<ProjectGraphNode>,
    /// Every edge whose endpoints both belong to the project.
    pub edges: Vec<TaskDependency>,
    /// Cycles among blocking edges. Empty unless the store was corrupted.
    pub cycles: Vec<Vec<TaskId>>,
}

/// How a task is reached from the analysed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    /// Waits on the analysed task directly.
    Direct,
    /// Waits through at least one intermediate task.
    Indirect,
}

/// A task affected by a delay of the analysed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactedTask {
    /// The affected task.
    pub task_id: TaskId,
    /// Its key, `None` if missing from the store.
    pub key: Option<String>,
    /// Its title, `None` if missing from the store.
    pub title: Option<String>,
    /// Its status, `None` if missing from the store.
    pub status: Option<TaskStatus>,
    /// Direct or indirect.
    pub impact: ImpactLevel,
    /// Blocking edges between the two tasks.
    pub distance: usize,
}

/// Transitive dependents of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    /// The analysed task.
    pub task_id: TaskId,
    /// Affected tasks in breadth-first order.
    pub impacted: Vec<ImpactedTask>,
    /// Longest chain of dependents, starting with the analysed task.
    pub critical_path: Vec<TaskId>,
    /// `impacted.len()`.
    pub total_impacted: usize,
    /// Whether the depth cap cut the walk short.
    pub truncated: bool,
}

impl<T: TaskStore, D: DependencyStore> TaskGraphService<T, D> {
    /// Roll up the direct subtasks of a task.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the parent does not exist.
    pub fn get_subtask_summary(&self, parent_task_id: &TaskId) -> Result<SubtaskSummary> {
        self.get_subtask_summary_with_scope(parent_task_id, SummaryScope::Direct)
    }

    /// Roll up the subtasks of a task in the given scope.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the parent does not exist.
    #[instrument(skip(self))]
    pub fn get_subtask_summary_with_scope(
        &self,
        parent_task_id: &TaskId,
        scope: SummaryScope,
    ) -> Result<SubtaskSummary> {
        self.require_task(parent_task_id)?;
        let subtasks = match scope {
            SummaryScope::Direct => self.tasks.list_children(parent_task_id)?,
            SummaryScope::Recursive => self.descendants(parent_task_id)?,
        };
        Ok(SubtaskSummary::from_subtasks(parent_task_id.clone(), &subtasks))
    }

    fn descendants(&self, root: &TaskId) -> Result<Vec<Task>> {
        let max_depth = self.config.hierarchy.max_depth;
        let mut seen = HashSet::from([root.clone()]);
        let mut queue = VecDeque::from([(root.clone(), 0usize)]);
        let mut found = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for child in self.tasks.list_children(&current)? {
                if !seen.insert(child.id.clone()) {
                    warn!(task = %current, child = %child.id, "Hierarchy loop, skipping subtask");
                    continue;
                }
                queue.push_back((child.id.clone(), depth + 1));
                found.push(child);
            }
        }

        Ok(found)
    }

    /// Build the dependency graph of a project.
    ///
    /// Edges to tasks of other projects are left out. Levels and cycles are
    /// computed over blocking edges only.
    ///
    /// # Errors
    ///
    /// Returns an error if a store fails.
    #[instrument(skip(self))]
    pub fn generate_dependency_graph(&self, project_id: &ProjectId) -> Result<ProjectDependencyGraph> {
        let tasks = self.tasks.list_tasks_by_project(project_id)?;
        let members: HashSet<&TaskId> = tasks.iter().map(|task| &task.id).collect();

        let mut edges = Vec::new();
        for edge in self.dependencies.list(&DependencyFilter::new())? {
            let inside = members.contains(&edge.dependent_task_id)
                && members.contains(&edge.blocking_task_id);
            if inside {
                edges.push(edge);
            } else if members.contains(&edge.dependent_task_id)
                || members.contains(&edge.blocking_task_id)
            {
                debug!(
                    id = %edge.id,
                    dependent = %edge.dependent_task_id,
                    blocking = %edge.blocking_task_id,
                    "Skipping cross-project dependency"
                );
            }
        }

        let mut graph: DependencyGraph<(), _> = DependencyGraph::new();
        for task in &tasks {
            graph.add_node(task.id.as_str(), ());
        }
        for edge in edges.iter().filter(|edge| edge.dependency_type.is_blocking()) {
            graph.add_edge(
                edge.blocking_task_id.as_str(),
                edge.dependent_task_id.as_str(),
                edge.id.clone(),
            )?;
        }

        let levels = graph.levels();
        let cycles: Vec<Vec<TaskId>> = graph
            .detect_cycles()
            .into_iter()
            .map(|cycle| cycle.into_iter().map(TaskId::from).collect())
            .collect();
        if !cycles.is_empty() {
            warn!(project = %project_id, cycles = cycles.len(), "Blocking cycles found in project");
        }

        let mut nodes: Vec<ProjectGraphNode> = tasks
            .into_iter()
            .map(|task| ProjectGraphNode {
                level: levels.get(task.id.as_str()).copied().unwrap_or(0),
                task_id: task.id,
                key: task.key,
                title: task.title,
                status: task.status,
            })
            .collect();
        nodes.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.key.cmp(&b.key)));

        debug!(
            project = %project_id,
            nodes = nodes.len(),
            edges = edges.len(),
            "Generated dependency graph"
        );
        Ok(ProjectDependencyGraph {
            project_id: project_id.clone(),
            nodes,
            edges,
            cycles,
        })
    }

    /// Find every task that transitively waits on a task.
    ///
    /// The walk follows blocking edges for at most
    /// `dependencies.impactDepthCap` hops.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist.
    #[instrument(skip(self))]
    pub fn get_dependency_impact_analysis(&self, task_id: &TaskId) -> Result<ImpactAnalysis> {
        self.require_task(task_id)?;
        let cap = self.config.dependencies.impact_depth_cap;
        let graph = self.blocking_graph()?;

        let reachability = graph.reachable_within(task_id.as_str(), cap);
        let mut cache: HashMap<TaskId, Option<Task>> = HashMap::new();
        let mut impacted = Vec::with_capacity(reachability.reached.len());
        for reached in reachability.reached {
            let id = TaskId::from(reached.id);
            let task = match cache.get(&id) {
                Some(task) => task.clone(),
                None => {
                    let task = self.tasks.get_task(&id)?;
                    cache.insert(id.clone(), task.clone());
                    task
                }
            };
            impacted.push(ImpactedTask {
                key: task.as_ref().map(|t| t.key.clone()),
                title: task.as_ref().map(|t| t.title.clone()),
                status: task.map(|t| t.status),
                task_id: id,
                impact: if reached.distance == 1 {
                    ImpactLevel::Direct
                } else {
                    ImpactLevel::Indirect
                },
                distance: reached.distance,
            });
        }

        let mut critical_path: Vec<TaskId> = graph
            .longest_chain_from(task_id.as_str(), cap)
            .into_iter()
            .map(TaskId::from)
            .collect();
        if critical_path.is_empty() {
            critical_path.push(task_id.clone());
        }

        if reachability.truncated {
            warn!(task = %task_id, cap, "Impact analysis stopped at the depth cap");
        }
        Ok(ImpactAnalysis {
            task_id: task_id.clone(),
            total_impacted: impacted.len(),
            impacted,
            critical_path,
            truncated: reachability.truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DependencyType;
    use crate::store::InMemoryStore;
    use crate::TrellisConfig;
    use std::sync::Arc;

    fn service(tasks: Vec<Task>) -> TaskGraphService<InMemoryStore, InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        for task in tasks {
            store.insert_task(task);
        }
        TaskGraphService::new(store.clone(), store, TrellisConfig::default())
    }

    fn block(service: &TaskGraphService<InMemoryStore, InMemoryStore>, dependent: &str, blocking: &str) {
        service
            .create_dependency(&dependent.into(), &blocking.into(), DependencyType::Blocks)
            .unwrap();
    }

    #[test]
    fn test_summary_without_subtasks() {
        let service = service(vec![Task::new("p", "P", "Parent", "web")]);
        let summary = service.get_subtask_summary(&"p".into()).unwrap();

        assert_eq!(summary.total_subtasks, 0);
        assert!(summary.completion_percentage.abs() < f64::EPSILON);
        assert!(!summary.completion_percentage.is_nan());
    }

    #[test]
    fn test_summary_buckets_and_hours() {
        let service = service(vec![
            Task::new("p", "P", "Parent", "web"),
            Task::new("a", "A", "a", "web")
                .with_parent("p")
                .with_status(TaskStatus::Done)
                .with_hours(4.0, 5.0),
            Task::new("b", "B", "b", "web")
                .with_parent("p")
                .with_status(TaskStatus::InReview)
                .with_hours(3.0, 1.0),
            Task::new("c", "C", "c", "web")
                .with_parent("p")
                .with_status(TaskStatus::Blocked),
            Task::new("d", "D", "d", "web").with_parent("c").with_status(TaskStatus::Done),
        ]);

        let summary = service.get_subtask_summary(&"p".into()).unwrap();
        assert_eq!(summary.total_subtasks, 3);
        assert_eq!(summary.completed_subtasks, 1);
        assert_eq!(summary.in_progress_subtasks, 1);
        assert_eq!(summary.todo_subtasks, 1);
        assert!((summary.completion_percentage - 33.33).abs() < 1e-9);
        assert!((summary.estimated_hours - 7.0).abs() < 1e-9);
        assert!((summary.logged_hours - 6.0).abs() < 1e-9);
        assert!((summary.remaining_hours - 2.0).abs() < 1e-9);

        let recursive = service
            .get_subtask_summary_with_scope(&"p".into(), SummaryScope::Recursive)
            .unwrap();
        assert_eq!(recursive.total_subtasks, 4);
        assert!((recursive.completion_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_graph_levels_and_cross_project_edges() {
        let service = service(vec![
            Task::new("a", "WEB-1", "a", "web"),
            Task::new("b", "WEB-2", "b", "web"),
            Task::new("c", "WEB-3", "c", "web"),
            Task::new("z", "OPS-1", "z", "ops"),
        ]);
        block(&service, "b", "a");
        block(&service, "c", "b");
        block(&service, "c", "z");
        service
            .create_dependency(&"a".into(), &"c".into(), DependencyType::RelatesTo)
            .unwrap();

        let graph = service.generate_dependency_graph(&"web".into()).unwrap();
        let levels: Vec<(&str, usize)> = graph
            .nodes
            .iter()
            .map(|node| (node.task_id.as_str(), node.level))
            .collect();
        assert_eq!(levels, vec![("a", 0), ("b", 1), ("c", 2)]);
        assert_eq!(graph.edges.len(), 3);
        assert!(graph.cycles.is_empty());
    }

    #[test]
    fn test_impact_analysis() {
        let service = service(vec![
            Task::new("root", "R", "root", "web"),
            Task::new("a", "A", "a", "web"),
            Task::new("b", "B", "b", "web"),
            Task::new("c", "C", "c", "web"),
        ]);
        block(&service, "a", "root");
        block(&service, "b", "root");
        block(&service, "c", "a");

        let analysis = service.get_dependency_impact_analysis(&"root".into()).unwrap();
        assert_eq!(analysis.total_impacted, 3);
        assert!(!analysis.truncated);

        let c = analysis
            .impacted
            .iter()
            .find(|entry| entry.task_id.as_str() == "c")
            .unwrap();
        assert_eq!(c.impact, ImpactLevel::Indirect);
        assert_eq!(c.distance, 2);

        let path: Vec<&str> = analysis.critical_path.iter().map(TaskId::as_str).collect();
        assert_eq!(path, vec!["root", "a", "c"]);
    }

    #[test]
    fn test_impact_analysis_on_ladder_deeper_than_cap() {
        let layers = 60;
        let mut tasks = vec![Task::new("root", "R", "root", "web")];
        for layer in 0..layers {
            for side in ["l", "r"] {
                let id = format!("{side}{layer}");
                tasks.push(Task::new(id.as_str(), id.as_str(), id.as_str(), "web"));
            }
        }
        let service = service(tasks);
        for side in ["l", "r"] {
            block(&service, &format!("{side}0"), "root");
        }
        for layer in 1..layers {
            for blocking in ["l", "r"] {
                for dependent in ["l", "r"] {
                    block(
                        &service,
                        &format!("{dependent}{layer}"),
                        &format!("{blocking}{}", layer - 1),
                    );
                }
            }
        }

        let cap = service.config().dependencies.impact_depth_cap;
        let started = std::time::Instant::now();
        let analysis = service.get_dependency_impact_analysis(&"root".into()).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        assert!(analysis.truncated);
        assert_eq!(analysis.critical_path.len(), cap + 1);
        assert_eq!(analysis.critical_path[0].as_str(), "root");
        assert_eq!(analysis.total_impacted, 2 * cap);
    }

    #[test]
    fn test_impact_analysis_of_isolated_task() {
        let service = service(vec![Task::new("solo", "S", "solo", "web")]);
        let analysis = service.get_dependency_impact_analysis(&"solo".into()).unwrap();

        assert!(analysis.impacted.is_empty());
        assert_eq!(analysis.critical_path, vec![TaskId::from("solo")]);
    }
}
