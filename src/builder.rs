//! Builder / Validator (component C7): fluent construction of a
//! [`Crew`]/[`SwarmCrew`], plus structural validation ahead of execution.

use std::collections::{HashMap, HashSet};

use crate::agent::Agent;
use crate::crew::Crew;
use crate::task::{Task, TaskDependency};
use crate::utilities::errors::ValidationError;

/// DFS coloring used by cycle detection.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Fluent crew builder. Accumulates agents, tasks, and shared-context
/// seed values; [`Builder::validate`] runs the structural checks in
/// structural validation, and [`Builder::build`] hands the accumulated state to a
/// [`Crew`].
#[derive(Default)]
pub struct Builder {
    agents: HashMap<String, Agent>,
    tasks: Vec<Task>,
    shared_context: HashMap<String, String>,
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    pub fn add_agent(mut self, agent: Agent) -> Self {
        self.agents.insert(agent.name().to_string(), agent);
        self
    }

    pub fn add_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn add_shared_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.shared_context.insert(key.into(), value.into());
        self
    }

    /// Chains `tasks` into a linear dependency sequence: each task after
    /// the first depends on its predecessor's declared result key. Every
    /// task but the first must declare a `result_key` for this to link
    /// anything meaningful; a task without one simply contributes no
    /// substitution value to its successor.
    pub fn add_task_chain(mut self, tasks: Vec<Task>) -> Self {
        let mut previous: Option<(String, Option<String>)> = None;
        for mut task in tasks {
            if let Some((prev_name, Some(prev_key))) = previous.clone() {
                let mut deps = task.dependencies().to_vec();
                deps.push(TaskDependency::new(prev_name, prev_key));
                task = Task::new(
                    task.name().to_string(),
                    task.agent_name().to_string(),
                    task.prompt_template().to_string(),
                    deps,
                    task.result_key().map(|s| s.to_string()),
                )
                .expect("re-validating an already-valid template cannot fail");
            }
            previous = Some((task.name().to_string(), task.result_key().map(|s| s.to_string())));
            self.tasks.push(task);
        }
        self
    }

    /// Runs every structural check: unique task names, no
    /// unknown agents, no dangling dependencies, dependency result keys
    /// matching their source task, no duplicate result keys, and an
    /// acyclic dependency graph (grey/black DFS; the first back-edge is
    /// reported).
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen_names: HashSet<&str> = HashSet::new();
        let mut result_keys: HashMap<&str, &str> = HashMap::new();
        let by_name: HashMap<&str, &Task> = self.tasks.iter().map(|t| (t.name(), t)).collect();

        for task in &self.tasks {
            if !seen_names.insert(task.name()) {
                return Err(ValidationError::DuplicateTaskName {
                    task: task.name().to_string(),
                });
            }
            if !self.agents.contains_key(task.agent_name()) {
                return Err(ValidationError::UnknownAgent {
                    task: task.name().to_string(),
                    agent: task.agent_name().to_string(),
                });
            }
            if let Some(key) = task.result_key() {
                if let Some(&other) = result_keys.get(key) {
                    return Err(ValidationError::DuplicateResultKey {
                        result_key: key.to_string(),
                        first: other.to_string(),
                        second: task.name().to_string(),
                    });
                }
                result_keys.insert(key, task.name());
            }
            for dep in task.dependencies() {
                let source = by_name.get(dep.source_task.as_str()).ok_or_else(|| {
                    ValidationError::DanglingDependency {
                        task: task.name().to_string(),
                        source_task: dep.source_task.clone(),
                    }
                })?;
                if source.result_key() != Some(dep.result_key.as_str()) {
                    return Err(ValidationError::MismatchedResultKey {
                        task: task.name().to_string(),
                        source_task: dep.source_task.clone(),
                        declared: dep.result_key.clone(),
                        actual: source.result_key().map(|s| s.to_string()),
                    });
                }
            }
        }

        self.check_acyclic(&by_name)
    }

    fn check_acyclic(&self, by_name: &HashMap<&str, &Task>) -> Result<(), ValidationError> {
        let mut colors: HashMap<&str, Color> = by_name.keys().map(|&n| (n, Color::White)).collect();

        for &start in by_name.keys() {
            if colors[start] == Color::White {
                self.visit(start, by_name, &mut colors)?;
            }
        }
        Ok(())
    }

    fn visit<'a>(
        &self,
        name: &'a str,
        by_name: &HashMap<&'a str, &'a Task>,
        colors: &mut HashMap<&'a str, Color>,
    ) -> Result<(), ValidationError> {
        colors.insert(name, Color::Grey);
        if let Some(task) = by_name.get(name) {
            for dep in task.dependencies() {
                let dep_name = dep.source_task.as_str();
                match colors.get(dep_name).copied().unwrap_or(Color::White) {
                    Color::Grey => {
                        return Err(ValidationError::Cycle {
                            task: name.to_string(),
                        })
                    }
                    Color::White => self.visit(dep_name, by_name, colors)?,
                    Color::Black => {}
                }
            }
        }
        colors.insert(name, Color::Black);
        Ok(())
    }

    /// Consumes the builder into a [`Crew`]. Does not implicitly run
    /// `validate()`; callers that want structural checks must call it
    /// first (validation is optional, but must run to
    /// completion before `build()` if invoked).
    pub fn build(self) -> Crew {
        Crew::new(self.agents, self.tasks, self.shared_context)
    }
}
