//! Task and dependency model (component C2).

use serde::{Deserialize, Serialize};

use crate::template;
use crate::utilities::errors::ValidationError;

/// A single dependency edge: this task needs `source_task`'s published
/// result, available under `result_key` in the render context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDependency {
    /// Name of the task that must complete first.
    pub source_task: String,
    /// Key under which the dependency's result is exposed to this task's
    /// template, i.e. the placeholder name this task expects to resolve.
    pub result_key: String,
}

impl TaskDependency {
    pub fn new(source_task: impl Into<String>, result_key: impl Into<String>) -> Self {
        TaskDependency {
            source_task: source_task.into(),
            result_key: result_key.into(),
        }
    }
}

/// Lifecycle of a task within a single crew execution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Complete,
    Failed,
}

/// A unit of work: a name, the agent that executes it, a prompt template,
/// an ordered list of dependencies, and an optional key under which its
/// result is published to the shared [`crate::context::Context`].
///
/// The template's placeholder set is computed once at construction (see
/// [`template::required_vars`]) and the template itself is validated for
/// well-formed braces then, so a malformed template is rejected before a
/// crew ever starts executing rather than mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    name: String,
    agent_name: String,
    prompt_template: String,
    #[serde(skip)]
    required_vars: Vec<String>,
    dependencies: Vec<TaskDependency>,
    result_key: Option<String>,
    #[serde(skip)]
    status: TaskStatus,
}

impl Task {
    /// Builds a task, validating that `prompt_template` has well-formed
    /// placeholder braces. Returns a [`ValidationError::MalformedTemplate`]
    /// otherwise.
    pub fn new(
        name: impl Into<String>,
        agent_name: impl Into<String>,
        prompt_template: impl Into<String>,
        dependencies: Vec<TaskDependency>,
        result_key: Option<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let prompt_template = prompt_template.into();
        template::validate_template(&name, &prompt_template)?;
        let required_vars = template::required_vars(&prompt_template);
        Ok(Task {
            name,
            agent_name: agent_name.into(),
            prompt_template,
            required_vars,
            dependencies,
            result_key,
            status: TaskStatus::Pending,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    pub fn required_vars(&self) -> &[String] {
        &self.required_vars
    }

    pub fn dependencies(&self) -> &[TaskDependency] {
        &self.dependencies
    }

    pub fn result_key(&self) -> Option<&str> {
        self.result_key.as_deref()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    /// Names of all dependency source tasks, in declared order.
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .map(|d| d.source_task.as_str())
            .collect()
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task(\"{}\" -> agent \"{}\")", self.name, self.agent_name)
    }
}
