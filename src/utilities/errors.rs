//! Error taxonomy for the swarm crew engine.
//!
//! One `thiserror`-derived enum per class of failure, each carrying
//! structured data rather than a pre-formatted string so callers can
//! match on variant.

use thiserror::Error;

/// Structural errors raised by the builder/validator (C7) or at `Task`
/// construction, before a crew ever executes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A cycle was found in the dependency graph; `task` is the task whose
    /// visit re-entered an ancestor still on the DFS stack.
    #[error("circular dependency detected involving task: {task}")]
    Cycle { task: String },

    /// A task references an agent not present in the crew's agent registry.
    #[error("missing agent '{agent}' for task: {task}")]
    UnknownAgent { task: String, agent: String },

    /// A dependency names a source task that does not exist in the crew.
    #[error("dependency task '{source_task}' not found for task: {task}")]
    DanglingDependency { task: String, source_task: String },

    /// A dependency's declared result key does not match what the source
    /// task actually publishes.
    #[error(
        "dependency on '{source_task}' for task '{task}' names result key '{declared}', \
         but '{source_task}' publishes under '{actual:?}'"
    )]
    MismatchedResultKey {
        task: String,
        source_task: String,
        declared: String,
        actual: Option<String>,
    },

    /// Two tasks in the same crew declare the same result key.
    #[error("duplicate result key '{result_key}' declared by both '{first}' and '{second}'")]
    DuplicateResultKey {
        result_key: String,
        first: String,
        second: String,
    },

    /// A task's own name collides with one already registered.
    #[error("duplicate task name: {task}")]
    DuplicateTaskName { task: String },

    /// A prompt template has an unbalanced or otherwise malformed brace.
    #[error("malformed template for task '{task}': {reason}")]
    MalformedTemplate { task: String, reason: String },
}

/// Raised by the template binder (C1) when a placeholder has no entry in
/// the render context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("missing variable: {0}")]
pub struct MissingVariable(pub String);

/// The full runtime error taxonomy, returned by the scheduler (C5) and the
/// node (C4).
#[derive(Debug, Error)]
pub enum SwarmError {
    /// See [`ValidationError`].
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The render context for `task` lacked a placeholder.
    #[error("task '{task}' missing variable: {source}")]
    MissingVariable {
        task: String,
        #[source]
        source: MissingVariable,
    },

    /// A node's agent table did not contain the agent a task required.
    #[error("agent '{agent}' not available on node '{node}'")]
    AgentNotAvailable { node: String, agent: String },

    /// The agent's `run` operation failed.
    #[error("agent '{agent}' failed on task '{task}': {message}")]
    AgentFailure {
        task: String,
        agent: String,
        message: String,
    },

    /// A full rotation of the queue produced no dispatch.
    #[error("deadlock: no progress possible, {remaining} task(s) unreachable: {tasks:?}")]
    Deadlock {
        remaining: usize,
        tasks: Vec<String>,
    },

    /// The remote transport channel failed.
    #[error("transport error calling {method} on node '{node}': {message}")]
    Transport {
        node: String,
        method: String,
        message: String,
    },
}
