//! Agent handle and executor capability (component C3).
//!
//! An [`Agent`] is a name paired with an opaque [`AgentExecutor`]
//! capability. The engine never inspects how an executor produces its
//! output — LLM call, subprocess, deterministic stub — only that it maps
//! a rendered prompt to a result or an error string.

use std::sync::Arc;

use async_trait::async_trait;

/// Runs a single rendered prompt to completion.
///
/// Implementations are free to be synchronous (wrapped in
/// `spawn_blocking`) or natively async; the trait itself is `async_trait`
/// to match the rest of the crate's I/O-bound surfaces.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Executes `prompt` and returns the raw textual result, or an error
    /// message describing the failure.
    async fn run(&self, prompt: &str) -> Result<String, String>;
}

/// A named capability: the engine dispatches tasks to agents by name and
/// never touches the executor directly outside of [`Agent::run`].
///
/// `model` and `tools` are carried per the external constructor
/// shape (`Agent(name, executor, model, tools)`) but are opaque to the
/// core — the scheduler never reads them; they exist so an
/// [`AgentExecutor`] implementation can be configured with the model
/// identifier and tool list it needs before being handed to `Agent::new`.
#[derive(Clone)]
pub struct Agent {
    name: String,
    executor: Arc<dyn AgentExecutor>,
    model: Option<String>,
    tools: Vec<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, executor: Arc<dyn AgentExecutor>) -> Self {
        Agent {
            name: name.into(),
            executor,
            model: None,
            tools: Vec::new(),
        }
    }

    /// Builder-style constructor carrying the opaque `model`/`tools`
    /// metadata named in the external interface.
    pub fn with_metadata(
        name: impl Into<String>,
        executor: Arc<dyn AgentExecutor>,
        model: Option<String>,
        tools: Vec<String>,
    ) -> Self {
        Agent {
            name: name.into(),
            executor,
            model,
            tools,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque model identifier, if set. Never inspected by the scheduler.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Opaque tool names, if set. Never inspected by the scheduler.
    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    /// Runs `prompt` through this agent's executor.
    pub async fn run(&self, prompt: &str) -> Result<String, String> {
        self.executor.run(prompt).await
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}
