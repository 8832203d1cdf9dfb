//! # swarmcrew
//!
//! A distributed task-graph execution engine for agent-based workloads.
//! Users declare named tasks bound to named agents and parameterized
//! prompt templates, with explicit data dependencies on other tasks'
//! results; the engine resolves the dependency graph, schedules ready
//! tasks across a federation of worker nodes, and marshals each task's
//! result into the prompt of its dependents.

pub mod agent;
pub mod builder;
pub mod context;
pub mod crew;
pub mod evaluator;
pub mod node;
pub mod scheduler;
pub mod swarm;
pub mod task;
pub mod template;
pub mod utilities;

pub use agent::{Agent, AgentExecutor};
pub use builder::Builder;
pub use context::Context;
pub use crew::{Crew, ExecutionOutcome, SwarmCrew};
pub use evaluator::{DebugLevel, Evaluator, ExecutionReport};
pub use node::{Node, NodeState, NodeStatusSnapshot, RemoteNode, Worker};
pub use scheduler::{Scheduler, SchedulerObserver};
pub use task::{Task, TaskDependency, TaskStatus};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
