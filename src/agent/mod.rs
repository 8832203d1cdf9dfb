//! Agent module.
//!
//! An `Agent` is a named handle over an opaque [`AgentExecutor`]
//! capability. See [`core`] for both types.

pub mod core;

pub use self::core::{Agent, AgentExecutor};
