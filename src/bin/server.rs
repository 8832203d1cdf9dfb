//! `swarm-node`: a standalone worker process hosting one [`Node`] over
//! gRPC. A thin entry point — configuration is read straight from the
//! environment, no config file, no CLI parser.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use swarmcrew::agent::AgentExecutor;
use swarmcrew::node::Node;
use swarmcrew::swarm::server::{serve, SwarmNodeServicer};
use swarmcrew::Agent;

/// Placeholder executor for the demo binary: a real deployment would
/// register agents backed by an actual LLM/tool client here instead.
struct EchoExecutor;

#[async_trait]
impl AgentExecutor for EchoExecutor {
    async fn run(&self, prompt: &str) -> Result<String, String> {
        Ok(format!("R:{prompt}"))
    }
}

fn node_id() -> String {
    env::var("SWARM_NODE_ID").unwrap_or_else(|_| "remote-1".to_string())
}

fn bind_addr() -> anyhow::Result<SocketAddr> {
    let host = env::var("SWARM_NODE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("SWARM_NODE_PORT")
        .ok()
        .map(|p| p.parse::<u16>())
        .transpose()?
        .unwrap_or(swarmcrew::swarm::DEFAULT_PORT);
    Ok(format!("{host}:{port}").parse()?)
}

/// Comma-separated agent names this node hosts, e.g. `writer,researcher`.
/// Defaults to a single `writer` agent backed by `EchoExecutor`.
fn agent_names() -> Vec<String> {
    env::var("SWARM_NODE_AGENTS")
        .map(|s| s.split(',').map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect())
        .unwrap_or_else(|_| vec!["writer".to_string()])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let addr = bind_addr()?;
    let id = node_id();

    let mut agents = HashMap::new();
    for name in agent_names() {
        agents.insert(name.clone(), Agent::new(name, Arc::new(EchoExecutor)));
    }

    tracing::info!(node_id = %id, agent_count = agents.len(), "starting swarm node");

    let node = Arc::new(Node::new(id, agents));
    let servicer = SwarmNodeServicer::new(node);
    serve(addr, servicer).await?;
    Ok(())
}
