//! Worker node state machine (component C4).
//!
//! A `Node` holds a table of locally available agents and executes tasks
//! dispatched to it. It is a small state machine — `Idle -> Busy -> Idle`
//! on the happy path, `Idle|Busy -> Offline` on shutdown or a transport
//! failure the scheduler reports — and otherwise a pure function of
//! (task, rendered prompt) modulo whatever side effects the agent itself
//! performs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::agent::Agent;
use crate::swarm::client::SwarmNodeClient;
use crate::swarm::proto::TaskMessage;
use crate::utilities::errors::SwarmError;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Idle,
    Busy,
    Offline,
}

/// A node: an identity, an agent table, and a current lifecycle state.
///
/// Local nodes (the implicit node inside a plain [`crate::crew::Crew`])
/// and remote nodes (reached over [`crate::swarm`]) share this same type;
/// the scheduler decides whether to call [`Node::execute_task`] directly
/// or proxy it through a [`crate::swarm::client::SwarmNodeClient`].
pub struct Node {
    id: String,
    agents: HashMap<String, Agent>,
    state: RwLock<NodeState>,
    current_task: RwLock<Option<String>>,
}

/// Snapshot returned by [`Node::get_status`]: safe to read
/// concurrently with an in-flight [`Node::execute_task`] call.
#[derive(Debug, Clone)]
pub struct NodeStatusSnapshot {
    pub node_id: String,
    pub status: NodeState,
    pub current_task: Option<String>,
    pub available_agents: Vec<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, agents: HashMap<String, Agent>) -> Self {
        Node {
            id: id.into(),
            agents,
            state: RwLock::new(NodeState::Idle),
            current_task: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    /// Whether this node can currently accept a dispatch for `agent_name`:
    /// idle and carrying that agent in its table.
    pub fn is_eligible_for(&self, agent_name: &str) -> bool {
        self.state() == NodeState::Idle && self.agents.contains_key(agent_name)
    }

    pub fn has_agent(&self, agent_name: &str) -> bool {
        self.agents.contains_key(agent_name)
    }

    pub fn mark_offline(&self) {
        *self.state.write() = NodeState::Offline;
    }

    /// Point-in-time status snapshot: node id, lifecycle state, the task
    /// currently executing (if any), and the agent table's names. Safe to
    /// call while `execute_task` is running on another thread.
    pub fn get_status(&self) -> NodeStatusSnapshot {
        NodeStatusSnapshot {
            node_id: self.id.clone(),
            status: self.state(),
            current_task: self.current_task.read().clone(),
            available_agents: self.agents.keys().cloned().collect(),
        }
    }

    /// Runs `prompt` (already fully rendered — the node never resolves
    /// templates or dependencies itself) through the named agent,
    /// transitioning `Idle -> Busy -> Idle` around the call.
    pub async fn execute_task(
        &self,
        task_name: &str,
        agent_name: &str,
        prompt: &str,
    ) -> Result<String, SwarmError> {
        let agent = self
            .agents
            .get(agent_name)
            .ok_or_else(|| SwarmError::AgentNotAvailable {
                node: self.id.clone(),
                agent: agent_name.to_string(),
            })?
            .clone();

        *self.state.write() = NodeState::Busy;
        *self.current_task.write() = Some(task_name.to_string());
        let result = agent.run(prompt).await;
        *self.current_task.write() = None;
        *self.state.write() = NodeState::Idle;

        result.map_err(|message| SwarmError::AgentFailure {
            task: task_name.to_string(),
            agent: agent_name.to_string(),
            message,
        })
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A thread-safe handle to a node, as stored in the scheduler's node
/// registry.
pub type SharedNode = Arc<Node>;

/// A worker node reached over the gRPC transport rather than in-process.
/// Tracks its own idle/busy/offline state locally (so the scheduler's
/// eligibility check needs no round trip) and proxies
/// [`RemoteNode::execute_task`] through a held [`SwarmNodeClient`]
/// connection, never re-resolving the template or dependencies on this
/// side.
pub struct RemoteNode {
    id: String,
    agent_names: HashSet<String>,
    state: RwLock<NodeState>,
    client: tokio::sync::Mutex<SwarmNodeClient>,
}

impl RemoteNode {
    pub fn new(
        id: impl Into<String>,
        agent_names: impl IntoIterator<Item = String>,
        client: SwarmNodeClient,
    ) -> Self {
        RemoteNode {
            id: id.into(),
            agent_names: agent_names.into_iter().collect(),
            state: RwLock::new(NodeState::Idle),
            client: tokio::sync::Mutex::new(client),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    pub fn has_agent(&self, agent_name: &str) -> bool {
        self.agent_names.contains(agent_name)
    }

    pub fn is_eligible_for(&self, agent_name: &str) -> bool {
        self.state() == NodeState::Idle && self.has_agent(agent_name)
    }

    pub fn mark_offline(&self) {
        *self.state.write() = NodeState::Offline;
    }

    /// Sends `prompt` (already fully rendered) to the remote node over
    /// `ExecuteTask`, translating its `TaskResult` back into the same
    /// `Result` shape [`Node::execute_task`] returns.
    pub async fn execute_task(
        &self,
        task_name: &str,
        agent_name: &str,
        prompt: &str,
    ) -> Result<String, SwarmError> {
        *self.state.write() = NodeState::Busy;
        let message = TaskMessage {
            name: task_name.to_string(),
            agent_name: agent_name.to_string(),
            data: prompt.as_bytes().to_vec(),
            dependencies: Vec::new(),
        };
        let response = {
            let mut client = self.client.lock().await;
            client.execute_task(message).await
        };
        *self.state.write() = NodeState::Idle;

        let result = response?;
        if result.status == "success" {
            String::from_utf8(result.result).map_err(|e| SwarmError::Transport {
                node: self.id.clone(),
                method: "ExecuteTask".to_string(),
                message: format!("response payload was not valid utf-8: {e}"),
            })
        } else {
            Err(SwarmError::AgentFailure {
                task: task_name.to_string(),
                agent: agent_name.to_string(),
                message: result.error,
            })
        }
    }
}

/// Either an in-process [`Node`] or a [`RemoteNode`] reached over gRPC.
/// The scheduler dispatches through this common surface without caring
/// which kind of worker it holds.
#[derive(Clone)]
pub enum Worker {
    Local(SharedNode),
    Remote(Arc<RemoteNode>),
}

impl Worker {
    pub fn id(&self) -> &str {
        match self {
            Worker::Local(n) => n.id(),
            Worker::Remote(n) => n.id(),
        }
    }

    pub fn has_agent(&self, agent_name: &str) -> bool {
        match self {
            Worker::Local(n) => n.has_agent(agent_name),
            Worker::Remote(n) => n.has_agent(agent_name),
        }
    }

    pub fn is_eligible_for(&self, agent_name: &str) -> bool {
        match self {
            Worker::Local(n) => n.is_eligible_for(agent_name),
            Worker::Remote(n) => n.is_eligible_for(agent_name),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Worker::Remote(_))
    }

    pub fn mark_offline(&self) {
        match self {
            Worker::Local(n) => n.mark_offline(),
            Worker::Remote(n) => n.mark_offline(),
        }
    }

    pub async fn execute_task(
        &self,
        task_name: &str,
        agent_name: &str,
        prompt: &str,
    ) -> Result<String, SwarmError> {
        match self {
            Worker::Local(n) => n.execute_task(task_name, agent_name, prompt).await,
            Worker::Remote(n) => n.execute_task(task_name, agent_name, prompt).await,
        }
    }
}

impl From<SharedNode> for Worker {
    fn from(node: SharedNode) -> Self {
        Worker::Local(node)
    }
}

impl From<Arc<RemoteNode>> for Worker {
    fn from(node: Arc<RemoteNode>) -> Self {
        Worker::Remote(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::core::test_support::{EchoExecutor, FailingExecutor};

    fn node_with_echo(id: &str, agent_name: &str) -> Node {
        let mut agents = HashMap::new();
        agents.insert(
            agent_name.to_string(),
            Agent::new(agent_name, Arc::new(EchoExecutor)),
        );
        Node::new(id, agents)
    }

    #[tokio::test]
    async fn execute_task_round_trips_idle_busy_idle() {
        let node = node_with_echo("n1", "writer");
        assert_eq!(node.state(), NodeState::Idle);
        let out = node.execute_task("t1", "writer", "hi").await.unwrap();
        assert_eq!(out, "R:hi");
        assert_eq!(node.state(), NodeState::Idle);
    }

    #[tokio::test]
    async fn execute_task_fails_for_unknown_agent() {
        let node = node_with_echo("n1", "writer");
        let err = node.execute_task("t1", "researcher", "hi").await.unwrap_err();
        assert!(matches!(err, SwarmError::AgentNotAvailable { .. }));
    }

    #[tokio::test]
    async fn execute_task_returns_to_idle_after_agent_failure() {
        let mut agents = HashMap::new();
        agents.insert(
            "writer".to_string(),
            Agent::new(
                "writer",
                Arc::new(FailingExecutor {
                    message: "boom".to_string(),
                }),
            ),
        );
        let node = Node::new("n1", agents);
        let err = node.execute_task("t1", "writer", "hi").await.unwrap_err();
        assert!(matches!(err, SwarmError::AgentFailure { .. }));
        assert_eq!(node.state(), NodeState::Idle);
    }

    #[test]
    fn is_eligible_for_requires_idle_and_agent_present() {
        let node = node_with_echo("n1", "writer");
        assert!(node.is_eligible_for("writer"));
        assert!(!node.is_eligible_for("researcher"));
        node.mark_offline();
        assert!(!node.is_eligible_for("writer"));
    }

    #[tokio::test]
    async fn get_status_reports_current_task_while_busy_and_none_when_idle() {
        let node = node_with_echo("n1", "writer");
        let before = node.get_status();
        assert_eq!(before.node_id, "n1");
        assert_eq!(before.status, NodeState::Idle);
        assert_eq!(before.current_task, None);
        assert_eq!(before.available_agents, vec!["writer".to_string()]);

        node.execute_task("t1", "writer", "hi").await.unwrap();
        let after = node.get_status();
        assert_eq!(after.status, NodeState::Idle);
        assert_eq!(after.current_task, None);
    }
}
