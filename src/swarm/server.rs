//! Remote node-side gRPC server: implements `SwarmNodeService` against a
//! local [`Node`], and a `serve` helper for the `swarm-node` binary.

use std::net::SocketAddr;

use parking_lot::Mutex;
use tonic::{transport::Server, Request, Response, Status};

use crate::node::SharedNode;
use crate::swarm::proto::swarm_node_service_server::{SwarmNodeService, SwarmNodeServiceServer};
use crate::swarm::proto::{NodeInfo, NodeStatus, TaskMessage, TaskResult};

/// The gRPC-facing half of a worker node. Wraps a [`SharedNode`];
/// `UpdateStatus` carries an externally-reported current task that a
/// manager may push independently of a running `execute_task` call, so it
/// is tracked separately here rather than read off [`crate::node::Node::get_status`].
pub struct SwarmNodeServicer {
    node: SharedNode,
    reported_task: Mutex<Option<String>>,
}

impl SwarmNodeServicer {
    pub fn new(node: SharedNode) -> Self {
        SwarmNodeServicer {
            node,
            reported_task: Mutex::new(None),
        }
    }

    fn status_string(&self) -> String {
        match self.node.state() {
            crate::node::NodeState::Idle => "idle".to_string(),
            crate::node::NodeState::Busy => "busy".to_string(),
            crate::node::NodeState::Offline => "offline".to_string(),
        }
    }

    /// Status response derived from the node's live [`NodeStatusSnapshot`],
    /// falling back to the last externally reported task (via
    /// `UpdateStatus`) when the node itself isn't mid-execution.
    fn status_response(&self) -> NodeStatus {
        let snapshot = self.node.get_status();
        let current_task = snapshot
            .current_task
            .or_else(|| self.reported_task.lock().clone())
            .unwrap_or_default();
        NodeStatus {
            node_id: snapshot.node_id,
            status: self.status_string(),
            current_task,
        }
    }
}

#[tonic::async_trait]
impl SwarmNodeService for SwarmNodeServicer {
    async fn register_node(&self, _request: Request<NodeInfo>) -> Result<Response<NodeStatus>, Status> {
        Ok(Response::new(self.status_response()))
    }

    /// `data` is treated as an already-rendered prompt — the manager
    /// renders locally and sends the finalized string; this handler
    /// never re-resolves dependencies or templates.
    async fn execute_task(&self, request: Request<TaskMessage>) -> Result<Response<TaskResult>, Status> {
        let message = request.into_inner();

        let prompt = match String::from_utf8(message.data) {
            Ok(p) => p,
            Err(e) => {
                return Ok(Response::new(TaskResult {
                    status: "error".to_string(),
                    result: Vec::new(),
                    error: format!("prompt payload was not valid utf-8: {e}"),
                }));
            }
        };

        let outcome = self
            .node
            .execute_task(&message.name, &message.agent_name, &prompt)
            .await;

        let result = match outcome {
            Ok(value) => TaskResult {
                status: "success".to_string(),
                result: value.into_bytes(),
                error: String::new(),
            },
            Err(e) => TaskResult {
                status: "error".to_string(),
                result: Vec::new(),
                error: e.to_string(),
            },
        };
        Ok(Response::new(result))
    }

    async fn update_status(&self, request: Request<NodeStatus>) -> Result<Response<NodeStatus>, Status> {
        let incoming = request.into_inner();
        *self.reported_task.lock() = if incoming.current_task.is_empty() {
            None
        } else {
            Some(incoming.current_task)
        };
        Ok(Response::new(self.status_response()))
    }

    async fn heartbeat(&self, _request: Request<NodeInfo>) -> Result<Response<NodeStatus>, Status> {
        Ok(Response::new(self.status_response()))
    }
}

/// Serves `servicer` over gRPC at `addr` until the process is killed.
pub async fn serve(addr: SocketAddr, servicer: SwarmNodeServicer) -> Result<(), tonic::transport::Error> {
    tracing::info!(%addr, "swarm node listening");
    Server::builder()
        .add_service(SwarmNodeServiceServer::new(servicer))
        .serve(addr)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::core::test_support::EchoExecutor;
    use crate::agent::Agent;
    use crate::node::Node;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn servicer() -> SwarmNodeServicer {
        let mut agents = HashMap::new();
        agents.insert("writer".to_string(), Agent::new("writer", Arc::new(EchoExecutor)));
        SwarmNodeServicer::new(Arc::new(Node::new("remote-1", agents)))
    }

    #[tokio::test]
    async fn execute_task_echoes_rendered_prompt() {
        let servicer = servicer();
        let request = Request::new(TaskMessage {
            name: "t1".to_string(),
            agent_name: "writer".to_string(),
            data: b"hello".to_vec(),
            dependencies: vec![],
        });
        let response = servicer.execute_task(request).await.unwrap().into_inner();
        assert_eq!(response.status, "success");
        assert_eq!(String::from_utf8(response.result).unwrap(), "R:hello");
    }

    #[tokio::test]
    async fn execute_task_reports_error_for_unknown_agent() {
        let servicer = servicer();
        let request = Request::new(TaskMessage {
            name: "t1".to_string(),
            agent_name: "researcher".to_string(),
            data: b"hello".to_vec(),
            dependencies: vec![],
        });
        let response = servicer.execute_task(request).await.unwrap().into_inner();
        assert_eq!(response.status, "error");
        assert!(!response.error.is_empty());
    }

    #[tokio::test]
    async fn heartbeat_reports_current_status() {
        let servicer = servicer();
        let response = servicer
            .heartbeat(Request::new(NodeInfo {
                node_id: "remote-1".to_string(),
                available_agents: vec!["writer".to_string()],
                status: "idle".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.node_id, "remote-1");
        assert_eq!(response.status, "idle");
    }

    #[tokio::test]
    async fn update_status_echoes_reported_task_until_cleared() {
        let servicer = servicer();
        let response = servicer
            .update_status(Request::new(NodeStatus {
                node_id: "remote-1".to_string(),
                status: "busy".to_string(),
                current_task: "t7".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.current_task, "t7");

        let cleared = servicer
            .update_status(Request::new(NodeStatus {
                node_id: "remote-1".to_string(),
                status: "idle".to_string(),
                current_task: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(cleared.current_task, "");
    }
}
