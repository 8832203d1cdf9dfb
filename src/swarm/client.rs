//! Manager-side gRPC client: a thin wrapper over a `tonic` channel
//! exposing the four `SwarmNodeService` operations as typed async calls.

use std::sync::Arc;
use std::time::Instant;

use tonic::transport::Channel;

use crate::scheduler::SchedulerObserver;
use crate::swarm::proto::{
    swarm_node_service_client::SwarmNodeServiceClient, NodeInfo, NodeStatus, TaskMessage, TaskResult,
};
use crate::utilities::errors::SwarmError;

/// A long-lived connection to one remote node. Channels are reused across
/// calls; `close()` drops the inner channel explicitly when a caller
/// wants to release it ahead of the client's own `Drop`.
pub struct SwarmNodeClient {
    node_id: String,
    inner: Option<SwarmNodeServiceClient<Channel>>,
    observers: Vec<Arc<dyn SchedulerObserver>>,
}

impl SwarmNodeClient {
    /// Connects to `addr` (e.g. `http://127.0.0.1:50051`), recording
    /// `node_id` for error messages and observer notifications.
    pub async fn connect(
        node_id: impl Into<String>,
        addr: impl Into<String>,
        observers: Vec<Arc<dyn SchedulerObserver>>,
    ) -> Result<Self, SwarmError> {
        let node_id = node_id.into();
        let addr = addr.into();
        let client = SwarmNodeServiceClient::connect(addr).await.map_err(|e| SwarmError::Transport {
            node: node_id.clone(),
            method: "connect".to_string(),
            message: e.to_string(),
        })?;
        Ok(SwarmNodeClient {
            node_id,
            inner: Some(client),
            observers,
        })
    }

    fn client_mut(&mut self) -> Result<&mut SwarmNodeServiceClient<Channel>, SwarmError> {
        self.inner.as_mut().ok_or_else(|| SwarmError::Transport {
            node: self.node_id.clone(),
            method: "call".to_string(),
            message: "client closed".to_string(),
        })
    }

    fn notify_send(&self, method: &str, bytes: usize) {
        for obs in &self.observers {
            obs.on_transport_send(&self.node_id, method, bytes);
        }
    }

    fn notify_receive(&self, method: &str, bytes: usize, duration: std::time::Duration) {
        for obs in &self.observers {
            obs.on_transport_receive(&self.node_id, method, bytes, duration);
        }
    }

    pub async fn register_node(&mut self, info: NodeInfo) -> Result<NodeStatus, SwarmError> {
        let bytes = info.node_id.len() + info.available_agents.iter().map(|a| a.len()).sum::<usize>();
        self.notify_send("RegisterNode", bytes);
        let started = Instant::now();
        let node_id = self.node_id.clone();
        let response = self
            .client_mut()?
            .register_node(info)
            .await
            .map_err(|e| SwarmError::Transport {
                node: node_id.clone(),
                method: "RegisterNode".to_string(),
                message: e.to_string(),
            })?
            .into_inner();
        self.notify_receive("RegisterNode", response.node_id.len(), started.elapsed());
        Ok(response)
    }

    pub async fn execute_task(&mut self, message: TaskMessage) -> Result<TaskResult, SwarmError> {
        let bytes = message.data.len();
        self.notify_send("ExecuteTask", bytes);
        let started = Instant::now();
        let node_id = self.node_id.clone();
        let response = self
            .client_mut()?
            .execute_task(message)
            .await
            .map_err(|e| SwarmError::Transport {
                node: node_id.clone(),
                method: "ExecuteTask".to_string(),
                message: e.to_string(),
            })?
            .into_inner();
        self.notify_receive("ExecuteTask", response.result.len(), started.elapsed());
        Ok(response)
    }

    pub async fn update_status(&mut self, status: NodeStatus) -> Result<NodeStatus, SwarmError> {
        self.notify_send("UpdateStatus", status.current_task.len());
        let started = Instant::now();
        let node_id = self.node_id.clone();
        let response = self
            .client_mut()?
            .update_status(status)
            .await
            .map_err(|e| SwarmError::Transport {
                node: node_id.clone(),
                method: "UpdateStatus".to_string(),
                message: e.to_string(),
            })?
            .into_inner();
        self.notify_receive("UpdateStatus", response.current_task.len(), started.elapsed());
        Ok(response)
    }

    pub async fn heartbeat(&mut self, info: NodeInfo) -> Result<NodeStatus, SwarmError> {
        self.notify_send("Heartbeat", info.node_id.len());
        let started = Instant::now();
        let node_id = self.node_id.clone();
        let response = self
            .client_mut()?
            .heartbeat(info)
            .await
            .map_err(|e| SwarmError::Transport {
                node: node_id.clone(),
                method: "Heartbeat".to_string(),
                message: e.to_string(),
            })?
            .into_inner();
        self.notify_receive("Heartbeat", response.current_task.len(), started.elapsed());
        Ok(response)
    }

    /// Releases the underlying channel ahead of `Drop`.
    pub fn close(&mut self) {
        self.inner = None;
    }
}
