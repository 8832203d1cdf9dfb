//! Crew façade (component C6): the user-facing object composing a
//! scheduler with an initial context and an implicit local node.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::Agent;
use crate::context::Context;
use crate::evaluator::{Evaluator, ExecutionReport};
use crate::node::{Node, RemoteNode, Worker};
use crate::scheduler::{Scheduler, SchedulerObserver};
use crate::swarm::SwarmNodeClient;
use crate::task::Task;
use crate::utilities::errors::SwarmError;
use crate::utilities::logger::Logger;

/// Identifier of the node a plain `Crew` registers implicitly.
pub const LOCAL_NODE_ID: &str = "local";

/// A group of agents and tasks, with an implicit local node hosting every
/// declared agent. See [`SwarmCrew`] for the variant that can add remote
/// worker nodes.
pub struct Crew {
    agents: HashMap<String, Agent>,
    tasks: Vec<Task>,
    initial_context: HashMap<String, String>,
    nodes: Vec<Worker>,
    logger: Logger,
}

impl Crew {
    /// Builds a crew and registers the implicit local node bound to every
    /// declared agent.
    pub fn new(
        agents: HashMap<String, Agent>,
        tasks: Vec<Task>,
        initial_context: HashMap<String, String>,
    ) -> Self {
        let local = Arc::new(Node::new(LOCAL_NODE_ID, agents.clone()));
        Crew {
            agents,
            tasks,
            initial_context,
            nodes: vec![Worker::Local(local)],
            logger: Logger::default(),
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.logger.set_verbose(verbose);
        self
    }

    pub fn agents(&self) -> &HashMap<String, Agent> {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<Worker> {
        &mut self.nodes
    }

    pub(crate) fn has_remote_nodes(&self) -> bool {
        self.nodes.len() > 1
    }

    /// Executes every task to completion and returns the final shared
    /// context. When `evaluate` is true, an [`Evaluator`] is attached as
    /// an observer and a post-run report is returned alongside.
    pub async fn execute(&self, evaluate: bool) -> Result<ExecutionOutcome, SwarmError> {
        self.logger.info(&format!(
            "starting crew execution: {} task(s), {} node(s)",
            self.tasks.len(),
            self.nodes.len()
        ));

        let context = Arc::new(Context::with_values(self.initial_context.clone()));
        let evaluator = if evaluate { Some(Arc::new(Evaluator::new())) } else { None };
        let observers: Vec<Arc<dyn SchedulerObserver>> = evaluator
            .clone()
            .map(|e| vec![e as Arc<dyn SchedulerObserver>])
            .unwrap_or_default();

        let scheduler = Arc::new(Scheduler::new(
            self.tasks.clone(),
            context.clone(),
            self.nodes.clone(),
            observers,
        ));

        let completed = if self.has_remote_nodes() {
            scheduler.run_sequential().await?
        } else {
            scheduler.run_local_batch().await?
        };

        self.logger.info(&format!("crew execution complete: {} task(s) finished", completed.len()));

        let report = evaluator.as_ref().map(|e| e.generate_report(&completed));
        Ok(ExecutionOutcome {
            context: context.snapshot(),
            completed,
            report,
        })
    }
}

/// Result of [`Crew::execute`]: the final shared context, the order in
/// which tasks completed, and an optional plain-text evaluator report.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub context: HashMap<String, String>,
    pub completed: Vec<String>,
    pub report: Option<ExecutionReport>,
}

/// A [`Crew`] that can additionally register and drop remote worker
/// nodes. Registering any remote node switches execution from local
/// parallel batching to sequential remote-capable dispatch.
pub struct SwarmCrew {
    inner: Crew,
}

impl SwarmCrew {
    pub fn new(
        agents: HashMap<String, Agent>,
        tasks: Vec<Task>,
        initial_context: HashMap<String, String>,
    ) -> Self {
        SwarmCrew {
            inner: Crew::new(agents, tasks, initial_context),
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.inner = self.inner.verbose(verbose);
        self
    }

    /// Registers an additional in-process node bound to `agents`.
    pub fn add_node(&mut self, id: impl Into<String>, agents: HashMap<String, Agent>) {
        self.inner
            .nodes_mut()
            .push(Worker::Local(Arc::new(Node::new(id, agents))));
    }

    /// Connects to a genuinely remote node at `addr` (e.g.
    /// `http://127.0.0.1:50051`) and registers it, declaring the agents it
    /// hosts. Switches execution to sequential remote-capable dispatch.
    pub async fn add_remote_node(
        &mut self,
        id: impl Into<String>,
        addr: impl Into<String>,
        agent_names: impl IntoIterator<Item = String>,
    ) -> Result<(), SwarmError> {
        let id = id.into();
        let client = SwarmNodeClient::connect(id.clone(), addr, Vec::new()).await?;
        self.inner
            .nodes_mut()
            .push(Worker::Remote(Arc::new(RemoteNode::new(id, agent_names, client))));
        Ok(())
    }

    /// Drops the node registered under `id`, if any.
    pub fn remove_node(&mut self, id: &str) {
        self.inner.nodes_mut().retain(|n| n.id() != id);
    }

    pub async fn execute(&self, evaluate: bool) -> Result<ExecutionOutcome, SwarmError> {
        self.inner.execute(evaluate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::core::test_support::EchoExecutor;

    fn echo_agents(names: &[&str]) -> HashMap<String, Agent> {
        names
            .iter()
            .map(|n| (n.to_string(), Agent::new(*n, Arc::new(EchoExecutor))))
            .collect()
    }

    #[tokio::test]
    async fn crew_executes_single_task_against_implicit_local_node() {
        let agents = echo_agents(&["writer"]);
        let task = Task::new("t1", "writer", "hello {topic}", vec![], Some("r1".to_string())).unwrap();
        let mut initial = HashMap::new();
        initial.insert("topic".to_string(), "rust".to_string());
        let crew = Crew::new(agents, vec![task], initial);
        let outcome = crew.execute(false).await.unwrap();
        assert_eq!(outcome.context.get("r1"), Some(&"R:hello rust".to_string()));
        assert_eq!(outcome.completed, vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn swarm_crew_add_and_remove_node() {
        let agents = echo_agents(&["writer"]);
        let task = Task::new("t1", "writer", "hi", vec![], None).unwrap();
        let mut crew = SwarmCrew::new(agents, vec![task], HashMap::new());
        crew.add_node("remote-1", echo_agents(&["writer"]));
        assert!(crew.inner.has_remote_nodes());
        crew.remove_node("remote-1");
        assert!(!crew.inner.has_remote_nodes());
    }

    #[tokio::test]
    async fn swarm_crew_executes_task_against_a_genuinely_remote_node() {
        use crate::swarm::proto::swarm_node_service_server::SwarmNodeServiceServer;
        use crate::swarm::server::SwarmNodeServicer;
        use tokio_stream::wrappers::TcpListenerStream;

        let remote_agents = echo_agents(&["writer"]);
        let servicer = SwarmNodeServicer::new(Arc::new(Node::new("remote-1", remote_agents)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(SwarmNodeServiceServer::new(servicer))
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .unwrap();
        });

        let task = Task::new("t1", "writer", "hello {topic}", vec![], Some("r1".to_string())).unwrap();
        let mut initial = HashMap::new();
        initial.insert("topic".to_string(), "rust".to_string());
        let mut crew = SwarmCrew::new(HashMap::new(), vec![task], initial);
        crew.add_remote_node("remote-1", format!("http://{addr}"), vec!["writer".to_string()])
            .await
            .unwrap();

        let outcome = crew.execute(false).await.unwrap();
        assert_eq!(outcome.context.get("r1"), Some(&"R:hello rust".to_string()));
        assert_eq!(outcome.completed, vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn crew_execute_with_evaluate_attaches_report() {
        let agents = echo_agents(&["writer"]);
        let task = Task::new("t1", "writer", "hi", vec![], None).unwrap();
        let crew = Crew::new(agents, vec![task], HashMap::new());
        let outcome = crew.execute(true).await.unwrap();
        assert!(outcome.report.is_some());
    }
}
