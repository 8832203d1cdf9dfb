//! The dependency-driven scheduler (component C5) — the central algorithm.
//!
//! Owns the task queue, the shared result [`Context`], and the node
//! registry, and drives a crew's task graph to completion. Two dispatch
//! modes are exposed: [`Scheduler::run_local_batch`] (every ready task in
//! a batch, concurrently, via a `tokio::task::JoinSet`) and
//! [`Scheduler::run_sequential`] (one task in flight at a time, the mode
//! used once a remote node is in the registry).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinSet;

use crate::context::Context;
use crate::node::Worker;
use crate::task::Task;
use crate::template;
use crate::utilities::errors::SwarmError;

/// How long the scheduler backs off before re-checking node availability.
/// Tens of milliseconds.
const NODE_WAIT_INTERVAL: Duration = Duration::from_millis(20);

/// Explicit plug-in point for observing a scheduler run, replacing
/// ad-hoc monkey-patching with a registered trait object. All methods
/// default to no-ops so an observer only implements what it cares about.
pub trait SchedulerObserver: Send + Sync {
    fn on_task_start(&self, _task: &str, _agent: &str, _node: &str, _deps: &[String]) {}
    fn on_task_end(&self, _task: &str, _node: &str, _result: &Result<String, String>) {}
    fn on_transport_send(&self, _node: &str, _method: &str, _bytes: usize) {}
    fn on_transport_receive(&self, _node: &str, _method: &str, _bytes: usize, _duration: Duration) {}
}

/// The scheduler/manager. Built once per crew execution and discarded
/// after `run_local_batch`/`run_sequential` returns.
pub struct Scheduler {
    tasks: Mutex<VecDeque<Task>>,
    all_tasks: HashMap<String, Task>,
    context: Arc<Context>,
    nodes: Vec<Worker>,
    completed: Mutex<Vec<String>>,
    observers: Vec<Arc<dyn SchedulerObserver>>,
}

impl Scheduler {
    pub fn new(
        tasks: Vec<Task>,
        context: Arc<Context>,
        nodes: Vec<Worker>,
        observers: Vec<Arc<dyn SchedulerObserver>>,
    ) -> Self {
        let all_tasks = tasks.iter().map(|t| (t.name().to_string(), t.clone())).collect();
        Scheduler {
            tasks: Mutex::new(tasks.into_iter().collect()),
            all_tasks,
            context,
            nodes,
            completed: Mutex::new(Vec::new()),
            observers,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    fn is_ready(&self, task: &Task) -> bool {
        let dep_keys: Vec<String> = task.dependencies().iter().map(|d| d.result_key.clone()).collect();
        self.context.has_all(&dep_keys) && self.context.has_all(task.required_vars())
    }

    /// Eligible node for the *sequential* (remote-capable) dispatch path:
    /// idle and carrying the agent, in registration order.
    fn find_eligible_node(&self, agent_name: &str) -> Option<Worker> {
        self.nodes.iter().find(|n| n.is_eligible_for(agent_name)).cloned()
    }

    /// Node lookup for the *local batch* path: the implicit local worker
    /// hosts independent agent executors, so distinct agents may run
    /// concurrently against it — busy/idle exclusivity is meaningful for a
    /// remote node's single connection, not for in-process agent calls.
    fn find_node_with_agent(&self, agent_name: &str) -> Option<Worker> {
        self.nodes.iter().find(|n| n.has_agent(agent_name)).cloned()
    }

    /// Builds the render context for `task`: a snapshot of the shared
    /// context, with each declared dependency explicitly re-aliased to
    /// its source task's actual result key.
    fn dispatch_context(&self, task: &Task) -> HashMap<String, String> {
        let mut ctx = self.context.snapshot();
        for dep in task.dependencies() {
            if let Some(source) = self.all_tasks.get(&dep.source_task) {
                if let Some(source_key) = source.result_key() {
                    if let Some(value) = self.context.get(source_key) {
                        ctx.insert(dep.result_key.clone(), value);
                    }
                }
            }
        }
        ctx
    }

    fn render_prompt(&self, task: &Task) -> Result<String, SwarmError> {
        let ctx = self.dispatch_context(task);
        template::render(task.prompt_template(), &ctx).map_err(|source| SwarmError::MissingVariable {
            task: task.name().to_string(),
            source,
        })
    }

    fn notify_start(&self, task: &Task, node: &str) {
        let deps = task.dependency_names().into_iter().map(str::to_string).collect::<Vec<_>>();
        for obs in &self.observers {
            obs.on_task_start(task.name(), task.agent_name(), node, &deps);
        }
    }

    fn notify_end(&self, task: &str, node: &str, result: &Result<String, SwarmError>) {
        let as_strings: Result<String, String> = match result {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(e.to_string()),
        };
        for obs in &self.observers {
            obs.on_task_end(task, node, &as_strings);
        }
    }

    fn notify_transport_send(&self, node: &str, method: &str, bytes: usize) {
        for obs in &self.observers {
            obs.on_transport_send(node, method, bytes);
        }
    }

    fn notify_transport_receive(&self, node: &str, method: &str, bytes: usize, duration: Duration) {
        for obs in &self.observers {
            obs.on_transport_receive(node, method, bytes, duration);
        }
    }

    /// Runs the queue sequentially: one task in flight at a time. This is
    /// the mode used whenever a remote node participates, since the
    /// reference semantics keep remote dispatch single-flight.
    ///
    /// Waiting for a node to free up shares the same no-progress budget as
    /// waiting for a task's dependencies: an agent hosted nowhere in the
    /// registry fails immediately with [`SwarmError::AgentNotAvailable`],
    /// and an agent whose only hosting node(s) stay busy/offline bounds out
    /// to [`SwarmError::Deadlock`] rather than polling forever.
    pub async fn run_sequential(&self) -> Result<Vec<String>, SwarmError> {
        let mut rotations_since_progress = 0usize;
        loop {
            let queue_len = self.tasks.lock().len();
            if queue_len == 0 {
                break;
            }
            if rotations_since_progress >= queue_len {
                let remaining: Vec<String> =
                    self.tasks.lock().iter().map(|t| t.name().to_string()).collect();
                return Err(SwarmError::Deadlock {
                    remaining: remaining.len(),
                    tasks: remaining,
                });
            }

            let head_ready = {
                let q = self.tasks.lock();
                q.front().map(|t| self.is_ready(t)).unwrap_or(false)
            };
            if !head_ready {
                let mut q = self.tasks.lock();
                if let Some(t) = q.pop_front() {
                    q.push_back(t);
                }
                drop(q);
                rotations_since_progress += 1;
                continue;
            }

            let agent_name = {
                let q = self.tasks.lock();
                q.front().expect("checked non-empty above").agent_name().to_string()
            };
            let node = match self.find_eligible_node(&agent_name) {
                Some(n) => n,
                None => {
                    // No idle node hosts this agent right now. If no node in
                    // the registry hosts it *at all*, waiting can never help;
                    // fail the same way the batch path's `execute_one` does.
                    // Otherwise every node for this agent is transiently
                    // busy, so count this rotation against the same
                    // no-progress budget as an unready task, bounding the
                    // wait instead of spinning on it forever.
                    if self.find_node_with_agent(&agent_name).is_none() {
                        return Err(SwarmError::AgentNotAvailable {
                            node: "registry".to_string(),
                            agent: agent_name.clone(),
                        });
                    }
                    rotations_since_progress += 1;
                    tokio::time::sleep(NODE_WAIT_INTERVAL).await;
                    continue;
                }
            };

            let task = {
                let mut q = self.tasks.lock();
                q.pop_front().expect("checked non-empty above")
            };
            let prompt = self.render_prompt(&task)?;
            self.notify_start(&task, node.id());
            if node.is_remote() {
                self.notify_transport_send(node.id(), "ExecuteTask", prompt.len());
            }
            let started = Instant::now();
            let result = node.execute_task(task.name(), &agent_name, &prompt).await;
            if node.is_remote() {
                let size = result.as_ref().map(|v| v.len()).unwrap_or(0);
                self.notify_transport_receive(node.id(), "ExecuteTask", size, started.elapsed());
            }
            self.notify_end(task.name(), node.id(), &result);
            let value = result?;
            if let Some(key) = task.result_key() {
                self.context.set(key, value);
            }
            self.completed.lock().push(task.name().to_string());
            rotations_since_progress = 0;
        }
        Ok(self.completed())
    }

    fn pop_ready_batch(&self) -> Vec<Task> {
        let mut q = self.tasks.lock();
        let mut ready = Vec::new();
        let mut remaining = VecDeque::new();
        while let Some(t) = q.pop_front() {
            if self.is_ready(&t) {
                ready.push(t);
            } else {
                remaining.push_back(t);
            }
        }
        *q = remaining;
        ready
    }

    async fn execute_one(&self, task: Task) -> Result<(), SwarmError> {
        let agent_name = task.agent_name().to_string();
        let node = self.find_node_with_agent(&agent_name).ok_or_else(|| SwarmError::AgentNotAvailable {
            node: "local".to_string(),
            agent: agent_name.clone(),
        })?;
        let prompt = self.render_prompt(&task)?;
        self.notify_start(&task, node.id());
        let result = node.execute_task(task.name(), &agent_name, &prompt).await;
        self.notify_end(task.name(), node.id(), &result);
        let value = result?;
        if let Some(key) = task.result_key() {
            self.context.set(key, value);
        }
        self.completed.lock().push(task.name().to_string());
        Ok(())
    }

    /// Runs the queue in local parallel batches: every currently-ready
    /// task is dispatched concurrently, the batch is awaited to
    /// completion (success or failure of every member), and the next
    /// batch is formed against the updated context.
    ///
    /// Requires `Arc<Self>` since spawned tasks must outlive the calling
    /// stack frame.
    pub async fn run_local_batch(self: &Arc<Self>) -> Result<Vec<String>, SwarmError> {
        loop {
            let ready_batch = self.pop_ready_batch();
            if ready_batch.is_empty() {
                if self.tasks.lock().is_empty() {
                    break;
                }
                let remaining: Vec<String> =
                    self.tasks.lock().iter().map(|t| t.name().to_string()).collect();
                return Err(SwarmError::Deadlock {
                    remaining: remaining.len(),
                    tasks: remaining,
                });
            }

            let mut join_set = JoinSet::new();
            for task in ready_batch {
                let scheduler = Arc::clone(self);
                join_set.spawn(async move { scheduler.execute_one(task).await });
            }

            let mut first_err = None;
            while let Some(joined) = join_set.join_next().await {
                match joined.expect("task panicked") {
                    Ok(()) => {}
                    Err(e) if first_err.is_none() => first_err = Some(e),
                    Err(_) => {}
                }
            }
            if let Some(e) = first_err {
                return Err(e);
            }
        }
        Ok(self.completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::core::test_support::EchoExecutor;
    use crate::agent::Agent;
    use crate::node::Node;
    use crate::task::TaskDependency;

    fn local_node(agents: &[&str]) -> Worker {
        let mut table = HashMap::new();
        for name in agents {
            table.insert(name.to_string(), Agent::new(*name, Arc::new(EchoExecutor)));
        }
        Worker::Local(Arc::new(Node::new("local", table)))
    }

    #[tokio::test]
    async fn sequential_linear_chain_propagates_results() {
        let t1 = Task::new("t1", "writer", "start", vec![], Some("r1".to_string())).unwrap();
        let t2 = Task::new(
            "t2",
            "writer",
            "next: {r1}",
            vec![TaskDependency::new("t1", "r1")],
            Some("r2".to_string()),
        )
        .unwrap();
        let context = Arc::new(Context::new());
        let scheduler = Scheduler::new(vec![t1, t2], context.clone(), vec![local_node(&["writer"])], vec![]);
        let completed = scheduler.run_sequential().await.unwrap();
        assert_eq!(completed, vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(context.get("r2"), Some("R:next: R:start".to_string()));
    }

    #[tokio::test]
    async fn sequential_fails_fast_when_no_node_hosts_the_agent() {
        let t1 = Task::new("t1", "researcher", "go", vec![], None).unwrap();
        let context = Arc::new(Context::new());
        let scheduler = Scheduler::new(vec![t1], context, vec![local_node(&["writer"])], vec![]);
        let err = scheduler.run_sequential().await.unwrap_err();
        assert!(matches!(err, SwarmError::AgentNotAvailable { .. }));
    }

    #[tokio::test]
    async fn sequential_bounds_the_wait_for_a_permanently_offline_node() {
        let node = local_node(&["writer"]);
        node.mark_offline();

        let t1 = Task::new("t1", "writer", "go", vec![], None).unwrap();
        let context = Arc::new(Context::new());
        let scheduler = Scheduler::new(vec![t1], context, vec![node], vec![]);
        let err = scheduler.run_sequential().await.unwrap_err();
        assert!(matches!(err, SwarmError::Deadlock { .. }));
    }

    #[tokio::test]
    async fn sequential_detects_deadlock_on_dangling_dependency() {
        let t1 = Task::new(
            "t1",
            "writer",
            "needs {missing}",
            vec![],
            Some("r1".to_string()),
        )
        .unwrap();
        let context = Arc::new(Context::new());
        let scheduler = Scheduler::new(vec![t1], context, vec![local_node(&["writer"])], vec![]);
        let err = scheduler.run_sequential().await.unwrap_err();
        assert!(matches!(err, SwarmError::Deadlock { .. }));
    }

    #[tokio::test]
    async fn local_batch_fans_out_independent_tasks() {
        let a = Task::new("a", "writer", "a", vec![], Some("ra".to_string())).unwrap();
        let b = Task::new("b", "writer", "b", vec![], Some("rb".to_string())).unwrap();
        let join = Task::new(
            "join",
            "writer",
            "{ra}+{rb}",
            vec![TaskDependency::new("a", "ra"), TaskDependency::new("b", "rb")],
            Some("rjoin".to_string()),
        )
        .unwrap();
        let context = Arc::new(Context::new());
        let scheduler = Arc::new(Scheduler::new(
            vec![a, b, join],
            context.clone(),
            vec![local_node(&["writer"])],
            vec![],
        ));
        let completed = scheduler.run_local_batch().await.unwrap();
        assert_eq!(completed.len(), 3);
        assert_eq!(context.get("rjoin"), Some("R:R:a+R:b".to_string()));
    }

    #[tokio::test]
    async fn sequential_propagates_agent_failure() {
        use crate::agent::core::test_support::FailingExecutor;

        let mut table = HashMap::new();
        table.insert(
            "writer".to_string(),
            Agent::new(
                "writer",
                Arc::new(FailingExecutor {
                    message: "boom".to_string(),
                }),
            ),
        );
        let node = Worker::Local(Arc::new(Node::new("local", table)));

        let t1 = Task::new("t1", "writer", "go", vec![], None).unwrap();
        let context = Arc::new(Context::new());
        let scheduler = Scheduler::new(vec![t1], context, vec![node], vec![]);
        let err = scheduler.run_sequential().await.unwrap_err();
        assert!(matches!(err, SwarmError::AgentFailure { .. }));
    }

    #[tokio::test]
    async fn sequential_dispatches_a_single_task_to_a_genuinely_remote_node() {
        use crate::node::RemoteNode;
        use crate::swarm::proto::swarm_node_service_server::SwarmNodeServiceServer;
        use crate::swarm::server::SwarmNodeServicer;
        use crate::swarm::SwarmNodeClient;
        use tokio_stream::wrappers::TcpListenerStream;

        let mut remote_agents = HashMap::new();
        remote_agents.insert(
            "researcher".to_string(),
            Agent::new("researcher", Arc::new(EchoExecutor)),
        );
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

        let client = SwarmNodeClient::connect("remote-1", format!("http://{addr}"), vec![])
            .await
            .unwrap();
        let remote = Worker::Remote(Arc::new(RemoteNode::new(
            "remote-1",
            vec!["researcher".to_string()],
            client,
        )));

        let t1 = Task::new(
            "t1",
            "researcher",
            "investigate {topic}",
            vec![],
            Some("r1".to_string()),
        )
        .unwrap();
        let context = Arc::new(Context::with_values(HashMap::from([(
            "topic".to_string(),
            "rust".to_string(),
        )])));
        let scheduler = Scheduler::new(vec![t1], context.clone(), vec![remote], vec![]);
        let completed = scheduler.run_sequential().await.unwrap();
        assert_eq!(completed, vec!["t1".to_string()]);
        assert_eq!(context.get("r1"), Some("R:investigate rust".to_string()));
    }
}
