//! Evaluator / debug sink: an optional observer.
//!
//! A pure observer: it implements [`SchedulerObserver`] and records task
//! timing and transport-call metadata without ever influencing scheduler
//! decisions. Folds a debug-level verbosity setting and a
//! distributed-communication verification heuristic into a single type.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::scheduler::SchedulerObserver;

/// Verbosity of what the evaluator records and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    None,
    Basic,
    Detailed,
    Verbose,
}

impl Default for DebugLevel {
    fn default() -> Self {
        DebugLevel::Basic
    }
}

#[derive(Debug, Clone)]
struct TaskRecord {
    agent: String,
    node: String,
    deps: Vec<String>,
    start: Instant,
    end: Option<Instant>,
    failed: bool,
}

#[derive(Debug, Clone)]
struct TransportRecord {
    node: String,
    method: String,
    bytes: usize,
    duration: Option<Duration>,
}

/// Records task timing and transport metadata for a single crew
/// execution. Thread-safe: multiple tasks in a local batch may report
/// concurrently.
pub struct Evaluator {
    debug_level: DebugLevel,
    run_start: Instant,
    tasks: Mutex<HashMap<String, TaskRecord>>,
    transport_calls: Mutex<Vec<TransportRecord>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::with_debug_level(DebugLevel::default())
    }

    pub fn with_debug_level(debug_level: DebugLevel) -> Self {
        Evaluator {
            debug_level,
            run_start: Instant::now(),
            tasks: Mutex::new(HashMap::new()),
            transport_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn debug_level(&self) -> DebugLevel {
        self.debug_level
    }

    /// Tasks that finished with a node id other than the implicit local
    /// node — i.e. ones plausibly dispatched over the wire.
    pub fn remote_tasks(&self) -> Vec<String> {
        self.tasks
            .lock()
            .iter()
            .filter(|(_, r)| r.node != crate::crew::LOCAL_NODE_ID)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Buckets completed task names by the node id that executed them.
    pub fn tasks_by_node(&self) -> HashMap<String, Vec<String>> {
        let mut buckets: HashMap<String, Vec<String>> = HashMap::new();
        for (name, record) in self.tasks.lock().iter() {
            buckets.entry(record.node.clone()).or_default().push(name.clone());
        }
        buckets
    }

    /// Applies a latency heuristic to decide whether the recorded
    /// transport calls plausibly crossed a real network boundary: any
    /// call took longer than a trivial in-process round trip would.
    pub fn verify_distributed_communication(&self) -> bool {
        const MIN_PLAUSIBLE_NETWORK_LATENCY: Duration = Duration::from_micros(200);
        let calls = self.transport_calls.lock();
        if calls.is_empty() {
            return false;
        }
        calls
            .iter()
            .any(|c| c.duration.map(|d| d >= MIN_PLAUSIBLE_NETWORK_LATENCY).unwrap_or(false))
    }

    /// Overlap set: for `task`, every other task whose [start, end)
    /// interval intersects its own — the "parallel group" it ran in.
    pub fn parallel_group(&self, task: &str) -> Vec<String> {
        let tasks = self.tasks.lock();
        let Some(target) = tasks.get(task) else {
            return Vec::new();
        };
        let target_end = target.end.unwrap_or(target.start);
        tasks
            .iter()
            .filter(|(name, record)| {
                *name != task
                    && record.start < target_end
                    && target.start < record.end.unwrap_or(record.start)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Total wall-clock time elapsed since the evaluator was created.
    pub fn total_run_time(&self) -> Duration {
        self.run_start.elapsed()
    }

    /// Generates a plain-text execution report in the order tasks
    /// finished, per `completed`.
    pub fn generate_report(&self, completed: &[String]) -> ExecutionReport {
        let tasks = self.tasks.lock();
        let mut lines = Vec::new();
        lines.push(format!("Execution report ({} task(s))", completed.len()));
        lines.push(format!("Total run time: {:.3}s", self.total_run_time().as_secs_f64()));
        for name in completed {
            if let Some(record) = tasks.get(name) {
                let duration = record
                    .end
                    .map(|end| end.duration_since(record.start))
                    .unwrap_or_default();
                lines.push(format!(
                    "  {name} [agent={}, node={}] {:.3}s{}",
                    record.agent,
                    record.node,
                    duration.as_secs_f64(),
                    if record.failed { " (failed)" } else { "" }
                ));
                if !record.deps.is_empty() {
                    lines.push(format!("    Dependencies: {}", record.deps.join(", ")));
                }
            }
        }
        if self.debug_level >= DebugLevel::Detailed {
            lines.push(format!(
                "Distributed communication verified: {}",
                self.verify_distributed_communication()
            ));
        }
        ExecutionReport {
            text: lines.join("\n"),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-text rendering of a single crew execution, produced by
/// [`Evaluator::generate_report`].
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    text: String,
}

impl ExecutionReport {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

impl SchedulerObserver for Evaluator {
    fn on_task_start(&self, task: &str, agent: &str, node: &str, deps: &[String]) {
        self.tasks.lock().insert(
            task.to_string(),
            TaskRecord {
                agent: agent.to_string(),
                node: node.to_string(),
                deps: deps.to_vec(),
                start: Instant::now(),
                end: None,
                failed: false,
            },
        );
    }

    fn on_task_end(&self, task: &str, node: &str, result: &Result<String, String>) {
        let mut tasks = self.tasks.lock();
        let record = tasks.entry(task.to_string()).or_insert_with(|| TaskRecord {
            agent: String::new(),
            node: node.to_string(),
            deps: Vec::new(),
            start: Instant::now(),
            end: None,
            failed: false,
        });
        record.end = Some(Instant::now());
        record.failed = result.is_err();
    }

    fn on_transport_send(&self, node: &str, method: &str, bytes: usize) {
        if self.debug_level == DebugLevel::None {
            return;
        }
        self.transport_calls.lock().push(TransportRecord {
            node: node.to_string(),
            method: method.to_string(),
            bytes,
            duration: None,
        });
    }

    fn on_transport_receive(&self, node: &str, method: &str, bytes: usize, duration: Duration) {
        if self.debug_level == DebugLevel::None {
            return;
        }
        let mut calls = self.transport_calls.lock();
        if let Some(last) = calls
            .iter_mut()
            .rev()
            .find(|c| c.node == node && c.method == method && c.duration.is_none())
        {
            last.duration = Some(duration);
            last.bytes += bytes;
        } else {
            calls.push(TransportRecord {
                node: node.to_string(),
                method: method.to_string(),
                bytes,
                duration: Some(duration),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn records_task_start_and_end() {
        let evaluator = Evaluator::new();
        evaluator.on_task_start("t1", "writer", "local", &[]);
        sleep(Duration::from_millis(5));
        evaluator.on_task_end("t1", "local", &Ok("done".to_string()));
        let report = evaluator.generate_report(&["t1".to_string()]);
        assert!(report.as_str().contains("t1"));
        assert!(report.as_str().contains("agent=writer"));
    }

    #[test]
    fn records_task_dependencies_in_report() {
        let evaluator = Evaluator::new();
        evaluator.on_task_start("t2", "writer", "local", &["t1".to_string()]);
        evaluator.on_task_end("t2", "local", &Ok("done".to_string()));
        let report = evaluator.generate_report(&["t2".to_string()]);
        assert!(report.as_str().contains("Dependencies: t1"));
    }

    #[test]
    fn tasks_by_node_buckets_correctly() {
        let evaluator = Evaluator::new();
        evaluator.on_task_start("t1", "writer", "local", &[]);
        evaluator.on_task_end("t1", "local", &Ok("x".to_string()));
        evaluator.on_task_start("t2", "writer", "remote-1", &[]);
        evaluator.on_task_end("t2", "remote-1", &Ok("y".to_string()));
        let buckets = evaluator.tasks_by_node();
        assert_eq!(buckets.get("local").unwrap(), &vec!["t1".to_string()]);
        assert_eq!(buckets.get("remote-1").unwrap(), &vec!["t2".to_string()]);
    }

    #[test]
    fn remote_tasks_excludes_local_node() {
        let evaluator = Evaluator::new();
        evaluator.on_task_start("t1", "writer", "local", &[]);
        evaluator.on_task_end("t1", "local", &Ok("x".to_string()));
        evaluator.on_task_start("t2", "writer", "remote-1", &[]);
        evaluator.on_task_end("t2", "remote-1", &Ok("y".to_string()));
        assert_eq!(evaluator.remote_tasks(), vec!["t2".to_string()]);
    }

    #[test]
    fn verify_distributed_communication_requires_plausible_latency() {
        let evaluator = Evaluator::with_debug_level(DebugLevel::Detailed);
        assert!(!evaluator.verify_distributed_communication());
        evaluator.on_transport_send("remote-1", "ExecuteTask", 128);
        evaluator.on_transport_receive("remote-1", "ExecuteTask", 64, Duration::from_millis(2));
        assert!(evaluator.verify_distributed_communication());
    }

    #[test]
    fn none_debug_level_records_no_transport_calls() {
        let evaluator = Evaluator::with_debug_level(DebugLevel::None);
        evaluator.on_transport_send("remote-1", "Heartbeat", 8);
        assert!(!evaluator.verify_distributed_communication());
    }
}
