//! Dependency-aware run scheduler
//!
//! A single coordinator owns all run state. It admits ready nodes into a
//! bounded in-flight set and waits for whichever execution finishes first,
//! so a freed slot is refilled as soon as possible. Executors never touch
//! run state directly: results come back through the in-flight futures and
//! streamed text through a channel.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{EngineConfig, ResetPolicy};
use crate::constants::reasons;
use crate::error::{EngineError, Result};
use crate::events::{EventSink, WorkflowEvent};
use crate::executor::{missing_executor, ExecutionResult, ExecutorSet, PartialUpdate};
use crate::graph::DependencyGraph;
use crate::inputs::InputView;
use crate::output::{normalize, NodeOutput};
use crate::payload::{build_payload, NodePayload};
use crate::readiness::{evaluate, Readiness};
use crate::scope::{downstream_scope, upstream_scope};
use crate::state::ExecutionState;
use crate::store::{GraphStore, NodeUpdate};
use crate::types::{GraphEdge, GraphNode, NodeId, NodeKind, NodeSettings};

type InFlight = BoxFuture<'static, (NodeId, ExecutionResult)>;
type Progress = (NodeId, String);

/// What to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Run only this node and its ancestors; `None` runs every executable node
    pub target: Option<NodeId>,
    /// Overrides the configured reset policy
    pub reset: Option<ResetPolicy>,
}

impl RunOptions {
    /// Run the whole graph
    pub fn all() -> Self {
        Self::default()
    }

    /// Run `node_id` and whatever it depends on
    pub fn target(node_id: impl Into<NodeId>) -> Self {
        Self {
            target: Some(node_id.into()),
            reset: None,
        }
    }

    pub fn with_reset(mut self, reset: ResetPolicy) -> Self {
        self.reset = Some(reset);
        self
    }
}

/// Outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub execution_id: String,
    /// Every output available at the end of the run, reused ones included
    pub outputs: HashMap<NodeId, NodeOutput>,
    /// Final state of every node in the execution scope
    pub states: HashMap<NodeId, ExecutionState>,
    /// The run stopped early because it was cancelled
    pub cancelled: bool,
}

impl RunReport {
    pub fn output(&self, node_id: &str) -> Option<&NodeOutput> {
        self.outputs.get(node_id)
    }

    pub fn state(&self, node_id: &str) -> Option<&ExecutionState> {
        self.states.get(node_id)
    }

    /// IDs of failed nodes, sorted
    pub fn failed_nodes(&self) -> Vec<&str> {
        let mut failed: Vec<&str> = self
            .states
            .iter()
            .filter(|(_, state)| state.is_failed())
            .map(|(id, _)| id.as_str())
            .collect();
        failed.sort_unstable();
        failed
    }

    /// Whether every node in scope completed
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.states.values().all(|s| s.is_completed())
    }
}

/// Executes workflow graphs held in a graph store
pub struct Scheduler {
    store: Arc<dyn GraphStore>,
    executors: ExecutorSet,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn GraphStore>,
        executors: ExecutorSet,
        event_sink: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            executors,
            events: event_sink,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one pass over the graph
    ///
    /// Node failures are recorded in the report and never abort the run.
    /// Errors are returned only when the run cannot start: a cycle, or an
    /// unknown or passive target. In those cases the store is not modified.
    pub async fn run(&self, options: RunOptions, cancel: CancellationToken) -> Result<RunReport> {
        let snapshot = self.store.snapshot();
        let edges = snapshot.sanitized_edges();
        let graph = DependencyGraph::build(&snapshot.nodes, &edges)?;

        if let Some(target) = &options.target {
            let node = snapshot
                .find_node(target)
                .ok_or_else(|| EngineError::NodeNotFound(target.clone()))?;
            if !node.is_executable() {
                return Err(EngineError::NotExecutable(target.clone()));
            }
        }

        let execution_scope: HashSet<NodeId> = match &options.target {
            Some(target) => upstream_scope(&graph, target),
            None => graph.execution_order().iter().cloned().collect(),
        };
        let seeds: Vec<&str> = match &options.target {
            Some(target) => vec![target.as_str()],
            None => graph.execution_order().iter().map(String::as_str).collect(),
        };
        let reset_scope: HashSet<NodeId> = match options.reset.unwrap_or(self.config.default_reset) {
            ResetPolicy::Downstream => downstream_scope(&graph, seeds),
            ResetPolicy::TargetOnly => seeds.into_iter().map(str::to_string).collect(),
            ResetPolicy::Keep => HashSet::new(),
        };

        let execution_id = Uuid::new_v4().to_string();
        log::info!(
            "Starting run {} ({} nodes in scope, {} reset)",
            execution_id,
            execution_scope.len(),
            reset_scope.len()
        );

        let mut nodes = snapshot.nodes;
        for node in nodes.iter_mut().filter(|n| reset_scope.contains(&n.id)) {
            NodeUpdate::Reset.apply(node);
            self.store.update_node(&node.id, NodeUpdate::Reset);
        }

        let resolved: HashMap<NodeId, NodeOutput> = nodes
            .iter()
            .filter(|n| n.is_executable())
            .filter_map(|n| n.completed_output().map(|o| (n.id.clone(), o.clone())))
            .collect();
        let pending: Vec<NodeId> = graph
            .execution_order()
            .iter()
            .filter(|id| execution_scope.contains(*id) && !resolved.contains_key(*id))
            .cloned()
            .collect();
        let states: HashMap<NodeId, ExecutionState> = nodes
            .iter()
            .filter(|n| execution_scope.contains(&n.id))
            .map(|n| (n.id.clone(), n.state.clone()))
            .collect();

        self.emit(WorkflowEvent::RunStarted {
            execution_id: execution_id.clone(),
            target: options.target.clone(),
            nodes: pending.clone(),
        });

        let mut run = Run {
            scheduler: self,
            execution_id,
            nodes,
            edges,
            resolved,
            failed: HashSet::new(),
            states,
            pending,
            in_flight: HashSet::new(),
        };

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<Progress>();
        let mut running: FuturesUnordered<InFlight> = FuturesUnordered::new();
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() {
                cancelled = true;
            }
            if !cancelled {
                run.admit(&mut running, &cancel, &progress_tx);
            }

            if running.is_empty() {
                if !cancelled && !run.pending.is_empty() {
                    run.fail_stalled();
                }
                break;
            }

            let finished = tokio::select! {
                Some(done) = running.next() => Some(done),
                Some((node_id, text)) = progress_rx.recv() => {
                    run.stream(&node_id, text);
                    None
                }
            };

            if let Some((node_id, result)) = finished {
                // partials sent before the result must land while the node is in flight
                while let Ok((id, text)) = progress_rx.try_recv() {
                    run.stream(&id, text);
                }
                run.finish(&node_id, result);
            }
        }

        Ok(run.into_report(cancelled))
    }

    /// Start the executor call for a built payload
    fn start(
        &self,
        node_id: &str,
        payload: NodePayload,
        cancel: &CancellationToken,
        progress: &mpsc::UnboundedSender<Progress>,
    ) -> std::result::Result<InFlight, String> {
        let id = node_id.to_string();
        let token = cancel.clone();

        let call: BoxFuture<'static, ExecutionResult> = match payload {
            NodePayload::Generation(payload) => {
                let executor = self.executors.generation.clone();
                Box::pin(async move { executor.generate(&id, payload, token).await })
            }
            NodePayload::ExtendVideo(payload) => {
                let executor = self
                    .executors
                    .video_extend
                    .clone()
                    .ok_or_else(|| missing_executor(NodeKind::ExtendVideo))?;
                Box::pin(async move { executor.extend(&id, payload, token).await })
            }
            NodePayload::Enrichment(payload) => {
                let executor = self
                    .executors
                    .enrichment
                    .clone()
                    .ok_or_else(|| missing_executor(NodeKind::PromptEnhancer))?;
                let tx = progress.clone();
                let partial_id = id.clone();
                let on_partial: PartialUpdate = Arc::new(move |text: &str| {
                    let _ = tx.send((partial_id.clone(), text.to_string()));
                });
                Box::pin(async move { executor.enrich(&id, payload, on_partial, token).await })
            }
        };

        let call = AssertUnwindSafe(call).catch_unwind().map(|outcome| {
            outcome.unwrap_or_else(|_| ExecutionResult::failed(reasons::EXECUTOR_PANICKED))
        });

        let id = node_id.to_string();
        let token = cancel.clone();
        Ok(Box::pin(async move {
            let result = tokio::select! {
                result = call => result,
                _ = token.cancelled() => ExecutionResult::failed(reasons::CANCELLED),
            };
            (id, result)
        }))
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Failed to send run event: {}", e);
        }
    }
}

/// What to do with a pending node this round
enum Decision {
    Complete(NodeOutput),
    Dispatch(NodePayload),
    Fail(String),
}

/// State of one run, owned by the coordinator
struct Run<'s> {
    scheduler: &'s Scheduler,
    execution_id: String,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    resolved: HashMap<NodeId, NodeOutput>,
    failed: HashSet<NodeId>,
    states: HashMap<NodeId, ExecutionState>,
    pending: Vec<NodeId>,
    in_flight: HashSet<NodeId>,
}

impl Run<'_> {
    /// Settle every pending node that can be settled now
    ///
    /// Repeats until a round changes nothing, since inline completions and
    /// failures can unblock or doom other pending nodes.
    fn admit(
        &mut self,
        running: &mut FuturesUnordered<InFlight>,
        cancel: &CancellationToken,
        progress: &mpsc::UnboundedSender<Progress>,
    ) {
        let max = self.scheduler.config.max_concurrency.max(1);
        loop {
            let slots = max.saturating_sub(self.in_flight.len());
            let decisions = self.decide(slots);
            if decisions.is_empty() {
                break;
            }

            for (node_id, decision) in decisions {
                self.pending.retain(|id| id != &node_id);
                match decision {
                    Decision::Complete(output) => self.complete(&node_id, output),
                    Decision::Fail(error) => self.fail(&node_id, error),
                    Decision::Dispatch(payload) => {
                        match self.scheduler.start(&node_id, payload, cancel, progress) {
                            Ok(future) => {
                                self.mark_running(&node_id);
                                running.push(future);
                            }
                            Err(error) => self.fail(&node_id, error),
                        }
                    }
                }
            }
        }
    }

    fn decide(&self, mut slots: usize) -> Vec<(NodeId, Decision)> {
        let view = InputView::new(&self.nodes, &self.resolved, &self.failed);
        let mut decisions = Vec::new();

        for node_id in &self.pending {
            let Some(node) = view.node(node_id) else {
                continue;
            };
            match evaluate(node, &self.edges, &view) {
                Readiness::Ready => {
                    if let NodeSettings::Text(settings) = &node.settings {
                        decisions.push((
                            node_id.clone(),
                            Decision::Complete(NodeOutput::text(settings.text.clone())),
                        ));
                    } else if slots > 0 {
                        slots -= 1;
                        let decision = match build_payload(node, &view, &self.edges) {
                            Ok(payload) => Decision::Dispatch(payload),
                            Err(e) => Decision::Fail(e.to_string()),
                        };
                        decisions.push((node_id.clone(), decision));
                    }
                }
                Readiness::NotReady(reason) if reason.is_permanent() => {
                    decisions.push((node_id.clone(), Decision::Fail(reason.to_string())));
                }
                Readiness::NotReady(_) => {}
            }
        }

        decisions
    }

    /// Fail every pending node once nothing is running and nothing can start
    fn fail_stalled(&mut self) {
        let stalled: Vec<(NodeId, String)> = {
            let view = InputView::new(&self.nodes, &self.resolved, &self.failed);
            self.pending
                .iter()
                .filter_map(|id| view.node(id))
                .map(|node| {
                    let reason = match evaluate(node, &self.edges, &view) {
                        Readiness::NotReady(reason) => reason.to_string(),
                        Readiness::Ready => reasons::MISSING_INPUTS.to_string(),
                    };
                    (node.id.clone(), reason)
                })
                .collect()
        };

        log::warn!(
            "Run {} cannot make progress; failing {} pending nodes",
            self.execution_id,
            stalled.len()
        );
        self.pending.clear();
        for (node_id, reason) in stalled {
            self.fail(&node_id, reason);
        }
    }

    fn mark_running(&mut self, node_id: &str) {
        log::debug!("Dispatching node '{}'", node_id);
        self.in_flight.insert(node_id.to_string());
        self.states.insert(node_id.to_string(), ExecutionState::running());
        self.scheduler.store.update_node(node_id, NodeUpdate::Running);
        self.scheduler.emit(WorkflowEvent::NodeStarted {
            node_id: node_id.to_string(),
            execution_id: self.execution_id.clone(),
        });
    }

    /// Fold an executor result into run state
    fn finish(&mut self, node_id: &str, result: ExecutionResult) {
        self.in_flight.remove(node_id);
        let Some(kind) = self.nodes.iter().find(|n| n.id == node_id).map(|n| n.kind()) else {
            return;
        };

        match (result.success, result.output) {
            (true, Some(raw)) => match normalize(kind, raw) {
                Ok(output) => self.complete(node_id, output),
                Err(e) => self.fail(node_id, e.to_string()),
            },
            (true, None) => self.fail(node_id, "Executor returned no output".to_string()),
            (false, _) => {
                let error = result
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "Execution failed".to_string());
                self.fail(node_id, error);
            }
        }
    }

    /// Forward partial text from a node that is still running
    fn stream(&mut self, node_id: &str, text: String) {
        if !self.in_flight.contains(node_id) {
            return;
        }
        self.scheduler.store.update_node(
            node_id,
            NodeUpdate::Streaming {
                text: text.clone(),
            },
        );
        self.scheduler.emit(WorkflowEvent::node_progress(
            node_id,
            &self.execution_id,
            text,
        ));
    }

    fn complete(&mut self, node_id: &str, output: NodeOutput) {
        log::debug!("Node '{}' completed", node_id);
        self.resolved.insert(node_id.to_string(), output.clone());
        self.states.insert(node_id.to_string(), ExecutionState::completed());
        self.scheduler.store.update_node(
            node_id,
            NodeUpdate::Completed {
                output: output.clone(),
            },
        );
        self.scheduler.emit(WorkflowEvent::NodeCompleted {
            node_id: node_id.to_string(),
            execution_id: self.execution_id.clone(),
            output,
        });
    }

    fn fail(&mut self, node_id: &str, error: String) {
        log::warn!("Node '{}' failed: {}", node_id, error);
        self.failed.insert(node_id.to_string());
        self.states
            .insert(node_id.to_string(), ExecutionState::failed(error.clone()));
        self.scheduler.store.update_node(
            node_id,
            NodeUpdate::Failed {
                error: error.clone(),
            },
        );
        self.scheduler
            .emit(WorkflowEvent::node_failed(node_id, &self.execution_id, error));
    }

    fn into_report(self, cancelled: bool) -> RunReport {
        let completed = self.states.values().filter(|s| s.is_completed()).count();
        if cancelled {
            log::info!("Run {} cancelled", self.execution_id);
            self.scheduler.emit(WorkflowEvent::RunCancelled {
                execution_id: self.execution_id.clone(),
            });
        } else {
            log::info!(
                "Run {} finished: {} completed, {} failed",
                self.execution_id,
                completed,
                self.failed.len()
            );
            self.scheduler.emit(WorkflowEvent::RunCompleted {
                execution_id: self.execution_id.clone(),
                completed,
                failed: self.failed.len(),
            });
        }

        RunReport {
            execution_id: self.execution_id,
            outputs: self.resolved,
            states: self.states,
            cancelled,
        }
    }
}
