//! Canvas Engine - Dependency-aware execution for content-generation canvases
//!
//! This crate decides what to run, when, and with what inputs for a canvas
//! of connected nodes: prompts, prompt enhancers, image and video
//! generators, and passive media references. It supports:
//!
//! - Connection validation with per-handle types, cardinality and mode gates
//! - Full-graph and targeted runs with downstream invalidation
//! - Bounded parallel dispatch (three in flight by default)
//! - Upstream failure propagation without aborting independent branches
//! - Cooperative cancellation and streamed partial text
//!
//! # Architecture
//!
//! - `WorkflowGraph`: nodes with tagged per-kind settings, and edges
//! - `DependencyGraph`: adjacency and topological order of executable nodes
//! - `readiness`: whether a node's inputs are satisfied
//! - `payload`: the request handed to an external executor
//! - `Scheduler`: the run loop, driving a `GraphStore` and executors
//!
//! Generation itself happens outside this crate, behind the executor traits.
//!
//! # Example
//!
//! ```ignore
//! use canvas_engine::{ExecutorSet, InMemoryGraphStore, RunOptions, Scheduler};
//!
//! let store = Arc::new(InMemoryGraphStore::new(graph));
//! let scheduler = Scheduler::new(
//!     store,
//!     ExecutorSet::new(generator),
//!     Arc::new(NullEventSink),
//!     EngineConfig::default(),
//! );
//! let report = scheduler.run(RunOptions::target("image"), CancellationToken::new()).await?;
//! ```

pub mod builder;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod handles;
pub mod inputs;
pub mod models;
pub mod output;
pub mod payload;
pub mod readiness;
pub mod scheduler;
pub mod scope;
pub mod state;
pub mod store;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use config::{EngineConfig, ResetPolicy};
pub use error::{EngineError, Result};
pub use events::{EventSink, NullEventSink, VecEventSink, WorkflowEvent};
pub use executor::{
    EnrichmentExecutor, ExecutionResult, ExecutorSet, GenerationExecutor, PartialUpdate,
    VideoExtendExecutor,
};
pub use graph::DependencyGraph;
pub use output::{NodeOutput, RawOutput};
pub use payload::{build_payload, NodePayload, PayloadError};
pub use readiness::{evaluate, Readiness, UnreadyReason};
pub use scheduler::{RunOptions, RunReport, Scheduler};
pub use scope::{downstream_scope, upstream_scope};
pub use state::{ExecutionState, ExecutionStatus};
pub use store::{GraphStore, InMemoryGraphStore, NodeUpdate};
pub use types::{GraphEdge, GraphNode, NodeKind, NodeSettings, WorkflowGraph};
pub use validation::{check_connection, is_valid_connection, ConnectionError};

// Re-export the cancellation token executors receive
pub use tokio_util::sync::CancellationToken;
