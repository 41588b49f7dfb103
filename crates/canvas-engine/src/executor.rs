//! External executor interfaces
//!
//! The scheduler never performs generation itself. It hands a built payload
//! to one of these executors and records whatever comes back. Every call
//! receives the run's cancellation token.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::output::RawOutput;
use crate::payload::{EnrichmentPayload, ExtendVideoPayload, GenerationPayload};
use crate::types::NodeKind;

/// Result of one executor call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<RawOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A successful call producing `output`
    pub fn ok(output: RawOutput) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    /// A failed call with an error message
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Callback receiving the accumulated text of a streaming enrichment
pub type PartialUpdate = Arc<dyn Fn(&str) + Send + Sync>;

/// Image and video generation
#[async_trait]
pub trait GenerationExecutor: Send + Sync {
    async fn generate(
        &self,
        node_id: &str,
        payload: GenerationPayload,
        cancel: CancellationToken,
    ) -> ExecutionResult;
}

/// Continuation of an existing video
#[async_trait]
pub trait VideoExtendExecutor: Send + Sync {
    async fn extend(
        &self,
        node_id: &str,
        payload: ExtendVideoPayload,
        cancel: CancellationToken,
    ) -> ExecutionResult;
}

/// Prompt rewriting with streamed partial text
#[async_trait]
pub trait EnrichmentExecutor: Send + Sync {
    /// Rewrite the payload text
    ///
    /// `on_partial` may be called any number of times with the text
    /// produced so far before the call returns.
    async fn enrich(
        &self,
        node_id: &str,
        payload: EnrichmentPayload,
        on_partial: PartialUpdate,
        cancel: CancellationToken,
    ) -> ExecutionResult;
}

/// The executors available to a scheduler
///
/// Generation is mandatory. A node whose executor is absent fails when it
/// is dispatched.
#[derive(Clone)]
pub struct ExecutorSet {
    pub generation: Arc<dyn GenerationExecutor>,
    pub video_extend: Option<Arc<dyn VideoExtendExecutor>>,
    pub enrichment: Option<Arc<dyn EnrichmentExecutor>>,
}

impl ExecutorSet {
    /// Executor set with only a generation executor
    pub fn new(generation: Arc<dyn GenerationExecutor>) -> Self {
        Self {
            generation,
            video_extend: None,
            enrichment: None,
        }
    }

    pub fn with_video_extend(mut self, executor: Arc<dyn VideoExtendExecutor>) -> Self {
        self.video_extend = Some(executor);
        self
    }

    pub fn with_enrichment(mut self, executor: Arc<dyn EnrichmentExecutor>) -> Self {
        self.enrichment = Some(executor);
        self
    }
}

/// Failure message for a kind whose executor is not configured
pub(crate) fn missing_executor(kind: NodeKind) -> String {
    format!("No executor configured for {} nodes", kind)
}
