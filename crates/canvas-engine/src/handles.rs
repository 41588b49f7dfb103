//! Handle policies
//!
//! A handle's behaviour is derived from the owning node's kind and the
//! handle name. Policies are not stored on edges; they are looked up here
//! whenever a connection is validated or an input is resolved.

use crate::constants::{handles, limits};
use crate::types::{NodeKind, PortDataType, ReferenceMode};

const TEXT_SOURCES: &[NodeKind] = &[NodeKind::Text, NodeKind::PromptEnhancer];
const IMAGE_SOURCES: &[NodeKind] = &[NodeKind::ImageGenerator, NodeKind::ImageReference];
const VIDEO_SOURCES: &[NodeKind] = &[
    NodeKind::VideoGenerator,
    NodeKind::ExtendVideo,
    NodeKind::VideoReference,
];

/// How a target handle participates in readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleRole {
    /// The node's prompt input; falls back to inline text when unconnected
    Prompt,
    /// An input that must be connected for the node to run
    Required,
    /// An input that only blocks the node when connected
    Optional,
}

/// Connection rules for one target handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlePolicy {
    /// Data type the handle consumes
    pub data_type: PortDataType,
    /// Node kinds allowed as edge sources
    pub accepted_sources: &'static [NodeKind],
    /// Maximum number of edges into this handle
    pub max_connections: usize,
    /// Reference mode the target must be in for the handle to exist
    pub mode: Option<ReferenceMode>,
    pub role: HandleRole,
}

impl HandlePolicy {
    const fn single(
        data_type: PortDataType,
        accepted_sources: &'static [NodeKind],
        role: HandleRole,
    ) -> Self {
        Self {
            data_type,
            accepted_sources,
            max_connections: 1,
            mode: None,
            role,
        }
    }

    const fn gated(mut self, mode: ReferenceMode) -> Self {
        self.mode = Some(mode);
        self
    }

    const fn up_to(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Whether more than one edge may target this handle
    pub fn allows_multiple(&self) -> bool {
        self.max_connections > 1
    }

    /// Whether `kind` may feed this handle
    pub fn accepts(&self, kind: NodeKind) -> bool {
        self.accepted_sources.contains(&kind)
    }

    /// Whether the handle is exposed under the given reference mode
    pub fn is_active(&self, mode: Option<ReferenceMode>) -> bool {
        match self.mode {
            Some(required) => mode == Some(required),
            None => true,
        }
    }
}

/// Look up the policy for a target handle
///
/// Returns `None` when the kind has no such input handle.
pub fn policy_for(kind: NodeKind, handle: &str) -> Option<HandlePolicy> {
    use HandleRole::{Optional, Prompt, Required};
    use PortDataType::{Image, Text, Video};

    let policy = match (kind, handle) {
        (NodeKind::PromptEnhancer, handles::PROMPT_IN) => {
            HandlePolicy::single(Text, TEXT_SOURCES, Prompt)
        }

        (NodeKind::ImageGenerator, handles::PROMPT) => HandlePolicy::single(Text, TEXT_SOURCES, Prompt),
        (NodeKind::ImageGenerator, handles::NEGATIVE) => {
            HandlePolicy::single(Text, TEXT_SOURCES, Optional)
        }
        (NodeKind::ImageGenerator, handles::REF_IMAGES) => {
            HandlePolicy::single(Image, IMAGE_SOURCES, Optional).up_to(limits::IMAGE_REFERENCE_IMAGES)
        }

        (NodeKind::VideoGenerator, handles::PROMPT) => HandlePolicy::single(Text, TEXT_SOURCES, Prompt),
        (NodeKind::VideoGenerator, handles::NEGATIVE) => {
            HandlePolicy::single(Text, TEXT_SOURCES, Optional)
        }
        (NodeKind::VideoGenerator, handles::REF_IMAGES) => {
            HandlePolicy::single(Image, IMAGE_SOURCES, Optional)
                .up_to(limits::VIDEO_REFERENCE_IMAGES)
                .gated(ReferenceMode::Images)
        }
        (NodeKind::VideoGenerator, handles::FIRST_FRAME | handles::LAST_FRAME) => {
            HandlePolicy::single(Image, IMAGE_SOURCES, Optional).gated(ReferenceMode::Frames)
        }

        (NodeKind::ExtendVideo, handles::VIDEO_IN) => {
            HandlePolicy::single(Video, VIDEO_SOURCES, Required)
        }
        (NodeKind::ExtendVideo, handles::PROMPT) => HandlePolicy::single(Text, TEXT_SOURCES, Optional),

        _ => return None,
    };

    Some(policy)
}

/// The handle carrying a kind's prompt, if it has one
pub fn prompt_handle(kind: NodeKind) -> Option<&'static str> {
    match kind {
        NodeKind::PromptEnhancer => Some(handles::PROMPT_IN),
        NodeKind::ImageGenerator | NodeKind::VideoGenerator | NodeKind::ExtendVideo => {
            Some(handles::PROMPT)
        }
        _ => None,
    }
}

/// Name of the single output handle of a kind
pub fn output_handle(kind: NodeKind) -> &'static str {
    match kind.output_type() {
        PortDataType::Text => handles::TEXT_OUT,
        PortDataType::Image => handles::IMAGE_OUT,
        PortDataType::Video => handles::VIDEO_OUT,
        PortDataType::Audio => handles::AUDIO_OUT,
        PortDataType::Document => handles::DOCUMENT_OUT,
    }
}
