//! Core types for canvas workflow graphs
//!
//! These types define the structure of workflow graphs: nodes with their
//! per-kind settings, the edges between their handles, and the graph
//! container itself.

use serde::{Deserialize, Serialize};

use crate::output::NodeOutput;
use crate::state::ExecutionState;
use crate::validation::{check_connection, ConnectionError};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Name of a handle (port) on a node
pub type HandleId = String;

/// The data type carried by a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDataType {
    /// Prompt or other text
    Text,
    /// Image data (base64 encoded)
    Image,
    /// Video reference (URL)
    Video,
    /// Audio upload
    Audio,
    /// Document upload
    Document,
}

impl std::fmt::Display for PortDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        };
        f.write_str(name)
    }
}

/// Kind of a node on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// Plain prompt text
    Text,
    /// LLM rewrite of an upstream or inline prompt
    PromptEnhancer,
    /// Image generation
    ImageGenerator,
    /// Video generation, driven by reference images or first/last frames
    VideoGenerator,
    /// Continuation of an existing video
    ExtendVideo,
    /// Uploaded image
    ImageReference,
    /// Uploaded or linked video
    VideoReference,
    /// Uploaded audio
    AudioReference,
    /// Uploaded document
    DocumentReference,
}

impl NodeKind {
    /// Whether the scheduler dispatches nodes of this kind
    ///
    /// Passive reference nodes are data sources only.
    pub fn is_executable(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::PromptEnhancer
                | Self::ImageGenerator
                | Self::VideoGenerator
                | Self::ExtendVideo
        )
    }

    /// The data type this kind produces on its output handle
    pub fn output_type(&self) -> PortDataType {
        match self {
            Self::Text | Self::PromptEnhancer => PortDataType::Text,
            Self::ImageGenerator | Self::ImageReference => PortDataType::Image,
            Self::VideoGenerator | Self::ExtendVideo | Self::VideoReference => {
                PortDataType::Video
            }
            Self::AudioReference => PortDataType::Audio,
            Self::DocumentReference => PortDataType::Document,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::PromptEnhancer => "promptEnhancer",
            Self::ImageGenerator => "imageGenerator",
            Self::VideoGenerator => "videoGenerator",
            Self::ExtendVideo => "extendVideo",
            Self::ImageReference => "imageReference",
            Self::VideoReference => "videoReference",
            Self::AudioReference => "audioReference",
            Self::DocumentReference => "documentReference",
        };
        f.write_str(name)
    }
}

/// Which reference inputs a video generator currently exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Up to three reference images
    #[default]
    Images,
    /// Explicit first and last frames
    Frames,
}

/// Inline image data held in node settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    pub base64: String,
    pub mime_type: String,
}

/// Settings of a text node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextSettings {
    pub text: String,
}

/// Settings of a prompt enhancer node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptEnhancerSettings {
    /// Inline text, used when nothing is connected to `prompt-in`
    pub text: String,
    /// Extra guidance for the rewrite
    pub instructions: Option<String>,
    pub model: Option<String>,
}

/// Settings of an image generator node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageGeneratorSettings {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
}

/// Settings of a video generator node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoGeneratorSettings {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub model: Option<String>,
    pub reference_mode: ReferenceMode,
    /// Ordered frame list, used when frame handles are not connected
    pub frames: Vec<ImageData>,
    pub aspect_ratio: Option<String>,
    pub duration_seconds: Option<u32>,
    pub resolution: Option<String>,
}

/// Settings of an extend-video node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtendVideoSettings {
    pub prompt: String,
    pub model: Option<String>,
}

/// Settings of an uploaded image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageReferenceSettings {
    pub base64: Option<String>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

/// Settings of an uploaded or linked video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoReferenceSettings {
    pub url: Option<String>,
    pub poster_base64: Option<String>,
}

/// Settings of an uploaded audio or document file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileReferenceSettings {
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

/// Per-kind node settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeSettings {
    Text(TextSettings),
    PromptEnhancer(PromptEnhancerSettings),
    ImageGenerator(ImageGeneratorSettings),
    VideoGenerator(VideoGeneratorSettings),
    ExtendVideo(ExtendVideoSettings),
    ImageReference(ImageReferenceSettings),
    VideoReference(VideoReferenceSettings),
    AudioReference(FileReferenceSettings),
    DocumentReference(FileReferenceSettings),
}

impl NodeSettings {
    /// The kind these settings belong to
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Text(_) => NodeKind::Text,
            Self::PromptEnhancer(_) => NodeKind::PromptEnhancer,
            Self::ImageGenerator(_) => NodeKind::ImageGenerator,
            Self::VideoGenerator(_) => NodeKind::VideoGenerator,
            Self::ExtendVideo(_) => NodeKind::ExtendVideo,
            Self::ImageReference(_) => NodeKind::ImageReference,
            Self::VideoReference(_) => NodeKind::VideoReference,
            Self::AudioReference(_) => NodeKind::AudioReference,
            Self::DocumentReference(_) => NodeKind::DocumentReference,
        }
    }

    /// Inline prompt text, for kinds that have one
    pub fn inline_prompt(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(&s.text),
            Self::PromptEnhancer(s) => Some(&s.text),
            Self::ImageGenerator(s) => Some(&s.prompt),
            Self::VideoGenerator(s) => Some(&s.prompt),
            Self::ExtendVideo(s) => Some(&s.prompt),
            Self::ImageReference(_)
            | Self::VideoReference(_)
            | Self::AudioReference(_)
            | Self::DocumentReference(_) => None,
        }
    }

    /// Current reference mode (video generators only)
    pub fn reference_mode(&self) -> Option<ReferenceMode> {
        match self {
            Self::VideoGenerator(s) => Some(s.reference_mode),
            _ => None,
        }
    }
}

/// An edge connecting two handles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Source handle
    pub source_handle: HandleId,
    /// Target node ID
    pub target: NodeId,
    /// Target handle
    pub target_handle: HandleId,
}

impl GraphEdge {
    /// Whether two edges connect the same handles
    pub fn same_connection(&self, other: &GraphEdge) -> bool {
        self.source == other.source
            && self.source_handle == other.source_handle
            && self.target == other.target
            && self.target_handle == other.target_handle
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Kind-specific configuration
    pub settings: NodeSettings,
    /// Last known execution state
    #[serde(default)]
    pub state: ExecutionState,
    /// Last recorded output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<NodeOutput>,
}

impl GraphNode {
    /// Create an idle node with no output
    pub fn new(id: impl Into<String>, settings: NodeSettings) -> Self {
        Self {
            id: id.into(),
            settings,
            state: ExecutionState::default(),
            output: None,
        }
    }

    /// The node's kind
    pub fn kind(&self) -> NodeKind {
        self.settings.kind()
    }

    /// Whether the scheduler dispatches this node
    pub fn is_executable(&self) -> bool {
        self.kind().is_executable()
    }

    /// The completed, error-free output this node holds, if any
    pub fn completed_output(&self) -> Option<&NodeOutput> {
        if self.state.is_completed() && self.state.error.is_none() {
            self.output.as_ref()
        } else {
            None
        }
    }
}

/// A complete workflow graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
    /// Nodes in the graph
    pub nodes: Vec<GraphNode>,
    /// Edges connecting nodes
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Edges whose endpoints both exist in the graph
    ///
    /// Dangling edges can survive node deletion on the canvas; they are
    /// never used for scheduling.
    pub fn sanitized_edges(&self) -> Vec<GraphEdge> {
        self.edges
            .iter()
            .filter(|e| self.find_node(&e.source).is_some() && self.find_node(&e.target).is_some())
            .cloned()
            .collect()
    }

    /// Add an edge if the connection validator accepts it
    pub fn try_connect(&mut self, edge: GraphEdge) -> std::result::Result<(), ConnectionError> {
        check_connection(&edge, &self.edges, &self.nodes)?;
        self.edges.push(edge);
        Ok(())
    }

    /// Remove a node and every edge attached to it
    pub fn remove_node(&mut self, node_id: &str) -> Option<GraphNode> {
        let pos = self.nodes.iter().position(|n| n.id == node_id)?;
        self.edges.retain(|e| e.source != node_id && e.target != node_id);
        Some(self.nodes.remove(pos))
    }
}
