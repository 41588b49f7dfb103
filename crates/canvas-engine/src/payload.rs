//! Executor payload construction
//!
//! Turns a ready node plus the outputs of its sources into the request
//! handed to an executor. Edge-supplied values always win over the node's
//! inline settings.

use serde::{Deserialize, Serialize};

use crate::constants::{handles, reasons};
use crate::inputs::{edges_into, InputView};
use crate::models::resolve_model;
use crate::output::{normalize_base64, NodeOutput};
use crate::types::{
    ExtendVideoSettings, GraphEdge, GraphNode, ImageData, ImageGeneratorSettings, NodeKind,
    NodeSettings, PromptEnhancerSettings, ReferenceMode, VideoGeneratorSettings,
};

/// An image passed to a generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImage {
    /// Base64 data without a data URL prefix
    pub data: String,
    pub mime_type: String,
}

impl From<&ImageData> for ReferenceImage {
    fn from(image: &ImageData) -> Self {
        Self {
            data: normalize_base64(&image.base64),
            mime_type: image.mime_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub model: String,
    pub reference_images: Vec<ReferenceImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPayload {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub model: String,
    pub reference_mode: ReferenceMode,
    /// Populated in `images` mode
    pub reference_images: Vec<ReferenceImage>,
    /// Populated in `frames` mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_frame: Option<ReferenceImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame: Option<ReferenceImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Request for the generation executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GenerationPayload {
    Image(ImagePayload),
    Video(VideoPayload),
}

/// Request for the video-extend executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendVideoPayload {
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub model: String,
}

/// Request for the enrichment executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub model: String,
}

/// Any executor request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePayload {
    Generation(GenerationPayload),
    ExtendVideo(ExtendVideoPayload),
    Enrichment(EnrichmentPayload),
}

/// Reasons a payload cannot be built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Prompt or a required input did not resolve to a usable value
    #[error("{}", reasons::MISSING_INPUTS)]
    MissingInput,

    /// The node names a model that is not in the model table
    #[error("Unknown model '{model}' for {kind} node")]
    UnknownModel { kind: NodeKind, model: String },

    /// The node kind is never sent to an executor
    #[error("{0} nodes are not dispatched to an executor")]
    NotDispatched(NodeKind),
}

/// Build the executor request for `node`
pub fn build_payload(
    node: &GraphNode,
    view: &InputView<'_>,
    edges: &[GraphEdge],
) -> Result<NodePayload, PayloadError> {
    let inputs = NodeInputs {
        node,
        view,
        edges,
    };
    match &node.settings {
        NodeSettings::PromptEnhancer(settings) => inputs.enrichment(settings),
        NodeSettings::ImageGenerator(settings) => inputs.image(settings),
        NodeSettings::VideoGenerator(settings) => inputs.video(settings),
        NodeSettings::ExtendVideo(settings) => inputs.extend_video(settings),
        NodeSettings::Text(_)
        | NodeSettings::ImageReference(_)
        | NodeSettings::VideoReference(_)
        | NodeSettings::AudioReference(_)
        | NodeSettings::DocumentReference(_) => Err(PayloadError::NotDispatched(node.kind())),
    }
}

/// Input resolution for one node
struct NodeInputs<'a, 'v> {
    node: &'a GraphNode,
    view: &'a InputView<'v>,
    edges: &'a [GraphEdge],
}

impl NodeInputs<'_, '_> {
    /// Outputs feeding `handle`, in edge order
    fn outputs(&self, handle: &str) -> Vec<NodeOutput> {
        edges_into(self.edges, &self.node.id, handle)
            .filter_map(|e| self.view.output_of(&e.source))
            .map(|o| o.into_owned())
            .collect()
    }

    /// Edge text if connected, else `inline`; `None` when blank
    fn text(&self, handle: &str, inline: Option<&str>) -> Option<String> {
        let connected = edges_into(self.edges, &self.node.id, handle).next().is_some();
        let value = if connected {
            self.outputs(handle)
                .into_iter()
                .find_map(|o| o.as_text().map(str::to_string))
        } else {
            inline.map(str::to_string)
        };
        value.filter(|v| !v.trim().is_empty())
    }

    fn images(&self, handle: &str) -> Vec<ReferenceImage> {
        self.outputs(handle)
            .into_iter()
            .filter_map(|o| match o {
                NodeOutput::Image { base64, mime_type } => Some(ReferenceImage {
                    data: base64,
                    mime_type,
                }),
                _ => None,
            })
            .collect()
    }

    fn model(&self, name: Option<&str>) -> Result<String, PayloadError> {
        let kind = self.node.kind();
        resolve_model(kind, name)
            .map(str::to_string)
            .ok_or_else(|| PayloadError::UnknownModel {
                kind,
                model: name.unwrap_or_default().to_string(),
            })
    }

    fn enrichment(&self, settings: &PromptEnhancerSettings) -> Result<NodePayload, PayloadError> {
        let text = self
            .text(handles::PROMPT_IN, Some(&settings.text))
            .ok_or(PayloadError::MissingInput)?;
        Ok(NodePayload::Enrichment(EnrichmentPayload {
            text,
            instructions: settings
                .instructions
                .clone()
                .filter(|i| !i.trim().is_empty()),
            model: self.model(settings.model.as_deref())?,
        }))
    }

    fn image(&self, settings: &ImageGeneratorSettings) -> Result<NodePayload, PayloadError> {
        let prompt = self
            .text(handles::PROMPT, Some(&settings.prompt))
            .ok_or(PayloadError::MissingInput)?;
        Ok(NodePayload::Generation(GenerationPayload::Image(ImagePayload {
            prompt,
            negative_prompt: self.text(handles::NEGATIVE, settings.negative_prompt.as_deref()),
            model: self.model(settings.model.as_deref())?,
            reference_images: self.images(handles::REF_IMAGES),
            aspect_ratio: settings.aspect_ratio.clone(),
            resolution: settings.resolution.clone(),
        })))
    }

    fn video(&self, settings: &VideoGeneratorSettings) -> Result<NodePayload, PayloadError> {
        let prompt = self
            .text(handles::PROMPT, Some(&settings.prompt))
            .ok_or(PayloadError::MissingInput)?;

        let (reference_images, first_frame, last_frame) = match settings.reference_mode {
            ReferenceMode::Images => (self.images(handles::REF_IMAGES), None, None),
            ReferenceMode::Frames => {
                let first = self
                    .images(handles::FIRST_FRAME)
                    .into_iter()
                    .next()
                    .or_else(|| settings.frames.first().map(ReferenceImage::from));
                let last = self.images(handles::LAST_FRAME).into_iter().next().or_else(|| {
                    if settings.frames.len() >= 2 {
                        settings.frames.last().map(ReferenceImage::from)
                    } else {
                        None
                    }
                });
                (Vec::new(), first, last)
            }
        };

        Ok(NodePayload::Generation(GenerationPayload::Video(VideoPayload {
            prompt,
            negative_prompt: self.text(handles::NEGATIVE, settings.negative_prompt.as_deref()),
            model: self.model(settings.model.as_deref())?,
            reference_mode: settings.reference_mode,
            reference_images,
            first_frame,
            last_frame,
            aspect_ratio: settings.aspect_ratio.clone(),
            duration_seconds: settings.duration_seconds,
            resolution: settings.resolution.clone(),
        })))
    }

    fn extend_video(&self, settings: &ExtendVideoSettings) -> Result<NodePayload, PayloadError> {
        let video_url = self
            .outputs(handles::VIDEO_IN)
            .into_iter()
            .find_map(|o| match o {
                NodeOutput::Video { url, .. } => Some(url),
                _ => None,
            })
            .ok_or(PayloadError::MissingInput)?;
        Ok(NodePayload::ExtendVideo(ExtendVideoPayload {
            video_url,
            prompt: self.text(handles::PROMPT, Some(&settings.prompt)),
            model: self.model(settings.model.as_deref())?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::types::{
        ImageReferenceSettings, NodeId, TextSettings, VideoReferenceSettings, WorkflowGraph,
    };

    fn text(value: &str) -> NodeSettings {
        NodeSettings::Text(TextSettings {
            text: value.to_string(),
        })
    }

    fn image_ref(data: &str) -> NodeSettings {
        NodeSettings::ImageReference(ImageReferenceSettings {
            base64: Some(data.to_string()),
            mime_type: Some("image/jpeg".to_string()),
            file_name: None,
        })
    }

    fn frame(data: &str) -> ImageData {
        ImageData {
            base64: data.to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    fn build(
        graph: &WorkflowGraph,
        node_id: &str,
        resolved: &HashMap<NodeId, NodeOutput>,
    ) -> Result<NodePayload, PayloadError> {
        let failed = HashSet::new();
        let view = InputView::new(&graph.nodes, resolved, &failed);
        build_payload(graph.find_node(node_id).unwrap(), &view, &graph.edges)
    }

    #[test]
    fn test_edge_prompt_preferred_over_inline() {
        let graph = WorkflowBuilder::new()
            .add_node("t", text("ignored"))
            .add_node(
                "g",
                NodeSettings::ImageGenerator(ImageGeneratorSettings {
                    prompt: "inline prompt".to_string(),
                    negative_prompt: Some("blurry".to_string()),
                    ..Default::default()
                }),
            )
            .add_edge("t", "text", "g", "prompt")
            .build();
        let resolved: HashMap<NodeId, NodeOutput> =
            [("t".to_string(), NodeOutput::text("A cat"))].into_iter().collect();

        match build(&graph, "g", &resolved).unwrap() {
            NodePayload::Generation(GenerationPayload::Image(payload)) => {
                assert_eq!(payload.prompt, "A cat");
                assert_eq!(payload.negative_prompt.as_deref(), Some("blurry"));
                assert_eq!(payload.model, "gemini-2.5-flash-image");
                assert!(payload.reference_images.is_empty());
            }
            other => panic!("Expected image payload, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_prompt_is_missing_input() {
        let graph = WorkflowBuilder::new()
            .add_node(
                "g",
                NodeSettings::ImageGenerator(ImageGeneratorSettings {
                    prompt: " \n".to_string(),
                    ..Default::default()
                }),
            )
            .build();

        let err = build(&graph, "g", &HashMap::new()).unwrap_err();
        assert_eq!(err, PayloadError::MissingInput);
        assert_eq!(err.to_string(), "missing required inputs or prompt");
    }

    #[test]
    fn test_reference_images_in_edge_order_and_typed() {
        let graph = WorkflowBuilder::new()
            .add_node("r1", image_ref("data:image/jpeg;base64,b25l"))
            .add_node("r2", image_ref("dHdv"))
            .add_node("g", NodeSettings::ImageGenerator(ImageGeneratorSettings {
                prompt: "A collage".to_string(),
                ..Default::default()
            }))
            .add_node("gen-img", NodeSettings::ImageGenerator(ImageGeneratorSettings::default()))
            .add_edge("r2", "image", "g", "ref-images")
            .add_edge("gen-img", "image", "g", "ref-images")
            .add_edge("r1", "image", "g", "ref-images")
            .build();
        // A mistyped upstream output is excluded rather than forwarded
        let resolved: HashMap<NodeId, NodeOutput> =
            [("gen-img".to_string(), NodeOutput::text("not an image"))]
                .into_iter()
                .collect();

        match build(&graph, "g", &resolved).unwrap() {
            NodePayload::Generation(GenerationPayload::Image(payload)) => {
                let data: Vec<&str> = payload
                    .reference_images
                    .iter()
                    .map(|r| r.data.as_str())
                    .collect();
                assert_eq!(data, vec!["dHdv", "b25l"]);
                assert_eq!(payload.reference_images[0].mime_type, "image/jpeg");
            }
            other => panic!("Expected image payload, got {:?}", other),
        }
    }

    #[test]
    fn test_frames_fall_back_to_frame_list() {
        let graph = WorkflowBuilder::new()
            .add_node("edge-frame", image_ref("ZWRnZQ=="))
            .add_node(
                "v",
                NodeSettings::VideoGenerator(VideoGeneratorSettings {
                    prompt: "A cat".to_string(),
                    model: Some("veo-3.1-fast".to_string()),
                    reference_mode: ReferenceMode::Frames,
                    frames: vec![frame("Zmlyc3Q="), frame("bWlk"), frame("bGFzdA==")],
                    ..Default::default()
                }),
            )
            .add_edge("edge-frame", "image", "v", "last-frame")
            .build();

        match build(&graph, "v", &HashMap::new()).unwrap() {
            NodePayload::Generation(GenerationPayload::Video(payload)) => {
                assert_eq!(payload.prompt, "A cat");
                assert_eq!(payload.model, "veo-3.1-fast-generate-preview");
                assert_eq!(payload.first_frame.unwrap().data, "Zmlyc3Q=");
                assert_eq!(payload.last_frame.unwrap().data, "ZWRnZQ==");
                assert!(payload.reference_images.is_empty());
            }
            other => panic!("Expected video payload, got {:?}", other),
        }
    }

    #[test]
    fn test_single_frame_is_not_reused_as_last() {
        let graph = WorkflowBuilder::new()
            .add_node(
                "v",
                NodeSettings::VideoGenerator(VideoGeneratorSettings {
                    prompt: "A cat".to_string(),
                    reference_mode: ReferenceMode::Frames,
                    frames: vec![frame("b25seQ==")],
                    ..Default::default()
                }),
            )
            .build();

        match build(&graph, "v", &HashMap::new()).unwrap() {
            NodePayload::Generation(GenerationPayload::Video(payload)) => {
                assert!(payload.first_frame.is_some());
                assert!(payload.last_frame.is_none());
            }
            other => panic!("Expected video payload, got {:?}", other),
        }
    }

    #[test]
    fn test_extend_video_uses_reference_url() {
        let graph = WorkflowBuilder::new()
            .add_node(
                "src",
                NodeSettings::VideoReference(VideoReferenceSettings {
                    url: Some("https://cdn.example/in.mp4".to_string()),
                    poster_base64: None,
                }),
            )
            .add_node("x", NodeSettings::ExtendVideo(ExtendVideoSettings::default()))
            .add_edge("src", "video", "x", "video-in")
            .build();

        assert_eq!(
            build(&graph, "x", &HashMap::new()).unwrap(),
            NodePayload::ExtendVideo(ExtendVideoPayload {
                video_url: "https://cdn.example/in.mp4".to_string(),
                prompt: None,
                model: "veo-3.1-generate-preview".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_model_rejected() {
        let graph = WorkflowBuilder::new()
            .add_node(
                "e",
                NodeSettings::PromptEnhancer(PromptEnhancerSettings {
                    text: "A cat".to_string(),
                    instructions: Some("make it cinematic".to_string()),
                    model: Some("gpt-4o".to_string()),
                }),
            )
            .build();

        assert!(matches!(
            build(&graph, "e", &HashMap::new()),
            Err(PayloadError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_text_nodes_not_dispatched() {
        let graph = WorkflowBuilder::new().add_node("t", text("A cat")).build();
        assert_eq!(
            build(&graph, "t", &HashMap::new()),
            Err(PayloadError::NotDispatched(NodeKind::Text))
        );
    }
}
