//! Readiness evaluation
//!
//! Decides whether a pending node's inputs are satisfied enough to dispatch
//! it. A node that is not ready is either waiting on an upstream result or
//! can never run in this pass; the scheduler fails the latter immediately.

use std::fmt;

use crate::constants::{handles, reasons};
use crate::handles::{policy_for, prompt_handle, HandlePolicy, HandleRole};
use crate::inputs::{edges_into, InputView};
use crate::types::{GraphEdge, GraphNode, NodeId, NodeSettings, PortDataType};

/// Outcome of evaluating a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(UnreadyReason),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Why a node cannot be dispatched yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnreadyReason {
    /// One or more sources failed in this run
    UpstreamFailed { sources: Vec<NodeId> },
    /// A connected source has not produced a value yet
    WaitingForInput { handle: String, source: NodeId },
    /// No prompt edge and no inline prompt
    MissingPrompt,
    /// Extend-video node without a source video
    MissingVideoInput,
    /// A connected text source resolved to blank text
    EmptyInput { handle: String, source: NodeId },
    /// A connected source produced a value of the wrong type
    TypeMismatch {
        handle: String,
        expected: PortDataType,
        actual: PortDataType,
    },
}

impl UnreadyReason {
    /// Whether the node can never become ready in the current run
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::WaitingForInput { .. })
    }
}

impl fmt::Display for UnreadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamFailed { .. } => f.write_str(reasons::UPSTREAM_FAILED),
            Self::WaitingForInput { handle, source } => {
                write!(f, "waiting for input '{}' from node '{}'", handle, source)
            }
            Self::MissingPrompt => f.write_str(reasons::MISSING_PROMPT),
            Self::MissingVideoInput => f.write_str("missing required video input"),
            Self::EmptyInput { handle, source } => {
                write!(f, "input '{}' from node '{}' is empty", handle, source)
            }
            Self::TypeMismatch {
                handle,
                expected,
                actual,
            } => write!(
                f,
                "input '{}' expects {} but received {}",
                handle, expected, actual
            ),
        }
    }
}

/// Evaluate whether `node` can be dispatched
///
/// `edges` should be the sanitized edge list of the run snapshot.
pub fn evaluate(node: &GraphNode, edges: &[GraphEdge], view: &InputView<'_>) -> Readiness {
    match check(node, edges, view) {
        Ok(()) => Readiness::Ready,
        Err(reason) => Readiness::NotReady(reason),
    }
}

fn check(node: &GraphNode, edges: &[GraphEdge], view: &InputView<'_>) -> Result<(), UnreadyReason> {
    let mut failed_sources: Vec<NodeId> = Vec::new();
    for edge in edges.iter().filter(|e| e.target == node.id) {
        if view.is_failed(&edge.source) && !failed_sources.contains(&edge.source) {
            failed_sources.push(edge.source.clone());
        }
    }
    if !failed_sources.is_empty() {
        return Err(UnreadyReason::UpstreamFailed {
            sources: failed_sources,
        });
    }

    match &node.settings {
        NodeSettings::Text(settings) => {
            if settings.text.trim().is_empty() {
                return Err(UnreadyReason::MissingPrompt);
            }
            Ok(())
        }
        NodeSettings::PromptEnhancer(_)
        | NodeSettings::ImageGenerator(_)
        | NodeSettings::VideoGenerator(_) => {
            check_prompt(node, edges, view)?;
            check_connected_inputs(node, edges, view)
        }
        NodeSettings::ExtendVideo(_) => {
            if edges_into(edges, &node.id, handles::VIDEO_IN).next().is_none() {
                return Err(UnreadyReason::MissingVideoInput);
            }
            check_connected_inputs(node, edges, view)
        }
        NodeSettings::ImageReference(_)
        | NodeSettings::VideoReference(_)
        | NodeSettings::AudioReference(_)
        | NodeSettings::DocumentReference(_) => Ok(()),
    }
}

/// Prompt from the prompt edge if connected, else the inline text
fn check_prompt(
    node: &GraphNode,
    edges: &[GraphEdge],
    view: &InputView<'_>,
) -> Result<(), UnreadyReason> {
    let kind = node.kind();
    let Some(handle) = prompt_handle(kind) else {
        return Ok(());
    };
    let Some(policy) = policy_for(kind, handle) else {
        return Ok(());
    };

    let mut connected = false;
    for edge in edges_into(edges, &node.id, handle) {
        connected = true;
        check_input(edge, &policy, view)?;
    }

    if !connected
        && node
            .settings
            .inline_prompt()
            .map_or(true, |text| text.trim().is_empty())
    {
        return Err(UnreadyReason::MissingPrompt);
    }
    Ok(())
}

/// Every connected non-prompt input on an active handle must resolve
fn check_connected_inputs(
    node: &GraphNode,
    edges: &[GraphEdge],
    view: &InputView<'_>,
) -> Result<(), UnreadyReason> {
    let kind = node.kind();
    let mode = node.settings.reference_mode();

    for edge in edges.iter().filter(|e| e.target == node.id) {
        let Some(policy) = policy_for(kind, &edge.target_handle) else {
            continue;
        };
        if policy.role == HandleRole::Prompt || !policy.is_active(mode) {
            continue;
        }
        check_input(edge, &policy, view)?;
    }
    Ok(())
}

fn check_input(
    edge: &GraphEdge,
    policy: &HandlePolicy,
    view: &InputView<'_>,
) -> Result<(), UnreadyReason> {
    let Some(output) = view.output_of(&edge.source) else {
        return Err(UnreadyReason::WaitingForInput {
            handle: edge.target_handle.clone(),
            source: edge.source.clone(),
        });
    };

    let actual = output.data_type();
    if actual != policy.data_type {
        return Err(UnreadyReason::TypeMismatch {
            handle: edge.target_handle.clone(),
            expected: policy.data_type,
            actual,
        });
    }

    if output.as_text().map_or(false, |text| text.trim().is_empty()) {
        return Err(UnreadyReason::EmptyInput {
            handle: edge.target_handle.clone(),
            source: edge.source.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::output::NodeOutput;
    use crate::types::{
        ExtendVideoSettings, ImageGeneratorSettings, ImageReferenceSettings,
        PromptEnhancerSettings, ReferenceMode, TextSettings, VideoGeneratorSettings,
        WorkflowGraph,
    };

    fn text(value: &str) -> NodeSettings {
        NodeSettings::Text(TextSettings {
            text: value.to_string(),
        })
    }

    fn image_gen(prompt: &str) -> NodeSettings {
        NodeSettings::ImageGenerator(ImageGeneratorSettings {
            prompt: prompt.to_string(),
            ..Default::default()
        })
    }

    fn evaluate_in(
        graph: &WorkflowGraph,
        node_id: &str,
        resolved: &HashMap<NodeId, NodeOutput>,
        failed: &HashSet<NodeId>,
    ) -> Readiness {
        let view = InputView::new(&graph.nodes, resolved, failed);
        let node = graph.find_node(node_id).unwrap();
        evaluate(node, &graph.edges, &view)
    }

    #[test]
    fn test_linear_chain_waits_then_becomes_ready() {
        let graph = WorkflowBuilder::new()
            .add_node("t", text("A cat"))
            .add_node("e", NodeSettings::PromptEnhancer(PromptEnhancerSettings::default()))
            .add_node("g", image_gen(""))
            .add_edge("t", "text", "e", "prompt-in")
            .add_edge("e", "text", "g", "prompt")
            .build();
        let failed = HashSet::new();
        let mut resolved = HashMap::new();

        assert!(evaluate_in(&graph, "t", &resolved, &failed).is_ready());
        assert_eq!(
            evaluate_in(&graph, "e", &resolved, &failed),
            Readiness::NotReady(UnreadyReason::WaitingForInput {
                handle: "prompt-in".to_string(),
                source: "t".to_string(),
            })
        );

        resolved.insert("t".to_string(), NodeOutput::text("A cat"));
        assert!(evaluate_in(&graph, "e", &resolved, &failed).is_ready());
        assert!(!evaluate_in(&graph, "g", &resolved, &failed).is_ready());

        resolved.insert("e".to_string(), NodeOutput::text("A fluffy cat"));
        assert!(evaluate_in(&graph, "g", &resolved, &failed).is_ready());
    }

    #[test]
    fn test_blank_inline_prompt_is_permanent() {
        let graph = WorkflowBuilder::new()
            .add_node("g", image_gen("   "))
            .add_node("t", text(""))
            .build();
        let resolved = HashMap::new();
        let failed = HashSet::new();

        for id in ["g", "t"] {
            match evaluate_in(&graph, id, &resolved, &failed) {
                Readiness::NotReady(reason) => {
                    assert_eq!(reason, UnreadyReason::MissingPrompt);
                    assert!(reason.is_permanent());
                    assert_eq!(reason.to_string(), "missing required prompt");
                }
                Readiness::Ready => panic!("{} should not be ready", id),
            }
        }
    }

    #[test]
    fn test_failed_upstream_reported_first() {
        let graph = WorkflowBuilder::new()
            .add_node("t", text("A cat"))
            .add_node("g", image_gen(""))
            .add_edge("t", "text", "g", "prompt")
            .build();
        let resolved = HashMap::new();
        let failed: HashSet<NodeId> = ["t".to_string()].into_iter().collect();

        let readiness = evaluate_in(&graph, "g", &resolved, &failed);
        match readiness {
            Readiness::NotReady(reason) => {
                assert_eq!(reason.to_string(), "upstream dependency failed");
                assert!(reason.is_permanent());
            }
            Readiness::Ready => panic!("should not be ready"),
        }
    }

    #[test]
    fn test_optional_input_blocks_only_when_connected() {
        let graph = WorkflowBuilder::new()
            .add_node("neg", text("blurry"))
            .add_node("g1", image_gen("A cat"))
            .add_node("g2", image_gen("A dog"))
            .add_edge("neg", "text", "g1", "negative")
            .build();
        let failed = HashSet::new();
        let mut resolved = HashMap::new();

        assert!(!evaluate_in(&graph, "g1", &resolved, &failed).is_ready());
        assert!(evaluate_in(&graph, "g2", &resolved, &failed).is_ready());

        resolved.insert("neg".to_string(), NodeOutput::text("blurry"));
        assert!(evaluate_in(&graph, "g1", &resolved, &failed).is_ready());
    }

    #[test]
    fn test_blank_connected_text_is_empty_input() {
        let graph = WorkflowBuilder::new()
            .add_node("t", text("placeholder"))
            .add_node("g", image_gen("inline is ignored"))
            .add_edge("t", "text", "g", "prompt")
            .build();
        let failed = HashSet::new();
        let resolved: HashMap<NodeId, NodeOutput> =
            [("t".to_string(), NodeOutput::text("  "))].into_iter().collect();

        assert_eq!(
            evaluate_in(&graph, "g", &resolved, &failed),
            Readiness::NotReady(UnreadyReason::EmptyInput {
                handle: "prompt".to_string(),
                source: "t".to_string(),
            })
        );
    }

    #[test]
    fn test_reference_source_resolves_from_settings() {
        let graph = WorkflowBuilder::new()
            .add_node(
                "ref",
                NodeSettings::ImageReference(ImageReferenceSettings {
                    base64: Some("aGVsbG8=".to_string()),
                    mime_type: Some("image/png".to_string()),
                    file_name: None,
                }),
            )
            .add_node("empty-ref", NodeSettings::ImageReference(ImageReferenceSettings::default()))
            .add_node("g1", image_gen("A cat"))
            .add_node("g2", image_gen("A dog"))
            .add_edge("ref", "image", "g1", "ref-images")
            .add_edge("empty-ref", "image", "g2", "ref-images")
            .build();
        let resolved = HashMap::new();
        let failed = HashSet::new();

        assert!(evaluate_in(&graph, "g1", &resolved, &failed).is_ready());
        assert!(matches!(
            evaluate_in(&graph, "g2", &resolved, &failed),
            Readiness::NotReady(UnreadyReason::WaitingForInput { .. })
        ));
    }

    #[test]
    fn test_inactive_mode_edges_ignored() {
        let graph = WorkflowBuilder::new()
            .add_node("img", image_gen("A frame"))
            .add_node(
                "v",
                NodeSettings::VideoGenerator(VideoGeneratorSettings {
                    prompt: "A drone shot".to_string(),
                    reference_mode: ReferenceMode::Images,
                    ..Default::default()
                }),
            )
            .add_edge("img", "image", "v", "first-frame")
            .build();
        let resolved = HashMap::new();
        let failed = HashSet::new();

        assert!(evaluate_in(&graph, "v", &resolved, &failed).is_ready());
    }

    #[test]
    fn test_extend_video_requires_video_input() {
        let graph = WorkflowBuilder::new()
            .add_node("v", NodeSettings::VideoGenerator(VideoGeneratorSettings {
                prompt: "A drone shot".to_string(),
                ..Default::default()
            }))
            .add_node("x1", NodeSettings::ExtendVideo(ExtendVideoSettings::default()))
            .add_node("x2", NodeSettings::ExtendVideo(ExtendVideoSettings::default()))
            .add_edge("v", "video", "x1", "video-in")
            .build();
        let failed = HashSet::new();
        let mut resolved = HashMap::new();

        assert_eq!(
            evaluate_in(&graph, "x2", &resolved, &failed),
            Readiness::NotReady(UnreadyReason::MissingVideoInput)
        );
        assert!(!evaluate_in(&graph, "x1", &resolved, &failed).is_ready());

        resolved.insert("v".to_string(), NodeOutput::video("https://cdn.example/v.mp4"));
        assert!(evaluate_in(&graph, "x1", &resolved, &failed).is_ready());
    }

    #[test]
    fn test_wrong_output_type_is_mismatch() {
        let graph = WorkflowBuilder::new()
            .add_node("e", NodeSettings::PromptEnhancer(PromptEnhancerSettings {
                text: "A cat".to_string(),
                ..Default::default()
            }))
            .add_node("g", image_gen(""))
            .add_edge("e", "text", "g", "prompt")
            .build();
        let failed = HashSet::new();
        let resolved: HashMap<NodeId, NodeOutput> =
            [("e".to_string(), NodeOutput::image("aGk=", "image/png"))]
                .into_iter()
                .collect();

        match evaluate_in(&graph, "g", &resolved, &failed) {
            Readiness::NotReady(reason @ UnreadyReason::TypeMismatch { .. }) => {
                assert!(reason.is_permanent());
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }
}
