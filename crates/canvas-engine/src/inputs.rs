//! Read-only view of the values available to a node's inputs
//!
//! Executable sources contribute their resolved output once they complete.
//! Passive reference nodes contribute the media held in their own settings.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use crate::constants::defaults;
use crate::output::{normalize_base64, split_data_url, NodeOutput};
use crate::types::{GraphEdge, GraphNode, NodeId, NodeSettings};

/// Lookup of node outputs and failures during a run
pub struct InputView<'a> {
    nodes: HashMap<&'a str, &'a GraphNode>,
    resolved: &'a HashMap<NodeId, NodeOutput>,
    failed: &'a HashSet<NodeId>,
}

impl<'a> InputView<'a> {
    pub fn new(
        nodes: &'a [GraphNode],
        resolved: &'a HashMap<NodeId, NodeOutput>,
        failed: &'a HashSet<NodeId>,
    ) -> Self {
        Self {
            nodes: nodes.iter().map(|n| (n.id.as_str(), n)).collect(),
            resolved,
            failed,
        }
    }

    /// Find a node by ID
    pub fn node(&self, node_id: &str) -> Option<&'a GraphNode> {
        self.nodes.get(node_id).copied()
    }

    /// Whether a node has failed in this run
    pub fn is_failed(&self, node_id: &str) -> bool {
        self.failed.contains(node_id)
    }

    /// The value a node currently supplies to its dependents
    pub fn output_of(&self, node_id: &str) -> Option<Cow<'a, NodeOutput>> {
        let node = self.node(node_id)?;
        if node.is_executable() {
            self.resolved.get(node_id).map(Cow::Borrowed)
        } else {
            reference_output(&node.settings).map(Cow::Owned)
        }
    }
}

/// Edges into `handle` on `target`, in edge order
pub fn edges_into<'e>(
    edges: &'e [GraphEdge],
    target: &'e str,
    handle: &'e str,
) -> impl Iterator<Item = &'e GraphEdge> + 'e {
    edges
        .iter()
        .filter(move |e| e.target == target && e.target_handle == handle)
}

/// The value a passive reference node supplies, if it holds any media
pub fn reference_output(settings: &NodeSettings) -> Option<NodeOutput> {
    match settings {
        NodeSettings::ImageReference(s) => {
            let data = s.base64.as_deref()?;
            let (embedded_mime, _) = split_data_url(data);
            let base64 = normalize_base64(data);
            if base64.is_empty() {
                return None;
            }
            let mime_type = s
                .mime_type
                .clone()
                .or(embedded_mime)
                .unwrap_or_else(|| defaults::IMAGE_MIME_TYPE.to_string());
            Some(NodeOutput::Image { base64, mime_type })
        }
        NodeSettings::VideoReference(s) => {
            let url = s.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
            Some(NodeOutput::Video {
                url: url.to_string(),
                poster_base64: s.poster_base64.as_deref().map(normalize_base64),
            })
        }
        NodeSettings::AudioReference(_) | NodeSettings::DocumentReference(_) => None,
        NodeSettings::Text(_)
        | NodeSettings::PromptEnhancer(_)
        | NodeSettings::ImageGenerator(_)
        | NodeSettings::VideoGenerator(_)
        | NodeSettings::ExtendVideo(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageReferenceSettings, VideoReferenceSettings};

    #[test]
    fn test_image_reference_output() {
        let settings = NodeSettings::ImageReference(ImageReferenceSettings {
            base64: Some("data:image/jpeg;base64,aGVs\nbG8=".to_string()),
            mime_type: None,
            file_name: Some("cat.jpg".to_string()),
        });
        assert_eq!(
            reference_output(&settings),
            Some(NodeOutput::image("aGVsbG8=", "image/jpeg"))
        );
    }

    #[test]
    fn test_empty_references_supply_nothing() {
        let image = NodeSettings::ImageReference(ImageReferenceSettings::default());
        let video = NodeSettings::VideoReference(VideoReferenceSettings {
            url: Some("  ".to_string()),
            poster_base64: None,
        });
        assert!(reference_output(&image).is_none());
        assert!(reference_output(&video).is_none());
    }

    #[test]
    fn test_view_prefers_resolved_for_executables() {
        let nodes = vec![GraphNode::new(
            "t",
            NodeSettings::Text(crate::types::TextSettings {
                text: "inline".to_string(),
            }),
        )];
        let mut resolved = HashMap::new();
        let failed = HashSet::new();

        {
            let view = InputView::new(&nodes, &resolved, &failed);
            assert!(view.output_of("t").is_none());
            assert!(view.output_of("missing").is_none());
        }

        resolved.insert("t".to_string(), NodeOutput::text("resolved"));
        let view = InputView::new(&nodes, &resolved, &failed);
        assert_eq!(view.output_of("t").unwrap().as_text(), Some("resolved"));
    }
}
