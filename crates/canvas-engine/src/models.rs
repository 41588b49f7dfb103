//! Model name translation
//!
//! The canvas shows short model names; executors expect backend model
//! identifiers. Every accepted name is listed here, backend identifiers
//! included as explicit identity mappings, so an unknown name is always
//! an error instead of being passed through.

use crate::constants::defaults;
use crate::types::{NodeKind, PortDataType};

/// One accepted model name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelEntry {
    /// Name as it appears in node settings
    pub name: &'static str,
    /// Identifier sent to the executor
    pub backend_id: &'static str,
    /// What the model produces
    pub output: PortDataType,
}

const fn entry(name: &'static str, backend_id: &'static str, output: PortDataType) -> ModelEntry {
    ModelEntry {
        name,
        backend_id,
        output,
    }
}

/// Accepted model names
pub const MODEL_TABLE: &[ModelEntry] = &[
    // text
    entry("gemini-flash", "gemini-2.5-flash", PortDataType::Text),
    entry("gemini-pro", "gemini-2.5-pro", PortDataType::Text),
    entry("gemini-2.5-flash", "gemini-2.5-flash", PortDataType::Text),
    entry("gemini-2.5-pro", "gemini-2.5-pro", PortDataType::Text),
    // image
    entry("nano-banana", "gemini-2.5-flash-image", PortDataType::Image),
    entry("nano-banana-pro", "gemini-3-pro-image-preview", PortDataType::Image),
    entry("imagen-4", "imagen-4.0-generate-001", PortDataType::Image),
    entry("imagen-4-fast", "imagen-4.0-fast-generate-001", PortDataType::Image),
    entry("gemini-2.5-flash-image", "gemini-2.5-flash-image", PortDataType::Image),
    entry("gemini-3-pro-image-preview", "gemini-3-pro-image-preview", PortDataType::Image),
    entry("imagen-4.0-generate-001", "imagen-4.0-generate-001", PortDataType::Image),
    entry("imagen-4.0-fast-generate-001", "imagen-4.0-fast-generate-001", PortDataType::Image),
    // video
    entry("veo-3.1", "veo-3.1-generate-preview", PortDataType::Video),
    entry("veo-3.1-fast", "veo-3.1-fast-generate-preview", PortDataType::Video),
    entry("veo-3.1-generate-preview", "veo-3.1-generate-preview", PortDataType::Video),
    entry("veo-3.1-fast-generate-preview", "veo-3.1-fast-generate-preview", PortDataType::Video),
];

/// Backend identifier for a model name, if the name is known
pub fn backend_model_id(name: &str) -> Option<&'static str> {
    MODEL_TABLE
        .iter()
        .find(|e| e.name == name.trim())
        .map(|e| e.backend_id)
}

/// Default backend model for a dispatched kind
pub fn default_model(kind: NodeKind) -> Option<&'static str> {
    match kind {
        NodeKind::PromptEnhancer => Some(defaults::ENHANCER_MODEL),
        NodeKind::ImageGenerator => Some(defaults::IMAGE_MODEL),
        NodeKind::VideoGenerator | NodeKind::ExtendVideo => Some(defaults::VIDEO_MODEL),
        NodeKind::Text
        | NodeKind::ImageReference
        | NodeKind::VideoReference
        | NodeKind::AudioReference
        | NodeKind::DocumentReference => None,
    }
}

/// Resolve the backend model for a node of `kind`
///
/// A missing or blank name selects the kind's default. Returns `None` when
/// the name is unknown or the model produces the wrong kind of output.
pub fn resolve_model(kind: NodeKind, name: Option<&str>) -> Option<&'static str> {
    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => return default_model(kind),
    };
    MODEL_TABLE
        .iter()
        .find(|e| e.name == name && e.output == kind.output_type())
        .map(|e| e.backend_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_names_translate() {
        assert_eq!(backend_model_id("nano-banana"), Some("gemini-2.5-flash-image"));
        assert_eq!(
            backend_model_id("veo-3.1-fast"),
            Some("veo-3.1-fast-generate-preview")
        );
        assert_eq!(backend_model_id("veo-3.1"), Some("veo-3.1-generate-preview"));
    }

    #[test]
    fn test_backend_ids_map_to_themselves() {
        for entry in MODEL_TABLE {
            assert_eq!(backend_model_id(entry.backend_id), Some(entry.backend_id));
        }
    }

    #[test]
    fn test_unknown_name_not_passed_through() {
        assert_eq!(backend_model_id("dall-e-3"), None);
        assert_eq!(resolve_model(NodeKind::ImageGenerator, Some("dall-e-3")), None);
    }

    #[test]
    fn test_defaults_and_family_check() {
        assert_eq!(
            resolve_model(NodeKind::ImageGenerator, None),
            Some("gemini-2.5-flash-image")
        );
        assert_eq!(
            resolve_model(NodeKind::ExtendVideo, Some("  ")),
            Some("veo-3.1-generate-preview")
        );
        assert_eq!(resolve_model(NodeKind::VideoGenerator, Some("nano-banana")), None);
        assert_eq!(resolve_model(NodeKind::Text, None), None);
    }
}
