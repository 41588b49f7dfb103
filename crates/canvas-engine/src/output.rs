//! Node outputs
//!
//! `NodeOutput` is the canonical value recorded for a completed node and
//! consumed by its dependents. Executors hand back a looser `RawOutput`,
//! which is normalized here before anything downstream sees it.

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::types::{NodeKind, PortDataType};

/// Canonical output of a completed node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeOutput {
    #[serde(rename_all = "camelCase")]
    Text { value: String },
    #[serde(rename_all = "camelCase")]
    Image { base64: String, mime_type: String },
    #[serde(rename_all = "camelCase")]
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        poster_base64: Option<String>,
    },
}

impl NodeOutput {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    pub fn image(base64: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            base64: base64.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self::Video {
            url: url.into(),
            poster_base64: None,
        }
    }

    /// The data type this output carries
    pub fn data_type(&self) -> PortDataType {
        match self {
            Self::Text { .. } => PortDataType::Text,
            Self::Image { .. } => PortDataType::Image,
            Self::Video { .. } => PortDataType::Video,
        }
    }

    /// Text value, if this is a text output
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { value } => Some(value),
            _ => None,
        }
    }
}

/// Result value as produced by an external executor
///
/// Image data may still carry a `data:` URL prefix or line-wrapped base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RawOutput {
    #[serde(rename_all = "camelCase")]
    Text { text: String },
    #[serde(rename_all = "camelCase")]
    Image {
        data: String,
        #[serde(default)]
        mime_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Video {
        url: String,
        #[serde(default)]
        poster: Option<String>,
    },
}

/// Errors normalizing an executor result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    /// The executor returned a different kind of value than the node produces
    #[error("Expected {expected} output, got {actual}")]
    UnexpectedType {
        expected: PortDataType,
        actual: PortDataType,
    },

    /// The executor returned an empty value
    #[error("Executor returned an empty {0} output")]
    Empty(PortDataType),
}

impl RawOutput {
    fn data_type(&self) -> PortDataType {
        match self {
            Self::Text { .. } => PortDataType::Text,
            Self::Image { .. } => PortDataType::Image,
            Self::Video { .. } => PortDataType::Video,
        }
    }
}

/// Convert an executor result into the canonical output for `kind`
pub fn normalize(kind: NodeKind, raw: RawOutput) -> Result<NodeOutput, OutputError> {
    let expected = kind.output_type();
    let actual = raw.data_type();
    if expected != actual {
        return Err(OutputError::UnexpectedType { expected, actual });
    }

    match raw {
        RawOutput::Text { text } => Ok(NodeOutput::Text { value: text }),
        RawOutput::Image { data, mime_type } => {
            let (embedded_mime, payload) = split_data_url(&data);
            let base64 = normalize_base64(payload);
            if base64.is_empty() {
                return Err(OutputError::Empty(PortDataType::Image));
            }
            let mime_type = mime_type
                .filter(|m| !m.trim().is_empty())
                .or(embedded_mime)
                .unwrap_or_else(|| defaults::IMAGE_MIME_TYPE.to_string());
            Ok(NodeOutput::Image { base64, mime_type })
        }
        RawOutput::Video { url, poster } => {
            let url = url.trim().to_string();
            if url.is_empty() {
                return Err(OutputError::Empty(PortDataType::Video));
            }
            let poster_base64 = poster
                .map(|p| normalize_base64(split_data_url(&p).1))
                .filter(|p| !p.is_empty());
            Ok(NodeOutput::Video { url, poster_base64 })
        }
    }
}

/// Split a `data:<mime>;base64,<payload>` URL
///
/// Returns the embedded MIME type (if any) and the payload. Input without
/// a data URL prefix is returned unchanged as the payload.
pub fn split_data_url(data: &str) -> (Option<String>, &str) {
    let trimmed = data.trim_start();
    let Some(rest) = trimmed.strip_prefix("data:") else {
        return (None, data);
    };
    let Some((header, payload)) = rest.split_once(',') else {
        return (None, data);
    };
    let mime = header
        .split(';')
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    (mime, payload)
}

/// Strip a data URL prefix and all whitespace from base64 data
///
/// Applying this twice yields the same result as applying it once.
pub fn normalize_base64(data: &str) -> String {
    split_data_url(data)
        .1
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}
