//! Wire types for the Gemini `generateContent` endpoint.
//!
//! Only the fields this crate sends or reads are modeled; everything else in
//! a response is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Response modality requesting image output.
pub const MODALITY_IMAGE: &str = "IMAGE";

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation contents; a single user turn here.
    pub contents: Vec<Content>,
    /// Output configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// One image followed by one instruction, asking for image output only.
    #[must_use]
    pub fn image_edit(payload: &str, media_type: &str, instruction: &str) -> Self {
        Self {
            contents: vec![Content {
                role: None,
                parts: vec![
                    Part::inline(media_type, payload),
                    Part::text(instruction),
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec![MODALITY_IMAGE.to_string()]),
            }),
        }
    }
}

/// A multi-part message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    /// Producer of the content (`user` or `model`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One unit of content: text or inline binary data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    /// Text part.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    /// Inline data part.
    #[must_use]
    pub fn inline(media_type: &str, data: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(Blob {
                mime_type: media_type.to_string(),
                data: data.to_string(),
            }),
        }
    }
}

/// Base64 binary data with its media type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// Media type of `data`.
    #[serde(default)]
    pub mime_type: String,
    /// Base64-encoded bytes.
    #[serde(default)]
    pub data: String,
}

/// Generation settings.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Requested output modalities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
}

/// Response body of `generateContent`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate responses.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Feedback on the prompt, present when it was blocked.
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Payload of the first inline-data part of the first candidate.
    ///
    /// Parts are scanned in order and the first match wins.
    #[must_use]
    pub fn first_image_payload(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .map(|blob| blob.data.as_str())
            .find(|data| !data.is_empty())
    }

    /// Finish reason of the first candidate, if any.
    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }
}

/// A single candidate response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content.
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Prompt-level feedback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Reason the prompt was blocked.
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error details.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    /// HTTP-like status code.
    #[serde(default)]
    pub code: Option<u16>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Canonical status name, e.g. `INVALID_ARGUMENT`.
    #[serde(default)]
    pub status: Option<String>,
}
