//! Conversion between local image files and base64 transport payloads.
//!
//! Uploads are validated by their *declared* media type (derived from the
//! file name, the way a browser fills `File.type`). The content is sniffed
//! as well, but a mismatch only produces a warning.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;

use crate::error::{Error, Result};

/// Media type of every processed result.
pub const RESULT_MEDIA_TYPE: &str = "image/png";

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";
const FALLBACK_FILE_NAME: &str = "image";

/// An image selected by the user, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// File name as selected (no directory).
    pub file_name: String,
    /// Raw file content.
    pub raw_bytes: Vec<u8>,
    /// Declared media type, always in the `image/` category.
    pub media_type: String,
    /// Base64 encoding of `raw_bytes`.
    pub payload: String,
}

impl UploadedImage {
    /// Displayable form: `data:<media_type>;base64,<payload>`.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.payload)
    }
}

/// A successfully processed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    data_uri: String,
}

impl ProcessingResult {
    /// Wrap a base64 PNG payload returned by the API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPayload`] if `payload` is empty.
    pub fn from_payload(payload: &str) -> Result<Self> {
        Ok(Self {
            data_uri: decode(payload, RESULT_MEDIA_TYPE)?,
        })
    }

    /// Displayable form, always `data:image/png;base64,...`.
    #[must_use]
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Decode the result back to binary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDataUri`] if the payload is not valid base64.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        let (_, payload) = split_data_uri(&self.data_uri)?;
        general_purpose::STANDARD
            .decode(payload)
            .map_err(|_| Error::InvalidDataUri)
    }
}

/// Declared media type for a file name, from its extension.
#[must_use]
pub fn declared_media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MEDIA_TYPE)
        .to_string()
}

/// Whether a media type belongs to the image category.
#[must_use]
pub fn is_image_media_type(media_type: &str) -> bool {
    media_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Read and encode an image file.
///
/// The declared type is checked before the file is touched, so a non-image
/// is rejected without any I/O.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if the declared type is not `image/*`.
/// - [`Error::FileRead`] if the file cannot be read.
pub async fn encode(path: &Path) -> Result<UploadedImage> {
    let media_type = declared_media_type(path);
    if !is_image_media_type(&media_type) {
        return Err(Error::InvalidInput { media_type });
    }

    let raw_bytes = tokio::fs::read(path).await.map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    encode_bytes(file_name, raw_bytes, media_type)
}

/// Encode in-memory image content with an explicit declared type.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `media_type` is not `image/*`.
pub fn encode_bytes(
    file_name: impl Into<String>,
    raw_bytes: Vec<u8>,
    media_type: impl Into<String>,
) -> Result<UploadedImage> {
    let media_type = media_type.into();
    if !is_image_media_type(&media_type) {
        return Err(Error::InvalidInput { media_type });
    }
    let file_name = file_name.into();

    match sniff_format(&raw_bytes) {
        Some(actual) if !actual.to_mime_type().eq_ignore_ascii_case(&media_type) => {
            tracing::warn!(
                file = %file_name,
                declared = %media_type,
                actual = actual.to_mime_type(),
                "declared media type does not match content"
            );
        }
        None => {
            tracing::warn!(file = %file_name, declared = %media_type, "content is not a recognized image format");
        }
        Some(_) => {}
    }

    let payload = general_purpose::STANDARD.encode(&raw_bytes);
    Ok(UploadedImage {
        file_name,
        raw_bytes,
        media_type,
        payload,
    })
}

/// Format a base64 payload as a displayable data URI.
///
/// # Errors
///
/// Returns [`Error::EmptyPayload`] if `payload` is empty.
pub fn decode(payload: &str, media_type: &str) -> Result<String> {
    if payload.is_empty() {
        return Err(Error::EmptyPayload);
    }
    Ok(format!("data:{media_type};base64,{payload}"))
}

/// Split a `data:<type>;base64,<payload>` URI into its media type and payload.
///
/// # Errors
///
/// Returns [`Error::InvalidDataUri`] if the URI is malformed or the payload is empty.
pub fn split_data_uri(uri: &str) -> Result<(&str, &str)> {
    let rest = uri.strip_prefix("data:").ok_or(Error::InvalidDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(Error::InvalidDataUri)?;
    let media_type = header.strip_suffix(";base64").ok_or(Error::InvalidDataUri)?;
    if payload.is_empty() {
        return Err(Error::InvalidDataUri);
    }
    Ok((media_type, payload))
}

/// Detect the actual container format from magic bytes.
#[must_use]
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Name of the downloaded artifact: `watermark_removed_<original>.png`.
#[must_use]
pub fn artifact_name(original_file_name: &str) -> String {
    let original = if original_file_name.trim().is_empty() {
        FALLBACK_FILE_NAME
    } else {
        original_file_name
    };
    format!("watermark_removed_{original}.png")
}

/// Full artifact path inside `dir`.
#[must_use]
pub fn artifact_path(dir: &Path, original_file_name: &str) -> PathBuf {
    dir.join(artifact_name(original_file_name))
}
