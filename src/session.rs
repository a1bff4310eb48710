//! Upload / process / download state machine.
//!
//! A [`Session`] mirrors what a single-page front end keeps in memory: the
//! selected image, the processed result, the last user-facing error, and
//! the request state that gates the "remove watermark" action.
//!
//! Processing is split into [`Session::begin_submit`] and
//! [`Session::complete`] so a caller driving its own event loop can keep the
//! session responsive while the request is in flight. Every upload and reset
//! advances a generation counter; a completion from an older generation is
//! dropped, which keeps a result from outliving the image it was made from.

use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::client::ImageEditor;
use crate::error::{Error, Result};
use crate::transfer::{self, ProcessingResult, UploadedImage};

/// State of the remote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    /// Nothing sent since the last upload or reset.
    #[default]
    Idle,
    /// A request is outstanding.
    InFlight,
    /// The last request produced a result.
    Succeeded,
    /// The last request failed.
    Failed,
}

/// Ticket for an outstanding request, returned by [`Session::begin_submit`].
#[derive(Debug, Clone)]
pub struct PendingRequest {
    generation: u64,
    /// Base64 image payload to send.
    pub payload: String,
    /// Declared media type of the payload.
    pub media_type: String,
}

/// In-memory state of one user's interaction.
#[derive(Debug, Default)]
pub struct Session {
    upload: Option<UploadedImage>,
    result: Option<ProcessingResult>,
    error: Option<&'static str>,
    state: RequestState,
    generation: u64,
    in_flight: Option<u64>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current request state.
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Currently selected image.
    #[must_use]
    pub fn uploaded(&self) -> Option<&UploadedImage> {
        self.upload.as_ref()
    }

    /// Processed image, if the last request succeeded.
    #[must_use]
    pub fn result(&self) -> Option<&ProcessingResult> {
        self.result.as_ref()
    }

    /// Last user-facing error message.
    #[must_use]
    pub fn error_message(&self) -> Option<&'static str> {
        self.error
    }

    /// Whether the processing action is enabled.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.upload.is_some() && self.state != RequestState::InFlight
    }

    /// Select an image file from disk.
    ///
    /// On failure the previous upload is kept and the error is recorded.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] or [`Error::FileRead`], see [`transfer::encode`].
    pub async fn upload(&mut self, path: &Path) -> Result<()> {
        let outcome = transfer::encode(path).await;
        self.accept_upload(outcome)
    }

    /// Select in-memory image content.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `media_type` is not `image/*`.
    pub fn upload_bytes(
        &mut self,
        file_name: impl Into<String>,
        raw_bytes: Vec<u8>,
        media_type: impl Into<String>,
    ) -> Result<()> {
        let outcome = transfer::encode_bytes(file_name, raw_bytes, media_type);
        self.accept_upload(outcome)
    }

    fn accept_upload(&mut self, outcome: Result<UploadedImage>) -> Result<()> {
        match outcome {
            Ok(uploaded) => {
                tracing::debug!(
                    file = %uploaded.file_name,
                    media_type = %uploaded.media_type,
                    bytes = uploaded.raw_bytes.len(),
                    "image selected"
                );
                self.generation += 1;
                self.upload = Some(uploaded);
                self.result = None;
                self.error = None;
                if self.state != RequestState::InFlight {
                    self.state = RequestState::Idle;
                }
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Start processing the current upload.
    ///
    /// # Errors
    ///
    /// - [`Error::NoImageSelected`] if nothing is uploaded.
    /// - [`Error::Busy`] if a request is already in flight.
    /// - [`Error::InvalidDataUri`] if the upload has no content; nothing is sent
    ///   and the attempt is marked failed.
    pub fn begin_submit(&mut self) -> Result<PendingRequest> {
        if self.state == RequestState::InFlight {
            return Err(Error::Busy);
        }
        let Some(uploaded) = &self.upload else {
            self.error = Some(Error::NoImageSelected.user_message());
            return Err(Error::NoImageSelected);
        };
        if uploaded.payload.is_empty() {
            tracing::warn!(file = %uploaded.file_name, "refusing to send an empty image");
            self.result = None;
            self.error = Some(Error::InvalidDataUri.user_message());
            self.state = RequestState::Failed;
            return Err(Error::InvalidDataUri);
        }

        let pending = PendingRequest {
            generation: self.generation,
            payload: uploaded.payload.clone(),
            media_type: uploaded.media_type.clone(),
        };
        self.state = RequestState::InFlight;
        self.in_flight = Some(self.generation);
        self.result = None;
        self.error = None;
        Ok(pending)
    }

    /// Apply the outcome of a request started with [`begin_submit`](Self::begin_submit).
    ///
    /// Returns `false` if the upload changed (or the session was reset) since
    /// the request began; the outcome is then discarded. A newer request that
    /// is still outstanding keeps the session in flight.
    pub fn complete(&mut self, pending: &PendingRequest, outcome: Result<String>) -> bool {
        if self.in_flight == Some(pending.generation) {
            self.in_flight = None;
        }

        if pending.generation != self.generation {
            tracing::debug!(
                started = pending.generation,
                current = self.generation,
                "discarding result for a stale upload"
            );
            if self.state == RequestState::InFlight && self.in_flight.is_none() {
                self.state = RequestState::Idle;
            }
            return false;
        }

        match outcome.and_then(|payload| ProcessingResult::from_payload(&payload)) {
            Ok(result) => {
                self.result = Some(result);
                self.error = None;
                self.state = RequestState::Succeeded;
            }
            Err(e) => {
                tracing::warn!(error = %e, "watermark removal failed");
                self.result = None;
                self.error = Some(Error::ProcessingFailed.user_message());
                self.state = RequestState::Failed;
            }
        }
        true
    }

    /// Run one full request against `editor`.
    ///
    /// # Errors
    ///
    /// Errors from [`begin_submit`](Self::begin_submit), or the remote error
    /// if the request failed.
    pub async fn process(&mut self, editor: &dyn ImageEditor) -> Result<()> {
        let pending = self.begin_submit()?;
        let outcome = editor
            .remove_watermark(&pending.payload, &pending.media_type)
            .await;

        let failure = match &outcome {
            Err(Error::NoImageReturned) => Some(Error::NoImageReturned),
            Err(_) => Some(Error::ProcessingFailed),
            Ok(_) => None,
        };
        self.complete(&pending, outcome);

        match failure {
            Some(e) => Err(e),
            None if self.state == RequestState::Failed => Err(Error::ProcessingFailed),
            None => Ok(()),
        }
    }

    /// Write the processed image into `dir` as
    /// `watermark_removed_<original>.png`.
    ///
    /// Decodable images that are not already PNG are re-encoded so the
    /// artifact matches its extension. Anything else is written as returned.
    ///
    /// # Errors
    ///
    /// - [`Error::NoResult`] if there is nothing to save.
    /// - [`Error::Io`] if writing fails.
    pub async fn download(&self, dir: &Path) -> Result<PathBuf> {
        let result = self.result.as_ref().ok_or(Error::NoResult)?;
        let original = self
            .upload
            .as_ref()
            .map_or("", |u| u.file_name.as_str());
        let path = transfer::artifact_path(dir, original);

        let mut bytes = result.bytes()?;
        match transfer::sniff_format(&bytes) {
            Some(ImageFormat::Png) => {}
            other => match reencode_png(&bytes) {
                Ok(png) => {
                    tracing::debug!(format = ?other, "re-encoded result as PNG");
                    bytes = png;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "result is not a decodable image, saving bytes as returned");
                }
            },
        }

        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), "saved processed image");
        Ok(path)
    }

    /// Drop the upload, result, and error.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.upload = None;
        self.result = None;
        self.error = None;
        self.state = RequestState::Idle;
    }
}

fn reencode_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let mut out = std::io::Cursor::new(Vec::new());
    decoded.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
