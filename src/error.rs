//! Error types for the gemini-watermark-eraser crate.

use std::path::PathBuf;

/// Shown for every remote-side failure, whatever the cause.
const PROCESSING_FAILED_MESSAGE: &str = "Could not process the image. Please try again.";

/// Errors that can occur while uploading, processing, or saving an image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The selected file is not declared as an image.
    #[error("not an image file (declared type: {media_type})")]
    InvalidInput {
        /// Media type declared for the rejected file.
        media_type: String,
    },

    /// The selected file could not be read from disk.
    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        /// Path of the file that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The remote response carried no inline image part.
    #[error("the API did not return a processed image")]
    NoImageReturned,

    /// The remote call failed. The cause is logged, not carried.
    #[error("failed to process image with the Gemini API")]
    ProcessingFailed,

    /// No API key was found in the environment.
    #[error("API_KEY environment variable not set")]
    MissingApiKey,

    /// A payload to decode was empty.
    #[error("empty image payload")]
    EmptyPayload,

    /// A string was not a `data:<type>;base64,<payload>` URI.
    #[error("invalid image format")]
    InvalidDataUri,

    /// Processing was triggered before any image was uploaded.
    #[error("no image has been uploaded")]
    NoImageSelected,

    /// Processing was triggered while a request is already in flight.
    #[error("a request is already in flight")]
    Busy,

    /// Download was requested but there is no processed image.
    #[error("no processed image to save")]
    NoResult,

    /// An I/O error occurred while writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while re-encoding the result image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Text suitable for showing to the end user.
    ///
    /// Local validation errors get their own wording; every remote-side
    /// failure collapses to a single message.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "Please upload a valid image file.",
            Self::FileRead { .. } => "Error reading the image file.",
            Self::NoImageSelected => "Please upload an image first.",
            Self::Busy => "The image is still being processed.",
            Self::NoResult => "There is no processed image to download yet.",
            Self::MissingApiKey => "The API key is not configured.",
            Self::Io(_) | Self::Image(_) => "Could not save the processed image.",
            Self::NoImageReturned
            | Self::ProcessingFailed
            | Self::EmptyPayload
            | Self::InvalidDataUri
            | Self::Http(_) => PROCESSING_FAILED_MESSAGE,
        }
    }

    /// Whether this error originated on the remote side of the exchange.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::NoImageReturned | Self::ProcessingFailed)
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
