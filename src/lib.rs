//! Remove AI watermarks by asking the Gemini image model to repaint them.
//!
//! No pixels are edited locally. The selected image is base64-encoded, sent
//! to `generateContent` together with a fixed removal instruction, and the
//! first image part of the response becomes the result.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use gemini_watermark_eraser::{Config, ProcessingClient, Session};
//!
//! # async fn run() -> gemini_watermark_eraser::Result<()> {
//! let config = Arc::new(Config::from_env()?);
//! let client = ProcessingClient::new(config)?;
//!
//! let mut session = Session::new();
//! session.upload(Path::new("photo.jpg")).await?;
//! session.process(&client).await?;
//! let saved = session.download(Path::new(".")).await?;
//! println!("saved {}", saved.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Local problems (a non-image selection, an unreadable file) and remote
//! problems are kept apart in [`Error`], but every remote failure shares one
//! [`Error::user_message`].

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod gemini;
pub mod session;
pub mod transfer;

pub use client::{ImageEditor, ProcessingClient, REMOVAL_INSTRUCTION};
pub use config::Config;
pub use error::{Error, Result};
pub use session::{PendingRequest, RequestState, Session};
pub use transfer::{artifact_name, decode, encode, encode_bytes, ProcessingResult, UploadedImage};
