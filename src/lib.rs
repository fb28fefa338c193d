//! Video Transcriber - an HTTP service that turns uploaded videos into time-coded transcripts
//!
//! This library requests speech transcription for a video stored in Google Cloud Storage
//! from the Video Intelligence API, waits for the long-running operation to finish and packs
//! the recognized words into fixed-width, timestamped transcript lines.

pub mod cli;
pub mod config;
pub mod output;
pub mod server;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use output::{format_lines, format_segments, Transcript, TranscriptLine};
pub use server::AppState;
pub use transcribe::{
    SpeechAlternative, SpeechSegment, Transcriber, TranscriptionPipeline, TranscriptionResult,
    VideoReference, WordSpan,
};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the transcriber
#[derive(thiserror::Error, Debug)]
pub enum TranscriberError {
    #[error("{0}")]
    Validation(String),

    #[error("operation did not complete within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("{0}")]
    Service(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<reqwest::Error> for TranscriberError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TranscriberError::Service(format!("request to Video Intelligence timed out: {}", err))
        } else {
            TranscriberError::Unexpected(anyhow::Error::new(err))
        }
    }
}
