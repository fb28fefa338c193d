use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "video-transcriber",
    about = "Video Transcriber - Time-coded transcripts for videos in Cloud Storage using Google Video Intelligence",
    version,
    long_about = "Serves an HTTP endpoint that takes the Cloud Storage path of an uploaded video, runs speech transcription through the Google Video Intelligence API and answers with fixed-width, timestamped transcript lines."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a YAML configuration file
    #[arg(short, long, global = true, env = "VIDEO_TRANSCRIBER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP transcription endpoint
    Serve {
        /// Interface to bind (overrides the config file)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides the config file and PORT)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Transcribe one video and print or save the transcript
    Transcribe {
        /// Cloud Storage URI (gs://bucket/path) or object path inside the configured bucket
        #[arg(value_name = "GCS_PATH")]
        gcs_path: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (defaults to the configured format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Maximum characters per transcript line
        #[arg(long, value_name = "CHARS")]
        max_chars: Option<usize>,
    },

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a configuration file with default values
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Timestamped transcript lines
    Text,
    /// JSON with lines and metadata
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
