use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::transcribe::TranscriptionResult;

pub mod formatters;

pub use formatters::*;

/// Render a transcription result in the requested format
pub fn render(result: &TranscriptionResult, format: &OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Text => result.transcript.render(),
        OutputFormat::Json => serde_json::to_string_pretty(result)
            .context("Failed to serialize transcription result")?,
    };
    Ok(content)
}

/// Save transcription result to file
pub async fn save_to_file(
    result: &TranscriptionResult,
    path: &Path,
    format: &OutputFormat,
) -> Result<()> {
    let content = render(result, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print transcription result to console
pub fn print_to_console(result: &TranscriptionResult, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    print!("{}", content);
    Ok(())
}
