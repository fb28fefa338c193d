use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::output::{format_segments, Transcript};
use crate::TranscriberError;

pub mod auth;
pub mod processor;
pub mod video_intelligence;

pub use video_intelligence::VideoIntelligenceClient;

/// Locator of a video that was already uploaded to Cloud Storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoReference(String);

impl VideoReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Build a reference from caller input. Bare object paths are placed in `default_bucket`,
    /// anything carrying a scheme is passed through for the service to validate.
    pub fn resolve(raw: &str, default_bucket: &str) -> Self {
        if raw.contains("://") || default_bucket.is_empty() {
            return Self(raw.to_string());
        }
        Self(format!("gs://{}/{}", default_bucket, raw.trim_start_matches('/')))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One recognized word with its timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpan {
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl WordSpan {
    pub fn new(text: impl Into<String>, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            text: text.into(),
            start_seconds,
            end_seconds,
        }
    }
}

/// One hypothesis for a speech segment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeechAlternative {
    pub transcript: String,
    pub confidence: f32,
    pub words: Vec<WordSpan>,
}

/// A stretch of recognized speech; alternatives are ranked, index 0 is the best
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub alternatives: Vec<SpeechAlternative>,
    pub language_code: Option<String>,
}

impl SpeechSegment {
    pub fn best(&self) -> Option<&SpeechAlternative> {
        self.alternatives.first()
    }
}

/// Remote speech transcription of a stored video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Run one transcription job to completion and return its segments in service order
    async fn request_transcript(
        &self,
        video: &VideoReference,
    ) -> std::result::Result<Vec<SpeechSegment>, TranscriberError>;
}

/// Transcription result with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Time-coded transcript lines
    pub transcript: Transcript,

    /// Video that was transcribed
    pub video: VideoReference,

    /// Transcription metadata
    pub metadata: TranscriptionMetadata,
}

/// Metadata about the transcription process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionMetadata {
    /// Language reported by the service
    pub language: String,

    /// Processing time in seconds
    pub processing_duration: f64,

    /// Speech segments returned by the service
    pub segment_count: usize,

    /// Words placed into the transcript
    pub word_count: usize,

    /// Average confidence of the alternatives used
    pub confidence: Option<f64>,

    /// Timestamp when transcription completed
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Requests a transcript and formats it into lines
pub struct TranscriptionPipeline {
    transcriber: Arc<dyn Transcriber>,
    default_bucket: String,
    max_chars_per_line: usize,
}

impl TranscriptionPipeline {
    /// Create a pipeline backed by the Video Intelligence API
    pub fn new(config: &Config) -> Result<Self> {
        let client = VideoIntelligenceClient::new(config)?;
        Ok(Self::with_transcriber(Arc::new(client), config))
    }

    /// Create a pipeline around any transcriber
    pub fn with_transcriber(transcriber: Arc<dyn Transcriber>, config: &Config) -> Self {
        Self {
            transcriber,
            default_bucket: config.google.bucket_name.clone(),
            max_chars_per_line: config.app.max_chars_per_line,
        }
    }

    pub fn resolve(&self, raw: &str) -> VideoReference {
        VideoReference::resolve(raw, &self.default_bucket)
    }

    /// Transcribe a video, packing lines to `max_chars` (or the configured width)
    pub async fn transcribe(
        &self,
        video: &VideoReference,
        max_chars: Option<usize>,
    ) -> std::result::Result<TranscriptionResult, TranscriberError> {
        let max_chars = max_chars.unwrap_or(self.max_chars_per_line);
        if max_chars == 0 {
            return Err(TranscriberError::Validation(
                "maxCharsPerLine must be greater than zero.".to_string(),
            ));
        }

        let started = std::time::Instant::now();
        tracing::info!(video = %video, "Processing video for speech transcription");

        let segments = self.transcriber.request_transcript(video).await?;
        let transcript = format_segments(&segments, max_chars);
        if transcript.is_empty() {
            tracing::warn!(video = %video, "No speech found in video");
        }

        let used: Vec<&SpeechAlternative> = segments
            .iter()
            .filter_map(SpeechSegment::best)
            .collect();

        let metadata = TranscriptionMetadata {
            language: segments
                .iter()
                .find_map(|s| s.language_code.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            processing_duration: started.elapsed().as_secs_f64(),
            segment_count: segments.len(),
            word_count: used.iter().map(|alt| alt.words.len()).sum(),
            confidence: average_confidence(&used),
            completed_at: chrono::Utc::now(),
        };

        tracing::info!(
            video = %video,
            segments = metadata.segment_count,
            words = metadata.word_count,
            lines = transcript.lines.len(),
            elapsed = %crate::utils::format_duration(metadata.processing_duration),
            "Transcription completed"
        );

        Ok(TranscriptionResult {
            transcript,
            video: video.clone(),
            metadata,
        })
    }
}

/// Calculate average confidence of alternatives that carry words
fn average_confidence(alternatives: &[&SpeechAlternative]) -> Option<f64> {
    let confidences: Vec<f64> = alternatives
        .iter()
        .filter(|alt| !alt.words.is_empty())
        .map(|alt| alt.confidence as f64)
        .collect();

    if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn segment(words: &[(&str, f64, f64)], confidence: f32) -> SpeechSegment {
        SpeechSegment {
            alternatives: vec![SpeechAlternative {
                transcript: words.iter().map(|w| w.0).collect::<Vec<_>>().join(" "),
                confidence,
                words: words.iter().map(|(t, s, e)| WordSpan::new(*t, *s, *e)).collect(),
            }],
            language_code: Some("en-us".to_string()),
        }
    }

    #[test]
    fn test_resolve_passes_through_gcs_uri() {
        let video = VideoReference::resolve("gs://other/clip.mp4", "bucket");
        assert_eq!(video.as_str(), "gs://other/clip.mp4");
    }

    #[test]
    fn test_resolve_bare_path_uses_bucket() {
        let video = VideoReference::resolve("/videos/uid/clip.mp4", "bucket");
        assert_eq!(video.as_str(), "gs://bucket/videos/uid/clip.mp4");
    }

    #[test]
    fn test_resolve_without_bucket_is_verbatim() {
        let video = VideoReference::resolve("videos/clip.mp4", "");
        assert_eq!(video.as_str(), "videos/clip.mp4");
    }

    #[test]
    fn test_resolve_keeps_surrounding_whitespace() {
        let video = VideoReference::resolve(" gs://other/clip.mp4 ", "bucket");
        assert_eq!(video.as_str(), " gs://other/clip.mp4 ");
    }

    #[tokio::test]
    async fn test_pipeline_formats_segments() {
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_request_transcript()
            .with(eq(VideoReference::new("gs://bucket/clip.mp4")))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    segment(&[("Hello", 0.0, 0.4), ("there.", 0.5, 0.9)], 0.9),
                    SpeechSegment::default(),
                    segment(&[("Bye.", 2.0, 2.3)], 0.7),
                ])
            });

        let pipeline = TranscriptionPipeline::with_transcriber(Arc::new(transcriber), &Config::default());
        let result = pipeline
            .transcribe(&VideoReference::new("gs://bucket/clip.mp4"), None)
            .await
            .unwrap();

        assert_eq!(
            result.transcript.render(),
            "[0.00s - 0.90s] Hello there.\n[2.00s - 2.30s] Bye.\n"
        );
        assert_eq!(result.metadata.segment_count, 3);
        assert_eq!(result.metadata.word_count, 3);
        assert_eq!(result.metadata.language, "en-us");
        let confidence = result.metadata.confidence.unwrap();
        assert!((confidence - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_pipeline_propagates_timeout() {
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_request_transcript()
            .returning(|_| Err(TranscriberError::Timeout { seconds: 600 }));

        let pipeline = TranscriptionPipeline::with_transcriber(Arc::new(transcriber), &Config::default());
        let err = pipeline
            .transcribe(&VideoReference::new("gs://bucket/clip.mp4"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriberError::Timeout { seconds: 600 }));
    }

    #[tokio::test]
    async fn test_zero_width_rejected_before_remote_call() {
        let mut transcriber = MockTranscriber::new();
        transcriber.expect_request_transcript().never();

        let pipeline = TranscriptionPipeline::with_transcriber(Arc::new(transcriber), &Config::default());
        let err = pipeline
            .transcribe(&VideoReference::new("gs://bucket/clip.mp4"), Some(0))
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriberError::Validation(_)));
    }
}
