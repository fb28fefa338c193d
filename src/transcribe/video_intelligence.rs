use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::auth::TokenProvider;
use super::processor::{read_operation, OperationProcessor, PollSettings};
use super::{SpeechSegment, Transcriber, VideoReference};
use crate::config::Config;
use crate::TranscriberError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateVideoRequest<'a> {
    input_uri: &'a str,
    features: [&'static str; 1],
    video_context: VideoContext<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoContext<'a> {
    speech_transcription_config: SpeechTranscriptionConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechTranscriptionConfig<'a> {
    language_code: &'a str,
    enable_automatic_punctuation: bool,
}

/// Client for the Video Intelligence `videos:annotate` speech transcription feature
pub struct VideoIntelligenceClient {
    http: Client,
    tokens: Arc<TokenProvider>,
    endpoint: String,
    language_code: String,
    enable_automatic_punctuation: bool,
    operation_timeout: Duration,
    poll: PollSettings,
}

impl VideoIntelligenceClient {
    /// Create a client using the credentials named in the configuration
    pub fn new(config: &Config) -> Result<Self> {
        let tokens = TokenProvider::from_config(&config.google.credentials)?;
        Self::with_token_provider(config, tokens)
    }

    pub fn with_token_provider(config: &Config, tokens: TokenProvider) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let transcription = &config.google.transcription;
        Ok(Self {
            http,
            tokens: Arc::new(tokens),
            endpoint: config.google.endpoint.trim_end_matches('/').to_string(),
            language_code: transcription.language_code.clone(),
            enable_automatic_punctuation: transcription.enable_automatic_punctuation,
            operation_timeout: config.operation_timeout(),
            poll: PollSettings {
                initial_interval: Duration::from_secs(transcription.initial_poll_interval_secs),
                max_interval: Duration::from_secs(transcription.max_poll_interval_secs),
            },
        })
    }

    /// Start the annotate operation and return its name
    async fn start_annotation(&self, video: &VideoReference) -> Result<String, TranscriberError> {
        let request = AnnotateVideoRequest {
            input_uri: video.as_str(),
            features: ["SPEECH_TRANSCRIPTION"],
            video_context: VideoContext {
                speech_transcription_config: SpeechTranscriptionConfig {
                    language_code: &self.language_code,
                    enable_automatic_punctuation: self.enable_automatic_punctuation,
                },
            },
        };

        let token = self.tokens.token(&self.http).await?;
        let response = self
            .http
            .post(format!("{}/v1/videos:annotate", self.endpoint))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let operation = read_operation(response).await?;
        if operation.name.is_empty() {
            return Err(TranscriberError::Service(
                "annotate response did not include an operation name".to_string(),
            ));
        }

        Ok(operation.name)
    }

    async fn annotate_and_wait(
        &self,
        video: &VideoReference,
    ) -> Result<Vec<SpeechSegment>, TranscriberError> {
        let operation_name = self.start_annotation(video).await?;

        tracing::info!(
            video = %video,
            operation = %operation_name,
            timeout_secs = self.operation_timeout.as_secs(),
            "Started speech transcription operation"
        );

        OperationProcessor::new(
            self.http.clone(),
            self.tokens.clone(),
            &self.endpoint,
            operation_name,
            self.poll,
        )
        .wait_for_completion()
        .await
    }
}

#[async_trait]
impl Transcriber for VideoIntelligenceClient {
    /// Token fetch, annotate call and polling all share one deadline
    async fn request_transcript(
        &self,
        video: &VideoReference,
    ) -> Result<Vec<SpeechSegment>, TranscriberError> {
        let seconds = self.operation_timeout.as_secs();
        tokio::time::timeout(self.operation_timeout, self.annotate_and_wait(video))
            .await
            .map_err(|_| {
                tracing::warn!(video = %video, timeout_secs = seconds, "Transcription timed out");
                TranscriberError::Timeout { seconds }
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotate_request_body() {
        let request = AnnotateVideoRequest {
            input_uri: "gs://bucket/clip.mp4",
            features: ["SPEECH_TRANSCRIPTION"],
            video_context: VideoContext {
                speech_transcription_config: SpeechTranscriptionConfig {
                    language_code: "en-US",
                    enable_automatic_punctuation: true,
                },
            },
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "inputUri": "gs://bucket/clip.mp4",
                "features": ["SPEECH_TRANSCRIPTION"],
                "videoContext": {
                    "speechTranscriptionConfig": {
                        "languageCode": "en-US",
                        "enableAutomaticPunctuation": true
                    }
                }
            })
        );
    }

    #[test]
    fn test_client_takes_poll_settings_from_config() {
        let mut config = Config::default();
        config.google.endpoint = "http://localhost:9000/".to_string();
        config.google.transcription.operation_timeout_secs = 42;

        let client =
            VideoIntelligenceClient::with_token_provider(&config, TokenProvider::fixed("t")).unwrap();
        assert_eq!(client.endpoint, "http://localhost:9000");
        assert_eq!(client.operation_timeout, Duration::from_secs(42));
        assert_eq!(client.poll.initial_interval, Duration::from_secs(5));
        assert_eq!(client.poll.max_interval, Duration::from_secs(30));
    }
}
