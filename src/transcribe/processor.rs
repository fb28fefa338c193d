use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::auth::TokenProvider;
use super::{SpeechAlternative, SpeechSegment, WordSpan};
use crate::utils::{parse_proto_duration, poll_delay};
use crate::TranscriberError;

/// Long-running operation as returned by `videos:annotate` and `operations.get`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<Status>,
    pub response: Option<AnnotateVideoResponse>,
}

/// google.rpc.Status
#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Status {
    fn describe(&self) -> String {
        format!("{} (code {})", self.message, self.code)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnnotateVideoResponse {
    #[serde(default)]
    annotation_results: Vec<VideoAnnotationResults>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoAnnotationResults {
    #[serde(default)]
    speech_transcriptions: Vec<ApiSpeechTranscription>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSpeechTranscription {
    #[serde(default)]
    alternatives: Vec<ApiAlternative>,
    language_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    words: Vec<ApiWordInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiWordInfo {
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    word: String,
}

/// Polling schedule for one operation
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

/// Waits for an annotate operation and decodes its speech transcriptions
pub struct OperationProcessor {
    client: Client,
    tokens: Arc<TokenProvider>,
    operation_url: String,
    operation_name: String,
    settings: PollSettings,
}

impl OperationProcessor {
    pub fn new(
        client: Client,
        tokens: Arc<TokenProvider>,
        endpoint: &str,
        operation_name: String,
        settings: PollSettings,
    ) -> Self {
        let operation_url = format!("{}/v1/{}", endpoint.trim_end_matches('/'), operation_name);
        Self {
            client,
            tokens,
            operation_url,
            operation_name,
            settings,
        }
    }

    /// Poll until the operation is done and decode its result. The caller bounds the wait.
    pub async fn wait_for_completion(&self) -> Result<Vec<SpeechSegment>, TranscriberError> {
        let started = Instant::now();
        let operation = self.poll_until_done().await?;

        tracing::info!(
            operation = %self.operation_name,
            elapsed_secs = started.elapsed().as_secs(),
            "Transcription operation finished"
        );

        process_operation(operation)
    }

    async fn poll_until_done(&self) -> Result<Operation, TranscriberError> {
        let mut check_count: u32 = 0;

        loop {
            check_count += 1;

            let operation = self.get_operation().await?;
            if operation.done {
                return Ok(operation);
            }

            let wait_time = poll_delay(
                check_count,
                self.settings.initial_interval,
                self.settings.max_interval,
            );
            tracing::debug!(
                operation = %self.operation_name,
                check = check_count,
                wait_secs = wait_time.as_secs(),
                "Transcription in progress"
            );
            sleep(wait_time).await;
        }
    }

    /// Get operation status
    async fn get_operation(&self) -> Result<Operation, TranscriberError> {
        let token = self.tokens.token(&self.client).await?;
        let response = self
            .client
            .get(&self.operation_url)
            .bearer_auth(token)
            .send()
            .await?;

        read_operation(response).await
    }
}

/// Decode an operation reply, turning HTTP failures into service errors
pub(crate) async fn read_operation(response: reqwest::Response) -> Result<Operation, TranscriberError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: Status,
        }
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error.describe())
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(TranscriberError::Service(format!(
            "Video Intelligence returned HTTP {}: {}",
            status.as_u16(),
            detail
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        TranscriberError::Unexpected(anyhow::anyhow!("Failed to parse operation JSON: {}", e))
    })
}

/// Extract speech segments from a finished operation
pub(crate) fn process_operation(operation: Operation) -> Result<Vec<SpeechSegment>, TranscriberError> {
    if let Some(error) = operation.error {
        return Err(TranscriberError::Service(error.describe()));
    }

    let Some(first) = operation
        .response
        .and_then(|r| r.annotation_results.into_iter().next())
    else {
        return Ok(Vec::new());
    };

    if let Some(error) = first.error {
        return Err(TranscriberError::Service(error.describe()));
    }

    first
        .speech_transcriptions
        .into_iter()
        .map(convert_transcription)
        .collect()
}

fn convert_transcription(api: ApiSpeechTranscription) -> Result<SpeechSegment, TranscriberError> {
    let alternatives = api
        .alternatives
        .into_iter()
        .map(|alt| -> Result<SpeechAlternative, TranscriberError> {
            let words = alt
                .words
                .into_iter()
                .map(convert_word)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SpeechAlternative {
                transcript: alt.transcript,
                confidence: alt.confidence,
                words,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SpeechSegment {
        alternatives,
        language_code: api.language_code,
    })
}

fn convert_word(word: ApiWordInfo) -> Result<WordSpan, TranscriberError> {
    let start = word.start_time.as_deref().map(parse_proto_duration).transpose()?;
    let end = word.end_time.as_deref().map(parse_proto_duration).transpose()?;
    Ok(WordSpan {
        text: word.word,
        start_seconds: start.unwrap_or(0.0),
        end_seconds: end.unwrap_or(0.0),
    })
}
