use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SubmissionError;
use crate::models::{Category, FeedbackText, TriageResult, UrgencyScore};

pub const CLASSIFY_DEADLINE: Duration = Duration::from_secs(35);

/// The authoritative triage oracle.
#[async_trait]
pub trait TriageClassifier: Send + Sync {
    async fn classify(&self, text: &FeedbackText) -> Result<TriageResult, SubmissionError>;
}

#[derive(Debug, Serialize)]
struct TriageRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TriageResponse {
    feedback_text: String,
    category: String,
    urgency_score: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Talks to the triage backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(CLASSIFY_DEADLINE)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/triage", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TriageClassifier for HttpClassifier {
    async fn classify(&self, text: &FeedbackText) -> Result<TriageResult, SubmissionError> {
        debug!(endpoint = %self.endpoint, chars = text.char_count(), "sending triage request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TriageRequest {
                text: text.as_str(),
            })
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.message);
            warn!(%status, ?message, "triage backend returned an error");
            return Err(SubmissionError::server(message));
        }

        let body = response
            .json::<TriageResponse>()
            .await
            .map_err(map_transport_error)?;
        into_result(body, text)
    }
}

fn map_transport_error(err: reqwest::Error) -> SubmissionError {
    if err.is_timeout() {
        SubmissionError::TimeoutError
    } else if err.is_connect() || err.is_request() {
        SubmissionError::NetworkError
    } else {
        warn!(error = %err, "unexpected triage client failure");
        SubmissionError::UnknownError
    }
}

fn into_result(body: TriageResponse, sent: &FeedbackText) -> Result<TriageResult, SubmissionError> {
    let urgency = UrgencyScore::try_from(body.urgency_score).map_err(|err| {
        warn!(error = %err, "triage backend returned an invalid urgency");
        SubmissionError::UnknownError
    })?;
    let feedback_text = FeedbackText::try_from(body.feedback_text.as_str())
        .unwrap_or_else(|_| sent.clone());

    Ok(TriageResult {
        feedback_text,
        category: Category::from_label(&body.category),
        urgency,
    })
}
