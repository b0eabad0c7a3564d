use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde_json::json;

use super::{CompletionBackend, CompletionError, CompletionRequest};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const CONTEXT_LENGTH_MARKER: &str = "maximum context length";
const CONTEXT_LENGTH_CODE: &str = "context_length_exceeded";

pub struct OpenAiBackend {
    client: Client,
    api_base: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build completion http client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl CompletionBackend for OpenAiBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let raw = response
            .text()
            .map_err(|err| CompletionError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status, retry_after.as_deref(), &raw));
        }

        extract_content(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    code: Option<String>,
}

pub(super) fn extract_content(raw: &str) -> Result<String, CompletionError> {
    let response: ChatResponse = serde_json::from_str(raw)
        .map_err(|err| CompletionError::InvalidResponse(format!("undecodable body: {err}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| CompletionError::InvalidResponse("response carried no message".to_string()))
}

pub(super) fn classify_failure(
    status: StatusCode,
    retry_after: Option<&str>,
    raw: &str,
) -> CompletionError {
    let (message, code) = match serde_json::from_str::<ErrorEnvelope>(raw) {
        Ok(envelope) => (envelope.error.message, envelope.error.code),
        Err(_) => (raw.trim().to_string(), None),
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return CompletionError::RateLimited {
            message,
            retry_after: retry_after
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        };
    }

    if message.contains(CONTEXT_LENGTH_MARKER) || code.as_deref() == Some(CONTEXT_LENGTH_CODE) {
        return CompletionError::ContextLength { message };
    }

    if status.is_server_error() {
        return CompletionError::Server {
            status: status.as_u16(),
            message,
        };
    }

    CompletionError::Api {
        status: status.as_u16(),
        message,
    }
}
