use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompletionError {
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("maximum context length exceeded: {message}")]
    ContextLength { message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Failures the outer attempt loop may retry unchanged. Anything the
    /// service itself reported, other than a rate limit, is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::ContextLength { .. } => "context_length",
            Self::Transport(_) => "transport",
            Self::Server { .. } => "server",
            Self::Api { .. } => "api",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("prompt still exceeds context after {shrinks} reductions: {message}")]
    ContextExhausted { shrinks: u32, message: String },

    #[error("gave up after {attempts} attempts: {last}")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        last: CompletionError,
    },

    #[error("request rejected: {0}")]
    Rejected(#[source] CompletionError),
}

impl FetchError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::ContextExhausted { .. } => "context_exhausted",
            Self::AttemptsExhausted { .. } => "attempts_exhausted",
            Self::Rejected(_) => "rejected",
        }
    }
}
