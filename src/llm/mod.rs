use std::time::Duration;

mod client;
mod error;
mod openai;

pub use client::{ResilientClient, RetryPolicy, RetryState};
pub use error::{CompletionError, FetchError};
pub use openai::{DEFAULT_OPENAI_API_BASE, OpenAiBackend};

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const SYSTEM_PROMPT: &str = "You are an expert metadata generator.";

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: &str, prompt: String, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            system: SYSTEM_PROMPT.to_string(),
            prompt,
            max_tokens,
            temperature,
        }
    }
}

pub trait CompletionBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
