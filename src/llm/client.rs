use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use super::{CompletionBackend, CompletionError, CompletionRequest, FetchError, Pause, ThreadPause};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_multiplier: f64,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub max_shrinks: u32,
    pub default_retry_after: Duration,
    pub politeness_min: Duration,
    pub politeness_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_multiplier: 1.0,
            min_backoff: Duration::from_secs(4),
            max_backoff: Duration::from_secs(60),
            max_shrinks: 3,
            default_retry_after: Duration::from_secs(60),
            politeness_min: Duration::from_secs(1),
            politeness_max: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based):
    /// `multiplier * 2^(attempt - 1)` seconds, clamped to the bounds.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let seconds = self.backoff_multiplier * 2f64.powi(exponent);
        Duration::from_secs_f64(seconds).clamp(self.min_backoff, self.max_backoff)
    }
}

/// Shrink state carried across context-overflow retries. `attempt` counts
/// reductions already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
    pub attempt: u32,
    pub prompt: String,
    pub max_tokens: u32,
}

impl RetryState {
    pub fn new(prompt: &str, max_tokens: u32) -> Self {
        Self {
            attempt: 0,
            prompt: prompt.to_string(),
            max_tokens,
        }
    }

    pub fn shrink(&mut self) {
        let keep = self.prompt.chars().count() / 2;
        self.prompt = self.prompt.chars().take(keep).collect();
        self.max_tokens = (self.max_tokens / 2).max(1);
        self.attempt += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub attempts: u32,
    pub shrinks: u32,
    pub prompt_chars: usize,
    pub max_tokens: u32,
}

enum AttemptError {
    Transient(CompletionError),
    Terminal(FetchError),
}

pub struct ResilientClient<B, P = ThreadPause> {
    backend: B,
    pause: P,
    policy: RetryPolicy,
}

impl<B: CompletionBackend> ResilientClient<B, ThreadPause> {
    pub fn new(backend: B) -> Self {
        Self::with_pause(backend, ThreadPause, RetryPolicy::default())
    }
}

impl<B: CompletionBackend, P: Pause> ResilientClient<B, P> {
    pub fn with_pause(backend: B, pause: P, policy: RetryPolicy) -> Self {
        Self {
            backend,
            pause,
            policy,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn pauser(&self) -> &P {
        &self.pause
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn fetch(&self, request: &CompletionRequest) -> Result<Completion, FetchError> {
        let mut state = RetryState::new(&request.prompt, request.max_tokens);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            debug!(
                attempt = attempts,
                prompt_chars = state.prompt.chars().count(),
                max_tokens = state.max_tokens,
                "requesting completion"
            );

            match self.attempt(request, &mut state) {
                Ok(content) => {
                    self.pause_politely();
                    return Ok(Completion {
                        content,
                        attempts,
                        shrinks: state.attempt,
                        prompt_chars: state.prompt.chars().count(),
                        max_tokens: state.max_tokens,
                    });
                }
                Err(AttemptError::Terminal(err)) => return Err(err),
                Err(AttemptError::Transient(err)) => {
                    if attempts >= self.policy.max_attempts {
                        warn!(attempts, error = %err, "completion attempts exhausted");
                        return Err(FetchError::AttemptsExhausted {
                            attempts,
                            last: err,
                        });
                    }

                    let delay = self.policy.backoff(attempts);
                    warn!(
                        attempt = attempts,
                        max_attempts = self.policy.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        category = err.category(),
                        error = %err,
                        "completion failed, retrying"
                    );
                    self.pause.pause(delay);
                }
            }
        }
    }

    fn attempt(
        &self,
        request: &CompletionRequest,
        state: &mut RetryState,
    ) -> Result<String, AttemptError> {
        loop {
            let call = CompletionRequest {
                prompt: state.prompt.clone(),
                max_tokens: state.max_tokens,
                ..request.clone()
            };

            match self.backend.complete(&call) {
                Ok(content) => return Ok(content),
                Err(CompletionError::ContextLength { message }) => {
                    if state.attempt >= self.policy.max_shrinks {
                        warn!(shrinks = state.attempt, "context length still exceeded");
                        return Err(AttemptError::Terminal(FetchError::ContextExhausted {
                            shrinks: state.attempt,
                            message,
                        }));
                    }
                    state.shrink();
                    info!(
                        shrinks = state.attempt,
                        prompt_chars = state.prompt.chars().count(),
                        max_tokens = state.max_tokens,
                        "context length exceeded, retrying with reduced prompt"
                    );
                }
                Err(CompletionError::RateLimited {
                    message,
                    retry_after,
                }) => {
                    let wait = retry_after.unwrap_or(self.policy.default_retry_after);
                    warn!(wait_secs = wait.as_secs_f64(), "rate limit reached");
                    self.pause.pause(wait);
                    return Err(AttemptError::Transient(CompletionError::RateLimited {
                        message,
                        retry_after,
                    }));
                }
                Err(err) if err.is_transient() => return Err(AttemptError::Transient(err)),
                Err(err) => {
                    warn!(category = err.category(), error = %err, "error during completion request");
                    return Err(AttemptError::Terminal(FetchError::Rejected(err)));
                }
            }
        }
    }

    fn pause_politely(&self) {
        let (min, max) = (self.policy.politeness_min, self.policy.politeness_max);
        if max <= min {
            self.pause.pause(min);
            return;
        }

        let seconds = rand::thread_rng().gen_range(min.as_secs_f64()..max.as_secs_f64());
        debug!(delay_secs = seconds, "pausing after completion");
        self.pause.pause(Duration::from_secs_f64(seconds));
    }
}
