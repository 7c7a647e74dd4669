use std::{fmt, sync::Arc, time::Duration};

use serde::Serialize;

use crate::foundation::core::ImageSize;
use crate::foundation::error::{CraftError, CraftResult};
use crate::generation::provider::{FailureKind, ImageProvider, build_providers};
use crate::model::config::{GenerationConfig, MAX_PROVIDERS};

/// Source of backoff sleeps. Swapped for a recording clock in tests.
pub trait Clock: Send + Sync {
    fn sleep(&self, d: Duration);
}

/// Real wall-clock sleeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
}

/// Record of one provider call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerationAttempt {
    /// 1-based, counted per provider.
    pub attempt_number: u32,
    pub provider: String,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

/// Successful generation: encoded bytes plus the attempt log that produced them.
#[derive(Clone, Debug)]
pub struct GenerationOutput {
    pub bytes: Vec<u8>,
    pub provider: String,
    pub attempts: Vec<GenerationAttempt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// Every configured provider used up its attempts on retryable failures.
    Exhausted,
    /// A non-retryable failure stopped the sequence.
    Fatal(FailureKind),
    /// No provider is configured.
    NoProviders,
    /// The provider returned bytes that do not decode as an image.
    Undecodable,
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("exhausted"),
            Self::Fatal(kind) => write!(f, "fatal ({kind})"),
            Self::NoProviders => f.write_str("no providers configured"),
            Self::Undecodable => f.write_str("undecodable output"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("generation {kind} after {} attempt(s){}", .attempts.len(), detail_suffix(.detail))]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub attempts: Vec<GenerationAttempt>,
    /// Message of the last provider failure, if any.
    pub detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Attempt budget and backoff base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per provider, >= 1.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &GenerationConfig) -> Self {
        Self {
            max_retries: cfg.max_retries.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
        }
    }

    /// Delay after the failed attempt with 0-based index `k`: `base * 2^k`.
    pub fn delay_after(&self, k: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << k.min(31))
    }
}

/// Next step after a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Sleep, then try the same provider again.
    Retry { delay: Duration },
    /// Move to the fallback provider immediately, attempt counter reset.
    SwitchProvider,
    /// Retryable failure on the last attempt of the last provider.
    Exhausted,
    /// Fatal failure; no retry, no fallback.
    Abort,
}

/// Retry/fallback state: which provider, which attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    pub provider_index: usize,
    /// 0-based attempt index within the current provider.
    pub attempt: u32,
}

impl RetryState {
    pub fn on_failure(
        &mut self,
        kind: FailureKind,
        policy: &RetryPolicy,
        provider_count: usize,
    ) -> Transition {
        if !kind.is_retryable() {
            return Transition::Abort;
        }
        let failed = self.attempt;
        if failed + 1 < policy.max_retries {
            self.attempt += 1;
            return Transition::Retry {
                delay: policy.delay_after(failed),
            };
        }
        if self.provider_index + 1 < provider_count {
            self.provider_index += 1;
            self.attempt = 0;
            return Transition::SwitchProvider;
        }
        Transition::Exhausted
    }
}

/// Generation with bounded retries and a single provider fallback.
pub struct GenerationClient {
    providers: Vec<Box<dyn ImageProvider>>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl GenerationClient {
    pub fn new(providers: Vec<Box<dyn ImageProvider>>, policy: RetryPolicy) -> CraftResult<Self> {
        if providers.len() > MAX_PROVIDERS {
            return Err(CraftError::config(format!(
                "at most {MAX_PROVIDERS} generation providers are supported, got {}",
                providers.len()
            )));
        }
        if policy.max_retries == 0 {
            return Err(CraftError::config("max_retries must be >= 1"));
        }
        Ok(Self {
            providers,
            policy,
            clock: Arc::new(SystemClock),
        })
    }

    /// Build HTTP providers from configuration.
    pub fn from_config(cfg: &GenerationConfig) -> CraftResult<Self> {
        Self::new(build_providers(cfg)?, RetryPolicy::from_config(cfg))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run the retry state machine until success, a fatal failure, or exhaustion.
    pub fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
    ) -> Result<GenerationOutput, GenerationError> {
        if self.providers.is_empty() {
            return Err(GenerationError {
                kind: GenerationErrorKind::NoProviders,
                attempts: Vec::new(),
                detail: None,
            });
        }

        let mut state = RetryState::default();
        let mut attempts = Vec::new();
        loop {
            let provider = &self.providers[state.provider_index];
            let attempt_number = state.attempt + 1;
            tracing::debug!(provider = provider.name(), attempt_number, %size, "generation attempt");

            let failure = match provider.generate(prompt, size) {
                Ok(bytes) => {
                    attempts.push(GenerationAttempt {
                        attempt_number,
                        provider: provider.name().to_owned(),
                        outcome: AttemptOutcome::Success,
                        failure: None,
                    });
                    tracing::info!(
                        provider = provider.name(),
                        attempts = attempts.len(),
                        bytes = bytes.len(),
                        "image generated"
                    );
                    return Ok(GenerationOutput {
                        bytes,
                        provider: provider.name().to_owned(),
                        attempts,
                    });
                }
                Err(failure) => failure,
            };

            attempts.push(GenerationAttempt {
                attempt_number,
                provider: provider.name().to_owned(),
                outcome: if failure.kind.is_retryable() {
                    AttemptOutcome::RetryableFailure
                } else {
                    AttemptOutcome::FatalFailure
                },
                failure: Some(failure.kind),
            });

            match state.on_failure(failure.kind, &self.policy, self.providers.len()) {
                Transition::Retry { delay } => {
                    tracing::warn!(
                        provider = provider.name(),
                        attempt_number,
                        error = %failure,
                        delay_ms = delay.as_millis() as u64,
                        "retryable generation failure; backing off"
                    );
                    self.clock.sleep(delay);
                }
                Transition::SwitchProvider => {
                    tracing::warn!(
                        from = provider.name(),
                        to = self.providers[state.provider_index].name(),
                        error = %failure,
                        "provider exhausted; falling back"
                    );
                }
                Transition::Exhausted => {
                    tracing::error!(attempts = attempts.len(), error = %failure, "generation exhausted");
                    return Err(GenerationError {
                        kind: GenerationErrorKind::Exhausted,
                        attempts,
                        detail: Some(failure.to_string()),
                    });
                }
                Transition::Abort => {
                    tracing::error!(provider = provider.name(), error = %failure, "fatal generation failure");
                    return Err(GenerationError {
                        kind: GenerationErrorKind::Fatal(failure.kind),
                        attempts,
                        detail: Some(failure.to_string()),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/generation/client.rs"]
mod tests;
