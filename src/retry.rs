//! Retry policies for job runs and individual steps
//!
//! A run as a whole and the data fetch step each carry their own
//! [`RetryConfig`]. The executor only decides *whether* and *when* to try
//! again; the operation itself stays a plain async function.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Retry configuration with backoff strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Delay before the first retry
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default)]
    pub jitter: bool,

    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Only retry errors matching one of these; empty retries everything
    #[serde(default)]
    pub retry_on: Vec<ErrorMatcher>,

    /// Maximum total time spent waiting between attempts
    #[serde(default, with = "humantime_serde")]
    pub retry_budget: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff: BackoffStrategy::default(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: false,
            jitter_factor: default_jitter_factor(),
            retry_on: Vec::new(),
            retry_budget: None,
        }
    }
}

impl RetryConfig {
    /// `retries` extra attempts after the first, `delay` apart.
    pub fn fixed(retries: u32, delay: Duration) -> Self {
        Self {
            attempts: retries + 1,
            backoff: BackoffStrategy::Fixed,
            initial_delay: delay,
            max_delay: delay,
            ..Default::default()
        }
    }

    /// Number of retries after the first attempt.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Backoff strategies for retry delays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    Linear {
        #[serde(with = "humantime_serde")]
        increment: Duration,
    },
    Exponential {
        #[serde(default = "default_exponential_base")]
        base: f64,
    },
    Fibonacci,
    /// Explicit delay per retry; falls back to `max_delay` when exhausted
    Custom { delays: Vec<Duration> },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base: default_exponential_base(),
        }
    }
}

/// Error patterns to match for retry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMatcher {
    Network,
    Timeout,
    /// HTTP 5xx errors
    ServerError,
    RateLimit,
    /// Custom regex pattern
    Pattern(String),
}

impl ErrorMatcher {
    /// Check if an error message matches this matcher
    pub fn matches(&self, error_msg: &str) -> bool {
        let error_lower = error_msg.to_lowercase();
        match self {
            ErrorMatcher::Network => {
                error_lower.contains("network")
                    || error_lower.contains("connection")
                    || error_lower.contains("refused")
                    || error_lower.contains("unreachable")
                    || error_lower.contains("dns")
            }
            ErrorMatcher::Timeout => {
                error_lower.contains("timeout") || error_lower.contains("timed out")
            }
            ErrorMatcher::ServerError => {
                error_lower.contains("500")
                    || error_lower.contains("502")
                    || error_lower.contains("503")
                    || error_lower.contains("504")
                    || error_lower.contains("server error")
            }
            ErrorMatcher::RateLimit => {
                error_lower.contains("rate limit")
                    || error_lower.contains("429")
                    || error_lower.contains("too many requests")
            }
            ErrorMatcher::Pattern(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(error_msg))
                .unwrap_or(false),
        }
    }
}

/// Runs an operation until it succeeds or the policy gives up
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: Arc<RwLock<RetryMetrics>>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(RwLock::new(RetryMetrics::default())),
        }
    }

    /// Run `operation` until it succeeds, the policy gives up, or it fails
    /// with an error for which `retryable` returns false.
    ///
    /// On final failure the error of the last attempt is returned unchanged.
    pub async fn execute_with_retry_when<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        context: &str,
        retryable: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        let mut total_delay = Duration::ZERO;

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => {
                    self.metrics.write().await.record_success(attempt);
                    return Ok(result);
                }
                Err(err) => {
                    let error_str = err.to_string();

                    if !retryable(&err) || !self.should_retry(&error_str, attempt) {
                        warn!("{} failed after {} attempt(s): {}", context, attempt, err);
                        self.metrics.write().await.record_failure(attempt);
                        return Err(err);
                    }

                    let delay = self.apply_jitter(self.calculate_delay(attempt));

                    if let Some(budget) = self.config.retry_budget {
                        if total_delay.saturating_add(delay) > budget {
                            warn!("Retry budget exhausted for {}", context);
                            self.metrics.write().await.record_failure(attempt);
                            return Err(err);
                        }
                    }

                    info!(
                        "Retrying {} (attempt {}/{}) after {:?}: {}",
                        context, attempt, self.config.attempts, delay, err
                    );

                    tokio::time::sleep(delay).await;
                    total_delay = total_delay.saturating_add(delay);
                    self.metrics.write().await.record_retry(attempt, delay);
                }
            }
        }
    }

    fn should_retry(&self, error_msg: &str, attempt: u32) -> bool {
        if attempt >= self.config.attempts {
            return false;
        }

        if self.config.retry_on.is_empty() {
            return true;
        }

        self.config
            .retry_on
            .iter()
            .any(|matcher| matcher.matches(error_msg))
    }

    /// Calculate delay for the given attempt, never above `max_delay`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let max_delay = self.config.max_delay;
        let steps = attempt.saturating_sub(1);
        let base_delay = match &self.config.backoff {
            BackoffStrategy::Fixed => self.config.initial_delay,
            BackoffStrategy::Linear { increment } => increment
                .checked_mul(steps)
                .and_then(|extra| self.config.initial_delay.checked_add(extra))
                .unwrap_or(max_delay),
            BackoffStrategy::Exponential { base } => {
                let multiplier = base.powi(steps.min(i32::MAX as u32) as i32);
                Duration::try_from_secs_f64(self.config.initial_delay.as_secs_f64() * multiplier)
                    .unwrap_or(max_delay)
            }
            BackoffStrategy::Fibonacci => self
                .config
                .initial_delay
                .checked_mul(fibonacci(attempt))
                .unwrap_or(max_delay),
            BackoffStrategy::Custom { delays } => delays
                .get(steps as usize)
                .copied()
                .unwrap_or(max_delay),
        };

        base_delay.min(max_delay)
    }

    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }

        let mut rng = rand::rng();
        let jitter_range = delay.as_secs_f64() * self.config.jitter_factor;
        let jitter = rng.random_range(-jitter_range / 2.0..=jitter_range / 2.0);
        Duration::try_from_secs_f64((delay.as_secs_f64() + jitter).max(0.0)).unwrap_or(delay)
    }

    pub async fn metrics(&self) -> RetryMetrics {
        self.metrics.read().await.clone()
    }
}

/// Retry metrics for observability
#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_attempts: u32,
    pub successful_attempts: u32,
    pub failed_attempts: u32,
    pub retries: Vec<(u32, Duration)>,
}

impl RetryMetrics {
    fn record_success(&mut self, attempt: u32) {
        self.total_attempts = attempt;
        self.successful_attempts += 1;
    }

    fn record_failure(&mut self, attempt: u32) {
        self.total_attempts = attempt;
        self.failed_attempts += 1;
    }

    fn record_retry(&mut self, attempt: u32, delay: Duration) {
        self.retries.push((attempt, delay));
    }
}

fn fibonacci(n: u32) -> u32 {
    match n {
        0 => 0,
        1 => 1,
        _ => {
            let mut a: u32 = 0;
            let mut b: u32 = 1;
            for _ in 2..=n {
                if b == u32::MAX {
                    break;
                }
                let temp = a.saturating_add(b);
                a = b;
                b = temp;
            }
            b
        }
    }
}

// Default functions for serde
fn default_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_jitter_factor() -> f64 {
    0.3
}

fn default_exponential_base() -> f64 {
    2.0
}
