//! HTTP client with bounded retry logic for the feed collectors.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use triage_errors::{CollectError, Error, NetworkError};

/// Retry knobs, overridable through the process environment.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_sleep: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_sleep: Duration::from_secs(1),
            timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Read overrides from `TRIAGE_HTTP_MAX_ATTEMPTS`,
    /// `TRIAGE_HTTP_RETRY_SLEEP_SECONDS`, and `TRIAGE_HTTP_TIMEOUT_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns an error when a set variable is not an integer inside its
    /// documented bounds.
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Self::default();
        Ok(Self {
            max_attempts: env_u64("TRIAGE_HTTP_MAX_ATTEMPTS", u64::from(defaults.max_attempts), 1, 10)?
                .try_into()
                .unwrap_or(u32::MAX),
            retry_sleep: Duration::from_secs(env_u64(
                "TRIAGE_HTTP_RETRY_SLEEP_SECONDS",
                defaults.retry_sleep.as_secs(),
                0,
                60,
            )?),
            timeout: Duration::from_secs(env_u64(
                "TRIAGE_HTTP_TIMEOUT_SECONDS",
                defaults.timeout.as_secs(),
                1,
                120,
            )?),
        })
    }
}

fn env_u64(var: &str, default: u64, min: u64, max: u64) -> Result<u64, Error> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(default);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    let parsed: u64 = raw.parse().map_err(|_| CollectError::InvalidEnv {
        var: var.to_string(),
        message: "must be an integer".to_string(),
    })?;
    if parsed < min || parsed > max {
        return Err(CollectError::InvalidEnv {
            var: var.to_string(),
            message: format!("must be between {min} and {max}"),
        }
        .into());
    }
    Ok(parsed)
}

/// Thin reqwest wrapper that retries transient failures with a fixed sleep.
pub struct FeedClient {
    client: Client,
    policy: RetryPolicy,
}

impl FeedClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(policy: RetryPolicy) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .connect_timeout(policy.timeout)
            .user_agent(concat!("triage-scanner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::RequestFailed {
                message: e.to_string(),
            })?;
        Ok(Self { client, policy })
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Execute a request with retries and decode the JSON body.
    ///
    /// Returns the payload together with the number of attempts used, which
    /// collectors record in their run metadata.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt once the retry
    /// budget is exhausted; non-2xx statuses are never retried away.
    pub async fn json_with_retry<F>(&self, build: F, label: &str) -> Result<(Value, u32), Error>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 && !self.policy.retry_sleep.is_zero() {
                tokio::time::sleep(self.policy.retry_sleep).await;
            }

            match self.attempt(build(&self.client)).await {
                Ok(payload) => return Ok((payload, attempt)),
                Err(error) => {
                    debug!(label, attempt, %error, "request attempt failed");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            NetworkError::RequestFailed {
                message: format!("{label}: no attempts were made"),
            }
            .into()
        }))
    }

    async fn attempt(&self, request: RequestBuilder) -> Result<Value, Error> {
        let response = request.send().await.map_err(classify)?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let seconds = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            return Err(NetworkError::RateLimited { seconds }.into());
        }

        let url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                url,
            }
            .into());
        }

        response.json::<Value>().await.map_err(classify)
    }
}

fn classify(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        return NetworkError::Timeout {
            url: error
                .url()
                .map(std::string::ToString::to_string)
                .unwrap_or_default(),
        }
        .into();
    }
    NetworkError::RequestFailed {
        message: error.to_string(),
    }
    .into()
}
