use crate::nats::dead_letter::{DeadLetter, DeadLetterPublisher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// Failure of a message handler, split by whether a retry can help.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Undeserializable or missing required fields. Retrying the same bytes
    /// cannot succeed, so these bypass retry and go straight to dead-letter.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Anything else (transient dependency failure, publish error). Retried
    /// up to the configured bound.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<crate::domain::DomainError> for ProcessError {
    fn from(e: crate::domain::DomainError) -> Self {
        use crate::domain::DomainError;
        match e {
            DomainError::InvalidSample(reason) | DomainError::InvalidAlert(reason) => {
                Self::Malformed(reason)
            }
            other => Self::Failed(anyhow::Error::new(other)),
        }
    }
}

/// A consumption-point handler. Implementations deserialize the payload and
/// run it through the domain, reporting failures as [`ProcessError`].
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, subject: &str, payload: &[u8]) -> Result<(), ProcessError>;
}

/// How a message left the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Handled,
    DeadLettered,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Wraps a consumption point with bounded retry and dead-letter redirection.
///
/// The handler is invoked at most `max_retries + 1` times with a fixed
/// backoff between attempts; exhaustion (or a malformed payload, after one
/// attempt) redirects the message to the dead-letter destination so the
/// stream is not blocked. An `Err` return means the dead-letter publish
/// itself failed and the message must NOT be acknowledged.
pub struct RetrySupervisor {
    stream: String,
    policy: RetryPolicy,
    handler: Arc<dyn MessageHandler>,
    dead_letters: Arc<dyn DeadLetterPublisher>,
}

impl RetrySupervisor {
    pub fn new(
        stream: impl Into<String>,
        policy: RetryPolicy,
        handler: Arc<dyn MessageHandler>,
        dead_letters: Arc<dyn DeadLetterPublisher>,
    ) -> Self {
        Self {
            stream: stream.into(),
            policy,
            handler,
            dead_letters,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub async fn process(&self, subject: &str, payload: &[u8]) -> Result<Disposition> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.handler.handle(subject, payload).await {
                Ok(()) => return Ok(Disposition::Handled),
                Err(ProcessError::Malformed(reason)) => {
                    warn!(
                        stream = %self.stream,
                        subject = %subject,
                        attempt = attempts,
                        error = %reason,
                        "Malformed message, redirecting to dead letter"
                    );
                    self.redirect(subject, payload, attempts, &reason).await?;
                    return Ok(Disposition::DeadLettered);
                }
                Err(ProcessError::Failed(e)) if attempts <= self.policy.max_retries => {
                    warn!(
                        stream = %self.stream,
                        subject = %subject,
                        attempt = attempts,
                        max_retries = self.policy.max_retries,
                        error = %e,
                        "Handler failed, retrying after backoff"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(ProcessError::Failed(e)) => {
                    error!(
                        stream = %self.stream,
                        subject = %subject,
                        attempts = attempts,
                        error = %e,
                        "Retries exhausted, redirecting to dead letter"
                    );
                    self.redirect(subject, payload, attempts, &format!("{e:#}"))
                        .await?;
                    return Ok(Disposition::DeadLettered);
                }
            }
        }
    }

    async fn redirect(
        &self,
        subject: &str,
        payload: &[u8],
        attempts: u32,
        reason: &str,
    ) -> Result<()> {
        let letter = DeadLetter {
            stream: self.stream.clone(),
            subject: subject.to_string(),
            error: reason.to_string(),
            attempts,
            failed_at: Utc::now(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        };
        self.dead_letters
            .publish(&letter)
            .await
            .context("Failed to redirect message to dead letter")
    }
}
