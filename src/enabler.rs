//! Account-Level Scan Enablement
//!
//! The lifecycle controller behind the custom resource: decides which remote
//! action (if any) an event requires, classifies the outcome of the enable
//! call, and retries transient failures with bounded exponential backoff.
//!
//! The controller is stateless across invocations; everything it needs is in
//! the incoming event plus its static configuration. Safety comes from the
//! idempotency of the remote enable operation and the constant sentinel
//! identifier, not from any local bookkeeping.

use crate::client::{ClientError, InspectorClient};
use crate::event::{LifecycleEvent, ResourceCategory, PHYSICAL_RESOURCE_ID};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Classified failure of an enable invocation
#[derive(Error, Debug)]
pub enum EnableError {
    #[error("enable failed after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: ClientError,
    },
    #[error("permission denied: {0}")]
    PermissionDenied(#[source] ClientError),
    #[error("invalid request: {0}")]
    InvalidRequest(#[source] ClientError),
    #[error("unexpected error: {0}")]
    Unknown(#[source] ClientError),
}

/// How a single failed remote call should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The feature (or a requested category) is already active; not an error
    AlreadyEnabled,
    /// Propagation delay, throttling, timeout, or server-side failure
    Transient,
    /// The caller lacks rights to enable scanning; retrying cannot help
    PermissionDenied,
    /// Malformed or unsupported request
    InvalidRequest,
    /// Anything the taxonomy does not recognize; surfaced as fatal
    Unknown,
}

/// Classify a failed enable call.
///
/// The narrow transient carve-out for access denials exists because the
/// service-linked role the enable call depends on is created on first use
/// and may not have propagated right after account onboarding.
pub fn classify(err: &ClientError) -> ErrorClass {
    match err {
        ClientError::Http(e) if e.is_timeout() || e.is_connect() => ErrorClass::Transient,
        ClientError::Http(_) => ErrorClass::Unknown,
        ClientError::Serialization(_) => ErrorClass::Unknown,
        ClientError::Api {
            status,
            code,
            message,
        } => {
            let code = code.as_deref().unwrap_or("");
            let message = message.to_ascii_lowercase();

            if code == "ConflictException"
                || code == "ALREADY_ENABLED"
                || message.contains("already enabled")
            {
                ErrorClass::AlreadyEnabled
            } else if code == "AccessDeniedException" || code == "ACCESS_DENIED" {
                if message.contains("service-linked role")
                    || message.contains("servicelinkedrole")
                    || message.contains("awsserviceroleforamazoninspector")
                {
                    ErrorClass::Transient
                } else {
                    ErrorClass::PermissionDenied
                }
            } else if code == "ValidationException" || *status == 400 {
                ErrorClass::InvalidRequest
            } else if code == "ThrottlingException"
                || code == "InternalServerException"
                || code == "INTERNAL_ERROR"
                || code.contains("THROTTLED")
                || *status == 429
                || *status >= 500
            {
                ErrorClass::Transient
            } else {
                ErrorClass::Unknown
            }
        }
    }
}

/// Bounded exponential backoff for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following the given attempt (1-based):
    /// base, 2x base, 4x base, capped at `max_delay`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

/// Seam between the lifecycle controller and the management API.
///
/// The enable operation is idempotent on the remote side. That is a
/// documented precondition of the management API, not something the
/// controller verifies; tests supply scripted fakes through this trait.
#[async_trait]
pub trait ScanApi: Send + Sync {
    async fn enable(&self, categories: &[ResourceCategory]) -> Result<(), ClientError>;
}

#[async_trait]
impl ScanApi for InspectorClient {
    async fn enable(&self, categories: &[ResourceCategory]) -> Result<(), ClientError> {
        InspectorClient::enable(self, categories).await
    }
}

/// Lifecycle controller for the account-level enablement custom resource
pub struct Enabler<A: ScanApi> {
    api: A,
    categories: Vec<ResourceCategory>,
    retry: RetryPolicy,
}

impl<A: ScanApi> Enabler<A> {
    pub fn new(api: A, categories: Vec<ResourceCategory>, retry: RetryPolicy) -> Self {
        Self {
            api,
            categories,
            retry,
        }
    }

    /// Handle one lifecycle event, producing the physical identifier
    pub async fn handle(&self, event: &LifecycleEvent) -> Result<String, EnableError> {
        match event {
            LifecycleEvent::Create { categories } => {
                self.enable_with_retry(categories.as_deref()).await?;
                Ok(PHYSICAL_RESOURCE_ID.to_string())
            }
            LifecycleEvent::Update { categories, .. } => {
                // Same sentinel as the original Create, even when the
                // category set changed, so the framework never plans a
                // replacement.
                self.enable_with_retry(categories.as_deref()).await?;
                Ok(PHYSICAL_RESOURCE_ID.to_string())
            }
            LifecycleEvent::Delete {
                physical_resource_id,
            } => {
                // Disabling account-wide scanning on stack teardown would
                // silently remove security coverage, so deletion takes no
                // remote action.
                tracing::info!("delete is a no-op, scanning stays enabled");
                Ok(physical_resource_id
                    .clone()
                    .unwrap_or_else(|| PHYSICAL_RESOURCE_ID.to_string()))
            }
        }
    }

    async fn enable_with_retry(
        &self,
        requested: Option<&[ResourceCategory]>,
    ) -> Result<(), EnableError> {
        let categories = requested.unwrap_or(&self.categories);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.api.enable(categories).await {
                Ok(()) => {
                    tracing::info!(attempt, ?categories, "scan enablement requested");
                    return Ok(());
                }
                Err(e) => match classify(&e) {
                    ErrorClass::AlreadyEnabled => {
                        tracing::info!(attempt, "scanning already enabled, treating as success");
                        return Ok(());
                    }
                    ErrorClass::Transient => {
                        if attempt >= self.retry.max_attempts {
                            tracing::error!(
                                attempt,
                                error = %e,
                                "enable failed after exhausting retries"
                            );
                            return Err(EnableError::Transient {
                                attempts: attempt,
                                source: e,
                            });
                        }

                        let delay = self.retry.delay(attempt);
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "transient enable failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    ErrorClass::PermissionDenied => {
                        tracing::error!(error = %e, "caller is not permitted to enable scanning");
                        return Err(EnableError::PermissionDenied(e));
                    }
                    ErrorClass::InvalidRequest => {
                        tracing::error!(error = %e, "enable request rejected as invalid");
                        return Err(EnableError::InvalidRequest(e));
                    }
                    ErrorClass::Unknown => {
                        tracing::error!(error = %e, "unclassified enable failure");
                        return Err(EnableError::Unknown(e));
                    }
                },
            }
        }
    }
}
