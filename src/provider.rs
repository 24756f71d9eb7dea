//! Custom Resource Provider Implementation
//!
//! Parses framework lifecycle events, runs them through the enablement
//! controller, and renders the framework response. Every input line yields
//! exactly one well-formed response object, including on parse and
//! validation failures.

use crate::client::InspectorClient;
use crate::enabler::{Enabler, RetryPolicy};
use crate::event::{CustomResourceEvent, CustomResourceResponse, ResourceCategory};
use std::time::Duration;
use tokio::runtime::Runtime;

/// Provider configuration, fixed at deployment time
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_token: Option<String>,
    pub resource_types: Vec<ResourceCategory>,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

/// Scan enablement provider
pub struct EnablementProvider {
    enabler: Enabler<InspectorClient>,
    runtime: Runtime,
}

impl EnablementProvider {
    /// Create a new provider
    pub fn new(config: ProviderConfig) -> Self {
        let mut client =
            InspectorClient::new(&config.endpoint).with_timeout(config.request_timeout);
        if let Some(token) = &config.api_token {
            client = client.with_token(token);
        }

        let runtime = Runtime::new().expect("Failed to create Tokio runtime");

        Self {
            enabler: Enabler::new(client, config.resource_types, config.retry),
            runtime,
        }
    }

    /// Handle one framework event, returning the serialized response
    pub fn handle_request(&self, input: &str) -> String {
        let event: CustomResourceEvent = match serde_json::from_str(input) {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(error = %e, "failed to parse lifecycle event");
                return render(CustomResourceResponse::failed(&format!(
                    "Malformed event: {}",
                    e
                )));
            }
        };

        tracing::info!(
            request_type = %event.request_type,
            request_id = event.request_id.as_deref(),
            logical_resource_id = event.logical_resource_id.as_deref(),
            "received lifecycle event"
        );

        let lifecycle = match event.validate() {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "rejected lifecycle event");
                return render(
                    CustomResourceResponse::failed(&e.to_string()).with_context(&event),
                );
            }
        };

        let response = match self.runtime.block_on(self.enabler.handle(&lifecycle)) {
            Ok(id) => {
                tracing::info!(physical_resource_id = %id, "lifecycle event succeeded");
                CustomResourceResponse::success(&id)
            }
            Err(e) => {
                tracing::error!(error = %e, "lifecycle event failed");
                CustomResourceResponse::failed(&e.to_string())
            }
        };

        render(response.with_context(&event))
    }
}

/// Emitted when the response itself cannot be serialized, so the caller
/// still receives one well-formed object per event.
const FALLBACK_RESPONSE: &str = r#"{"Status":"FAILED","Reason":"response serialization failed"}"#;

fn render(response: CustomResourceResponse) -> String {
    serde_json::to_string(&response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        FALLBACK_RESPONSE.to_string()
    })
}
