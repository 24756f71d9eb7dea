//! Custom Resource Wire Types
//!
//! Defines the lifecycle event and response types exchanged with the
//! provisioning framework's custom-resource provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable physical identifier for the account-level enablement.
///
/// The enable operation has no per-call identifier, so the provider returns
/// this fixed sentinel on every successful Create and Update. Returning the
/// same value keeps the framework from ever planning a replacement.
pub const PHYSICAL_RESOURCE_ID: &str = "EnableInspector2";

/// Resource category covered by account-level scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceCategory {
    #[serde(rename = "EC2")]
    Ec2,
    #[serde(rename = "ECR")]
    Ecr,
    #[serde(rename = "LAMBDA")]
    Lambda,
    #[serde(rename = "LAMBDA_CODE")]
    LambdaCode,
}

impl ResourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Ec2 => "EC2",
            ResourceCategory::Ecr => "ECR",
            ResourceCategory::Lambda => "LAMBDA",
            ResourceCategory::LambdaCode => "LAMBDA_CODE",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "EC2" => Ok(ResourceCategory::Ec2),
            "ECR" => Ok(ResourceCategory::Ecr),
            "LAMBDA" => Ok(ResourceCategory::Lambda),
            "LAMBDA_CODE" => Ok(ResourceCategory::LambdaCode),
            other => Err(format!("unrecognized resource category: {}", other)),
        }
    }
}

/// Event validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("unrecognized request type: {0}")]
    UnknownRequestType(String),
    #[error("unrecognized resource category: {0}")]
    UnknownCategory(String),
    #[error("resourceTypes must not be empty")]
    EmptyCategories,
    #[error("update event is missing PhysicalResourceId")]
    MissingPhysicalId,
}

/// Lifecycle event as delivered by the framework, before validation
#[derive(Debug, Deserialize)]
pub struct CustomResourceEvent {
    #[serde(rename = "RequestType")]
    pub request_type: String,
    #[serde(rename = "RequestId", default)]
    pub request_id: Option<String>,
    #[serde(rename = "StackId", default)]
    pub stack_id: Option<String>,
    #[serde(rename = "LogicalResourceId", default)]
    pub logical_resource_id: Option<String>,
    #[serde(rename = "PhysicalResourceId", default)]
    pub physical_resource_id: Option<String>,
    #[serde(rename = "ResourceProperties", default)]
    pub resource_properties: Option<ResourceProperties>,
}

/// Properties block of the custom resource
#[derive(Debug, Default, Deserialize)]
pub struct ResourceProperties {
    #[serde(rename = "resourceTypes", default)]
    pub resource_types: Option<Vec<String>>,
}

/// Validated lifecycle event
///
/// Closed over the three request types the framework can send; anything else
/// is rejected at entry, before any remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Create {
        categories: Option<Vec<ResourceCategory>>,
    },
    Update {
        physical_resource_id: String,
        categories: Option<Vec<ResourceCategory>>,
    },
    Delete {
        physical_resource_id: Option<String>,
    },
}

impl CustomResourceEvent {
    /// Validate the untyped framework payload into a closed lifecycle event
    pub fn validate(&self) -> Result<LifecycleEvent, ValidationError> {
        let categories = self.requested_categories()?;

        match self.request_type.as_str() {
            "Create" => Ok(LifecycleEvent::Create { categories }),
            "Update" => {
                let physical_resource_id = self
                    .physical_resource_id
                    .clone()
                    .ok_or(ValidationError::MissingPhysicalId)?;
                Ok(LifecycleEvent::Update {
                    physical_resource_id,
                    categories,
                })
            }
            "Delete" => Ok(LifecycleEvent::Delete {
                physical_resource_id: self.physical_resource_id.clone(),
            }),
            other => Err(ValidationError::UnknownRequestType(other.to_string())),
        }
    }

    /// Parse `ResourceProperties.resourceTypes` when present.
    ///
    /// Absence is fine (the provider falls back to its configured category
    /// set); a present-but-invalid list is fatal.
    fn requested_categories(&self) -> Result<Option<Vec<ResourceCategory>>, ValidationError> {
        let raw = match self
            .resource_properties
            .as_ref()
            .and_then(|p| p.resource_types.as_ref())
        {
            Some(raw) => raw,
            None => return Ok(None),
        };

        if raw.is_empty() {
            return Err(ValidationError::EmptyCategories);
        }

        raw.iter()
            .map(|s| {
                s.parse::<ResourceCategory>()
                    .map_err(|_| ValidationError::UnknownCategory(s.clone()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Response status reported back to the framework
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Response object returned to the framework, one per lifecycle event
#[derive(Debug, Serialize)]
pub struct CustomResourceResponse {
    #[serde(rename = "Status")]
    pub status: ResponseStatus,
    #[serde(rename = "PhysicalResourceId", skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(rename = "Reason", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "StackId", skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    #[serde(rename = "RequestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "LogicalResourceId", skip_serializing_if = "Option::is_none")]
    pub logical_resource_id: Option<String>,
}

impl CustomResourceResponse {
    pub fn success(physical_resource_id: &str) -> Self {
        Self {
            status: ResponseStatus::Success,
            physical_resource_id: Some(physical_resource_id.to_string()),
            reason: None,
            stack_id: None,
            request_id: None,
            logical_resource_id: None,
        }
    }

    pub fn failed(reason: &str) -> Self {
        Self {
            status: ResponseStatus::Failed,
            physical_resource_id: None,
            reason: Some(reason.to_string()),
            stack_id: None,
            request_id: None,
            logical_resource_id: None,
        }
    }

    /// Echo the correlation fields from the originating event
    pub fn with_context(mut self, event: &CustomResourceEvent) -> Self {
        self.stack_id = event.stack_id.clone();
        self.request_id = event.request_id.clone();
        self.logical_resource_id = event.logical_resource_id.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_event() {
        let event: CustomResourceEvent = serde_json::from_str(
            r#"{"RequestType":"Create","ResourceProperties":{"resourceTypes":["EC2","ECR","LAMBDA"]}}"#,
        )
        .unwrap();

        let lifecycle = event.validate().unwrap();
        assert_eq!(
            lifecycle,
            LifecycleEvent::Create {
                categories: Some(vec![
                    ResourceCategory::Ec2,
                    ResourceCategory::Ecr,
                    ResourceCategory::Lambda,
                ])
            }
        );
    }

    #[test]
    fn test_create_without_properties_defers_to_config() {
        let event: CustomResourceEvent =
            serde_json::from_str(r#"{"RequestType":"Create"}"#).unwrap();

        assert_eq!(
            event.validate().unwrap(),
            LifecycleEvent::Create { categories: None }
        );
    }

    #[test]
    fn test_unknown_request_type_rejected() {
        let event: CustomResourceEvent =
            serde_json::from_str(r#"{"RequestType":"Read"}"#).unwrap();

        assert!(matches!(
            event.validate(),
            Err(ValidationError::UnknownRequestType(t)) if t == "Read"
        ));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let event: CustomResourceEvent = serde_json::from_str(
            r#"{"RequestType":"Create","ResourceProperties":{"resourceTypes":["EC2","RDS"]}}"#,
        )
        .unwrap();

        assert!(matches!(
            event.validate(),
            Err(ValidationError::UnknownCategory(c)) if c == "RDS"
        ));
    }

    #[test]
    fn test_empty_categories_rejected() {
        let event: CustomResourceEvent = serde_json::from_str(
            r#"{"RequestType":"Create","ResourceProperties":{"resourceTypes":[]}}"#,
        )
        .unwrap();

        assert!(matches!(
            event.validate(),
            Err(ValidationError::EmptyCategories)
        ));
    }

    #[test]
    fn test_update_requires_physical_id() {
        let event: CustomResourceEvent =
            serde_json::from_str(r#"{"RequestType":"Update"}"#).unwrap();

        assert!(matches!(
            event.validate(),
            Err(ValidationError::MissingPhysicalId)
        ));
    }

    #[test]
    fn test_delete_carries_prior_id() {
        let event: CustomResourceEvent = serde_json::from_str(
            r#"{"RequestType":"Delete","PhysicalResourceId":"EnableInspector2"}"#,
        )
        .unwrap();

        assert_eq!(
            event.validate().unwrap(),
            LifecycleEvent::Delete {
                physical_resource_id: Some("EnableInspector2".to_string())
            }
        );
    }

    #[test]
    fn test_success_response_serialization() {
        let response = CustomResourceResponse::success(PHYSICAL_RESOURCE_ID);
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains(r#""Status":"SUCCESS""#));
        assert!(json.contains(r#""PhysicalResourceId":"EnableInspector2""#));
        assert!(!json.contains("Reason"));
    }

    #[test]
    fn test_failed_response_echoes_context() {
        let event: CustomResourceEvent = serde_json::from_str(
            r#"{"RequestType":"Create","RequestId":"req-1","StackId":"stack-1","LogicalResourceId":"EnableInspectorResource"}"#,
        )
        .unwrap();

        let response = CustomResourceResponse::failed("permission denied").with_context(&event);
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains(r#""Status":"FAILED""#));
        assert!(json.contains(r#""RequestId":"req-1""#));
        assert!(json.contains(r#""StackId":"stack-1""#));
        assert!(json.contains(r#""LogicalResourceId":"EnableInspectorResource""#));
    }

    #[test]
    fn test_category_round_trip() {
        for (name, category) in [
            ("EC2", ResourceCategory::Ec2),
            ("ECR", ResourceCategory::Ecr),
            ("LAMBDA", ResourceCategory::Lambda),
            ("LAMBDA_CODE", ResourceCategory::LambdaCode),
        ] {
            assert_eq!(name.parse::<ResourceCategory>().unwrap(), category);
            assert_eq!(category.as_str(), name);
        }

        assert!("ec2".parse::<ResourceCategory>().is_err());
    }
}
