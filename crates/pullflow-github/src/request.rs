//! Page request model and entry validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::MAX_PAGE_SIZE;
use crate::entity::{self, EntityDescriptor};
use crate::error::{Error, Result};

/// Deployment flavor of the remote source; selects base-path templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Deployment {
    /// The hosted cloud product.
    Cloud,
    /// A self-hosted server.
    Server,
}

/// Root of the traversal: an enterprise, or an explicit organization list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    /// Enumerate everything under one enterprise slug.
    Enterprise(String),
    /// Enumerate the named organizations, in order.
    Organizations(Vec<String>),
}

impl Scope {
    /// The organization list, when this is an organization-list scope.
    #[must_use]
    pub fn organizations(&self) -> Option<&[String]> {
        match self {
            Self::Enterprise(_) => None,
            Self::Organizations(orgs) => Some(orgs),
        }
    }
}

/// Requested attribute set for an entity.
///
/// Attribute names may be dotted paths (`$.node.id`); a child projection
/// selects a nested list-valued attribute and is flattened recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProjection {
    /// Entity (or child attribute) name.
    pub name: String,
    /// Attribute names to fetch.
    pub attributes: Vec<String>,
    /// Nested child projections.
    #[serde(default)]
    pub children: Vec<EntityProjection>,
}

impl EntityProjection {
    /// Projection with the given attributes and no children.
    #[must_use]
    pub fn new(name: impl Into<String>, attributes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            attributes,
            children: Vec::new(),
        }
    }

    /// Add a child projection.
    #[must_use]
    pub fn with_child(mut self, child: EntityProjection) -> Self {
        self.children.push(child);
        self
    }
}

/// One page-fetch invocation.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// Remote base address, with or without a scheme; a bare host implies
    /// a secure scheme.
    pub address: String,
    /// Credential, including the `Bearer ` prefix.
    pub credential: String,
    /// Entity name plus attribute projection.
    pub entity: EntityProjection,
    /// Maximum objects per page, 1..=100.
    pub page_size: usize,
    /// Continuation token from the previous call, if any.
    pub cursor: Option<String>,
    /// Traversal root.
    pub scope: Scope,
    /// Deployment flavor.
    pub deployment: Deployment,
    /// REST API version segment; required for flat entities on server
    /// deployments.
    pub api_version: Option<String>,
    /// Whether the caller asked for server-side ordering. Must be false.
    pub ordered: bool,
    /// Extra arguments attached at the terminal level of graph queries,
    /// rendered verbatim (e.g. `states: OPEN`).
    pub filters: Option<String>,
    /// Per-call deadline overriding the connector default.
    pub timeout: Option<Duration>,
}

/// A request that passed entry validation.
#[derive(Debug)]
pub(crate) struct ValidatedRequest<'a> {
    pub request: &'a PageRequest,
    pub descriptor: &'static EntityDescriptor,
    /// Normalized base address: secure scheme ensured, no trailing slash.
    pub base: String,
}

impl PageRequest {
    /// Validate the request before any I/O.
    pub(crate) fn validate(&self, allow_http: bool) -> Result<ValidatedRequest<'_>> {
        let base = normalize_address(&self.address, allow_http)?;

        if !self.credential.starts_with("Bearer ") {
            return Err(Error::datasource("credential must carry a Bearer prefix"));
        }

        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::request(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }

        let descriptor = entity::descriptor(&self.entity.name)
            .ok_or_else(|| Error::entity(format!("unknown entity {:?}", self.entity.name)))?;

        if self.ordered {
            return Err(Error::entity(
                "server-side ordering is not supported; request unordered data",
            ));
        }

        let has_unique_id = self
            .entity
            .attributes
            .iter()
            .any(|a| a == descriptor.unique_id_field);
        if !has_unique_id {
            return Err(Error::entity(format!(
                "projection for {} must include its unique id attribute {:?}",
                descriptor.name, descriptor.unique_id_field
            )));
        }
        if let Some((_, part)) = descriptor.unique_id_parts {
            if !self.entity.attributes.iter().any(|a| a == part) {
                return Err(Error::entity(format!(
                    "projection for {} must include {part:?} to form its unique id",
                    descriptor.name
                )));
            }
        }

        match &self.scope {
            Scope::Enterprise(slug) => {
                if slug.trim().is_empty() {
                    return Err(Error::request("enterprise slug must not be empty"));
                }
            }
            Scope::Organizations(orgs) => {
                if orgs.is_empty() {
                    return Err(Error::request("organization list must not be empty"));
                }
                if orgs.iter().any(|o| o.trim().is_empty()) {
                    return Err(Error::request(
                        "organization list must not contain empty names",
                    ));
                }
            }
        }

        if descriptor.is_flat()
            && self.deployment == Deployment::Server
            && self.api_version.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::datasource(format!(
                "{} on server deployments requires an API version",
                descriptor.name
            )));
        }

        Ok(ValidatedRequest {
            request: self,
            descriptor,
            base,
        })
    }
}

/// Ensure the address parses and uses a secure scheme, defaulting a bare
/// host to `https`. Returns the address without a trailing slash.
fn normalize_address(address: &str, allow_http: bool) -> Result<String> {
    if address.trim().is_empty() {
        return Err(Error::datasource("address must not be empty"));
    }
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{address}")
    };
    let url = Url::parse(&candidate)
        .map_err(|e| Error::datasource(format!("address {address:?} is not a valid URL: {e}")))?;
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        scheme => {
            return Err(Error::datasource(format!(
                "address scheme {scheme:?} is not secure"
            )));
        }
    }
    Ok(candidate.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn base_request() -> PageRequest {
        PageRequest {
            address: "github.example.com".to_string(),
            credential: "Bearer token".to_string(),
            entity: EntityProjection::new("Organization", vec!["id".into(), "login".into()]),
            page_size: 10,
            cursor: None,
            scope: Scope::Enterprise("SGNL".to_string()),
            deployment: Deployment::Cloud,
            api_version: None,
            ordered: false,
            filters: None,
            timeout: None,
        }
    }

    #[test]
    fn test_valid_request_normalizes_address() {
        let request = base_request();
        let v = request.validate(false).unwrap();
        assert_eq!(v.base, "https://github.example.com");
        assert_eq!(v.descriptor.name, "Organization");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let mut request = base_request();
        request.address = "https://github.example.com/".to_string();
        assert_eq!(request.validate(false).unwrap().base, "https://github.example.com");
    }

    #[test]
    fn test_insecure_scheme_rejected_by_default() {
        let mut request = base_request();
        request.address = "http://github.example.com".to_string();
        let err = request.validate(false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDatasourceConfig);
    }

    #[test]
    fn test_insecure_scheme_allowed_when_opted_in() {
        let mut request = base_request();
        request.address = "http://127.0.0.1:8080".to_string();
        assert!(request.validate(true).is_ok());
    }

    #[test]
    fn test_unknown_scheme_always_rejected() {
        let mut request = base_request();
        request.address = "ftp://github.example.com".to_string();
        assert!(request.validate(true).is_err());
    }

    #[test]
    fn test_credential_prefix_enforced() {
        let mut request = base_request();
        request.credential = "token abc".to_string();
        let err = request.validate(false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidDatasourceConfig);
    }

    #[test]
    fn test_page_size_bounds() {
        let mut request = base_request();
        request.page_size = 0;
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidPageRequestConfig
        );
        request.page_size = 101;
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidPageRequestConfig
        );
        request.page_size = 100;
        assert!(request.validate(false).is_ok());
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let mut request = base_request();
        request.entity = EntityProjection::new("Widget", vec!["id".into()]);
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidEntityConfig
        );
    }

    #[test]
    fn test_ordering_rejected() {
        let mut request = base_request();
        request.ordered = true;
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidEntityConfig
        );
    }

    #[test]
    fn test_missing_unique_id_rejected() {
        let mut request = base_request();
        request.entity = EntityProjection::new("Organization", vec!["login".into()]);
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidEntityConfig
        );
    }

    #[test]
    fn test_compound_unique_id_requires_component() {
        let mut request = base_request();
        // uniqueId requested, but the $.node.id component is missing.
        request.entity = EntityProjection::new("OrganizationUser", vec!["uniqueId".into()]);
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidEntityConfig
        );

        request.entity = EntityProjection::new(
            "OrganizationUser",
            vec!["uniqueId".into(), "$.node.id".into()],
        );
        assert!(request.validate(false).is_ok());
    }

    #[test]
    fn test_empty_enterprise_slug_rejected() {
        let mut request = base_request();
        request.scope = Scope::Enterprise("  ".to_string());
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidPageRequestConfig
        );
    }

    #[test]
    fn test_organization_list_must_be_non_empty() {
        let mut request = base_request();
        request.scope = Scope::Organizations(vec![]);
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidPageRequestConfig
        );

        request.scope = Scope::Organizations(vec!["org1".to_string(), String::new()]);
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidPageRequestConfig
        );
    }

    #[test]
    fn test_flat_server_requires_api_version() {
        let mut request = base_request();
        request.entity = EntityProjection::new("SecretScanningAlert", vec!["number".into()]);
        request.deployment = Deployment::Server;
        assert_eq!(
            request.validate(false).unwrap_err().code(),
            ErrorCode::InvalidDatasourceConfig
        );

        request.api_version = Some("v3".to_string());
        assert!(request.validate(false).is_ok());

        // Cloud deployments carry no version segment.
        request.deployment = Deployment::Cloud;
        request.api_version = None;
        assert!(request.validate(false).is_ok());
    }
}
