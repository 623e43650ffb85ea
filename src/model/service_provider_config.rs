//! `ServiceProviderConfig`: metadata describing which optional SCIM
//! protocol features this service supports. Unlike the rest of `model`,
//! this isn't part of any resource's attribute tree — it's a fixed
//! capability descriptor a host serializes directly, so it stays a plain
//! serde struct rather than a dynamic property tree.

use serde::{Deserialize, Serialize};

use crate::utils::error::ScimError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProviderConfig {
    #[serde(rename = "documentationUri", skip_serializing_if = "Option::is_none")]
    pub documentation_uri: Option<String>,
    pub patch: Supported,
    pub bulk: Bulk,
    pub filter: Filter,
    #[serde(rename = "changePassword")]
    pub change_password: Supported,
    pub sort: Supported,
    pub etag: Supported,
    #[serde(rename = "authenticationSchemes")]
    pub authentication_schemes: Vec<AuthenticationScheme>,
}

impl Default for ServiceProviderConfig {
    fn default() -> Self {
        ServiceProviderConfig {
            documentation_uri: None,
            patch: Supported { supported: true },
            bulk: Bulk {
                supported: false,
                max_operations: 0,
                max_payload_size: 0,
            },
            filter: Filter {
                supported: true,
                max_results: 200,
            },
            change_password: Supported { supported: false },
            sort: Supported { supported: true },
            etag: Supported { supported: true },
            authentication_schemes: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationScheme {
    pub name: String,
    pub r#type: String,
    pub description: String,
    #[serde(rename = "specUri")]
    pub spec_uri: String,
    #[serde(rename = "documentationUri", skip_serializing_if = "Option::is_none")]
    pub documentation_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub supported: bool,
    #[serde(rename = "maxResults")]
    pub max_results: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bulk {
    pub supported: bool,
    #[serde(rename = "maxOperations")]
    pub max_operations: i64,
    #[serde(rename = "maxPayloadSize")]
    pub max_payload_size: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Supported {
    pub supported: bool,
}

impl ServiceProviderConfig {
    /// Checks that `patch`, `filter`, `sort`, and `etag` are all flagged
    /// supported — the feature set this crate actually implements.
    /// `bulk`/`change_password` are legitimately allowed to be `false`.
    pub fn validate(&self) -> Result<(), ScimError> {
        if !self.patch.supported {
            return Err(ScimError::InvalidRequest("patch must be supported".into()));
        }
        if !self.filter.supported {
            return Err(ScimError::InvalidRequest("filter must be supported".into()));
        }
        if !self.sort.supported {
            return Err(ScimError::InvalidRequest("sort must be supported".into()));
        }
        if !self.etag.supported {
            return Err(ScimError::InvalidRequest("etag must be supported".into()));
        }
        Ok(())
    }

    pub fn serialize(&self) -> Result<String, ScimError> {
        serde_json::to_string(self).map_err(ScimError::from)
    }

    pub fn deserialize(json: &str) -> Result<Self, ScimError> {
        serde_json::from_str(json).map_err(ScimError::from)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn deserializes_from_wire_shape() {
        let json = r#"{
            "documentationUri": "http://example.com/help/scim.html",
            "patch": { "supported": true },
            "bulk": { "supported": false, "maxOperations": 0, "maxPayloadSize": 0 },
            "filter": { "supported": true, "maxResults": 200 },
            "changePassword": { "supported": false },
            "sort": { "supported": true },
            "etag": { "supported": true },
            "authenticationSchemes": [
                {
                    "name": "OAuth Bearer Token",
                    "type": "oauthbearertoken",
                    "description": "Authentication scheme using the OAuth Bearer Token Standard",
                    "specUri": "http://www.rfc-editor.org/info/rfc6750",
                    "primary": true
                }
            ]
        }"#;

        let config = ServiceProviderConfig::deserialize(json).unwrap();
        assert_eq!(config.filter.max_results, 200);
        assert_eq!(config.authentication_schemes.len(), 1);
        assert_eq!(config.authentication_schemes[0].r#type, "oauthbearertoken");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unsupported_filter() {
        let mut config = ServiceProviderConfig::default();
        config.filter.supported = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_serialize() {
        let config = ServiceProviderConfig::default();
        let json = config.serialize().unwrap();
        let back = ServiceProviderConfig::deserialize(&json).unwrap();
        assert_eq!(back.patch.supported, config.patch.supported);
    }
}
