//! Endpoint admission policies.
//!
//! This module handles loading and looking up per-endpoint rate limit
//! policies from configuration, so call sites carry a logical endpoint name
//! rather than repeating limit arithmetic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{GatewardError, Result};

use super::limiter::{CheckOptions, FailMode};

/// A complete set of endpoint policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySet {
    /// Map of logical endpoint name to its admission policy
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointPolicy>,
}

/// Admission policy for a single logical endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointPolicy {
    /// Maximum admitted count per window
    pub limit: u64,
    /// Fixed window length in seconds
    pub window_seconds: u64,
    /// Store-failure policy for this endpoint
    #[serde(default)]
    pub fail_mode: FailMode,
    /// Key prefix override; the engine default applies when unset
    #[serde(default)]
    pub namespace: Option<String>,
    /// Consult the abuse tracker's ban state before counting
    #[serde(default)]
    pub check_ban: bool,
}

impl PolicySet {
    /// Create an empty policy set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load policies from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading endpoint policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load policies from a YAML string and validate them.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let set: PolicySet = serde_yaml::from_str(yaml)
            .map_err(|e| GatewardError::Config(format!("Failed to parse policies: {}", e)))?;
        set.validate()?;
        Ok(set)
    }

    /// Look up the policy for a logical endpoint.
    pub fn get(&self, endpoint: &str) -> Option<&EndpointPolicy> {
        self.endpoints.get(endpoint)
    }

    /// Check every policy for nonsensical values.
    ///
    /// Runs once at startup; the validated set is then shared immutably.
    pub fn validate(&self) -> Result<()> {
        for (endpoint, policy) in &self.endpoints {
            if policy.limit == 0 {
                return Err(GatewardError::Config(format!(
                    "endpoint {:?} has a zero limit",
                    endpoint
                )));
            }
            if policy.window_seconds == 0 {
                return Err(GatewardError::Config(format!(
                    "endpoint {:?} has a zero-length window",
                    endpoint
                )));
            }
        }
        Ok(())
    }

    /// Get the number of configured endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Check whether any endpoints are configured.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl EndpointPolicy {
    /// Build the per-call check options for one caller of this endpoint.
    pub fn check_options(&self, endpoint: &str, identifier: &str) -> CheckOptions {
        CheckOptions {
            key: format!("{}:{}", endpoint, identifier),
            limit: self.limit,
            window_seconds: self.window_seconds,
            namespace: self.namespace.clone(),
            fail_mode: self.fail_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_policies() {
        let yaml = r#"
endpoints:
  posts/create:
    limit: 30
    window_seconds: 3600
  upload:
    limit: 50
    window_seconds: 3600
"#;
        let set = PolicySet::from_yaml(yaml).unwrap();
        assert_eq!(set.len(), 2);

        let policy = set.get("posts/create").unwrap();
        assert_eq!(policy.limit, 30);
        assert_eq!(policy.window_seconds, 3600);
        assert_eq!(policy.fail_mode, FailMode::Open);
        assert!(!policy.check_ban);
    }

    #[test]
    fn test_parse_full_policy() {
        let yaml = r#"
endpoints:
  moderation/report:
    limit: 10
    window_seconds: 300
    fail_mode: closed
    namespace: moderation
    check_ban: true
"#;
        let set = PolicySet::from_yaml(yaml).unwrap();
        let policy = set.get("moderation/report").unwrap();

        assert_eq!(policy.fail_mode, FailMode::Closed);
        assert_eq!(policy.namespace.as_deref(), Some("moderation"));
        assert!(policy.check_ban);
    }

    #[test]
    fn test_unknown_endpoint_is_none() {
        let set = PolicySet::new();
        assert!(set.get("nope").is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let yaml = r#"
endpoints:
  broken:
    limit: 0
    window_seconds: 60
"#;
        assert!(PolicySet::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
endpoints:
  broken:
    limit: 10
    window_seconds: 0
"#;
        assert!(PolicySet::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_check_options_compose_bucket_key() {
        let yaml = r#"
endpoints:
  posts/create:
    limit: 30
    window_seconds: 3600
    namespace: content
"#;
        let set = PolicySet::from_yaml(yaml).unwrap();
        let opts = set
            .get("posts/create")
            .unwrap()
            .check_options("posts/create", "user-1");

        assert_eq!(opts.key, "posts/create:user-1");
        assert_eq!(opts.limit, 30);
        assert_eq!(opts.window_seconds, 3600);
        assert_eq!(opts.namespace.as_deref(), Some("content"));
    }
}
