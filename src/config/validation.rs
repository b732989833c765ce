//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Validate the deployment layout description
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("backend.host must be a non-empty authority without scheme or path, got `{0}`")]
    BackendHost(String),
    #[error("backend.path_base must be empty or start with '/', got `{0}`")]
    PathBase(String),
    #[error("version_lookup.api_url `{0}` is not an absolute http(s) URL")]
    LookupUrl(String),
    #[error("deployments.service_dir must be a single path component, got `{0}`")]
    ServiceDir(String),
    #[error("deployments.environments must not be empty")]
    NoEnvironments,
    #[error("deployments.environments contains an empty or duplicate name `{0}`")]
    Environment(String),
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let host = &config.backend.host;
    if host.trim().is_empty() || host.contains("://") || host.trim_end_matches('/').contains('/')
    {
        errors.push(ValidationError::BackendHost(host.clone()));
    }

    let path_base = &config.backend.path_base;
    if !path_base.is_empty() && !path_base.starts_with('/') {
        errors.push(ValidationError::PathBase(path_base.clone()));
    }

    match Url::parse(&config.version_lookup.api_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base() => {}
        _ => errors.push(ValidationError::LookupUrl(
            config.version_lookup.api_url.clone(),
        )),
    }

    let service_dir = &config.deployments.service_dir;
    if service_dir.is_empty()
        || service_dir.contains(['/', '\\'])
        || service_dir == "."
        || service_dir == ".."
    {
        errors.push(ValidationError::ServiceDir(service_dir.clone()));
    }

    if config.deployments.environments.is_empty() {
        errors.push(ValidationError::NoEnvironments);
    }
    let mut seen = HashSet::new();
    for env in &config.deployments.environments {
        if env.trim().is_empty() || !seen.insert(env.as_str()) {
            errors.push(ValidationError::Environment(env.clone()));
        }
    }

    let timeouts = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.backend_secs", config.timeouts.backend_secs),
        ("timeouts.pool_idle_secs", config.timeouts.pool_idle_secs),
        ("version_lookup.timeout_secs", config.version_lookup.timeout_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.backend.host = "http://backend".into();
        config.backend.path_base = "BMSInternalWebService".into();
        config.version_lookup.api_url = "ftp://lookup".into();
        config.deployments.service_dir = "a/b".into();
        config.deployments.environments = vec!["Cloud NA".into(), "Cloud NA".into()];
        config.timeouts.backend_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.contains(&ValidationError::Environment("Cloud NA".into())));
        assert!(errors.contains(&ValidationError::ZeroTimeout("timeouts.backend_secs")));
    }

    #[test]
    fn test_empty_environment_list_rejected() {
        let mut config = ProxyConfig::default();
        config.deployments.environments.clear();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::NoEnvironments])
        );
    }

    #[test]
    fn test_backend_host_with_port_accepted() {
        let mut config = ProxyConfig::default();
        config.backend.host = "127.0.0.1:9000".into();
        config.backend.path_base = String::new();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
