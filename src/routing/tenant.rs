//! Tenant environment classification.
//!
//! # Responsibilities
//! - Map a tenant host to the environment tier it belongs to
//!
//! # Design Decisions
//! - Host matching is ASCII case-insensitive, like DNS names
//! - A trailing `:port` is ignored
//! - A domain matches whole labels only; `user@domain` forms are accepted
//! - Informational only: the category is logged, never used to route

use std::fmt;

/// Deployment tier a tenant host belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TenantEnvironment {
    Cloud,
    Labs,
    Preview,
}

impl fmt::Display for TenantEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TenantEnvironment::Cloud => "Cloud",
            TenantEnvironment::Labs => "Labs",
            TenantEnvironment::Preview => "Preview",
        };
        f.write_str(name)
    }
}

/// The tenant host matched none of the known domains.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tenant host `{0}`")]
pub struct InvalidTenantHost(pub String);

const KNOWN_DOMAINS: &[(&str, TenantEnvironment)] = &[
    ("ayudacloud.com", TenantEnvironment::Cloud),
    ("ayudalabs.com", TenantEnvironment::Labs),
    ("ayudapreview.com", TenantEnvironment::Preview),
];

/// Derive the environment category of a tenant host.
pub fn classify(tenant_host: &str) -> Result<TenantEnvironment, InvalidTenantHost> {
    let host = strip_port(tenant_host.trim());

    KNOWN_DOMAINS
        .iter()
        .find(|(domain, _)| belongs_to(host, domain))
        .map(|(_, env)| *env)
        .ok_or_else(|| InvalidTenantHost(tenant_host.to_string()))
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// `host` is `domain` itself or ends with `.domain` / `@domain`.
fn belongs_to(host: &str, domain: &str) -> bool {
    let host = host.as_bytes();
    let Some(split) = host.len().checked_sub(domain.len()) else {
        return false;
    };
    if !host[split..].eq_ignore_ascii_case(domain.as_bytes()) {
        return false;
    }
    split == 0 || matches!(host[split - 1], b'.' | b'@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_domains() {
        assert_eq!(classify("acme.ayudacloud.com"), Ok(TenantEnvironment::Cloud));
        assert_eq!(classify("test@ayudalabs.com"), Ok(TenantEnvironment::Labs));
        assert_eq!(classify("qa.ayudapreview.com"), Ok(TenantEnvironment::Preview));
    }

    #[test]
    fn test_case_insensitive_and_port() {
        assert_eq!(classify("ACME.AyudaCloud.COM"), Ok(TenantEnvironment::Cloud));
        assert_eq!(classify("acme.ayudalabs.com:8443"), Ok(TenantEnvironment::Labs));
    }

    #[test]
    fn test_unknown_domain_is_invalid() {
        assert_eq!(
            classify("acme.example.com"),
            Err(InvalidTenantHost("acme.example.com".into()))
        );
        assert!(classify("").is_err());
        assert!(classify("ayudacloud.com.evil.net").is_err());
    }

    #[test]
    fn test_domain_matches_whole_labels_only() {
        assert_eq!(classify("ayudacloud.com"), Ok(TenantEnvironment::Cloud));
        assert!(classify("notayudacloud.com").is_err());
        assert!(classify("acme.evilayudalabs.com:443").is_err());
    }
}
