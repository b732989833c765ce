//! Tenant version lookup.
//!
//! # Responsibilities
//! - Ask the version-lookup service which release a tenant runs
//! - Extract the routable segment from the dotted release string
//!
//! # Design Decisions
//! - Every failure (transport, status, body) is reported as absence
//! - No caching: one lookup per inbound request
//! - The routable segment is the third dot-separated part, never "the last"
//! - A segment that could name anything but one directory is rejected

use std::fmt;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;

use crate::config::VersionLookupConfig;

/// Short version token used as the first backend path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedVersion(String);

impl ResolvedVersion {
    /// Extract the routable version from a dotted release string
    /// (`7.3030.60843` → `60843`).
    pub fn from_release(release: &str) -> Option<Self> {
        release.split('.').nth(2).and_then(Self::parse)
    }

    /// Accept a bare version token such as `60843`.
    ///
    /// The token becomes a path component and a URL segment, so empty
    /// tokens and tokens carrying dots or separators are refused.
    pub fn parse(token: &str) -> Option<Self> {
        let valid = !token.is_empty() && !token.contains(['.', '/', '\\', ':', '?', '#']);
        valid.then(|| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
impl From<&str> for ResolvedVersion {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Errors raised while constructing the resolver.
#[derive(Debug, thiserror::Error)]
pub enum VersionLookupError {
    #[error("invalid version lookup URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build version lookup client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Client for the external version-lookup service.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    client: reqwest::Client,
    base_url: Url,
    authorization: String,
}

impl VersionResolver {
    pub fn new(config: &VersionLookupConfig) -> Result<Self, VersionLookupError> {
        let base_url = Url::parse(&config.api_url).map_err(|e| VersionLookupError::InvalidUrl {
            url: config.api_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(VersionLookupError::InvalidUrl {
                url: config.api_url.clone(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            authorization: format!("{} {}", config.auth_scheme, config.token),
        })
    }

    /// `<base>/get_version/<tenant host>/`
    pub fn lookup_url(&self, tenant_host: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("get_version")
                .push(tenant_host)
                .push("");
        }
        url
    }

    /// Resolve the routable version for a tenant, or `None` when the
    /// service cannot tell.
    pub async fn resolve(&self, tenant_host: &str) -> Option<ResolvedVersion> {
        let url = self.lookup_url(tenant_host);

        let response = match self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, &self.authorization)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(tenant_host = %tenant_host, url = %url, error = %e, "Version lookup request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(tenant_host = %tenant_host, status = %status, "Version lookup returned non-success status");
            return None;
        }

        let body = match response.json::<VersionResponse>().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(tenant_host = %tenant_host, error = %e, "Version lookup returned malformed body");
                return None;
            }
        };

        let version = ResolvedVersion::from_release(&body.version);
        if version.is_none() {
            tracing::warn!(
                tenant_host = %tenant_host,
                release = %body.version,
                "Release string has no routable segment"
            );
        }
        version
    }
}
