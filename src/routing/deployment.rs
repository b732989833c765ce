//! Deployment path resolution.
//!
//! # Responsibilities
//! - Find where a version is installed under the environment roots
//! - Prefer environments in configured priority order
//!
//! # Search
//! ```text
//! direct:   <root>/<env>/<service_dir>/<version> is a directory
//! fallback: <root>/<env>/<service_dir>/* named <version>, *.<version>
//!           or *.<version>.1   (only when no environment matched directly)
//! ```
//!
//! # Design Decisions
//! - Evaluated per call, nothing is memoized
//! - I/O errors in one environment mean "no match there", never abort
//! - Blocking filesystem calls run on the blocking thread pool

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DeploymentConfig;
use crate::routing::version::ResolvedVersion;

/// Ordered environment names, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentPriority(Arc<[String]>);

impl EnvironmentPriority {
    pub fn new<I, S>(environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(environments.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A version directory found in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentMatch {
    pub environment: String,
    pub path: PathBuf,
}

/// Searches the deployment tree for a version's physical location.
#[derive(Debug, Clone)]
pub struct BackendPathResolver {
    root: PathBuf,
    service_dir: String,
    priority: EnvironmentPriority,
}

impl BackendPathResolver {
    pub fn new(root: impl Into<PathBuf>, service_dir: impl Into<String>, priority: EnvironmentPriority) -> Self {
        Self {
            root: root.into(),
            service_dir: service_dir.into(),
            priority,
        }
    }

    pub fn from_config(config: &DeploymentConfig) -> Self {
        Self::new(
            config.root.clone(),
            config.service_dir.clone(),
            EnvironmentPriority::new(config.environments.iter().cloned()),
        )
    }

    fn service_root(&self, environment: &str) -> PathBuf {
        self.root.join(environment).join(&self.service_dir)
    }

    /// Resolve the highest-priority deployment path for `version`.
    pub fn resolve(&self, version: &ResolvedVersion) -> Option<PathBuf> {
        tracing::debug!(version = %version, root = %self.root.display(), "Looking for deployment path");

        let mut matches = self.direct_matches(version);
        if matches.is_empty() {
            tracing::debug!(version = %version, "No direct match, scanning for long version names");
            matches = self.fallback_matches(version);
        }

        // Matches were collected in priority order.
        match matches.into_iter().next() {
            Some(selected) => {
                tracing::info!(
                    version = %version,
                    environment = %selected.environment,
                    path = %selected.path.display(),
                    "Selected deployment path"
                );
                Some(selected.path)
            }
            None => {
                tracing::debug!(version = %version, "No deployment path found");
                None
            }
        }
    }

    /// Run [`resolve`](Self::resolve) on the blocking thread pool.
    pub async fn resolve_blocking(self: Arc<Self>, version: ResolvedVersion) -> Option<PathBuf> {
        let requested = version.clone();
        match tokio::task::spawn_blocking(move || self.resolve(&version)).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(version = %requested, error = %e, "Deployment path search task failed");
                None
            }
        }
    }

    fn direct_matches(&self, version: &ResolvedVersion) -> Vec<DeploymentMatch> {
        self.priority
            .iter()
            .filter_map(|env| {
                let candidate = self.service_root(env).join(version.as_str());
                if is_dir(&candidate) {
                    tracing::debug!(environment = %env, path = %candidate.display(), "Found direct path");
                    Some(DeploymentMatch {
                        environment: env.to_string(),
                        path: candidate,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    fn fallback_matches(&self, version: &ResolvedVersion) -> Vec<DeploymentMatch> {
        self.priority
            .iter()
            .filter_map(|env| {
                let service_root = self.service_root(env);
                let found = find_version_dir(&service_root, version.as_str())?;
                tracing::debug!(environment = %env, path = %found.display(), "Found long version path");
                // The short-version path is reported, not the long-named
                // directory that confirmed the version exists.
                Some(DeploymentMatch {
                    environment: env.to_string(),
                    path: service_root.join(version.as_str()),
                })
            })
            .collect()
    }
}

fn is_dir(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

/// First subdirectory of `service_root` whose name identifies `version`.
fn find_version_dir(service_root: &Path, version: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(service_root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(path = %service_root.display(), error = %e, "Cannot list service directory");
            return None;
        }
    };

    let dotted = format!(".{version}");
    let dotted_patch = format!(".{version}.1");

    entries
        .filter_map(Result::ok)
        .filter(|entry| is_dir(&entry.path()))
        .find(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name == version || name.ends_with(&dotted) || name.ends_with(&dotted_patch)
        })
        .map(|entry| entry.path())
}
