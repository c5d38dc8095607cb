//! Project configuration for the launcher and updater.
//!
//! Loaded from `rdw-dev.yaml` in the project root. Every field has a default,
//! so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level project configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Upstream repository queried by the updater.
    pub upstream: UpstreamConfig,
    /// Local synchronization settings.
    pub sync: SyncConfig,
    /// Package manager and the two development services.
    pub services: ServicesConfig,
    /// Startup ordering and shutdown timing for the launcher.
    pub startup: StartupConfig,
}

/// Upstream GitHub repository settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the GitHub REST API.
    pub api_base: String,
    /// Repository slug, `owner/name`.
    pub repository: String,
    /// Branch whose head is compared against the local record.
    pub branch: String,
    /// `User-Agent` header sent with the API request.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            repository: "litelis/remote-desktop-web".to_string(),
            branch: "main".to_string(),
            user_agent: "RemoteDesktopWeb-Updater".to_string(),
            timeout_secs: 10,
        }
    }
}

impl UpstreamConfig {
    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the public clone URL of the repository.
    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}.git", self.repository)
    }
}

/// Local synchronization settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Git remote used for fetch, pull and push.
    pub remote: String,
    /// Revision record file, relative to the repository's git directory.
    pub revision_file: PathBuf,
    /// Message used for the generated commit.
    pub commit_message: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            revision_file: PathBuf::from(".last_revision"),
            commit_message: "chore: sync with upstream".to_string(),
        }
    }
}

/// Package manager and service definitions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServicesConfig {
    /// JavaScript runtime checked during preflight.
    pub runtime: String,
    /// Package manager used for install and for running the services.
    pub package_manager: String,
    /// Arguments for the dependency install command.
    pub install_args: Vec<String>,
    /// Backend service.
    pub server: ServiceConfig,
    /// Frontend service.
    pub client: ServiceConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            runtime: "node".to_string(),
            package_manager: default_package_manager().to_string(),
            install_args: vec!["install".to_string()],
            server: ServiceConfig {
                name: "server".to_string(),
                dir: PathBuf::from("server"),
                args: vec!["run".to_string(), "dev".to_string()],
                url: Some("http://localhost:8443".to_string()),
            },
            client: ServiceConfig {
                name: "client".to_string(),
                dir: PathBuf::from("client"),
                args: vec!["start".to_string()],
                url: Some("http://localhost:3000".to_string()),
            },
        }
    }
}

const fn default_package_manager() -> &'static str {
    if cfg!(windows) {
        "npm.cmd"
    } else {
        "npm"
    }
}

/// One long-running development service.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name used in output tags.
    pub name: String,
    /// Working directory, relative to the project root.
    pub dir: PathBuf,
    /// Arguments passed to the package manager.
    pub args: Vec<String>,
    /// Address printed once the service is started.
    pub url: Option<String>,
}

/// Launcher timing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StartupConfig {
    /// Fixed delay before the client starts when no readiness probe is configured.
    pub delay_ms: u64,
    /// Endpoint polled until it answers 2xx before the client starts.
    pub readiness_url: Option<String>,
    /// Upper bound on readiness polling.
    pub readiness_timeout_secs: u64,
    /// Pause between readiness probe attempts.
    pub readiness_interval_ms: u64,
    /// Interval between liveness checks of the running services.
    pub poll_interval_ms: u64,
    /// Time a service gets to exit after SIGTERM before it is killed.
    pub shutdown_grace_secs: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            readiness_url: Some("http://localhost:8443/api/health/ping".to_string()),
            readiness_timeout_secs: 30,
            readiness_interval_ms: 500,
            poll_interval_ms: 1000,
            shutdown_grace_secs: 5,
        }
    }
}

impl ProjectConfig {
    /// File name looked up in the project root.
    pub const FILE_NAME: &'static str = "rdw-dev.yaml";

    /// Loads the configuration for a project root and applies environment overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let mut config = Self::load_from_path(root.join(Self::FILE_NAME))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads configuration from a specific file; a missing file yields defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Applies `RDW_*` overrides using the given variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(repository) = lookup("RDW_REPOSITORY") {
            self.upstream.repository = repository;
        }
        if let Some(branch) = lookup("RDW_BRANCH") {
            self.upstream.branch = branch;
        }
        if let Some(api_base) = lookup("RDW_API_BASE") {
            self.upstream.api_base = api_base;
        }
    }
}
