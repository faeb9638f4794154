use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_organizations")]
    pub organizations: BTreeMap<String, OrganizationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// Base URL of the REST API (GitHub Enterprise installs use `https://host/api/v3`)
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token with collaborator admin rights; falls back to `GITHUB_TOKEN`
    #[serde(default)]
    pub token: Option<String>,
    /// Timeout for each HTTP exchange in seconds (default: 30)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Page size for listing invitations, GitHub caps this at 100
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            timeout_seconds: default_timeout_seconds(),
            per_page: default_per_page(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

impl GitHubConfig {
    /// Token from the config file, or the `GITHUB_TOKEN` environment variable.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    pub fn page_size(&self) -> u32 {
        self.per_page.clamp(1, 100)
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_per_page() -> u32 {
    100
}

fn default_user_agent() -> String {
    format!("reinvite/{}", env!("CARGO_PKG_VERSION"))
}

/// Retry behaviour for calls to the hosting service.
///
/// Disabled by default: a transient failure is reported to the caller, who can
/// safely re-run the reconcile.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 0)
    #[serde(default)]
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds (default: 500)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound for a single backoff in milliseconds (default: 30000)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Add up to 25% jitter to each delay
    #[serde(default = "default_use_jitter")]
    pub use_jitter: bool,
    /// HTTP status codes worth retrying
    #[serde(default = "default_retry_status_codes")]
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            use_jitter: default_use_jitter(),
            retry_status_codes: default_retry_status_codes(),
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (1-based). Attempt 0 never waits.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        let capped = base.min(self.max_backoff_ms as f64);

        let delay_ms = if self.use_jitter {
            let jitter_range = capped * 0.25;
            let jitter = (rand::random::<f64>() * jitter_range * 2.0) - jitter_range;
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(delay_ms as u64)
    }

    pub fn should_retry(&self, status_code: u16) -> bool {
        self.retry_status_codes.contains(&status_code)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_use_jitter() -> bool {
    true
}

fn default_retry_status_codes() -> Vec<u16> {
    vec![429, 502, 503, 504]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A classroom organization and the assignments handed out in it.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationConfig {
    /// Display name shown to instructors
    pub name: String,
    /// GitHub organization that owns the student repositories
    pub owner: String,
    /// Assignments in the order the form offers them; the first is the default
    #[serde(default)]
    pub assignments: Vec<AssignmentConfig>,
}

impl OrganizationConfig {
    /// Repository prefix for an assignment display name.
    pub fn prefix_for(&self, assignment: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.name == assignment)
            .map(|a| a.prefix.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssignmentConfig {
    /// Display name
    pub name: String,
    /// Student repositories are named `{prefix}-{username}`
    pub prefix: String,
}

impl AssignmentConfig {
    fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

fn default_organizations() -> BTreeMap<String, OrganizationConfig> {
    let assignments = vec![
        AssignmentConfig::new("🧑GitHub Fundamentals", "github-fundamentals"),
        AssignmentConfig::new("Easy Moments", "easy-moments"),
    ];

    let mut organizations = BTreeMap::new();
    organizations.insert(
        "McMasterQM".to_string(),
        OrganizationConfig {
            name: "CHEM3PA3 winter26".to_string(),
            owner: "McMasterQM".to_string(),
            assignments,
        },
    );
    organizations
}

/// Why an organization/assignment selection could not be turned into a repository.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("Unknown organization '{0}'")]
    UnknownOrganization(String),
    #[error("Unknown assignment '{assignment}' for organization '{organization}'")]
    UnknownAssignment {
        organization: String,
        assignment: String,
    },
    #[error("Username is required")]
    MissingUsername,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            github: GitHubConfig::default(),
            logging: LoggingConfig::default(),
            organizations: default_organizations(),
        }
    }

    /// Resolve an assignment selection into the `(owner, repo)` pair of the
    /// student's repository. Repositories are named `{prefix}-{username}`.
    pub fn resolve_target(
        &self,
        organization: &str,
        assignment: &str,
        username: &str,
    ) -> Result<(String, String), TargetError> {
        let org = self
            .organizations
            .get(organization)
            .ok_or_else(|| TargetError::UnknownOrganization(organization.to_string()))?;

        let prefix = org
            .prefix_for(assignment)
            .ok_or_else(|| TargetError::UnknownAssignment {
                organization: organization.to_string(),
                assignment: assignment.to_string(),
            })?;

        let username = username.trim();
        if username.is_empty() {
            return Err(TargetError::MissingUsername);
        }

        Ok((org.owner.clone(), format!("{}-{}", prefix, username)))
    }

    /// Collect configuration problems. An empty list means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.github.resolve_token().is_none() {
            problems.push(
                "No GitHub token configured (set github.token or GITHUB_TOKEN)".to_string(),
            );
        }
        if !self.github.api_url.starts_with("http://") && !self.github.api_url.starts_with("https://")
        {
            problems.push(format!(
                "github.api_url must be an http(s) URL, got '{}'",
                self.github.api_url
            ));
        }
        if self.github.per_page == 0 || self.github.per_page > 100 {
            problems.push(format!(
                "github.per_page must be between 1 and 100, got {}",
                self.github.per_page
            ));
        }
        if self.github.timeout_seconds == 0 {
            problems.push("github.timeout_seconds must be greater than 0".to_string());
        }

        for (key, org) in &self.organizations {
            if org.owner.trim().is_empty() {
                problems.push(format!("organizations.{}: owner is empty", key));
            }
            if org.assignments.is_empty() {
                problems.push(format!("organizations.{}: no assignments configured", key));
            }
            for assignment in &org.assignments {
                if assignment.prefix.trim().is_empty() {
                    problems.push(format!(
                        "organizations.{}: assignment '{}' has an empty prefix",
                        key, assignment.name
                    ));
                }
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_classroom_org() {
        let config = Config::default();
        let org = config.organizations.get("McMasterQM").unwrap();
        assert_eq!(org.owner, "McMasterQM");
        assert_eq!(org.prefix_for("Easy Moments"), Some("easy-moments"));

        // Declaration order is kept, so the form's default comes first
        let names: Vec<&str> = org.assignments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["🧑GitHub Fundamentals", "Easy Moments"]);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.retry.max_retries, 0);
    }

    #[test]
    fn test_resolve_target() {
        let config = Config::default();
        let (owner, repo) = config
            .resolve_target("McMasterQM", "Easy Moments", "octocat")
            .unwrap();
        assert_eq!(owner, "McMasterQM");
        assert_eq!(repo, "easy-moments-octocat");
    }

    #[test]
    fn test_resolve_target_errors() {
        let config = Config::default();
        assert_eq!(
            config.resolve_target("Nope", "Easy Moments", "octocat"),
            Err(TargetError::UnknownOrganization("Nope".to_string()))
        );
        assert!(matches!(
            config.resolve_target("McMasterQM", "Missing", "octocat"),
            Err(TargetError::UnknownAssignment { .. })
        ));
        assert_eq!(
            config.resolve_target("McMasterQM", "Easy Moments", "  "),
            Err(TargetError::MissingUsername)
        );
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
[server]
port = 9090

[github]
token = "ghp_test"
per_page = 50

[github.retry]
max_retries = 2

[organizations.acme]
name = "ACME 101"
owner = "acme-classroom"

[[organizations.acme.assignments]]
name = "Lab 2"
prefix = "lab-2"

[[organizations.acme.assignments]]
name = "Lab 1"
prefix = "lab-1"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.github.page_size(), 50);
        assert_eq!(config.github.retry.max_retries, 2);
        assert_eq!(config.github.retry.retry_status_codes, vec![429, 502, 503, 504]);
        assert_eq!(config.organizations.len(), 1);
        let acme = &config.organizations["acme"];
        assert_eq!(acme.assignments[0], AssignmentConfig::new("Lab 2", "lab-2"));
        assert_eq!(acme.prefix_for("Lab 1"), Some("lab-1"));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let mut config = Config::default();
        config.github.token = Some("ghp_test".to_string());
        config.github.per_page = 500;
        config.github.api_url = "api.github.com".to_string();

        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("per_page")));
        assert!(problems.iter().any(|p| p.contains("api_url")));
    }

    #[test]
    fn test_backoff_without_jitter() {
        let retry = RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 250,
            backoff_multiplier: 2.0,
            use_jitter: false,
            retry_status_codes: vec![429],
        };

        assert_eq!(retry.calculate_backoff(0), Duration::ZERO);
        assert_eq!(retry.calculate_backoff(1), Duration::from_millis(100));
        assert_eq!(retry.calculate_backoff(2), Duration::from_millis(200));
        // Capped at max_backoff_ms
        assert_eq!(retry.calculate_backoff(3), Duration::from_millis(250));
        assert!(retry.should_retry(429));
        assert!(!retry.should_retry(404));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let retry = RetryConfig {
            initial_backoff_ms: 1000,
            ..RetryConfig::default()
        };
        for _ in 0..20 {
            let delay = retry.calculate_backoff(1).as_millis();
            assert!((750..=1250).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(include_str!("../../reinvite.example.toml")).unwrap();
        // The sample leaves the token to the environment
        assert!(config.validate().iter().all(|p| p.contains("token")));
        let (owner, repo) = config
            .resolve_target("McMasterQM", "🧑GitHub Fundamentals", "octocat")
            .unwrap();
        assert_eq!(owner, "McMasterQM");
        assert_eq!(repo, "github-fundamentals-octocat");
    }
}
