//! Configuration types for rushia-dl

use crate::error::{Error, Result};
use crate::types::Status;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Download behavior configuration (output directory, concurrency, accepted sources)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Directory finished artifacts are written to (default: "./download")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum concurrent downloads (default: 5)
    ///
    /// Submissions beyond this limit are rejected immediately; nothing is queued.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Hosts a source URL must belong to (default: youtube.com, youtu.be)
    ///
    /// Subdomains match too, so `youtube.com` also accepts `www.youtube.com`
    /// and `m.youtube.com`.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

/// Per-status lifetime of task records
///
/// The sweeper picks the timeout by a task's *current* status every cycle,
/// so a task that changes status effectively gets a new deadline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaskTimeouts {
    /// Pending tasks (default: 1 hour)
    #[serde(default = "default_pending_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub pending: Duration,

    /// Downloading tasks (default: 6 hours)
    #[serde(default = "default_downloading_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub downloading: Duration,

    /// Processing tasks (default: 3 hours)
    #[serde(default = "default_processing_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub processing: Duration,

    /// Completed tasks (default: 3 hours)
    #[serde(default = "default_completed_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub completed: Duration,

    /// Failed tasks (default: 1 hour)
    #[serde(default = "default_error_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub error: Duration,
}

impl TaskTimeouts {
    /// Timeout that applies to a task currently in `status`
    pub fn for_status(&self, status: Status) -> Duration {
        match status {
            Status::Pending => self.pending,
            Status::Downloading => self.downloading,
            Status::Processing => self.processing,
            Status::Completed => self.completed,
            Status::Error => self.error,
        }
    }
}

impl Default for TaskTimeouts {
    fn default() -> Self {
        Self {
            pending: default_pending_timeout(),
            downloading: default_downloading_timeout(),
            processing: default_processing_timeout(),
            completed: default_completed_timeout(),
            error: default_error_timeout(),
        }
    }
}

/// Retention sweep configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetentionConfig {
    /// Time between sweep cycles (default: 300 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub sweep_interval: Duration,

    /// Age after which artifacts are deleted, referenced or not (default: 3 hours)
    #[serde(default = "default_file_retention", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub file_retention: Duration,

    /// Extensions (without dot) of files the sweeper manages and counts as cached artifacts
    #[serde(default = "default_artifact_extensions")]
    pub artifact_extensions: Vec<String>,

    /// Per-status lifetime of task records
    #[serde(default)]
    pub task_timeouts: TaskTimeouts,

    /// Age after which an unconsumed credential file is deleted (default: 1 hour)
    #[serde(default = "default_credential_retention", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub credential_retention: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: default_sweep_interval(),
            file_retention: default_file_retention(),
            artifact_extensions: default_artifact_extensions(),
            task_timeouts: TaskTimeouts::default(),
            credential_retention: default_credential_retention(),
        }
    }
}

/// Credential (cookie file) storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CredentialConfig {
    /// Directory uploaded cookie files are kept in until consumed (default: "./.cookies")
    #[serde(default = "default_cookie_dir")]
    pub cookie_dir: PathBuf,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            cookie_dir: default_cookie_dir(),
        }
    }
}

/// Download engine (yt-dlp) configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EngineConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Network retry count per download (default: 10)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fragment retry count for HLS/DASH downloads (default: 10)
    #[serde(default = "default_retries")]
    pub fragment_retries: u32,

    /// Extractor retry count for downloads (default: 5)
    #[serde(default = "default_extractor_retries")]
    pub extractor_retries: u32,

    /// Extractor retry count for the liveness probe (default: 3)
    #[serde(default = "default_probe_extractor_retries")]
    pub probe_extractor_retries: u32,

    /// Sleep between extraction requests of the liveness probe (default: 1 second)
    #[serde(default = "default_probe_sleep_interval", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub probe_sleep_interval: Duration,

    /// Remote components the engine may fetch to solve JS challenges (default: ["ejs:github"])
    #[serde(default = "default_remote_components")]
    pub remote_components: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
            retries: default_retries(),
            fragment_retries: default_retries(),
            extractor_retries: default_extractor_retries(),
            probe_extractor_retries: default_probe_extractor_retries(),
            probe_sleep_interval: default_probe_sleep_interval(),
            remote_components: default_remote_components(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:8000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for MediaDownloader
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) — output directory, concurrency, accepted hosts
/// - [`retention`](RetentionConfig) — sweep interval and expiry windows
/// - [`credentials`](CredentialConfig) — cookie file storage
/// - [`engine`](EngineConfig) — yt-dlp binary and retry budget
/// - [`server`](ServerIntegrationConfig) — REST API
///
/// The download sub-config is flattened, so `download_dir` and
/// `max_concurrent_downloads` sit at the top level of the JSON document.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retention sweep settings
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Credential storage settings
    #[serde(default)]
    pub credentials: CredentialConfig,

    /// Download engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// API and external server integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults. The result is validated
    /// before it is returned.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse config file '{}': {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".into(),
                key: Some("max_concurrent_downloads".into()),
            });
        }
        if self.download.allowed_hosts.is_empty() {
            return Err(Error::Config {
                message: "allowed_hosts must name at least one host".into(),
                key: Some("allowed_hosts".into()),
            });
        }
        if self.retention.artifact_extensions.is_empty() {
            return Err(Error::Config {
                message: "artifact_extensions must name at least one extension".into(),
                key: Some("retention.artifact_extensions".into()),
            });
        }
        if self.retention.sweep_interval.is_zero() {
            return Err(Error::Config {
                message: "sweep_interval must be greater than zero".into(),
                key: Some("retention.sweep_interval".into()),
            });
        }
        Ok(())
    }
}

// Default value functions
fn default_download_dir() -> PathBuf {
    PathBuf::from("./download")
}

fn default_max_concurrent() -> usize {
    5
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["youtube.com".into(), "youtu.be".into()]
}

fn default_pending_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_downloading_timeout() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_processing_timeout() -> Duration {
    Duration::from_secs(3 * 60 * 60)
}

fn default_completed_timeout() -> Duration {
    Duration::from_secs(3 * 60 * 60)
}

fn default_error_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_file_retention() -> Duration {
    Duration::from_secs(3 * 60 * 60)
}

fn default_artifact_extensions() -> Vec<String> {
    vec!["m4a".into(), "mp4".into()]
}

fn default_credential_retention() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_cookie_dir() -> PathBuf {
    PathBuf::from("./.cookies")
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    10
}

fn default_extractor_retries() -> u32 {
    5
}

fn default_probe_extractor_retries() -> u32 {
    3
}

fn default_probe_sleep_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_remote_components() -> Vec<String> {
    vec!["ejs:github".into()]
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_limits() {
        let config = Config::default();
        assert_eq!(config.download.max_concurrent_downloads, 5);
        assert_eq!(config.retention.file_retention, Duration::from_secs(10_800));
        assert_eq!(config.retention.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.engine.retries, 10);
        assert_eq!(config.engine.fragment_retries, 10);
        assert_eq!(config.engine.extractor_retries, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn task_timeouts_are_selected_by_status() {
        let timeouts = TaskTimeouts::default();
        assert_eq!(timeouts.for_status(Status::Pending), Duration::from_secs(3_600));
        assert_eq!(
            timeouts.for_status(Status::Downloading),
            Duration::from_secs(21_600)
        );
        assert_eq!(
            timeouts.for_status(Status::Processing),
            Duration::from_secs(10_800)
        );
        assert_eq!(
            timeouts.for_status(Status::Completed),
            Duration::from_secs(10_800)
        );
        assert_eq!(timeouts.for_status(Status::Error), Duration::from_secs(3_600));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "download_dir": "/srv/media",
            "max_concurrent_downloads": 2,
            "retention": { "task_timeouts": { "error": 60 } }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.download.download_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.download.max_concurrent_downloads, 2);
        assert_eq!(config.retention.task_timeouts.error, Duration::from_secs(60));
        assert_eq!(
            config.retention.task_timeouts.downloading,
            Duration::from_secs(21_600)
        );
        assert_eq!(config.download.allowed_hosts, default_allowed_hosts());
    }

    #[test]
    fn timeouts_serialize_as_seconds() {
        let value = serde_json::to_value(TaskTimeouts::default()).unwrap();
        assert_eq!(value["pending"], 3_600);
        assert_eq!(value["downloading"], 21_600);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = Config::default();
        config.download.max_concurrent_downloads = 0;

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("max_concurrent_downloads"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "max_concurrent_downloads": 0 }"#).unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config { .. })));

        std::fs::write(&path, r#"{ "max_concurrent_downloads": 1 }"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.download.max_concurrent_downloads, 1);
    }

    #[test]
    fn load_reports_missing_file() {
        let result = Config::load(Path::new("/nonexistent/rushia-dl.json"));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
