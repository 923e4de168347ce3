use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub s3: S3Config,
    pub cache: CacheConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Prefix under which submissions are laid out as `<base_prefix>year/month/`.
    pub base_prefix: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Interactive syncs within this window are skipped unless forced.
    pub freshness_hours: i64,
    /// `sync-all` only re-syncs partitions older than this.
    pub stale_after_hours: i64,
    /// Poll interval for watching an in-progress sync.
    pub poll_interval_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            freshness_hours: 1,
            stale_after_hours: 24,
            poll_interval_seconds: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    pub dir: String,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        DownloadsConfig {
            dir: "downloads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub path: String,
    /// Maximum size of a single log file in megabytes.
    pub size: u64,
    pub max_files: usize,
}

pub fn load_config(path: &str) -> Result<Config> {
    let config_text = fs::read_to_string(Path::new(path))?;
    let config: Config = toml::from_str(&config_text)?;
    Ok(config)
}
