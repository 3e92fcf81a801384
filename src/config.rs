//! Server configuration from `MANGA_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::chapter::CleanupPolicy;
use crate::models::{DEFAULT_MAX_PAGE_BYTES, MAX_PAGE_ARCHIVE_SIZE};
use crate::storage::{S3Config, StorageConfig, StorageType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is required")]
    Missing { var: &'static str },

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// A catalog entry created at start-up when missing, given as `<uuid>:<title>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MangaSeed {
    pub id: Uuid,
    pub title: String,
}

impl MangaSeed {
    /// Lowercase ASCII words of the title joined by `-`
    pub fn slug(&self) -> String {
        let words: Vec<String> = self
            .title
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if words.is_empty() {
            self.id.simple().to_string()
        } else {
            words.join("-")
        }
    }
}

impl FromStr for MangaSeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, title) = s
            .split_once(':')
            .ok_or_else(|| "expected <uuid>:<title>".to_string())?;
        let id = Uuid::parse_str(id.trim()).map_err(|e| e.to_string())?;
        let title = title.trim();
        if title.is_empty() {
            return Err("title must not be empty".to_string());
        }
        Ok(Self {
            id,
            title: title.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    /// Prefix for page URLs handed to clients
    pub public_url: String,
    pub storage: StorageConfig,
    /// `None` means a random secret is generated at start-up
    pub token_secret: Option<String>,
    pub token_ttl: Duration,
    pub max_archive_bytes: usize,
    /// Largest decompressed page inside an archive
    pub max_page_bytes: u64,
    pub cleanup: CleanupPolicy,
    /// Log a token for this user at start-up
    pub bootstrap_uploader: Option<Uuid>,
    pub bootstrap_manga: Option<MangaSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let default_addr = SocketAddr::from(([127, 0, 0, 1], 8080));
        let bind_addr: SocketAddr = parse_or(&get, "MANGA_ADDR", default_addr)?;

        let data_dir = get("MANGA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("manga-server"));

        let database_path = get("MANGA_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("manga.db"));

        let public_url = get("MANGA_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{}", bind_addr))
            .trim_end_matches('/')
            .to_string();

        let storage = match get("MANGA_STORAGE").as_deref().unwrap_or("local") {
            "local" => StorageConfig::local(
                get("MANGA_STORAGE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| data_dir.join("files")),
            ),
            "memory" => StorageConfig::memory(),
            "s3" => {
                let bucket = get("MANGA_S3_BUCKET").ok_or(ConfigError::Missing {
                    var: "MANGA_S3_BUCKET",
                })?;
                let mut s3 = match get("MANGA_S3_ENDPOINT") {
                    Some(endpoint) => S3Config::minio(bucket, endpoint),
                    None => S3Config::aws(bucket, "us-east-1".to_string()),
                };
                if let Some(region) = get("MANGA_S3_REGION") {
                    s3.region = region;
                }
                if let Some(prefix) = get("MANGA_S3_PREFIX") {
                    s3 = s3.with_prefix(prefix);
                }
                StorageConfig {
                    storage_type: StorageType::S3(s3),
                }
            }
            other => {
                return Err(ConfigError::Invalid {
                    var: "MANGA_STORAGE",
                    value: other.to_string(),
                    reason: "expected local, s3 or memory".to_string(),
                })
            }
        };

        let ttl_secs: i64 = parse_or(&get, "MANGA_TOKEN_TTL_SECS", 24 * 60 * 60)?;
        let ttl_invalid = |reason: &str| ConfigError::Invalid {
            var: "MANGA_TOKEN_TTL_SECS",
            value: ttl_secs.to_string(),
            reason: reason.to_string(),
        };
        if ttl_secs <= 0 {
            return Err(ttl_invalid("must be positive"));
        }
        let token_ttl = Duration::try_seconds(ttl_secs).ok_or_else(|| ttl_invalid("out of range"))?;

        let max_archive_bytes = parse_or(&get, "MANGA_MAX_ARCHIVE_BYTES", MAX_PAGE_ARCHIVE_SIZE)?;
        let max_page_bytes: u64 = parse_or(&get, "MANGA_MAX_PAGE_BYTES", DEFAULT_MAX_PAGE_BYTES)?;
        if max_page_bytes == 0 {
            return Err(ConfigError::Invalid {
                var: "MANGA_MAX_PAGE_BYTES",
                value: max_page_bytes.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let cleanup = parse_or(&get, "MANGA_INGEST_CLEANUP", CleanupPolicy::default())?;
        let bootstrap_uploader = get("MANGA_BOOTSTRAP_UPLOADER")
            .map(|v| parse_value("MANGA_BOOTSTRAP_UPLOADER", &v))
            .transpose()?;
        let bootstrap_manga = get("MANGA_BOOTSTRAP_MANGA")
            .map(|v| parse_value("MANGA_BOOTSTRAP_MANGA", &v))
            .transpose()?;

        Ok(Self {
            bind_addr,
            database_path,
            public_url,
            storage,
            token_secret: get("MANGA_TOKEN_SECRET"),
            token_ttl,
            max_archive_bytes,
            max_page_bytes,
            cleanup,
            bootstrap_uploader,
            bootstrap_manga,
        })
    }
}

fn parse_value<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(value) => parse_value(var, &value),
        None => Ok(default),
    }
}
