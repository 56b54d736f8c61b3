//! Configuration types and loading

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Byte storage configuration
    pub storage: StorageConfig,

    /// Thumbnail specs and fallback image
    pub thumbnails: ThumbnailConfig,

    /// HTTP caching policy
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for attachment bytes
    pub local_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThumbnailConfig {
    pub specs: Vec<ThumbnailSpecConfig>,
    /// Image served when thumbnail generation fails
    pub default_thumbnail: Option<String>,
}

/// A named thumbnail bounding box. Zero means "derive from the other side".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ThumbnailSpecConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Days used for both `Expires` and `Cache-Control: max-age`
    pub max_age_days: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_body_size_bytes: 100 * 1024 * 1024, // 100MB
            },
            storage: StorageConfig {
                local_path: "/var/lib/stowage/attachments".to_string(),
            },
            thumbnails: ThumbnailConfig {
                specs: vec![
                    ThumbnailSpecConfig::new("small", 100, 0),
                    ThumbnailSpecConfig::new("medium", 300, 300),
                    ThumbnailSpecConfig::new("large", 800, 600),
                ],
                default_thumbnail: None,
            },
            cache: CacheConfig { max_age_days: 30 },
        }
    }
}

impl ThumbnailSpecConfig {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }

    /// Parse a comma separated list of `name:WIDTHxHEIGHT` entries
    pub fn parse_list(value: &str) -> Result<Vec<Self>, ConfigError> {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect()
    }

    fn parse(entry: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidValue {
            key: "STOWAGE_THUMBNAIL_SPECS".to_string(),
            message: format!("{entry}: {message}"),
        };

        let (name, size) = entry
            .split_once(':')
            .ok_or_else(|| invalid("expected name:WIDTHxHEIGHT"))?;
        let (width, height) = size
            .split_once('x')
            .ok_or_else(|| invalid("expected WIDTHxHEIGHT"))?;

        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("empty name"));
        }

        Ok(Self {
            name: name.to_string(),
            width: width.trim().parse().map_err(|_| invalid("invalid width"))?,
            height: height.trim().parse().map_err(|_| invalid("invalid height"))?,
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server
        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port.parse().unwrap_or(8080);
        }
        if let Ok(size) = std::env::var("STOWAGE_MAX_BODY_SIZE") {
            config.server.max_body_size_bytes =
                size.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "STOWAGE_MAX_BODY_SIZE".to_string(),
                    message: format!("not a byte count: {size}"),
                })?;
        }

        // Storage
        if let Ok(path) = std::env::var("STOWAGE_STORAGE_PATH") {
            config.storage.local_path = path;
        }

        // Caching
        if let Ok(days) = std::env::var("STOWAGE_CACHE_DAYS") {
            config.cache.max_age_days = days.parse().map_err(|_| ConfigError::InvalidValue {
                key: "STOWAGE_CACHE_DAYS".to_string(),
                message: format!("not a number of days: {days}"),
            })?;
        }

        // Thumbnails
        if let Ok(specs) = std::env::var("STOWAGE_THUMBNAIL_SPECS") {
            config.thumbnails.specs = ThumbnailSpecConfig::parse_list(&specs)?;
        }
        if let Ok(path) = std::env::var("STOWAGE_DEFAULT_THUMBNAIL") {
            if !path.is_empty() {
                config.thumbnails.default_thumbnail = Some(path);
            }
        }

        Ok(config)
    }

    /// Get the server address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::SocketAddr;
        let ip: std::net::IpAddr = self.server.host.parse().unwrap_or([0, 0, 0, 0].into());
        SocketAddr::new(ip, self.server.port)
    }
}
