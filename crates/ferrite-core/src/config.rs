//! Proxy configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Top-level configuration for the proxy, loadable from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProxyConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub qos: QosConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Remote object-store endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the object-store endpoint (a GCS-compatible JSON API).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

/// Disk cache and transfer-memory limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding cached objects.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Maximum total size of finalized cached files, in bytes.
    #[serde(default = "default_max_disk_bytes")]
    pub max_disk_bytes: u64,
    /// Maximum aggregate memory for in-flight transfer buffers, in bytes.
    #[serde(default = "default_max_stream_memory_bytes")]
    pub max_stream_memory_bytes: u64,
}

/// Per-client fairness limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QosConfig {
    /// Maximum concurrent requests per client id.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: u32,
    /// Maximum bytes per second per client id.
    #[serde(default = "default_max_bandwidth")]
    pub max_bandwidth_bps: u64,
    /// Idle horizon after which untracked client state is dropped, seconds.
    #[serde(default = "default_idle_horizon")]
    pub idle_client_horizon_secs: u64,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_endpoint() -> String {
    "http://localhost:4443".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_max_disk_bytes() -> u64 {
    500 * 1024 * 1024
}

fn default_max_stream_memory_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_max_concurrent() -> u32 {
    2
}

fn default_max_bandwidth() -> u64 {
    10 * 1024 * 1024
}

fn default_idle_horizon() -> u64 {
    600
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_disk_bytes: default_max_disk_bytes(),
            max_stream_memory_bytes: default_max_stream_memory_bytes(),
        }
    }
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            max_bandwidth_bps: default_max_bandwidth(),
            idle_client_horizon_secs: default_idle_horizon(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_sections() {
        let config: ProxyConfig = serde_yaml::from_str("remote:\n  endpoint: http://gcs:4443\n").unwrap();
        assert_eq!(config.remote.endpoint, "http://gcs:4443");
        assert_eq!(config.cache.max_disk_bytes, 500 * 1024 * 1024);
        assert_eq!(config.qos.max_concurrent_requests, 2);
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferrite.yaml");
        std::fs::write(
            &path,
            "cache:\n  max_disk_bytes: 1000\nqos:\n  max_bandwidth_bps: 4096\n",
        )
        .unwrap();

        let config = ProxyConfig::from_file(&path).unwrap();
        assert_eq!(config.cache.max_disk_bytes, 1000);
        assert_eq!(config.qos.max_bandwidth_bps, 4096);
    }
}
