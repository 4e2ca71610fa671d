use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Daemon configuration. Loaded from an optional JSON file named by
/// `QLOG_CONFIG`, then overridden field by field from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QlogConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory that `relativePath` query values are resolved against.
    #[serde(default = "default_log_root")]
    pub log_root: PathBuf,

    /// Chunk size for backward reads, in bytes.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

impl Default for QlogConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_root: default_log_root(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:7080".to_string()
}

fn default_log_root() -> PathBuf {
    PathBuf::from("/var/log")
}

fn default_buffer_capacity() -> usize {
    qlog_tail::DEFAULT_CHUNK_CAPACITY
}

pub fn load_config() -> QlogConfig {
    let mut config = match env_var("QLOG_CONFIG") {
        Some(path) if !path.trim().is_empty() => load_config_file(Path::new(&path)),
        _ => QlogConfig::default(),
    };

    if let Some(addr) = env_var("QLOG_LISTEN_ADDR") {
        if !addr.trim().is_empty() {
            config.listen_addr = addr;
        }
    }
    if let Some(root) = env_var("QLOG_LOG_ROOT") {
        if !root.trim().is_empty() {
            config.log_root = PathBuf::from(root);
        }
    }
    if let Some(capacity) = env_var("QLOG_BUFFER_CAPACITY") {
        match capacity.trim().parse::<usize>() {
            Ok(value) if value > 0 => config.buffer_capacity = value,
            _ => warn!("ignoring unparsable QLOG_BUFFER_CAPACITY: {capacity:?}"),
        }
    }

    config
}

fn load_config_file(path: &Path) -> QlogConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!("invalid config file {}: {err}", path.display());
                QlogConfig::default()
            }
        },
        Err(err) => {
            warn!("unreadable config file {}: {err}", path.display());
            QlogConfig::default()
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    #[cfg(test)]
    {
        let _ = key;
        None
    }

    #[cfg(not(test))]
    {
        std::env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_contract() {
        let config = QlogConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:7080");
        assert_eq!(config.log_root, PathBuf::from("/var/log"));
        assert_eq!(config.buffer_capacity, 65536);
    }

    #[test]
    fn partial_config_file_keeps_defaults_for_missing_fields() {
        let config: QlogConfig =
            serde_json::from_str(r#"{"buffer_capacity": 512}"#).expect("parse");
        assert_eq!(config.buffer_capacity, 512);
        assert_eq!(config.log_root, PathBuf::from("/var/log"));
    }

    #[test]
    fn invalid_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp");
        let path = dir.path().join("qlogd.json");
        std::fs::write(&path, "{not json").expect("write");
        let config = load_config_file(&path);
        assert_eq!(config.buffer_capacity, QlogConfig::default().buffer_capacity);
    }
}
