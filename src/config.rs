use crate::error::ServerResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    // Network configuration
    pub listen_address: String,
    pub port: u16,
    pub backlog: i32,

    // Filesystem configuration
    pub web_root: PathBuf,

    // Whitelisted asset served outside the web root resolver
    pub asset_path: String,
    pub asset_file: PathBuf,

    // I/O sizes
    pub read_buffer_size: usize,
    pub chunk_size: usize,
    pub max_events: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "::".to_string(),
            port: 8080,
            backlog: 10,

            web_root: PathBuf::from("."),

            asset_path: "/github.png".to_string(),
            asset_file: PathBuf::from("github.png"),

            read_buffer_size: 8 * 1024,
            chunk_size: 1024,
            max_events: 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address and port to listen on
    pub fn with_address(mut self, address: &str, port: u16) -> Self {
        self.listen_address = address.to_string();
        self.port = port;
        self
    }

    /// Set the directory tree served by the filesystem resolver
    pub fn with_web_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.web_root = root.into();
        self
    }

    /// Set the listen backlog depth
    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Set the file streaming chunk size
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_json_file<P: AsRef<Path>>(&self, path: P) -> ServerResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new();
        assert_eq!(config.port, 8080);
        assert_eq!(config.backlog, 10);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.asset_path, "/github.png");
    }

    #[test]
    fn test_json_round_trip() {
        let config = ServerConfig::new()
            .with_address("127.0.0.1", 9000)
            .with_web_root("/srv/www")
            .with_backlog(64)
            .with_chunk_size(4096);

        let json = serde_json::to_string(&config).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.listen_address, "127.0.0.1");
        assert_eq!(back.port, 9000);
        assert_eq!(back.web_root, PathBuf::from("/srv/www"));
        assert_eq!(back.backlog, 64);
        assert_eq!(back.chunk_size, 4096);
    }

    #[test]
    fn test_json_file_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "quickserve-config-{}.json",
            std::process::id()
        ));

        let config = ServerConfig::new()
            .with_address("::1", 8088)
            .with_backlog(32);
        config.save_to_json_file(&path).unwrap();

        let back = ServerConfig::from_json_file(&path).unwrap();
        assert_eq!(back.listen_address, "::1");
        assert_eq!(back.port, 8088);
        assert_eq!(back.backlog, 32);

        let _ = fs::remove_file(&path);
    }
}
