//! Client configuration for scanning through a running clamd.

use std::io;
use std::path::{Path, PathBuf};

/// A temporary clamd config file pointing at a local socket.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct ClamdConfig {
    socket_path: PathBuf,
    config_path: PathBuf,
}

impl ClamdConfig {
    pub fn new(socket_path: &Path) -> io::Result<Self> {
        let socket_path = std::path::absolute(socket_path)?;
        let config_path =
            std::env::temp_dir().join(format!("clamd-{}.conf", uuid::Uuid::new_v4().simple()));

        std::fs::write(
            &config_path,
            format!("LocalSocket {}\n", socket_path.display()),
        )?;
        log::info!("Created clamd config file at {}", config_path.display());

        Ok(Self {
            socket_path,
            config_path,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The `--config-file=` argument for clamdscan.
    pub fn config_arg(&self) -> String {
        format!("--config-file={}", self.config_path.display())
    }
}

impl Drop for ClamdConfig {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.config_path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!(
                    "Failed to remove clamd config file {}: {}",
                    self.config_path.display(),
                    e
                );
            }
        }
    }
}
