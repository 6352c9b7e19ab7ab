use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Failed to find plugin {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to spawn plugin {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin {plugin} exited with {status}: {}", String::from_utf8_lossy(.stdout).trim())]
    Exited {
        plugin: String,
        status: ExitStatus,
        /// Whatever the plugin wrote before failing; CNI plugins report
        /// errors as JSON on stdout.
        stdout: Vec<u8>,
    },

    #[error("Plugin {plugin} timed out after {}ms", .timeout.as_millis())]
    Timeout { plugin: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
