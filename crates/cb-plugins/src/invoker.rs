//! Plugin invocation
//!
//! Each call spawns the plugin once, feeds the config on stdin, collects
//! stdout and waits for the exit status. stderr goes straight to ours.
//! Every call is bounded by the invoker timeout; the child is killed when
//! the timeout fires or when the calling future is dropped.

use async_trait::async_trait;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::PluginError;

pub const ENV_COMMAND: &str = "CNI_COMMAND";
pub const ENV_CONTAINER_ID: &str = "CNI_CONTAINERID";
pub const ENV_NETNS: &str = "CNI_NETNS";
pub const ENV_PATH: &str = "CNI_PATH";

/// CNI operation requested from a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CniCommand {
    Add,
    Del,
}

impl CniCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CniCommand::Add => "ADD",
            CniCommand::Del => "DEL",
        }
    }
}

impl std::fmt::Display for CniCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait PluginInvoker: Send + Sync {
    /// Run `plugin` and return its stdout
    async fn invoke(
        &self,
        plugin: &str,
        command: CniCommand,
        container_id: &str,
        netns: &str,
        config: &[u8],
    ) -> Result<Vec<u8>, PluginError>;
}

/// Invokes plugin executables from a single plugin directory
#[derive(Debug, Clone)]
pub struct ExecInvoker {
    plugin_dir: PathBuf,
    timeout: Duration,
}

impl ExecInvoker {
    pub fn new(plugin_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            timeout,
        }
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Value for `CNI_PATH`. Colon-separated; only one directory for now.
    pub fn search_path(&self) -> String {
        self.plugin_dir.to_string_lossy().into_owned()
    }

    /// Locate the executable for `plugin`
    pub async fn resolve(&self, plugin: &str) -> Result<PathBuf, PluginError> {
        let path = self.plugin_dir.join(plugin);

        if plugin.is_empty() || plugin == "." || plugin == ".." || plugin.contains('/') {
            return Err(PluginError::NotFound { path });
        }

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.permissions().mode() & 0o111 != 0 => Ok(path),
            _ => Err(PluginError::NotFound { path }),
        }
    }

    async fn run(
        &self,
        plugin: &str,
        path: &Path,
        command: CniCommand,
        container_id: &str,
        netns: &str,
        config: &[u8],
    ) -> Result<Vec<u8>, PluginError> {
        let mut child = Command::new(path)
            .env(ENV_COMMAND, command.as_str())
            .env(ENV_CONTAINER_ID, container_id)
            .env(ENV_NETNS, netns)
            .env(ENV_PATH, self.search_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PluginError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        let stdin = child.stdin.take();
        let write_config = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(config).await?;
                stdin.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (written, output) = tokio::join!(write_config, child.wait_with_output());
        let output = output?;

        if let Err(e) = written {
            // Plugins that ignore stdin may exit before reading it
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                warn!("Failed writing config to plugin {}: {}", plugin, e);
            }
        }

        if !output.status.success() {
            return Err(PluginError::Exited {
                plugin: plugin.to_string(),
                status: output.status,
                stdout: output.stdout,
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl PluginInvoker for ExecInvoker {
    async fn invoke(
        &self,
        plugin: &str,
        command: CniCommand,
        container_id: &str,
        netns: &str,
        config: &[u8],
    ) -> Result<Vec<u8>, PluginError> {
        let path = self.resolve(plugin).await?;

        info!(
            "Executing plugin {} {} for {} (netns {}, timeout {}ms)",
            plugin,
            command,
            container_id,
            netns,
            self.timeout.as_millis()
        );
        let start = Instant::now();

        let result = tokio::time::timeout(
            self.timeout,
            self.run(plugin, &path, command, container_id, netns, config),
        )
        .await;

        let elapsed = start.elapsed().as_millis();
        match result {
            Ok(Ok(stdout)) => {
                debug!("Plugin {} {} completed in {}ms", plugin, command, elapsed);
                Ok(stdout)
            }
            Ok(Err(e)) => {
                warn!("Plugin {} {} failed after {}ms: {}", plugin, command, elapsed, e);
                Err(e)
            }
            Err(_) => {
                warn!("Plugin {} {} timed out after {}ms", plugin, command, elapsed);
                Err(PluginError::Timeout {
                    plugin: plugin.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}
