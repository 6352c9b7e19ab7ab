//! Configuration
//!
//! Two layers:
//!
//! - `load_environment()` reads `KEY=VALUE` lines from the canonical
//!   environment file into the process environment, without overriding
//!   variables that are already set. Call it before parsing flags so the
//!   flag parser can pick up env fallbacks.
//! - `BridgeConfig` is the typed configuration handed to the components.
//!
//! ```rust,no_run
//! use cb_core::config::load_environment;
//!
//! let report = load_environment();
//! // once tracing is initialized
//! report.log();
//! // CNI_BRIDGE_* variables from /etc/cni-bridge/environment are now visible
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Environment variable naming a custom environment file
pub const ENV_FILE_VAR: &str = "CNI_BRIDGE_ENV_FILE";

/// Paths checked for an environment file (in order of priority)
pub const ENV_FILE_PATHS: &[&str] = &["/etc/cni-bridge/environment", ".env"];

pub const DEFAULT_SOCKET: &str = "/usr/share/docker/plugins/cni.sock";
pub const DEFAULT_PLUGIN_DIR: &str = "/usr/libexec/cni-plugins";
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_PLUGIN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REGISTER_TIMEOUT_SECS: u64 = 30;

/// Outcome of [`load_environment`].
///
/// Loading runs before the subscriber exists, so nothing is logged while
/// reading; call [`EnvReport::log`] once tracing is initialized.
#[derive(Debug, Default)]
pub struct EnvReport {
    /// File the variables came from
    pub path: Option<String>,
    /// Keys set from the file, with secret values masked
    pub loaded: Vec<(String, String)>,
    /// Keys left alone because the environment already had them
    pub skipped: Vec<String>,
    /// Files that exist but could not be read, with the error
    pub unreadable: Vec<(String, String)>,
}

impl EnvReport {
    pub fn log(&self) {
        for (path, e) in &self.unreadable {
            warn!("Failed to read environment file {}: {}", path, e);
        }

        let Some(path) = &self.path else {
            debug!("No environment file found, using existing environment");
            return;
        };
        for (key, value) in &self.loaded {
            debug!("Loaded: {}={}", key, value);
        }
        for key in &self.skipped {
            debug!("Skipped (already set): {}", key);
        }
        info!(
            "Loaded {} environment variables from {} ({} skipped - already set)",
            self.loaded.len(),
            path,
            self.skipped.len()
        );
    }
}

/// Load environment variables from the canonical configuration file.
///
/// The first readable file wins: `$CNI_BRIDGE_ENV_FILE`, then
/// [`ENV_FILE_PATHS`] in order.
pub fn load_environment() -> EnvReport {
    let mut report = EnvReport::default();

    if let Ok(custom_path) = std::env::var(ENV_FILE_VAR) {
        if try_load_env_file(&custom_path, &mut report) {
            return report;
        }
    }

    for path in ENV_FILE_PATHS {
        if try_load_env_file(path, &mut report) {
            return report;
        }
    }

    report
}

fn try_load_env_file(path: &str, report: &mut EnvReport) -> bool {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return false;
    }

    let content = match fs::read_to_string(path_obj) {
        Ok(content) => content,
        Err(e) => {
            report.unreadable.push((path.to_string(), e.to_string()));
            return false;
        }
    };

    for (key, value) in content.lines().filter_map(parse_env_line) {
        if std::env::var(&key).is_err() {
            std::env::set_var(&key, &value);
            let shown = masked_value(&key, &value).to_string();
            report.loaded.push((key, shown));
        } else {
            report.skipped.push(key);
        }
    }

    report.path = Some(path.to_string());
    true
}

/// Values of keys that look like credentials are never logged
fn masked_value<'a>(key: &str, value: &'a str) -> &'a str {
    if key.contains("KEY") || key.contains("TOKEN") || key.contains("SECRET") {
        "***"
    } else {
        value
    }
}

/// Parse a single environment line into key-value pair.
///
/// Handles `KEY=VALUE`, `KEY="VALUE"` and `KEY='VALUE'`; comments and blank
/// lines yield `None`.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Typed configuration for the bridge service
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Unix socket the remote driver listens on
    pub socket_path: PathBuf,
    /// Directory holding CNI plugin executables
    pub plugin_dir: PathBuf,
    /// Optional directory of per-network CNI configuration files
    pub netconf_dir: Option<PathBuf>,
    /// Docker daemon address
    pub docker_host: String,
    /// Upper bound for one plugin execution
    pub plugin_timeout: Duration,
    /// Upper bound for waiting on a CreateNetwork connection to close
    pub register_timeout: Duration,
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET),
            plugin_dir: PathBuf::from(DEFAULT_PLUGIN_DIR),
            netconf_dir: None,
            docker_host: DEFAULT_DOCKER_HOST.to_string(),
            plugin_timeout: Duration::from_secs(DEFAULT_PLUGIN_TIMEOUT_SECS),
            register_timeout: Duration::from_secs(DEFAULT_REGISTER_TIMEOUT_SECS),
            debug: false,
        }
    }
}

impl BridgeConfig {
    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(Error::config("socket path must not be empty"));
        }
        if self.plugin_dir.as_os_str().is_empty() {
            return Err(Error::config("plugin directory must not be empty"));
        }
        if self.plugin_timeout.is_zero() {
            return Err(Error::config("plugin timeout must be greater than zero"));
        }
        if self.register_timeout.is_zero() {
            return Err(Error::config(
                "registration timeout must be greater than zero",
            ));
        }
        if !self.plugin_dir.is_dir() {
            warn!(
                "Plugin directory {} does not exist; every Join will fail until it does",
                self.plugin_dir.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_line_simple() {
        let (k, v) = parse_env_line("FOO=bar").unwrap();
        assert_eq!(k, "FOO");
        assert_eq!(v, "bar");
    }

    #[test]
    fn test_parse_env_line_quoted() {
        let (k, v) = parse_env_line("FOO=\"bar baz\"").unwrap();
        assert_eq!(k, "FOO");
        assert_eq!(v, "bar baz");

        let (_, v) = parse_env_line("FOO='bar'").unwrap();
        assert_eq!(v, "bar");
    }

    #[test]
    fn test_parse_env_line_skips_comments_and_blanks() {
        assert!(parse_env_line("").is_none());
        assert!(parse_env_line("   ").is_none());
        assert!(parse_env_line("# CNI_BRIDGE_SOCKET=/tmp/x").is_none());
        assert!(parse_env_line("=value").is_none());
        assert!(parse_env_line("NOEQUALS").is_none());
    }

    #[test]
    fn test_env_file_does_not_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("environment");
        std::fs::write(
            &path,
            "CB_CORE_TEST_NEW=from-file\nCB_CORE_TEST_SET=from-file\n",
        )
        .unwrap();
        std::env::set_var("CB_CORE_TEST_SET", "already");

        let mut report = EnvReport::default();
        assert!(try_load_env_file(path.to_str().unwrap(), &mut report));
        assert_eq!(std::env::var("CB_CORE_TEST_NEW").unwrap(), "from-file");
        assert_eq!(std::env::var("CB_CORE_TEST_SET").unwrap(), "already");
        assert_eq!(report.path.as_deref(), path.to_str());
        assert_eq!(
            report.loaded,
            vec![("CB_CORE_TEST_NEW".to_string(), "from-file".to_string())]
        );
        assert_eq!(report.skipped, vec!["CB_CORE_TEST_SET".to_string()]);
    }

    #[test]
    fn test_env_report_masks_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("environment");
        std::fs::write(
            &path,
            "CB_CORE_MASK_API_KEY=k1\nCB_CORE_MASK_TOKEN=t1\nCB_CORE_MASK_SECRET_FILE=s1\nCB_CORE_MASK_SOCKET=/run/cni.sock\n",
        )
        .unwrap();

        let mut report = EnvReport::default();
        assert!(try_load_env_file(path.to_str().unwrap(), &mut report));

        let shown: Vec<&str> = report.loaded.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(shown, vec!["***", "***", "***", "/run/cni.sock"]);
        // Only the logged copy is masked
        assert_eq!(std::env::var("CB_CORE_MASK_TOKEN").unwrap(), "t1");
    }

    #[test]
    fn test_missing_env_file() {
        let mut report = EnvReport::default();
        assert!(!try_load_env_file("/nonexistent/cni-bridge/environment", &mut report));
        assert!(report.path.is_none());
        assert!(report.unreadable.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = BridgeConfig {
            plugin_timeout: Duration::ZERO,
            ..BridgeConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_default() {
        assert!(BridgeConfig::default().validate().is_ok());
    }
}
