//! Command line flags

use cb_core::config::{
    DEFAULT_DOCKER_HOST, DEFAULT_PLUGIN_DIR, DEFAULT_PLUGIN_TIMEOUT_SECS,
    DEFAULT_REGISTER_TIMEOUT_SECS, DEFAULT_SOCKET,
};
use cb_core::BridgeConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "cni-bridge")]
#[command(version, about = "Docker remote network driver that runs CNI plugins")]
pub struct Args {
    /// Unix socket to serve the remote driver API on
    #[arg(long, env = "CNI_BRIDGE_SOCKET", default_value = DEFAULT_SOCKET)]
    pub socket: PathBuf,

    /// Directory holding CNI plugin executables
    #[arg(long, env = "CNI_BRIDGE_PLUGIN_DIR", default_value = DEFAULT_PLUGIN_DIR)]
    pub plugin_dir: PathBuf,

    /// Directory of per-network CNI configs (<network name>.conf)
    #[arg(long, env = "CNI_BRIDGE_NETCONF_DIR")]
    pub netconf_dir: Option<PathBuf>,

    /// Docker daemon address
    #[arg(long, env = "DOCKER_HOST", default_value = DEFAULT_DOCKER_HOST)]
    pub docker_host: String,

    /// Seconds a plugin may run before it is killed
    #[arg(long, env = "CNI_BRIDGE_PLUGIN_TIMEOUT", default_value_t = DEFAULT_PLUGIN_TIMEOUT_SECS)]
    pub plugin_timeout_secs: u64,

    /// Seconds to wait for a CreateNetwork connection to close
    #[arg(long, env = "CNI_BRIDGE_REGISTER_TIMEOUT", default_value_t = DEFAULT_REGISTER_TIMEOUT_SECS)]
    pub register_timeout_secs: u64,

    /// Debug logging
    #[arg(short, long, env = "CNI_BRIDGE_DEBUG")]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "CNI_BRIDGE_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    pub fn into_config(self) -> BridgeConfig {
        BridgeConfig {
            socket_path: self.socket,
            plugin_dir: self.plugin_dir,
            netconf_dir: self.netconf_dir,
            docker_host: self.docker_host,
            plugin_timeout: Duration::from_secs(self.plugin_timeout_secs),
            register_timeout: Duration::from_secs(self.register_timeout_secs),
            debug: self.debug,
        }
    }
}
