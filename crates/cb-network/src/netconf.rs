//! Per-network CNI configuration
//!
//! With no directory configured every plugin gets an empty stdin. With a
//! directory, `<dir>/<network name>.conf` is used, then `<dir>/<network
//! id>.conf`; when neither exists the payload stays empty.

use cb_core::NetworkRecord;
use std::path::PathBuf;
use tracing::debug;

use crate::error::DriverError;

#[derive(Debug, Clone, Default)]
pub struct NetconfLoader {
    dir: Option<PathBuf>,
}

impl NetconfLoader {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub async fn load(&self, network: &NetworkRecord) -> Result<Vec<u8>, DriverError> {
        let Some(dir) = &self.dir else {
            return Ok(Vec::new());
        };

        for stem in [&network.name, &network.id] {
            if stem.is_empty() || stem.contains('/') {
                continue;
            }
            let path = dir.join(format!("{}.conf", stem));
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    debug!("Using network config {}", path.display());
                    return Ok(bytes);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(DriverError::NetconfUnreadable { path, source }),
            }
        }

        debug!("No network config for {} ({})", network.name, network.id);
        Ok(Vec::new())
    }
}
