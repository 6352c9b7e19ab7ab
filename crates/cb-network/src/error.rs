//! Driver errors and their wire form
//!
//! Every failure is answered with `{"Err": "<message>"}`; malformed bodies
//! get 400, everything else 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cb_plugins::{CniCommand, PluginError};
use cb_state::StateError;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use crate::wire::ErrorResponse;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Unable to decode JSON payload: {0}")]
    Decode(String),

    #[error("Could not find network {0}")]
    NetworkNotFound(String),

    #[error("Failed to find container with sandbox {0}")]
    ContainerNotFound(String),

    #[error("Failed to find container {container} netns: {source}")]
    NamespaceUnresolved {
        container: String,
        #[source]
        source: StateError,
    },

    #[error("Failed to read network config {}: {source}", .path.display())]
    NetconfUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin {plugin} not found: {source}")]
    PluginNotFound {
        plugin: String,
        #[source]
        source: PluginError,
    },

    #[error("Plugin {plugin} failed the {command} operation: {source}")]
    PluginExecFailed {
        plugin: String,
        command: CniCommand,
        #[source]
        source: PluginError,
    },

    #[error("Plugin {plugin} did not finish the {command} operation: {source}")]
    Timeout {
        plugin: String,
        command: CniCommand,
        #[source]
        source: PluginError,
    },
}

impl DriverError {
    /// Classify a plugin failure
    pub fn from_plugin(plugin: &str, command: CniCommand, source: PluginError) -> Self {
        let plugin = plugin.to_string();
        match source {
            PluginError::NotFound { .. } => DriverError::PluginNotFound { plugin, source },
            PluginError::Timeout { .. } => DriverError::Timeout {
                plugin,
                command,
                source,
            },
            _ => DriverError::PluginExecFailed {
                plugin,
                command,
                source,
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DriverError::Decode(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DriverError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = self.to_string();
        warn!("{} {}", status.as_u16(), err);
        (status, Json(ErrorResponse { err })).into_response()
    }
}
