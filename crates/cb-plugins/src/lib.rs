//! cb-plugins: CNI plugin execution
//!
//! A CNI plugin is an executable in the plugin directory. It is told what to
//! do through `CNI_*` environment variables, reads its network configuration
//! from stdin and writes its result to stdout.

pub mod error;
pub mod invoker;

pub use error::PluginError;
pub use invoker::{CniCommand, ExecInvoker, PluginInvoker};
