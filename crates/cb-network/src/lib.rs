//! Docker remote network driver backed by CNI plugins
//!
//! Serves the libnetwork remote driver protocol. Networks are tracked in the
//! shared [`cb_state::StateCache`]; Join resolves the container behind a
//! sandbox key and runs the network's CNI plugin inside its namespace.

pub mod driver;
pub mod error;
pub mod handlers;
pub mod netconf;
pub mod wire;

pub use driver::{DriverConfig, NetworkDriver};
pub use error::DriverError;
pub use handlers::create_router;
pub use netconf::NetconfLoader;
