//! cb-state: Event-sourced state cache
//!
//! Provides:
//! - `StateCache`: shared view of known networks and live containers
//! - `Watcher`: the single event consumer that keeps the container view
//!   current, stoppable through its `WatcherHandle`

pub mod cache;
pub mod error;
pub mod watcher;

pub use cache::{netns_path, StateCache};
pub use error::StateError;
pub use watcher::{Watcher, WatcherExit, WatcherHandle};
