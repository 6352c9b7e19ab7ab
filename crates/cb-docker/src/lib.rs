//! Docker Engine backend for the cni-bridge runtime seam

pub mod client;
pub mod convert;

pub use client::DockerRuntime;
