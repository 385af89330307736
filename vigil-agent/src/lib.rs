//! The Vigil endpoint agent.
//!
//! A run snapshots the host, enriches its address and software inventory,
//! writes a local report, registers the device with the backend and finally
//! sweeps the local network for camera-like hosts.
#![allow(missing_docs)]

pub mod cli;
pub mod pipeline;
pub mod telemetry;

pub use pipeline::{Pipeline, RunOptions, RunSummary};
