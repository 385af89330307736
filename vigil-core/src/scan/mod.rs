//! Network scan execution.
//!
//! [`NmapExecutor`] runs the scanner binary directly (no shell) with
//! grepable output on stdout and shapes it into [`ScanHost`] records.

mod args;
mod grepable;
mod nmap;

use async_trait::async_trait;
use thiserror::Error;
use vigil_model::ScanHost;

pub use self::args::{
    check_args, split_args, validate_network, validate_target,
};
pub use self::grepable::parse_grepable;
pub use self::nmap::NmapExecutor;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("argument not allowed: {0}")]
    DisallowedArgument(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scan failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },
}

impl ScanError {
    /// True for request problems detected before the scanner ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScanError::DisallowedArgument(_) | ScanError::InvalidTarget(_)
        )
    }
}

#[async_trait]
pub trait ScanExecutor: Send + Sync {
    async fn scan(
        &self,
        target: &str,
        args: &[String],
    ) -> Result<Vec<ScanHost>, ScanError>;
}
