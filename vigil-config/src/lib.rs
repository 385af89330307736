//! Configuration loading for Vigil.
//!
//! Values come from an optional `.env` file, an optional TOML file and the
//! process environment, in increasing order of precedence. Missing
//! credentials never fail a load; they surface as [`ConfigWarnings`] and
//! disable the affected source.
#![allow(missing_docs)]

pub mod constants;
pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    AgentConfig, BackendConfig, CacheConfig, Config, ConfigMetadata,
    HostStatePolicy, IntelConfig, OAuthClientConfig, ScanServerConfig,
    SourceConfig,
};
pub use validation::{ConfigWarning, ConfigWarnings};
