//! Enrichment engine for Vigil.
//!
//! The pieces compose leaves first: a [`cache::CacheStore`] backs the
//! cache-aside helper, [`intel`] adapters turn one upstream service into a
//! normalized [`vigil_model::SourceOutcome`], and [`enrich::Enricher`] fans
//! an entity out to the requested sources. Discovery, reporting and scan
//! execution sit alongside as the pipeline's collaborators.
#![allow(missing_docs)]

pub mod cache;
pub mod device;
pub mod discovery;
pub mod enrich;
pub mod intel;
pub mod journal;
pub mod report;
pub mod reporting;
pub mod scan;
pub mod token;

pub use cache::{CacheError, CacheKey, CacheStore, MemoryCache, RedisCache};
pub use enrich::Enricher;
pub use intel::IntelSource;
pub use reporting::{HttpReportingSink, ReportingSink, SinkError};
pub use scan::{NmapExecutor, ScanError, ScanExecutor};
pub use token::{TokenError, TokenProvider};
