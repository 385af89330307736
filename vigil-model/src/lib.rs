//! Core data model definitions shared across Vigil crates.
#![allow(missing_docs)]

pub mod device;
pub mod enrichment;
pub mod entity;
pub mod error;
pub mod intel;
pub mod scan;
pub mod source;

// Intentionally curated re-exports for downstream consumers.
pub use device::{
    DeviceInfo, DeviceInfoSection, DeviceRecord, DeviceReport, EntityRecord,
    SecurityData,
};
pub use enrichment::EnrichmentResult;
pub use entity::{Entity, SoftwareId};
pub use error::{ModelError, Result as ModelResult};
pub use intel::{
    CveRecord, Fingerprint, FingerprintRecord, ReputationRecord,
    VulnSearchHit,
};
pub use scan::{HostState, PortRecord, ScanHost, ScanRequest};
pub use source::{
    FailureClass, SourceData, SourceKind, SourceOutcome, UnavailableReason,
};
