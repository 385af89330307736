//! Per-run report file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use vigil_model::DeviceReport;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write report {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `report_YYYYmmdd_HHMMSS.json`, UTC.
pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("report_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Writes `report` as pretty JSON into `dir` and returns the path.
pub async fn write_report(
    dir: &Path,
    report: &DeviceReport,
    at: DateTime<Utc>,
) -> Result<PathBuf, ReportError> {
    let path = dir.join(report_file_name(at));
    let body = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use vigil_model::{DeviceInfo, DeviceRecord, EnrichmentResult, Entity};

    use super::*;

    fn sample_report(at: DateTime<Utc>) -> DeviceReport {
        let info = DeviceInfo {
            name: "host".into(),
            os: "Linux 6.1".into(),
            ip_address: "10.0.0.2".into(),
            cpu_usage: 12.5,
            memory_usage: 40.0,
            timestamp: at,
        };
        let record = DeviceRecord::new(
            info,
            Vec::new(),
            Vec::new(),
            &EnrichmentResult::new(Entity::ip("10.0.0.2")),
        );
        DeviceReport::from(&record)
    }

    #[test]
    fn file_name_embeds_utc_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(report_file_name(at), "report_20250309_070501.json");
    }

    #[tokio::test]
    async fn writes_report_layout() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        let path = write_report(dir.path(), &sample_report(at), at)
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(json["device_info"]["ip"], "10.0.0.2");
        assert_eq!(json["device_info"]["cpu_usage"], 12.5);
        assert!(json["security_data"]["cves"].as_array().unwrap().is_empty());
        assert_eq!(json["security_data"]["shodan"]["status"], "unavailable");
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let at = Utc::now();
        let err = write_report(&missing, &sample_report(at), at)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }));
    }
}
