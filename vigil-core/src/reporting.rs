//! Reporting sink: delivers device and entity records to the backend.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use vigil_model::{DeviceRecord, EntityRecord};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend rejected {endpoint} with status {status}: {body}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("record not sendable: {0}")]
    InvalidRecord(String),
}

#[async_trait]
pub trait ReportingSink: Send + Sync {
    async fn register_device(
        &self,
        token: &str,
        device: &DeviceRecord,
    ) -> Result<(), SinkError>;

    async fn register_entity(
        &self,
        token: &str,
        entity: &EntityRecord,
    ) -> Result<(), SinkError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceEnvelope<'a> {
    token: &'a str,
    device_info: &'a DeviceRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CameraEnvelope<'a> {
    token: &'a str,
    camera_info: &'a EntityRecord,
}

/// JSON-over-HTTP sink for the backend's registration API.
#[derive(Debug, Clone)]
pub struct HttpReportingSink {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReportingSink {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: Serialize + Sync>(
        &self,
        endpoint: &'static str,
        token: &str,
        body: &T,
    ) -> Result<(), SinkError> {
        let response = self
            .http
            .post(format!("{}/{endpoint}", self.base_url))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Rejected {
            endpoint,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ReportingSink for HttpReportingSink {
    async fn register_device(
        &self,
        token: &str,
        device: &DeviceRecord,
    ) -> Result<(), SinkError> {
        if token.is_empty() {
            return Err(SinkError::InvalidRecord("empty token".into()));
        }
        let envelope = DeviceEnvelope {
            token,
            device_info: device,
        };
        self.post("register-device", token, &envelope).await?;
        info!(device = %device.info.name, "device registered");
        Ok(())
    }

    async fn register_entity(
        &self,
        token: &str,
        entity: &EntityRecord,
    ) -> Result<(), SinkError> {
        if token.is_empty() || entity.ip_address.is_empty() {
            return Err(SinkError::InvalidRecord(format!(
                "missing token or address for entity '{}'",
                entity.name
            )));
        }
        let envelope = CameraEnvelope {
            token,
            camera_info: entity,
        };
        self.post("cameras", token, &envelope).await?;
        info!(ip = %entity.ip_address, "entity registered");
        Ok(())
    }
}
