//! One agent run, from device snapshot to camera registration.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use futures::StreamExt;
use tracing::{error, info, warn};
use vigil_config::{AgentConfig, Config};
use vigil_core::discovery::{
    CameraSweep, DiscoveryFeed, StaticFeed, SweepFinding, load_inventory,
};
use vigil_core::journal::ErrorJournal;
use vigil_core::report::write_report;
use vigil_core::{
    Enricher, HttpReportingSink, NmapExecutor, ReportingSink, TokenProvider,
    cache, device, intel,
};
use vigil_model::{
    DeviceInfo, DeviceRecord, DeviceReport, Entity, EntityRecord, SoftwareId,
    SourceKind,
};

/// Sources consulted for the device's own address and for camera hosts.
pub const ADDRESS_SOURCES: [SourceKind; 2] =
    [SourceKind::Reputation, SourceKind::Fingerprint];
/// Sources consulted for each inventoried software package.
pub const SOFTWARE_SOURCES: [SourceKind; 1] = [SourceKind::VulnDb];
/// Sources consulted for a camera's product banner (or the generic
/// camera term when the host reported none).
pub const PRODUCT_SOURCES: [SourceKind; 1] = [SourceKind::VulnSearch];

const UNKNOWN_PRODUCT: &str = "Unknown";

/// Command-line overrides for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub network: Option<String>,
    pub skip_sweep: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub report_path: Option<PathBuf>,
    pub device_registered: bool,
    pub cameras_found: usize,
    pub cameras_registered: usize,
}

/// Builds the enricher described by `config`: Redis when reachable, the
/// in-process cache otherwise, and one adapter per intelligence source.
pub async fn enricher_from_config(
    config: &Config,
    http: &reqwest::Client,
) -> Enricher {
    let store = cache::connect(config.cache.redis_url.as_deref()).await;
    Enricher::new(store)
        .with_sources(intel::sources_from_config(&config.intel, http))
}

pub struct Pipeline {
    enricher: Arc<Enricher>,
    sink: Arc<dyn ReportingSink>,
    tokens: TokenProvider,
    sweep: Option<CameraSweep>,
    settings: AgentConfig,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("enricher", &self.enricher)
            .field("tokens", &self.tokens)
            .field("sweep", &self.sweep)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        enricher: Arc<Enricher>,
        sink: Arc<dyn ReportingSink>,
        tokens: TokenProvider,
        settings: AgentConfig,
    ) -> Self {
        Self {
            enricher,
            sink,
            tokens,
            sweep: None,
            settings,
        }
    }

    pub fn with_sweep(mut self, sweep: CameraSweep) -> Self {
        self.sweep = Some(sweep);
        self
    }

    /// Wires the production collaborators: HTTP adapters, the backend sink,
    /// the configured token source and an nmap-backed camera sweep.
    pub async fn from_config(
        config: &Config,
        options: &RunOptions,
    ) -> anyhow::Result<Self> {
        let http = intel::http_client().context("failed to build HTTP client")?;
        let enricher = enricher_from_config(config, &http).await;
        let sink = HttpReportingSink::new(
            http.clone(),
            config.backend.api_url.clone(),
        );
        let tokens = TokenProvider::from_config(&config.backend, http);

        let mut pipeline = Self::new(
            Arc::new(enricher),
            Arc::new(sink),
            tokens,
            config.agent.clone(),
        );

        if options.skip_sweep {
            info!("camera sweep disabled");
        } else {
            let network = options
                .network
                .clone()
                .unwrap_or_else(|| config.agent.camera_network.clone());
            let executor = Arc::new(NmapExecutor::new(
                config.scan_server.nmap_path.clone(),
            ));
            pipeline = pipeline.with_sweep(
                CameraSweep::new(
                    executor,
                    network,
                    config.agent.camera_ports.clone(),
                )
                .with_down_hosts(config.agent.down_hosts),
            );
        }
        Ok(pipeline)
    }

    /// Runs against a fresh snapshot of this host.
    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        let info = device::snapshot().await;
        self.run_with(info).await
    }

    /// Runs the pipeline and appends any escaping error to `journal`.
    /// Returns `None` when the run failed.
    pub async fn run_journaled(
        &self,
        journal: &ErrorJournal,
    ) -> Option<RunSummary> {
        match self.run().await {
            Ok(summary) => Some(summary),
            Err(err) => {
                record_failure(journal, &err).await;
                None
            }
        }
    }

    pub async fn run_with(
        &self,
        info: DeviceInfo,
    ) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        let software = load_inventory(self.settings.inventory_path.as_deref())
            .await
            .context("failed to load software inventory")?;
        let record = self.assess_device(info, software).await;
        info!(
            ip = %record.info.ip_address,
            software = record.software.len(),
            cves = record.cves.len(),
            "device assessed"
        );

        let report = DeviceReport::from(&record);
        let written = write_report(
            &self.settings.report_dir,
            &report,
            record.info.timestamp,
        )
        .await;
        match written {
            Ok(path) => {
                info!(path = %path.display(), "report written");
                summary.report_path = Some(path);
            }
            Err(err) => error!(error = %err, "failed to write report"),
        }

        let Some(token) = self
            .tokens
            .token()
            .await
            .context("failed to acquire backend token")?
        else {
            warn!("no backend credential configured; skipping registration");
            return Ok(summary);
        };

        match self.sink.register_device(&token, &record).await {
            Ok(()) => {
                info!(ip = %record.info.ip_address, "device registered");
                summary.device_registered = true;
            }
            Err(err) => error!(error = %err, "device registration failed"),
        }

        if let Some(sweep) = &self.sweep {
            let findings = sweep.sweep().await.with_context(|| {
                format!("camera sweep of {} failed", sweep.network())
            })?;
            summary.cameras_found = findings.len();
            summary.cameras_registered =
                self.register_cameras(&token, &findings).await;
            info!(
                found = summary.cameras_found,
                registered = summary.cameras_registered,
                "camera sweep complete"
            );
        }

        Ok(summary)
    }

    /// Enriches the device address and every inventoried package, and
    /// flattens the packages' CVEs in inventory order.
    pub async fn assess_device(
        &self,
        info: DeviceInfo,
        software: Vec<SoftwareId>,
    ) -> DeviceRecord {
        let deadline = self.settings.enrich_deadline;
        let address_sources: BTreeSet<SourceKind> = ADDRESS_SOURCES.into();
        let software_sources: BTreeSet<SourceKind> = SOFTWARE_SOURCES.into();

        let address = Entity::ip(info.ip_address.clone());
        let ip_result = self
            .enricher
            .enrich_within(&address, &address_sources, deadline)
            .await;

        let feed = StaticFeed::new(
            "inventory",
            software.iter().cloned().map(Entity::Software).collect(),
        );
        let mut results: Vec<_> = self
            .enricher
            .enrich_many(
                feed.entities(),
                &software_sources,
                self.settings.enrich_concurrency,
                Some(deadline),
            )
            .collect()
            .await;
        results.sort_by_key(|result| {
            software
                .iter()
                .position(|sw| result.entity.as_software() == Some(sw))
        });

        let cves = results
            .iter()
            .flat_map(|result| result.cves().iter().cloned())
            .collect();
        DeviceRecord::new(info, software, cves, &ip_result)
    }

    /// Builds the backend record for one sweep finding.
    pub async fn assess_camera(&self, finding: &SweepFinding) -> EntityRecord {
        let deadline = self.settings.enrich_deadline;
        let address_sources: BTreeSet<SourceKind> = ADDRESS_SOURCES.into();
        let product_sources: BTreeSet<SourceKind> = PRODUCT_SOURCES.into();

        let ip_result = self
            .enricher
            .enrich_within(&finding.ip, &address_sources, deadline)
            .await;
        let product_result = self
            .enricher
            .enrich_within(&finding.product, &product_sources, deadline)
            .await;

        let host = &finding.host;
        let product = host.product().unwrap_or(UNKNOWN_PRODUCT).to_string();
        let mut ports: Vec<u16> = host.ports.iter().map(|p| p.port).collect();
        ports.dedup();

        EntityRecord {
            ip_address: host.ip.clone(),
            name: format!("Camera {}", host.ip),
            manufacturer: product.clone(),
            model: product,
            hostnames: host.hostnames.clone(),
            state: host.state,
            ports,
            last_scanned: Utc::now(),
            shodan_data: ip_result.outcome_or_missing(SourceKind::Fingerprint),
            grey_noise_data: ip_result
                .outcome_or_missing(SourceKind::Reputation),
            vulnerabilities: product_result.vuln_hits().to_vec(),
            enrichment: vec![ip_result, product_result],
        }
    }

    async fn register_cameras(
        &self,
        token: &str,
        findings: &[SweepFinding],
    ) -> usize {
        let mut registered = 0;
        for finding in findings {
            let record = self.assess_camera(finding).await;
            match self.sink.register_entity(token, &record).await {
                Ok(()) => registered += 1,
                Err(err) => warn!(
                    ip = %record.ip_address,
                    error = %err,
                    "camera registration failed"
                ),
            }
        }
        registered
    }
}

/// Logs `err` and appends it to the journal. A journal that cannot be
/// written is only logged.
pub async fn record_failure(journal: &ErrorJournal, err: &anyhow::Error) {
    let message = format!("{err:#}");
    error!(error = %message, "agent run failed");
    if let Err(io) = journal.append(&message).await {
        error!(
            path = %journal.path().display(),
            error = %io,
            "failed to append to error journal"
        );
    }
}
