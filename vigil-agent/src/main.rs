use std::collections::BTreeSet;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use vigil_agent::cli::{Cli, Command, ConfigArgs, EnrichArgs, RunArgs};
use vigil_agent::pipeline::{self, Pipeline};
use vigil_agent::telemetry;
use vigil_config::constants::DEFAULT_ERROR_LOG;
use vigil_config::{Config, ConfigLoad, ConfigLoader};
use vigil_core::intel;
use vigil_core::journal::ErrorJournal;
use vigil_model::{Entity, SourceKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing();

    match cli.into_command() {
        Command::Run(args) => {
            run(args).await;
            Ok(())
        }
        Command::Enrich(args) => enrich(args).await,
    }
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;
    warnings.log();
    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    Ok(config)
}

/// Errors never escape a run: they land in the error journal and the
/// process still exits cleanly.
async fn run(args: RunArgs) {
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            let journal = ErrorJournal::new(DEFAULT_ERROR_LOG);
            pipeline::record_failure(&journal, &err).await;
            return;
        }
    };
    let journal = ErrorJournal::new(config.agent.error_log_path.clone());

    let pipeline = match Pipeline::from_config(&config, &args.options()).await {
        Ok(pipeline) => pipeline,
        Err(err) => {
            pipeline::record_failure(&journal, &err).await;
            return;
        }
    };

    if let Some(summary) = pipeline.run_journaled(&journal).await {
        info!(
            report = ?summary.report_path,
            device_registered = summary.device_registered,
            cameras_found = summary.cameras_found,
            cameras_registered = summary.cameras_registered,
            "agent run finished"
        );
    }
}

async fn enrich(args: EnrichArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;
    let http = intel::http_client().context("failed to build HTTP client")?;
    let enricher = pipeline::enricher_from_config(&config, &http).await;
    let requested: BTreeSet<SourceKind> =
        args.sources.iter().copied().collect();

    for entity in &args.entities {
        let sources = if requested.is_empty() {
            default_sources(entity)
        } else {
            requested.clone()
        };
        let result = enricher
            .enrich_within(entity, &sources, config.agent.enrich_deadline)
            .await;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

fn default_sources(entity: &Entity) -> BTreeSet<SourceKind> {
    SourceKind::ALL
        .into_iter()
        .filter(|kind| kind.accepts(entity))
        .collect()
}
