use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vigil_model::{Entity, SourceKind};

use crate::pipeline::RunOptions;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "vigil-agent")]
#[command(
    about = "Enriches device posture with threat intelligence and reports it"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

impl Cli {
    /// `run` is the default command.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Run(self.run))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute one full pipeline run
    Run(RunArgs),
    /// Enrich ad-hoc entities and print the results as JSON
    Enrich(EnrichArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file
    #[arg(long, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a .env file read before the environment
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Network to sweep for cameras, in CIDR form (overrides config)
    #[arg(long, value_name = "CIDR")]
    pub network: Option<String>,

    /// Skip the camera sweep
    #[arg(long, default_value_t = false)]
    pub skip_sweep: bool,
}

impl RunArgs {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            network: self.network.clone(),
            skip_sweep: self.skip_sweep,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EnrichArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// IP addresses or `name@version` software identities
    #[arg(required = true, value_name = "ENTITY")]
    pub entities: Vec<Entity>,

    /// Restrict the lookup to these sources (repeatable); defaults to
    /// every source that serves the entity's kind
    #[arg(long = "source", value_name = "NAME")]
    pub sources: Vec<SourceKind>,
}
