use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "vigil-scan-server")]
#[command(about = "Authenticated, rate-limited nmap scan service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeArgs,
}

impl Cli {
    /// `serve` is the default command.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP service
    Serve(ServeArgs),
    /// Print a bearer token signed with JWT_SECRET
    MintToken(MintTokenArgs),
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
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Server host (overrides config)
    #[arg(long)]
    pub host: Option<String>,

    /// Server port (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug, Clone)]
pub struct MintTokenArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Token lifetime, e.g. `1h` or `30m`
    #[arg(long, default_value = "1h", value_parser = humantime::parse_duration)]
    pub ttl: Duration,

    /// Optional `sub` claim
    #[arg(long)]
    pub subject: Option<String>,
}
