use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

/// What the process should do after loading configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    /// Report catalog/tree inconsistencies and exit.
    Check,
    /// Repair catalog/tree inconsistencies and exit.
    Reconcile,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Filesystem-backed object storage")]
pub struct Args {
    /// Host to bind to (overrides TRIPLES_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides TRIPLES_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Data directory holding the catalogs and bucket directories (overrides TRIPLES_DATA_DIR)
    #[arg(long = "dir")]
    pub data_dir: Option<PathBuf>,

    /// Report inconsistencies between catalogs and files, then exit
    #[arg(long, conflicts_with = "reconcile")]
    pub check: bool,

    /// Repair inconsistencies between catalogs and files, then exit
    #[arg(long)]
    pub reconcile: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<(Self, RunMode)> {
        // --- Environment fallback ---
        let env_host = env::var("TRIPLES_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("TRIPLES_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing TRIPLES_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8080,
            Err(err) => return Err(err).context("reading TRIPLES_PORT"),
        };
        let env_dir = env::var_os("TRIPLES_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            data_dir: args.data_dir.unwrap_or(env_dir),
        };
        if cfg.port == 0 {
            bail!("port must be between 1 and 65535");
        }

        let mode = if args.reconcile {
            RunMode::Reconcile
        } else if args.check {
            RunMode::Check
        } else {
            RunMode::Serve
        };
        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
