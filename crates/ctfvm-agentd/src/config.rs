use std::{path::PathBuf, time::Duration};

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use ctfvm_core::LifecycleConfig;
use ctfvm_observe::LoggerFormat;

use crate::duration::parse_ttl;

#[derive(Debug, Parser)]
#[command(name = "ctfvm-agentd")]
#[command(author, version, about = "Per-team challenge workloads with idle expiry", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Log filter directive
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format (text, json, journald)
    #[arg(long, env = "LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: LoggerFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve(ServeArgs),

    /// Scan challenge directories and upsert them into the catalog file
    Seed(SeedArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Serve(ServeArgs::parse_from(["serve"]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuntimeKind {
    /// Local Docker daemon
    Docker,
    /// In-process bookkeeping only, nothing is started
    Memory,
}

#[derive(Debug, Clone, Parser)]
pub struct ServeArgs {
    /// HTTP listen port
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Network every workload container joins
    #[arg(long, env = "DOCKER_NETWORK", default_value = "ctf-network")]
    pub network: String,

    /// Inactivity window before a workload is torn down
    #[arg(long, env = "CONTAINER_TIMEOUT", default_value = "30m", value_parser = parse_ttl)]
    pub container_timeout: Duration,

    /// Domain appended to workload hostnames
    #[arg(long, env = "BASE_DOMAIN", default_value = "ctf.local")]
    pub base_domain: String,

    /// Directory containing `challenges/<tag>/`
    #[arg(long, env = "CHALLENGES_ROOT", default_value = ".")]
    pub challenges_root: PathBuf,

    /// Catalog JSON file
    #[arg(long, env = "CATALOG_PATH", default_value = "catalog.json")]
    pub catalog_path: PathBuf,

    /// Seconds a container gets to stop before it is killed
    #[arg(long, env = "STOP_GRACE_SECS", default_value_t = 10)]
    pub stop_grace_secs: u64,

    /// Container runtime backend
    #[arg(long, env = "RUNTIME", value_enum, default_value_t = RuntimeKind::Docker)]
    pub runtime: RuntimeKind,
}

impl ServeArgs {
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            ttl: self.container_timeout,
            base_domain: self.base_domain.clone(),
            network: self.network.clone(),
            challenges_root: self.challenges_root.clone(),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
        }
    }
}

#[derive(Debug, Clone, ClapArgs)]
pub struct SeedArgs {
    /// Directory whose subdirectories hold `info.json`
    #[arg(long, default_value = "challenges")]
    pub source: PathBuf,

    /// Catalog JSON file to create or update
    #[arg(long, env = "CATALOG_PATH", default_value = "catalog.json")]
    pub catalog_path: PathBuf,
}
