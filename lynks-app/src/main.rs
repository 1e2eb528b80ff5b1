use anyhow::{Context, Result};
use clap::Parser;
use lynks_activate::{ActivationOutcome, ActivationTask};
use lynks_common::observability::init_logging;
use lynks_config::{DatabaseSettings, LynksConfig, LynksConfigLoader};
use std::path::PathBuf;
use tracing::{error, info};

const APP_NAME: &str = "activate-user";

/// Mark a Lynks user profile as activated
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, long_about = None)]
struct Cli {
    /// Username whose profile is activated
    username: String,

    /// File with POSTGRES_USER, POSTGRES_PASSWORD and POSTGRES_DB
    #[arg(long, env = "LYNKS_ENV_FILE", default_value = "config/.env")]
    env_file: PathBuf,

    /// YAML file with logging settings
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Config and logging; the env file is the only required input
    let loader = match &cli.config {
        Some(path) => LynksConfigLoader::new().with_file(path),
        None => LynksConfigLoader::new().with_optional_file("lynks.yaml"),
    };
    let cfg: LynksConfig = loader.load().context("failed to load configuration")?;
    init_logging(cfg.logging.to_log_config(APP_NAME))?;

    let settings = DatabaseSettings::from_env_file(&cli.env_file).map_err(|e| {
        error!(env_file = %cli.env_file.display(), error = %e, "activation.config_failed");
        e
    })?;

    // 2) Activate; database trouble is reported, not fatal
    println!("Connecting to Lynks database..");
    match ActivationTask::new(&settings)?.run(&cli.username).await {
        Ok(ActivationOutcome::Activated { rows }) => {
            println!("Activated user {} ({rows} row(s) updated)", cli.username);
        }
        Ok(ActivationOutcome::NotFound) => {
            println!("Username {} not found", cli.username);
        }
        Err(e) => {
            println!("{e}");
            info!(username = %cli.username, kind = e.kind(), "activation.reported");
        }
    }
    Ok(())
}
