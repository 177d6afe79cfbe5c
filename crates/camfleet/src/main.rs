mod cli;
mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use camfleet_api::{BridgeSdk, NmcliRadio, SystemAddressTable};
use camfleet_core::{Collaborators, Fleet};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands work without a fleet
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "camfleet", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let fleet = open_fleet(&cli.global).await?;
            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &fleet, &cli.global).await;
            fleet.shutdown().await;
            result
        }
    }
}

/// `--config` / `CAMFLEET_CONFIG`, else the platform location.
pub(crate) fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(camfleet_config::config_path)
}

/// Load the config, apply flag overrides and wire the real collaborators.
async fn open_fleet(global: &GlobalOpts) -> Result<Fleet, CliError> {
    let mut cfg = camfleet_config::load_config_from(&config_file(global))?;
    if let Some(dir) = &global.data_dir {
        cfg.data_dir = Some(dir.clone());
    }

    let fleet_config = cfg.to_fleet_config()?;
    let bridge = BridgeSdk::new(cfg.bridge_url()?, cfg.bridge_timeout()).map_err(|e| {
        CliError::AdapterUnavailable {
            reason: e.to_string(),
        }
    })?;
    let collaborators = Collaborators {
        sdk: Arc::new(bridge),
        radio: Arc::new(NmcliRadio::new(cfg.wifi_interface.clone())),
        address_table: Arc::new(SystemAddressTable),
    };

    tracing::debug!(data_dir = %fleet_config.data_dir.display(), "opening fleet");
    Ok(Fleet::open(fleet_config, collaborators).await?)
}
