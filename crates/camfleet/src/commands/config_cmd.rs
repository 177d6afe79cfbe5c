//! Config subcommand handlers.

use std::path::{Path, PathBuf};

use camfleet_config::{self as config, Config};
use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::validation("interactive", format!("prompt failed: {e}"))
}

fn load(path: &Path) -> Result<Config, CliError> {
    Ok(config::load_config_from(path)?)
}

/// Ask where a network password should live. `true` means the keyring.
fn prompt_keyring() -> Result<bool, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    Ok(selection == 0)
}

/// Record a network password on `cfg`, in the keyring unless `plaintext`.
fn store_password(
    cfg: &mut Config,
    ssid: &str,
    password: String,
    plaintext: bool,
) -> Result<(), CliError> {
    if password.is_empty() {
        return Err(CliError::validation("password", "cannot be empty"));
    }
    let entry = cfg.networks.entry(ssid.to_owned()).or_default();
    entry.password_env = None;
    if plaintext {
        entry.password = Some(password);
    } else {
        config::store_network_password(ssid, &password)?;
        entry.password = None;
        eprintln!("   ✓ password for '{ssid}' stored in system keyring");
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = crate::config_file(global);
    match args.command {
        ConfigCommand::Init => init(&path, global),

        ConfigCommand::Show => {
            let cfg = load(&path)?.redacted();
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)
                    .map_err(|e| CliError::Render(e.to_string()))?,
                format => output::render_single(format, &cfg, |_| String::new(), |_| {
                    String::new()
                })?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::SetNetwork {
            ssid,
            password_env,
            plaintext,
            activate,
        } => {
            let ssid = ssid.trim().to_owned();
            if ssid.is_empty() {
                return Err(CliError::validation("ssid", "cannot be empty"));
            }
            let mut cfg = load(&path)?;
            match password_env {
                Some(var) => {
                    let entry = cfg.networks.entry(ssid.clone()).or_default();
                    entry.password_env = Some(var);
                    entry.password = None;
                }
                None => {
                    let password = rpassword::prompt_password(format!("Password for {ssid}: "))
                        .map_err(prompt_err)?;
                    store_password(&mut cfg, &ssid, password, plaintext)?;
                }
            }
            if activate {
                cfg.active_network = Some(ssid.clone());
            }
            config::save_config_to(&cfg, &path)?;
            util::notice(global, format!("Saved network '{ssid}' to {}", path.display()));
            Ok(())
        }
    }
}

fn init(path: &Path, global: &GlobalOpts) -> Result<(), CliError> {
    eprintln!("camfleet configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    if path.exists()
        && !util::confirm("A config file already exists. Overwrite it?", "config init", global.yes)?
    {
        return Ok(());
    }
    let mut cfg = load(path)?;

    // 1. SDK bridge
    cfg.bridge_url = Input::new()
        .with_prompt("SDK bridge URL")
        .default(cfg.bridge_url.clone())
        .interact_text()
        .map_err(prompt_err)?;
    cfg.bridge_url()?;

    // 2. Download root
    let download_dir: String = Input::new()
        .with_prompt("Download folder")
        .default(cfg.download_dir().display().to_string())
        .interact_text()
        .map_err(prompt_err)?;
    cfg.download_dir = Some(PathBuf::from(download_dir));

    // 3. WiFi interface for camera access points
    let interface: String = Input::new()
        .with_prompt("WiFi interface (blank for system default)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    cfg.wifi_interface = Some(interface).filter(|i| !i.trim().is_empty());

    // 4. Home network
    let ssid: String = Input::new()
        .with_prompt("Home network SSID (blank to skip)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;
    let ssid = ssid.trim().to_owned();
    if !ssid.is_empty() {
        let password = rpassword::prompt_password(format!("Password for {ssid}: "))
            .map_err(prompt_err)?;
        let keyring = prompt_keyring()?;
        store_password(&mut cfg, &ssid, password, !keyring)?;
        cfg.active_network = Some(ssid);
    }

    config::save_config_to(&cfg, path)?;
    eprintln!("\n   ✓ Config saved to {}", path.display());
    Ok(())
}
