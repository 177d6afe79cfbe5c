//! Shared helpers for command handlers.

use std::io::IsTerminal;

use camfleet_core::{Fleet, FleetResult, Preference, Serial, SettingKind};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::cli::{GlobalOpts, Via};
use crate::error::CliError;
use crate::output::{self, Tone};

pub fn preference(via: Via) -> Preference {
    match via {
        Via::Auto => Preference::Auto,
        Via::ShortRange => Preference::ShortRange,
        Via::HomeNetwork => Preference::HomeNetwork,
    }
}

/// `None` when no serials were given, meaning every camera.
pub fn serials(raw: &[String]) -> Option<Vec<Serial>> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.iter().map(Serial::new).collect())
    }
}

/// Resolve a shoot by UUID, exact name (case-insensitive) or unique ID prefix.
pub async fn resolve_shoot(fleet: &Fleet, identifier: &str) -> Result<Uuid, CliError> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return Ok(id);
    }
    let shoots = fleet.shoots().list().await;
    if let Some(shoot) = shoots
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(identifier))
    {
        return Ok(shoot.id);
    }
    let mut by_prefix = shoots
        .iter()
        .filter(|s| s.id.to_string().starts_with(identifier));
    match (by_prefix.next(), by_prefix.next()) {
        (Some(shoot), None) if identifier.len() >= 4 => Ok(shoot.id),
        (Some(_), Some(_)) => Err(CliError::validation(
            "shoot",
            format!("'{identifier}' matches more than one shoot"),
        )),
        _ => Err(CliError::NotFound {
            resource_type: "shoot".into(),
            identifier: identifier.into(),
            list_command: "shoots list".into(),
        }),
    }
}

/// Parse `kind=value`, e.g. `frame_rate=8`.
pub fn parse_setting(raw: &str) -> Result<(SettingKind, u32), CliError> {
    let (kind, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::validation("set", format!("expected KIND=VALUE, got '{raw}'")))?;
    let kind: SettingKind = kind
        .trim()
        .replace('-', "_")
        .parse()
        .map_err(|_| CliError::validation("set", format!("unknown setting '{}'", kind.trim())))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| CliError::validation("set", format!("'{}' is not a number", value.trim())))?;
    Ok((kind, value))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Status line on stderr, unless `--quiet`.
pub fn notice(global: &GlobalOpts, message: impl AsRef<str>) {
    if !global.quiet {
        eprintln!("{}", message.as_ref());
    }
}

// ── Per-camera outcomes ─────────────────────────────────────────────

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Camera")]
    serial: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Render a fleet-wide result as one row per camera.
pub fn render_fleet<T: Serialize>(
    global: &GlobalOpts,
    result: &FleetResult<T>,
    ok_detail: impl Fn(&T) -> String,
) -> Result<String, CliError> {
    let color = output::should_color(global.color);
    output::render_single(
        global.output,
        result,
        |r| {
            let rows: Vec<OutcomeRow> = r
                .iter()
                .map(|(serial, outcome)| match outcome {
                    Ok(value) => OutcomeRow {
                        serial: serial.to_string(),
                        result: output::paint("ok", Tone::Good, color),
                        detail: ok_detail(value),
                    },
                    Err(failure) => OutcomeRow {
                        serial: serial.to_string(),
                        result: output::paint(failure.kind.to_string(), Tone::Bad, color),
                        detail: failure.message.clone(),
                    },
                })
                .collect();
            tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string()
        },
        |r| {
            r.iter()
                .map(|(serial, outcome)| {
                    format!("{serial}\t{}", if outcome.is_ok() { "ok" } else { "failed" })
                })
                .collect::<Vec<_>>()
                .join("\n")
        },
    )
}

/// Print a fleet-wide result, then fail with the partial exit code if any
/// camera failed.
pub fn finish_fleet<T: Serialize>(
    global: &GlobalOpts,
    result: &FleetResult<T>,
    ok_detail: impl Fn(&T) -> String,
) -> Result<(), CliError> {
    let rendered = render_fleet(global, result, ok_detail)?;
    output::print_output(&rendered, global.quiet);
    fleet_outcome(result)
}

pub fn fleet_outcome<T>(result: &FleetResult<T>) -> Result<(), CliError> {
    if result.is_complete_success() {
        return Ok(());
    }
    Err(CliError::Partial {
        failed: result.len() - result.success_count(),
        total: result.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use camfleet_core::{DeviceFailure, FailureKind};

    #[test]
    fn settings_accept_dashes_and_spaces() {
        assert_eq!(
            parse_setting("frame-rate = 8").unwrap(),
            (SettingKind::FrameRate, 8)
        );
        assert_eq!(parse_setting("gps=1").unwrap(), (SettingKind::Gps, 1));
    }

    #[test]
    fn malformed_settings_are_rejected() {
        for raw in ["resolution", "bogus=1", "resolution=high"] {
            let err = parse_setting(raw).unwrap_err();
            assert!(matches!(err, CliError::Validation { .. }), "{raw}: {err:?}");
        }
    }

    #[test]
    fn no_serials_means_every_camera() {
        assert_eq!(serials(&[]), None);
        assert_eq!(
            serials(&["0001".into()]),
            Some(vec![Serial::from("0001")])
        );
    }

    #[test]
    fn any_failure_is_partial() {
        let mut result = FleetResult::new();
        result.insert(Serial::from("0001"), Ok(()));
        assert!(fleet_outcome(&result).is_ok());

        result.insert(
            Serial::from("0002"),
            Err(DeviceFailure {
                kind: FailureKind::TransportUnavailable,
                message: "out of range".into(),
            }),
        );
        let err = fleet_outcome(&result).unwrap_err();
        assert!(matches!(err, CliError::Partial { failed: 1, total: 2 }));
    }
}
