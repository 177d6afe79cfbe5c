//! Preset command handlers.

use camfleet_core::{Command as CoreCommand, CommandResult, Fleet, Preset, PresetSettings, Serial};
use tabled::Tabled;

use crate::cli::{GlobalOpts, PresetsArgs, PresetsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PresetRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Pinned")]
    pinned: String,
    #[tabled(rename = "Settings")]
    settings: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&Preset> for PresetRow {
    fn from(p: &Preset) -> Self {
        Self {
            name: p.name.clone(),
            pinned: if p.pinned { "*" } else { "" }.into(),
            settings: settings_summary(&p.settings),
            updated: p.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

fn settings_summary(settings: &PresetSettings) -> String {
    if settings.is_empty() {
        return "-".into();
    }
    settings
        .iter()
        .map(|(kind, value)| format!("{kind}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn detail(p: &Preset) -> String {
    let settings: Vec<(String, String)> = p
        .settings
        .iter()
        .map(|(kind, value)| (format!("{kind}:"), value.to_string()))
        .collect();
    let mut pairs = vec![
        ("Name:", p.name.clone()),
        ("Pinned:", p.pinned.to_string()),
        ("Created:", p.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("Updated:", p.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ];
    pairs.extend(settings.iter().map(|(k, v)| (k.as_str(), v.clone())));
    output::detail_lines(&pairs)
}

fn parse_settings(raw: &[String]) -> Result<PresetSettings, CliError> {
    raw.iter().map(|s| util::parse_setting(s)).collect()
}

fn print_preset(global: &GlobalOpts, preset: &Preset) -> Result<(), CliError> {
    let out = output::render_single(global.output, preset, detail, |p| p.name.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(
    fleet: &Fleet,
    args: PresetsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        PresetsCommand::List => {
            let presets = fleet.presets().list().await;
            let out = output::render_list(
                global.output,
                &presets,
                |p| PresetRow::from(p),
                |p| p.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PresetsCommand::Get { name } => {
            let preset = fleet.presets().get(&name).await?;
            print_preset(global, &preset)
        }

        PresetsCommand::Create { name, settings } => {
            let settings = parse_settings(&settings)?;
            if let CommandResult::Preset(preset) = fleet
                .execute(CoreCommand::CreatePreset { name, settings })
                .await?
            {
                util::notice(global, format!("Created preset '{}'", preset.name));
                print_preset(global, &preset)?;
            }
            Ok(())
        }

        PresetsCommand::Update { name, settings } => {
            let settings = parse_settings(&settings)?;
            if let CommandResult::Preset(preset) = fleet
                .execute(CoreCommand::UpdatePreset { name, settings })
                .await?
            {
                print_preset(global, &preset)?;
            }
            Ok(())
        }

        PresetsCommand::Delete { name } => {
            fleet
                .execute(CoreCommand::DeletePreset { name: name.clone() })
                .await?;
            util::notice(global, format!("Deleted preset '{name}'"));
            Ok(())
        }

        PresetsCommand::Pin { name } => {
            if let CommandResult::Preset(preset) = fleet
                .execute(CoreCommand::TogglePresetPin { name })
                .await?
            {
                let state = if preset.pinned { "pinned" } else { "unpinned" };
                util::notice(global, format!("Preset '{}' {state}", preset.name));
            }
            Ok(())
        }

        PresetsCommand::Capture { serial, name, via } => {
            let result = fleet
                .execute(CoreCommand::CapturePreset {
                    serial: Serial::new(&serial),
                    name,
                    via: util::preference(via),
                })
                .await?;
            if let CommandResult::Preset(preset) = result {
                util::notice(
                    global,
                    format!("Captured {} settings from {serial}", preset.settings.len()),
                );
                print_preset(global, &preset)?;
            }
            Ok(())
        }

        PresetsCommand::Apply { name, serials, via } => {
            let result = fleet
                .execute(CoreCommand::ApplyPreset {
                    name,
                    serials: util::serials(&serials),
                    via: util::preference(via),
                })
                .await?;
            match result {
                CommandResult::PresetApplied(result) => {
                    util::finish_fleet(global, &result, |n| format!("{n} settings written"))
                }
                _ => Ok(()),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use camfleet_core::SettingKind;

    #[test]
    fn settings_parse_into_a_sorted_map() {
        let parsed = parse_settings(&["frame_rate=8".into(), "resolution=1".into()]).unwrap();
        assert_eq!(settings_summary(&parsed), "resolution=1 frame_rate=8");
        assert_eq!(parsed.get(&SettingKind::FrameRate), Some(&8));
    }

    #[test]
    fn one_bad_setting_fails_the_whole_list() {
        assert!(parse_settings(&["resolution=1".into(), "zoom=2".into()]).is_err());
    }

    #[test]
    fn empty_settings_show_a_dash() {
        assert_eq!(settings_summary(&PresetSettings::new()), "-");
    }
}
