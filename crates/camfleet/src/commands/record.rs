//! Recording command handlers.

use camfleet_core::{Command as CoreCommand, CommandResult, Fleet, SessionState};

use crate::cli::{GlobalOpts, RecordArgs, RecordCommand};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(fleet: &Fleet, args: RecordArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cmd, verb) = match args.command {
        RecordCommand::Start { via } => (
            CoreCommand::StartRecording {
                via: util::preference(via),
            },
            "started",
        ),
        RecordCommand::Stop { via } => (
            CoreCommand::StopRecording {
                via: util::preference(via),
            },
            "stopped",
        ),
        RecordCommand::Status => return status(fleet, global).await,
    };

    let CommandResult::Recording(outcome) = fleet.execute(cmd).await? else {
        return Ok(());
    };
    if let Some(take) = &outcome.take {
        util::notice(
            global,
            format!("Take {} ({}) {verb}", take.take_number, take.name),
        );
    }
    util::finish_fleet(global, &outcome.cameras, |route| format!("{verb} via {route}"))
}

async fn status(fleet: &Fleet, global: &GlobalOpts) -> Result<(), CliError> {
    let state = fleet.shoots().session_state().await;
    let active = fleet.shoots().active().await;
    let recording: Vec<String> = fleet
        .cameras_snapshot()
        .iter()
        .filter(|c| c.recording)
        .map(|c| c.serial.to_string())
        .collect();

    let out = output::render_single(
        global.output,
        &state,
        |s| {
            let shoot = active
                .as_ref()
                .map_or_else(|| "-".into(), |s| format!("{} ({})", s.name, s.id));
            let take = match s {
                SessionState::NoActiveShoot => "-".into(),
                SessionState::ShootActive { current_take, .. } => {
                    format!("idle, last take {current_take}")
                }
                SessionState::Recording { take, .. } => format!("recording take {take}"),
            };
            let cameras = if recording.is_empty() {
                "-".into()
            } else {
                recording.join(", ")
            };
            output::detail_lines(&[
                ("Shoot:", shoot),
                ("Take:", take),
                ("Recording:", cameras),
            ])
        },
        |s| {
            match s {
                SessionState::NoActiveShoot => "idle",
                SessionState::ShootActive { .. } => "shoot_active",
                SessionState::Recording { .. } => "recording",
            }
            .into()
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
