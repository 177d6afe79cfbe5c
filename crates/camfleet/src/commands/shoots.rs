//! Shoot and take command handlers.

use bytesize::ByteSize;
use camfleet_core::{Command as CoreCommand, CommandResult, Fleet, Shoot, Take, TakeFile};
use tabled::Tabled;

use crate::cli::{GlobalOpts, ShootsArgs, ShootsCommand, TakesArgs, TakesCommand};
use crate::error::CliError;
use crate::output::{self, Tone};

use super::{media, util};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ShootRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Takes")]
    takes: usize,
    #[tabled(rename = "Created")]
    created: String,
}

impl ShootRow {
    fn new(s: &Shoot, color: bool) -> Self {
        Self {
            id: short_id(s),
            name: s.name.clone(),
            active: if s.active {
                output::paint("active", Tone::Good, color)
            } else {
                String::new()
            },
            takes: s.takes.len(),
            created: s.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[derive(Tabled)]
struct TakeRow {
    #[tabled(rename = "#")]
    number: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Cameras")]
    cameras: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Length")]
    length: String,
    #[tabled(rename = "Files")]
    files: usize,
    #[tabled(rename = "Downloaded")]
    downloaded: String,
}

impl From<&Take> for TakeRow {
    fn from(t: &Take) -> Self {
        Self {
            number: t.take_number,
            name: t.name.clone(),
            cameras: t
                .cameras
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            started: t.started_at.format("%H:%M:%S").to_string(),
            length: take_length(t),
            files: t.files.len(),
            downloaded: if t.downloaded { "yes" } else { "" }.into(),
        }
    }
}

#[derive(Tabled)]
struct TakeFileRow {
    #[tabled(rename = "Camera")]
    serial: String,
    #[tabled(rename = "File")]
    filename: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&TakeFile> for TakeFileRow {
    fn from(f: &TakeFile) -> Self {
        Self {
            serial: f.serial.to_string(),
            filename: f.filename.clone(),
            size: ByteSize::b(f.size_bytes).to_string(),
            path: f.path.display().to_string(),
        }
    }
}

fn short_id(s: &Shoot) -> String {
    s.id.to_string().chars().take(8).collect()
}

fn take_length(t: &Take) -> String {
    match t.stopped_at {
        None => "recording".into(),
        Some(stop) => {
            let secs = (stop - t.started_at).num_seconds().max(0);
            format!("{}:{:02}", secs / 60, secs % 60)
        }
    }
}

fn detail(s: &Shoot) -> String {
    let mut text = output::detail_lines(&[
        ("ID:", s.id.to_string()),
        ("Name:", s.name.clone()),
        ("Active:", s.active.to_string()),
        ("Created:", s.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("Last take:", s.current_take_number.to_string()),
    ]);
    if !s.takes.is_empty() {
        let rows: Vec<TakeRow> = s.takes.iter().map(TakeRow::from).collect();
        text.push_str("\n\n");
        text.push_str(
            &tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string(),
        );
    }
    text
}

fn print_shoot(global: &GlobalOpts, shoot: &Shoot) -> Result<(), CliError> {
    let out = output::render_single(global.output, shoot, detail, |s| s.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn print_take(global: &GlobalOpts, take: &Take) -> Result<(), CliError> {
    let out = output::render_single(
        global.output,
        take,
        |t| {
            output::detail_lines(&[
                ("Take:", t.take_number.to_string()),
                ("Name:", t.name.clone()),
                ("Length:", take_length(t)),
                ("Files:", t.files.len().to_string()),
            ])
        },
        |t| t.take_number.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Shoots ──────────────────────────────────────────────────────────

pub async fn handle(fleet: &Fleet, args: ShootsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ShootsCommand::List => {
            let shoots = fleet.shoots().list().await;
            let color = output::should_color(global.color);
            let out = output::render_list(
                global.output,
                &shoots,
                |s| ShootRow::new(s, color),
                |s| s.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ShootsCommand::Get { shoot } => {
            let id = util::resolve_shoot(fleet, &shoot).await?;
            let shoot = fleet.shoots().get(id).await?;
            print_shoot(global, &shoot)
        }

        ShootsCommand::Create { name, activate } => {
            let CommandResult::Shoot(mut shoot) =
                fleet.execute(CoreCommand::CreateShoot { name }).await?
            else {
                return Ok(());
            };
            util::notice(global, format!("Created shoot '{}'", shoot.name));
            if activate {
                if let CommandResult::Shoot(active) = fleet
                    .execute(CoreCommand::ActivateShoot { id: shoot.id })
                    .await?
                {
                    shoot = active;
                }
            }
            print_shoot(global, &shoot)
        }

        ShootsCommand::Activate { shoot } => {
            let id = util::resolve_shoot(fleet, &shoot).await?;
            if let CommandResult::Shoot(shoot) =
                fleet.execute(CoreCommand::ActivateShoot { id }).await?
            {
                util::notice(global, format!("Active shoot: {}", shoot.name));
            }
            Ok(())
        }

        ShootsCommand::Deactivate => {
            match fleet.execute(CoreCommand::DeactivateShoot).await? {
                CommandResult::Deactivated(Some(shoot)) => {
                    util::notice(global, format!("Deactivated shoot '{}'", shoot.name));
                }
                _ => util::notice(global, "No shoot was active"),
            }
            Ok(())
        }

        ShootsCommand::Delete { shoot } => {
            let id = util::resolve_shoot(fleet, &shoot).await?;
            if !util::confirm(
                &format!("Delete shoot {id} and all of its takes? Downloaded files stay on disk."),
                "shoots delete",
                global.yes,
            )? {
                return Ok(());
            }
            fleet.execute(CoreCommand::DeleteShoot { id }).await?;
            util::notice(global, format!("Deleted shoot {id}"));
            Ok(())
        }

        ShootsCommand::Download { shoot } => {
            let shoot_id = util::resolve_shoot(fleet, &shoot).await?;
            let result = media::with_progress(
                fleet,
                global,
                fleet.execute(CoreCommand::DownloadShoot { shoot_id }),
            )
            .await?;
            let CommandResult::ShootDownload(report) = result else {
                return Ok(());
            };
            for take in &report.takes {
                let mark = if take.success { "complete" } else { "incomplete" };
                util::notice(
                    global,
                    format!("Take {}: {} files, {mark}", take.take_number, take.files),
                );
            }
            media::finish_report(global, &report.report)
        }
    }
}

// ── Takes ───────────────────────────────────────────────────────────

pub async fn handle_takes(
    fleet: &Fleet,
    args: TakesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        TakesCommand::List { shoot } => {
            let id = util::resolve_shoot(fleet, &shoot).await?;
            let shoot = fleet.shoots().get(id).await?;
            let out = output::render_list(
                global.output,
                &shoot.takes,
                |t| TakeRow::from(t),
                |t| t.take_number.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        TakesCommand::Create { shoot, name } => {
            let shoot_id = util::resolve_shoot(fleet, &shoot).await?;
            let result = fleet
                .execute(CoreCommand::CreateTake {
                    shoot_id,
                    name,
                    files: Vec::new(),
                })
                .await?;
            if let CommandResult::Take(take) = result {
                util::notice(global, format!("Created take {}", take.take_number));
                print_take(global, &take)?;
            }
            Ok(())
        }

        TakesCommand::Rename { shoot, take, name } => {
            let shoot_id = util::resolve_shoot(fleet, &shoot).await?;
            fleet
                .execute(CoreCommand::UpdateTake {
                    shoot_id,
                    take,
                    name: Some(name),
                    files: None,
                })
                .await?;
            util::notice(global, format!("Renamed take {take}"));
            Ok(())
        }

        TakesCommand::Delete { shoot, take } => {
            let shoot_id = util::resolve_shoot(fleet, &shoot).await?;
            fleet
                .execute(CoreCommand::DeleteTake { shoot_id, take })
                .await?;
            util::notice(global, format!("Deleted take {take}"));
            Ok(())
        }

        TakesCommand::Files { shoot, take } => {
            let shoot_id = util::resolve_shoot(fleet, &shoot).await?;
            let files = fleet.shoots().take_files(shoot_id, take).await?;
            let out = output::render_list(
                global.output,
                &files,
                |f| TakeFileRow::from(f),
                |f| f.path.display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
