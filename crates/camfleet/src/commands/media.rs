//! Media command handlers: downloads, camera listings, local files, erase.

use std::future::Future;
use std::io::IsTerminal;
use std::time::Duration;

use bytesize::ByteSize;
use camfleet_api::MediaFile;
use camfleet_core::{
    CameraDownload, Command as CoreCommand, CommandResult, DownloadReport, FileStatus, Fleet,
    HubMessage, LocalFile, MediaSelection, Serial,
};
use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use crate::cli::{GlobalOpts, MediaArgs, MediaCommand, OutputFormat, SelectionArgs};
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "Camera")]
    serial: String,
    #[tabled(rename = "Route")]
    route: String,
    #[tabled(rename = "New")]
    downloaded: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Size")]
    bytes: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl JobRow {
    fn new(serial: &Serial, job: &CameraDownload, color: bool) -> Self {
        let result = match &job.fatal {
            Some(failure) => output::paint(failure.message.clone(), Tone::Bad, color),
            None if job.overall_success => output::paint("complete", Tone::Good, color),
            None => output::paint("incomplete", Tone::Warn, color),
        };
        Self {
            serial: serial.to_string(),
            route: output::or_dash(job.transport),
            downloaded: job.downloaded(),
            skipped: job.skipped(),
            failed: job.failed(),
            bytes: ByteSize::b(job.bytes()).to_string(),
            result,
        }
    }
}

#[derive(Tabled)]
struct MediaRow {
    #[tabled(rename = "File")]
    filename: String,
    #[tabled(rename = "Folder")]
    directory: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Captured")]
    created: String,
}

impl From<&MediaFile> for MediaRow {
    fn from(m: &MediaFile) -> Self {
        Self {
            filename: m.filename.clone(),
            directory: m.directory.clone(),
            size: ByteSize::b(m.size_bytes).to_string(),
            created: output::or_dash(m.created.map(|t| t.format("%Y-%m-%d %H:%M:%S"))),
        }
    }
}

#[derive(Tabled)]
struct LocalRow {
    #[tabled(rename = "Camera")]
    serial: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

impl From<&LocalFile> for LocalRow {
    fn from(f: &LocalFile) -> Self {
        Self {
            serial: output::or_dash(f.serial.as_ref()),
            path: f.path.display().to_string(),
            size: ByteSize::b(f.size_bytes).to_string(),
            modified: output::or_dash(f.modified.map(|t| t.format("%Y-%m-%d %H:%M"))),
        }
    }
}

// ── Selection ───────────────────────────────────────────────────────

fn selection(args: SelectionArgs) -> Result<MediaSelection, CliError> {
    if let Some(n) = args.latest {
        if n == 0 {
            return Err(CliError::validation("latest", "must be at least 1"));
        }
        return Ok(MediaSelection::Latest(n));
    }
    if args.latest_video {
        return Ok(MediaSelection::LatestVideo);
    }
    if !args.files.is_empty() {
        return Ok(MediaSelection::Named(args.files));
    }
    Ok(MediaSelection::All)
}

// ── Progress ────────────────────────────────────────────────────────

/// Run `work` while a spinner on stderr follows the hub's download events.
/// Falls through untouched for quiet, structured or non-terminal output.
pub async fn with_progress<T>(
    fleet: &Fleet,
    global: &GlobalOpts,
    work: impl Future<Output = T>,
) -> T {
    if global.quiet || global.output != OutputFormat::Table || !std::io::stderr().is_terminal() {
        return work.await;
    }

    let (subscriber, mut rx) = fleet.subscribe();
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message("starting downloads");
    bar.enable_steady_tick(Duration::from_millis(120));

    let ticker = bar.clone();
    let listener = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message.as_ref() {
                HubMessage::DownloadProgress(p) => ticker.set_message(format!(
                    "{} [{}/{}] {} ({})",
                    p.serial,
                    p.index,
                    p.total,
                    p.filename,
                    ByteSize::b(p.bytes)
                )),
                HubMessage::DownloadComplete {
                    serial,
                    downloaded,
                    failed,
                    ..
                } => ticker.println(format!("{serial}: {downloaded} downloaded, {failed} failed")),
                HubMessage::DownloadError {
                    serial,
                    filename,
                    message,
                } => ticker.println(match filename {
                    Some(file) => format!("{serial}: {file}: {message}"),
                    None => format!("{serial}: {message}"),
                }),
                _ => {}
            }
        }
    });

    let result = work.await;
    fleet.unsubscribe(subscriber);
    listener.abort();
    bar.finish_and_clear();
    result
}

/// Print a download report, then fail with the partial exit code if any
/// camera's job was incomplete.
pub fn finish_report(global: &GlobalOpts, report: &DownloadReport) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        report,
        |r| {
            let rows: Vec<JobRow> = r
                .cameras
                .iter()
                .map(|(serial, job)| JobRow::new(serial, job, color))
                .collect();
            tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string()
        },
        |r| {
            r.cameras
                .values()
                .flat_map(|job| &job.files)
                .filter(|f| matches!(f.status, FileStatus::Downloaded { .. }))
                .map(|f| f.path.display().to_string())
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);

    if global.output == OutputFormat::Table {
        for (serial, job) in &report.cameras {
            for file in &job.files {
                if let FileStatus::Failed { error } = &file.status {
                    util::notice(global, format!("{serial}: {} failed: {error}", file.filename));
                }
            }
        }
    }

    if report.all_succeeded() {
        return Ok(());
    }
    let failed = report
        .cameras
        .values()
        .filter(|job| !job.overall_success)
        .count();
    Err(CliError::Partial {
        failed,
        total: report.cameras.len(),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(fleet: &Fleet, args: MediaArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        MediaCommand::Download {
            serials,
            selection: sel,
        } => {
            let cmd = CoreCommand::Download {
                serials: util::serials(&serials),
                selection: selection(sel)?,
            };
            util::notice(
                global,
                format!("Downloading into {}", fleet.downloads().download_dir().display()),
            );
            let result = with_progress(fleet, global, fleet.execute(cmd)).await?;
            match result {
                CommandResult::Download(report) => finish_report(global, &report),
                _ => Ok(()),
            }
        }

        MediaCommand::List { serial } => {
            let files = fleet.downloads().list_media(&Serial::new(&serial)).await?;
            let out = output::render_list(
                global.output,
                &files,
                |m| MediaRow::from(m),
                MediaFile::camera_path,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        MediaCommand::Local { serial } => {
            let serial = serial.map(Serial::from);
            let files = fleet.downloads().list_local(serial.as_ref()).await?;
            let out = output::render_list(
                global.output,
                &files,
                |f| LocalRow::from(f),
                |f| f.path.display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        MediaCommand::Erase { serial } => {
            if !util::confirm(
                &format!("Erase every file on camera {serial}? This cannot be undone."),
                "media erase",
                global.yes,
            )? {
                return Ok(());
            }
            let result = fleet
                .execute(CoreCommand::EraseSd {
                    serial: Serial::new(&serial),
                })
                .await?;
            if let CommandResult::Erased(route) = result {
                util::notice(global, format!("Erased camera {serial} via {route}"));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(latest: Option<usize>, latest_video: bool, files: &[&str]) -> SelectionArgs {
        SelectionArgs {
            latest,
            latest_video,
            files: files.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    #[test]
    fn no_flags_selects_everything() {
        assert_eq!(selection(args(None, false, &[])).unwrap(), MediaSelection::All);
    }

    #[test]
    fn flags_map_to_selections() {
        assert_eq!(
            selection(args(Some(2), false, &[])).unwrap(),
            MediaSelection::Latest(2)
        );
        assert_eq!(
            selection(args(None, true, &[])).unwrap(),
            MediaSelection::LatestVideo
        );
        assert_eq!(
            selection(args(None, false, &["GX010001.MP4"])).unwrap(),
            MediaSelection::Named(vec!["GX010001.MP4".into()])
        );
    }

    #[test]
    fn latest_zero_is_rejected() {
        let err = selection(args(Some(0), false, &[])).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }
}
