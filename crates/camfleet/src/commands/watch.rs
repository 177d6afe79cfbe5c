//! `watch`: run the background pollers and print hub messages as JSON lines.

use std::io::Write;

use camfleet_core::{Fleet, HubMessage};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;

use super::util;

fn wanted(message: &HubMessage, types: &[String]) -> bool {
    types.is_empty() || types.iter().any(|t| t == message.kind())
}

pub async fn handle(fleet: &Fleet, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (mut subscriber, mut rx) = fleet.subscribe();
    fleet.start().await;
    util::notice(global, "Watching fleet events (Ctrl-C to stop)");

    let mut seen = 0usize;
    let result = loop {
        let message = tokio::select! {
            message = rx.recv() => message,
            _ = tokio::signal::ctrl_c() => break Ok(()),
        };
        let Some(message) = message else {
            // The hub drops subscribers that fall behind.
            tracing::warn!("event stream dropped, resubscribing");
            (subscriber, rx) = fleet.subscribe();
            continue;
        };
        if !wanted(&message, &args.types) {
            continue;
        }

        let line = message
            .to_json()
            .map_err(|e| CliError::Render(e.to_string()))?;
        let mut stdout = std::io::stdout().lock();
        if writeln!(stdout, "{line}").is_err() {
            // Downstream pipe closed
            break Ok(());
        }
        drop(stdout);

        seen += 1;
        if args.count.is_some_and(|limit| seen >= limit) {
            break Ok(());
        }
    };

    fleet.unsubscribe(subscriber);
    result
}
