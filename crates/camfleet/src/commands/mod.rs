//! Command dispatch: bridges CLI args -> fleet Commands -> output formatting.

pub mod cameras;
pub mod config_cmd;
pub mod media;
pub mod network;
pub mod presets;
pub mod record;
pub mod shoots;
pub mod util;
pub mod watch;

use camfleet_core::Fleet;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a fleet-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, fleet: &Fleet, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Cameras(args) => cameras::handle(fleet, args, global).await,
        Command::Record(args) => record::handle(fleet, args, global).await,
        Command::Shoots(args) => shoots::handle(fleet, args, global).await,
        Command::Takes(args) => shoots::handle_takes(fleet, args, global).await,
        Command::Network(args) => network::handle(fleet, args, global).await,
        Command::Media(args) => media::handle(fleet, args, global).await,
        Command::Presets(args) => presets::handle(fleet, args, global).await,
        Command::Watch(args) => watch::handle(fleet, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions run without a fleet".into(),
        )),
    }
}
