//! Clap derive structures for the `camfleet` CLI.
//!
//! Only clap and clap_complete may be used here: build.rs compiles this
//! file on its own to render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// camfleet -- drive a fleet of action cameras from one terminal
#[derive(Debug, Parser)]
#[command(
    name = "camfleet",
    version,
    about = "Control a fleet of action cameras from the command line",
    long_about = "Connect, record, provision and offload a small fleet of action cameras.\n\n\
        Short-range control goes through the SDK bridge daemon; media travels over\n\
        the home network when a camera is provisioned, or the camera's own access\n\
        point otherwise.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (default: platform config dir)
    #[arg(long, env = "CAMFLEET_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the camera, shoot and preset stores
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CAMFLEET_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Route for camera commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Via {
    /// Short-range link when connected, home network otherwise
    #[default]
    Auto,
    /// Short-range link only
    ShortRange,
    /// Home network only
    HomeNetwork,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register, connect and inspect cameras
    #[command(alias = "cam", alias = "c")]
    Cameras(CamerasArgs),

    /// Start or stop recording on every reachable camera
    #[command(alias = "rec")]
    Record(RecordArgs),

    /// Manage shoots (named recording sessions)
    Shoots(ShootsArgs),

    /// Manage numbered takes within a shoot
    Takes(TakesArgs),

    /// Home-network provisioning and network profiles
    #[command(alias = "net", alias = "cohn")]
    Network(NetworkArgs),

    /// Download, list and erase camera media
    #[command(alias = "m")]
    Media(MediaArgs),

    /// Named bundles of camera settings
    Presets(PresetsArgs),

    /// Stream fleet events as JSON lines
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CAMERAS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CamerasArgs {
    #[command(subcommand)]
    pub command: CamerasCommand,
}

#[derive(Debug, Subcommand)]
pub enum CamerasCommand {
    /// List registered cameras
    #[command(alias = "ls")]
    List,

    /// Show one camera
    Get {
        /// Camera serial (last four digits)
        serial: String,
    },

    /// Register a camera
    Add {
        /// Camera serial (last four digits)
        serial: String,

        /// Display name (default: GoPro <serial>)
        #[arg(long)]
        name: Option<String>,

        /// Short-range address reported by discovery
        #[arg(long)]
        address: Option<String>,

        /// Camera access point SSID
        #[arg(long)]
        ap_ssid: Option<String>,

        /// Camera access point password
        #[arg(long)]
        ap_password: Option<String>,
    },

    /// Forget a camera
    #[command(alias = "rm")]
    Remove {
        /// Camera serial
        serial: String,
    },

    /// Rename a camera
    Rename {
        /// Camera serial
        serial: String,

        /// New display name
        name: String,
    },

    /// Set or clear the camera's access point login
    SetAp {
        /// Camera serial
        serial: String,

        /// Access point SSID (omit to clear)
        #[arg(long)]
        ssid: Option<String>,

        /// Access point password (prompted when --ssid is given without it)
        #[arg(long)]
        password: Option<String>,
    },

    /// Scan for advertising cameras
    Discover {
        /// Scan duration in seconds (default: config)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Open the short-range link (every camera when no serial is given)
    Connect {
        /// Camera serial
        serial: Option<String>,
    },

    /// Close the short-range link (every connected camera when no serial is given)
    Disconnect {
        /// Camera serial
        serial: Option<String>,
    },

    /// Verify links and reconnect cameras that dropped
    Check,

    /// Read battery and storage from every camera
    #[command(alias = "health")]
    Status,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RECORD
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RecordArgs {
    #[command(subcommand)]
    pub command: RecordCommand,
}

#[derive(Debug, Subcommand)]
pub enum RecordCommand {
    /// Press the shutter on every reachable camera
    Start {
        /// Route for the shutter command
        #[arg(long, value_enum, default_value = "auto")]
        via: Via,
    },

    /// Release the shutter on every recording camera
    Stop {
        /// Route for the shutter command
        #[arg(long, value_enum, default_value = "auto")]
        via: Via,
    },

    /// Show the current shoot and take
    Status,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SHOOTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ShootsArgs {
    #[command(subcommand)]
    pub command: ShootsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ShootsCommand {
    /// List shoots
    #[command(alias = "ls")]
    List,

    /// Show one shoot
    Get {
        /// Shoot ID or name
        shoot: String,
    },

    /// Create a shoot
    Create {
        /// Shoot name
        name: String,

        /// Make it the active shoot right away
        #[arg(long)]
        activate: bool,
    },

    /// Make a shoot the active one
    Activate {
        /// Shoot ID or name
        shoot: String,
    },

    /// Clear the active shoot
    Deactivate,

    /// Delete a shoot and its takes
    #[command(alias = "rm")]
    Delete {
        /// Shoot ID or name
        shoot: String,
    },

    /// Download every take of a shoot into its take folders
    Download {
        /// Shoot ID or name
        shoot: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TAKES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TakesArgs {
    #[command(subcommand)]
    pub command: TakesCommand,
}

#[derive(Debug, Subcommand)]
pub enum TakesCommand {
    /// List a shoot's takes
    #[command(alias = "ls")]
    List {
        /// Shoot ID or name
        shoot: String,
    },

    /// Add a take by hand
    Create {
        /// Shoot ID or name
        shoot: String,

        /// Take name (default: Take <n>)
        #[arg(long)]
        name: Option<String>,
    },

    /// Rename a take
    Rename {
        /// Shoot ID or name
        shoot: String,

        /// Take number
        take: u32,

        /// New name
        name: String,
    },

    /// Delete a take (its number is never reused)
    #[command(alias = "rm")]
    Delete {
        /// Shoot ID or name
        shoot: String,

        /// Take number
        take: u32,
    },

    /// List the files attached to a take
    Files {
        /// Shoot ID or name
        shoot: String,

        /// Take number
        take: u32,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NETWORK
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// Join a camera to the active home network
    Provision {
        /// Camera serial
        serial: String,
    },

    /// Forget a camera's home-network credential
    Unprovision {
        /// Camera serial
        serial: String,
    },

    /// Probe home-network reachability (every camera when no serial is given)
    Status {
        /// Camera serial
        serial: Option<String>,
    },

    /// Bring offline cameras back onto the home network
    Reenable {
        /// Camera serial (default: every offline camera)
        serial: Option<String>,
    },

    /// Override a camera's home-network address
    SetIp {
        /// Camera serial
        serial: String,

        /// New IP address
        ip: std::net::IpAddr,
    },

    /// List known home networks
    #[command(alias = "ls")]
    List,

    /// Make another home network active
    Switch {
        /// Network SSID
        ssid: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  MEDIA
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct MediaArgs {
    #[command(subcommand)]
    pub command: MediaCommand,
}

#[derive(Debug, Subcommand)]
pub enum MediaCommand {
    /// Download media into dated per-camera folders
    #[command(alias = "dl")]
    Download {
        /// Camera serials (default: every camera)
        serials: Vec<String>,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// List media on a camera
    List {
        /// Camera serial
        serial: String,
    },

    /// List files already downloaded
    Local {
        /// Only this camera's files
        #[arg(long)]
        serial: Option<String>,
    },

    /// Delete every file on a camera's SD card
    Erase {
        /// Camera serial
        serial: String,
    },
}

/// Which files to fetch. Everything when no flag is given.
#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct SelectionArgs {
    /// Only the N newest files per camera
    #[arg(long, value_name = "N")]
    pub latest: Option<usize>,

    /// Only the newest video per camera
    #[arg(long)]
    pub latest_video: bool,

    /// Only files with these names (repeatable)
    #[arg(long = "file", value_name = "NAME")]
    pub files: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PRESETS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PresetsArgs {
    #[command(subcommand)]
    pub command: PresetsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PresetsCommand {
    /// List presets, pinned first
    #[command(alias = "ls")]
    List,

    /// Show one preset
    Get {
        /// Preset name
        name: String,
    },

    /// Create a preset from explicit settings
    Create {
        /// Preset name
        name: String,

        /// Setting as KIND=VALUE, e.g. resolution=1 (repeatable)
        #[arg(long = "set", value_name = "KIND=VALUE")]
        settings: Vec<String>,
    },

    /// Replace a preset's settings
    Update {
        /// Preset name
        name: String,

        /// Setting as KIND=VALUE (repeatable)
        #[arg(long = "set", value_name = "KIND=VALUE", required = true)]
        settings: Vec<String>,
    },

    /// Delete a preset
    #[command(alias = "rm")]
    Delete {
        /// Preset name
        name: String,
    },

    /// Pin or unpin a preset
    Pin {
        /// Preset name
        name: String,
    },

    /// Save a camera's current settings as a new preset
    Capture {
        /// Camera serial
        serial: String,

        /// Preset name
        name: String,

        /// Route for reading settings
        #[arg(long, value_enum, default_value = "auto")]
        via: Via,
    },

    /// Write a preset to cameras
    Apply {
        /// Preset name
        name: String,

        /// Camera serials (default: every camera)
        serials: Vec<String>,

        /// Route for writing settings
        #[arg(long, value_enum, default_value = "auto")]
        via: Via,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many messages
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Only these message types (repeatable), e.g. fleet_status
    #[arg(long = "type", value_name = "TYPE")]
    pub types: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with guided setup
    Init,

    /// Display the resolved configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Add or update a home network
    SetNetwork {
        /// Network SSID
        ssid: String,

        /// Read the password from this environment variable instead of storing it
        #[arg(long, value_name = "VAR")]
        password_env: Option<String>,

        /// Store the password in the config file instead of the keyring
        #[arg(long, conflicts_with = "password_env")]
        plaintext: bool,

        /// Also make it the startup network
        #[arg(long)]
        activate: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
