//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use locus_core::Platform;
use locus_types::AuthorizationStatus;

#[derive(Parser)]
#[command(name = "locus")]
#[command(author, version, about = "Background location tracking coordinator tools", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Disable colored output (any non-empty `NO_COLOR` value also disables it)
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Tracking configuration file (defaults to the platform config dir)
    #[arg(short, long, global = true, env = "LOCUS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted tracking session against the mock engine
    Simulate(SimulateArgs),

    /// Route headless events from a JSON file
    Headless {
        /// JSON file holding one event or an array of events
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Inspect or create tracking configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration
    Check,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Authorization the simulated engine reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PermissionArg {
    #[default]
    Always,
    #[value(alias = "when-in-use")]
    Foreground,
    Denied,
    NotDetermined,
    Restricted,
}

impl From<PermissionArg> for AuthorizationStatus {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::Always => AuthorizationStatus::Always,
            PermissionArg::Foreground => AuthorizationStatus::WhenInUse,
            PermissionArg::Denied => AuthorizationStatus::Denied,
            PermissionArg::NotDetermined => AuthorizationStatus::NotDetermined,
            PermissionArg::Restricted => AuthorizationStatus::Restricted,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    #[default]
    Ios,
    Android,
    Other,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Ios => Platform::Ios,
            PlatformArg::Android => Platform::Android,
            PlatformArg::Other => Platform::Other,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Location authorization reported by the engine
    #[arg(short, long, value_enum, default_value = "always")]
    pub permission: PermissionArg,

    /// Grant motion-activity permission
    #[arg(long)]
    pub motion_granted: bool,

    /// Grant motion-activity permission midway through the session
    #[arg(long, conflicts_with = "motion_granted")]
    pub grant_motion_later: bool,

    /// Host platform
    #[arg(long, value_enum, default_value = "ios")]
    pub platform: PlatformArg,

    /// Number of scripted fixes
    #[arg(short = 'n', long, default_value = "5")]
    pub fixes: usize,

    /// Start with the app in the background
    #[arg(long)]
    pub background: bool,

    /// Pause between scripted fixes in milliseconds
    #[arg(long, default_value = "25")]
    pub step_ms: u64,

    /// Latitude the fixes are scattered around
    #[arg(long, default_value = "37.3318", allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude the fixes are scattered around
    #[arg(long, default_value = "-122.0312", allow_negative_numbers = true)]
    pub lng: f64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}
