use crate::config::default_config_path;
use crate::schedule::Schedule;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// App id of Counter-Strike, a free to play game that can be added to any account
pub const DEFAULT_LICENSE_APP: u32 = 730;

/// Time given to the stop request to reach steam before exiting
pub const EXIT_GRACE: Duration = Duration::from_millis(500);

const HOUR_SECONDS: u64 = 60 * 60;

/// Upper bound for the hour flags, one year
pub const MAX_HOURS: u64 = 24 * 365;

/// Idle play time on owned steam games
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Configuration file, defaults to config.json in the user's config directory
    #[arg(long, env = "STEAM_IDLER_CONFIG")]
    pub config: Option<PathBuf>,
    /// Directory suggested when asking for the maFiles
    #[arg(long, env = "STEAM_IDLER_MAFILES", default_value = "MaFiles")]
    pub mafiles: PathBuf,
    /// App id offered for a free license request
    #[arg(long, env = "STEAM_IDLER_LICENSE_APP", default_value_t = DEFAULT_LICENSE_APP)]
    pub license_app: u32,
    /// Upper bound for a single play session
    #[arg(long, default_value_t = 12, value_parser = clap::value_parser!(u64).range(1..=MAX_HOURS))]
    pub max_play_hours: u64,
    /// Upper bound for a single rest period
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u64).range(1..=MAX_HOURS))]
    pub max_rest_hours: u64,
    /// Stop after this many play/rest cycles
    #[arg(long)]
    pub cycles: Option<usize>,
    /// Forget the saved game selection and choose again
    #[arg(long)]
    pub reselect: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub mafile_dir: PathBuf,
    pub license_app_id: u32,
    pub schedule: Schedule,
    pub exit_grace: Duration,
    pub reselect: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            config_path: default_config_path(),
            mafile_dir: PathBuf::from("MaFiles"),
            license_app_id: DEFAULT_LICENSE_APP,
            schedule: Schedule::default(),
            exit_grace: EXIT_GRACE,
            reselect: false,
        }
    }
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        Settings {
            config_path: args.config.unwrap_or_else(default_config_path),
            mafile_dir: args.mafiles,
            license_app_id: args.license_app,
            schedule: Schedule {
                max_play: Duration::from_secs(args.max_play_hours * HOUR_SECONDS),
                max_rest: Duration::from_secs(args.max_rest_hours * HOUR_SECONDS),
                cycles: args.cycles,
            },
            exit_grace: EXIT_GRACE,
            reselect: args.reselect,
        }
    }
}
