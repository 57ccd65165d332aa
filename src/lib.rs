pub mod app;
pub mod config;
pub mod guard;
pub mod mafile;
pub mod prompt;
pub mod schedule;
pub mod session;
pub mod settings;

pub use steam_vent::proto;

pub use app::{Idler, IdlerError};
pub use config::{ConfigError, ConfigStore, Configuration};
pub use guard::{AuthCode, GuardError, SharedSecret};
pub use mafile::{MaFile, MaFileError, NamedMaFile};
pub use prompt::{ConsolePrompt, Prompt, PromptError};
pub use schedule::{Cycle, Outcome, Schedule, ScheduleError, Scheduler};
pub use session::{
    Credentials, Game, SessionConnector, SessionError, SteamSession, VentConnector, VentSession,
};
pub use settings::{Args, Settings};
