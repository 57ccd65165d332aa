use crate::config::{ConfigError, ConfigStore, Configuration};
use crate::guard::GuardError;
use crate::mafile::{read_dir, MaFile};
use crate::prompt::{Prompt, PromptError};
use crate::schedule::{run_until_interrupted, Outcome, ScheduleError, Scheduler};
use crate::session::{Credentials, Game, SessionConnector, SessionError, SteamSession};
use crate::settings::Settings;
use rand::Rng;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdlerError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to generate steam guard code: {0:#}")]
    Guard(#[from] GuardError),
    #[error("Giving up on login: {0:#}")]
    Login(SessionError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("No games selected in {}, run again with --reselect to choose games", path.display())]
    NoGamesSelected { path: PathBuf },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Walks through login and game selection, then idles the selected games
pub struct Idler<C, Read, Write> {
    connector: C,
    prompt: Prompt<Read, Write>,
    store: ConfigStore,
    settings: Settings,
    stop: CancellationToken,
}

impl<C, Read, Write> Idler<C, Read, Write>
where
    C: SessionConnector,
    Read: AsyncRead + Unpin + Send,
    Write: AsyncWrite + Unpin + Send,
{
    pub fn new(connector: C, prompt: Prompt<Read, Write>, settings: Settings) -> Self {
        Idler {
            connector,
            prompt,
            store: ConfigStore::new(settings.config_path.clone()),
            settings,
            stop: CancellationToken::new(),
        }
    }

    /// Cancelling the token ends idling once the current play/rest cycle is over
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn into_prompt(self) -> Prompt<Read, Write> {
        self.prompt
    }

    /// Run until the schedule is finished or `interrupt` resolves
    pub async fn run<R, I>(&mut self, rng: R, interrupt: I) -> Result<Outcome, IdlerError>
    where
        R: Rng,
        I: Future<Output = ()>,
    {
        let mut config = self.store.load();
        if self.settings.reselect && config.selected_games.take().is_some() {
            info!("discarding saved game selection");
        }

        let ma_file = self.ma_file().await?;
        let password = self.password(&mut config, &ma_file).await?;
        let session = self.log_on(&ma_file, &password).await?;
        self.prompt.say("Logged on!").await?;
        self.store.save(&config)?;

        let games = self.select_games(&mut config, &session).await?;
        self.store.save(&config)?;
        if games.is_empty() {
            return Err(IdlerError::NoGamesSelected {
                path: self.store.path().into(),
            });
        }

        let mut scheduler = Scheduler::new(
            &session,
            &games,
            self.settings.schedule.clone(),
            rng,
            self.stop.clone(),
        )?;
        let outcome =
            run_until_interrupted(&mut scheduler, interrupt, self.settings.exit_grace).await;
        if outcome == Outcome::Interrupted {
            self.prompt.say("Exited from all games").await?;
        }
        Ok(outcome)
    }

    /// Ask for the maFile directory until it can be read, then for the file to use
    async fn ma_file(&mut self) -> Result<MaFile, IdlerError> {
        let default = self.settings.mafile_dir.display().to_string();
        let mut files = loop {
            let path = self
                .prompt
                .input("Enter path to MaFiles directory", &default)
                .await?;
            match read_dir(Path::new(&path)) {
                Ok(files) => break files,
                Err(e) => {
                    warn!(error = %e, "failed to read maFiles");
                    self.prompt
                        .say(&format!("Can't read MaFiles directory! {e}"))
                        .await?;
                }
            }
        };
        let index = self.prompt.select("Select MaFile", &files).await?;
        Ok(files.swap_remove(index).content)
    }

    async fn password(
        &mut self,
        config: &mut Configuration,
        ma_file: &MaFile,
    ) -> Result<String, IdlerError> {
        if let Some(password) = config.password() {
            return Ok(password);
        }
        let password = self
            .prompt
            .password(&format!("Enter password for {}", ma_file.account_name))
            .await?;
        config.set_password(&password);
        Ok(password)
    }

    /// Log in, letting the user decide whether to retry after a failure
    ///
    /// Every attempt generates its own steam guard code once steam asks for one.
    #[instrument(skip_all, fields(account = %ma_file.account_name))]
    async fn log_on(&mut self, ma_file: &MaFile, password: &str) -> Result<C::Session, IdlerError> {
        ma_file.auth_code()?;
        let credentials = Credentials {
            account_name: ma_file.account_name.clone(),
            password: password.into(),
            shared_secret: ma_file.shared_secret.clone(),
        };
        loop {
            match self.connector.log_on(&credentials).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    error!(error = %e, "login failed");
                    self.prompt.say(&format!("Login failed: {e}")).await?;
                    if !self.prompt.confirm("Retry login?", true).await? {
                        return Err(IdlerError::Login(e));
                    }
                }
            }
        }
    }

    /// The saved selection, or a new one picked from the owned games
    async fn select_games<S: SteamSession>(
        &mut self,
        config: &mut Configuration,
        session: &S,
    ) -> Result<Vec<Game>, IdlerError> {
        if let Some(games) = &config.selected_games {
            return Ok(games.clone());
        }

        let license_app = self.settings.license_app_id;
        let request_license = self
            .prompt
            .confirm(&format!("Request free license for app {license_app}?"), false)
            .await?;
        if request_license {
            match session.request_free_license(&[license_app]).await {
                Ok(granted) => info!(?granted, "requested free license"),
                Err(e) => warn!(error = %e, app_id = license_app, "free license request failed"),
            }
        }

        let owned = session.owned_games().await?;
        let chosen = self
            .prompt
            .multi_select("Select which games to play", &owned)
            .await?;
        let names: HashSet<&str> = chosen.iter().map(|&i| owned[i].name.as_str()).collect();
        let selected: Vec<Game> = owned
            .iter()
            .filter(|game| names.contains(game.name.as_str()))
            .cloned()
            .collect();
        info!(count = selected.len(), "games selected");

        config.selected_games = Some(selected.clone());
        Ok(selected)
    }
}
