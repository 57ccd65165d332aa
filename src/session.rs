use crate::guard::{GuardError, SharedSecret};
use crate::proto::enums_clientserver::EMsg;
use crate::proto::steammessages_clientserver::cmsg_client_games_played::GamePlayed;
use crate::proto::steammessages_clientserver::CMsgClientGamesPlayed;
use crate::proto::steammessages_clientserver_2::{
    CMsgClientRequestFreeLicense, CMsgClientRequestFreeLicenseResponse,
};
use crate::proto::steammessages_player_steamclient::CPlayer_GetOwnedGames_Request;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::future::Future;
use steam_vent::auth::{FileGuardDataStore, SharedSecretAuthConfirmationHandler};
use steam_vent::{
    Connection, ConnectionError, ConnectionTrait, NetworkError, ServerDiscoveryError, ServerList,
};
use thiserror::Error;
use tracing::{debug, info, instrument};

const ERESULT_OK: u32 = 1;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("Failed to discover steam servers: {0:#}")]
    Discovery(#[from] ServerDiscoveryError),
    #[error("Login failed: {0:#}")]
    Connection(#[from] ConnectionError),
    #[error("Network error: {0:#}")]
    Network(#[from] NetworkError),
    #[error("Can't answer the steam guard challenge: {0:#}")]
    Guard(#[from] GuardError),
    #[error("steam rejected the request with result {eresult}")]
    Rejected { eresult: u32 },
    /// Error reported by a session implementation not backed by steam-vent
    #[error("{0}")]
    Other(String),
}

/// An owned app
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Game {
    pub appid: u32,
    pub name: String,
}

impl Game {
    pub fn new(appid: u32, name: impl Into<String>) -> Self {
        Game {
            appid,
            name: name.into(),
        }
    }
}

impl Display for Game {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Everything needed for a single login attempt
///
/// The steam guard code is generated from the secret when steam asks for it.
#[derive(Clone)]
pub struct Credentials {
    pub account_name: String,
    pub password: String,
    pub shared_secret: SharedSecret,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_name", &self.account_name)
            .finish_non_exhaustive()
    }
}

/// A logged in session
///
/// All calls are single requests without retries, the caller decides what to do with failures.
pub trait SteamSession: Sync {
    /// List the apps owned by the logged in account
    fn owned_games(&self) -> impl Future<Output = Result<Vec<Game>, SessionError>> + Send;

    /// Ask steam to add free licenses for the apps, returning the granted app ids
    fn request_free_license(
        &self,
        app_ids: &[u32],
    ) -> impl Future<Output = Result<Vec<u32>, SessionError>> + Send;

    /// Replace the set of games the account is currently playing, an empty set stops playing
    fn set_played_games(
        &self,
        app_ids: &[u32],
    ) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Creates sessions from credentials
pub trait SessionConnector {
    type Session: SteamSession;

    fn log_on(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}

/// Log in to the steam network using steam-vent
#[derive(Debug, Default, Clone)]
pub struct VentConnector;

impl SessionConnector for VentConnector {
    type Session = VentSession;

    #[instrument(skip_all, fields(account = %credentials.account_name))]
    async fn log_on(&self, credentials: &Credentials) -> Result<VentSession, SessionError> {
        // the confirmation handler can't report a bad secret
        credentials.shared_secret.auth_code()?;

        let server_list = ServerList::discover().await?;
        debug!("discovered servers");

        let confirmation_handler =
            SharedSecretAuthConfirmationHandler::new(credentials.shared_secret.as_str());

        let connection = Connection::login(
            &server_list,
            &credentials.account_name,
            &credentials.password,
            FileGuardDataStore::user_cache(),
            confirmation_handler,
        )
        .await?;
        info!(steam_id = %connection.steam_id().steam3(), "logged on");
        Ok(VentSession { connection })
    }
}

/// A session on a steam-vent connection
#[derive(Debug, Clone)]
pub struct VentSession {
    connection: Connection,
}

impl VentSession {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl SteamSession for VentSession {
    #[instrument(skip(self))]
    async fn owned_games(&self) -> Result<Vec<Game>, SessionError> {
        let req = CPlayer_GetOwnedGames_Request {
            steamid: Some(self.connection.steam_id().into()),
            include_appinfo: Some(true),
            include_played_free_games: Some(true),
            ..CPlayer_GetOwnedGames_Request::default()
        };
        let response = self.connection.service_method(req).await?;
        debug!(count = response.game_count(), "received owned games");
        Ok(response
            .games
            .iter()
            .map(|game| Game::new(game.appid() as u32, game.name()))
            .collect())
    }

    #[instrument(skip(self))]
    async fn request_free_license(&self, app_ids: &[u32]) -> Result<Vec<u32>, SessionError> {
        let req = CMsgClientRequestFreeLicense {
            appids: app_ids.to_vec(),
            ..CMsgClientRequestFreeLicense::default()
        };
        let response: CMsgClientRequestFreeLicenseResponse = self.connection.job(req).await?;
        if response.eresult() != ERESULT_OK {
            return Err(SessionError::Rejected {
                eresult: response.eresult(),
            });
        }
        Ok(response.granted_appids)
    }

    #[instrument(skip(self))]
    async fn set_played_games(&self, app_ids: &[u32]) -> Result<(), SessionError> {
        let msg = CMsgClientGamesPlayed {
            games_played: app_ids
                .iter()
                .map(|app_id| GamePlayed {
                    game_id: Some(*app_id as u64),
                    ..GamePlayed::default()
                })
                .collect(),
            ..CMsgClientGamesPlayed::default()
        };
        self.connection
            .send_with_kind(msg, EMsg::k_EMsgClientGamesPlayedWithDataBlob)
            .await?;
        Ok(())
    }
}
