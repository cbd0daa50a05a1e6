pub mod admin;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod link;
pub mod matching;
pub mod pairing;
pub mod relay;
pub mod routes;
pub mod session;
pub mod store;
pub mod transport;

use std::sync::Arc;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}};
use sqlx::SqlitePool;

use config::Settings;
use error::RelayError;
use session::{Invitations, Sessions};
use store::{InboxStore, ProfileStore};
use transport::Transport;

/// Everything an event handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct Broker {
    pub profiles: ProfileStore,
    pub inbox: InboxStore,
    pub transport: Transport,
    pub sessions: Sessions,
    pub invitations: Invitations,
    pub settings: Arc<Settings>,
}

impl Broker {
    pub fn new(db_pool: SqlitePool, transport: Transport, settings: Settings) -> Broker {
        Broker {
            profiles: ProfileStore::new(db_pool.clone()),
            inbox: InboxStore::new(db_pool),
            transport,
            sessions: Sessions::default(),
            invitations: Invitations::default(),
            settings: Arc::new(settings),
        }
    }
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub broker: Broker,
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<RelayError>() {
            Some(RelayError::Store(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
            Some(RelayError::Delivery { .. }) => StatusCode::BAD_GATEWAY,
            Some(RelayError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(RelayError);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(axum::Error);
