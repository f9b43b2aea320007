//! HTTP surface: upload form, conversion endpoint, health check.
//!
//! | Route           | Handler              |
//! |-----------------|----------------------|
//! | `GET /`         | [`handlers::index`]   |
//! | `POST /convert` | [`handlers::convert`] |
//! | `GET /health`   | [`handlers::health`]  |
//!
//! One-shot notices ("No files uploaded", …) travel to the next `GET /` in a
//! signed cookie, see [`flash`].

pub mod error;
pub mod flash;
pub mod handlers;

use crate::config::ServerConfig;
use crate::convert::ConversionContext;
use crate::error::ConvertError;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::ServerError;

/// Shared, immutable application state.
#[derive(Clone)]
pub struct AppState {
    pub ctx: ConversionContext,
    pub config: Arc<ServerConfig>,
    pub key: Key,
}

impl AppState {
    /// Build state from `config`, deriving the cookie key from its secret
    /// (or generating one).
    ///
    /// # Errors
    /// [`ConvertError::InvalidConfig`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`](crate::config::MIN_SECRET_LEN) bytes.
    pub fn new(config: ServerConfig, ctx: ConversionContext) -> Result<Self, ConvertError> {
        let key = flash::signing_key(config.secret_key.as_deref())?;
        Ok(Self {
            ctx,
            config: Arc::new(config),
            key,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

/// The full application router.
pub fn router(state: AppState) -> Router {
    let limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::index))
        .route("/convert", post(handlers::convert))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
