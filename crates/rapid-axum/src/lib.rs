//! Axum HTTP adapter for the rapid download engine.
//!
//! Exposes the sync surface (`/entries`), a server-sent event stream of
//! download events (`/events`) and a health probe. [`bootstrap`] is the
//! composition root that wires `SQLite`, the reqwest transport and file
//! storage into a [`rapid_download::DownloadEngine`].
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

pub use bootstrap::{AxumContext, CorsConfig, ServerConfig, bootstrap, start_server};
pub use error::HttpError;
pub use routes::create_router;
pub use sse::SseBroadcaster;
pub use state::AppState;
