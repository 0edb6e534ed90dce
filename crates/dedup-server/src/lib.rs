//! HTTP server for the line-deduplicating store.
//!
//! `PUT /<resource>` replaces a resource with the deduplicated request body
//! and answers with a JSON write summary. `GET /<resource>` streams it back.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::DedupServer;
