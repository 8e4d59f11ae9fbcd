/// Forum Service Library
///
/// Posts with votes and comment restrictions, threaded soft-deletable
/// comments, cursor-paginated post listings and a live feed of new comments.
/// The core is transport-agnostic: an API layer validates raw input with
/// `validation`, calls the services and maps `ErrorKind` to its responses.
///
/// # Modules
///
/// - `models`: Posts, comments, votes and pagination types
/// - `db`: Storage contract with in-memory and PostgreSQL stores
/// - `cursor`: Opaque pagination cursor encoding
/// - `services`: Post and comment services, live comment hub
/// - `validation`: Request validation for API layers
/// - `error`: Error types and the exposable error kinds
/// - `config`: Configuration management
/// - `logging`: Tracing subscriber setup
/// - `clock`: Injectable time source
/// - `app`: Application state wiring
pub mod app;
pub mod clock;
pub mod config;
pub mod cursor;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod validation;

pub use app::AppState;
pub use config::Config;
pub use error::{AppError, ErrorKind, Result};
