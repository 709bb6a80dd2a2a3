//! Per-season fantasy league data service: team rosters, driver mappings,
//! race schedules and fantasy scores stored as JSON documents on disk.

pub mod config;
pub mod error;
pub mod extract;
pub mod mapping;
pub mod routes;
pub mod scores;
pub mod store;
pub mod types;

pub use config::{AdminConfig, Config};
pub use error::{ApiError, ConfigError, StoreError, TransformError};
pub use mapping::{normalize_driver_mapping, normalize_team_mapping};
pub use routes::{build_router, AppState};
pub use scores::parse_external_scores;
pub use store::{DocumentKind, DocumentStore};
