use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;

/// Request level failures. Everything numeric is contained below this level
/// and degrades to `null` values instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown station: {0}")]
    UnknownStation(String),

    #[error("invalid geometry for station {station}: {reason}")]
    InvalidGeometry { station: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("scene catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
