use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("at least one station must be configured")]
    NoStations,

    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },

    #[error("band set {band_set} lacks band {band}")]
    MissingBand { band_set: String, band: String },

    #[error("reference month {0} is not within 1..=12")]
    Month(u32),
}
