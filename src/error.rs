use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    /// A dataset could not be fetched or parsed; the loader already logged why.
    #[error("data not provided: {0}")]
    DataUnavailable(String),

    #[error("zone boundaries are not GeoJSON features: {0}")]
    InvalidZones(String),

    #[error("density records are malformed: {0}")]
    InvalidRecords(#[from] serde_json::Error),

    #[error("invalid color scale: {0}")]
    InvalidScale(String),

    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),

    #[error("invalid data source '{0}'")]
    InvalidSource(String),
}
