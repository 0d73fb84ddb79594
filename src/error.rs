use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Fuzzy scoring or distance loss constructed over a degenerate
    /// geometry (zero-area frame, non-positive maximum distance).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("index {index} out of range (len {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("inconsistent batch: {features} feature vectors, {labels} labels")]
    InconsistentBatch { features: usize, labels: usize },

    #[error("config: {0}")]
    Config(String),

    #[error("malformed box record: {0}")]
    MalformedRecord(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
