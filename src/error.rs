use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("zone `{name}` needs at least 3 points, got {points}")]
    EmptyPolygon { name: String, points: usize },

    #[error("count line `{name}` has zero length")]
    DegenerateLine { name: String },

    #[error("duplicate {kind} name `{name}`")]
    DuplicateName { kind: &'static str, name: String },

    #[error("invalid tracker config: {0}")]
    InvalidConfig(String),

    #[error("invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Config Error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
