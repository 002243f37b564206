use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid solver config: {0}")]
    InvalidSolverConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ProjectionResult<T> = Result<T, ProjectionError>;
