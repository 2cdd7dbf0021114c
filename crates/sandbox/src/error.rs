use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pool(#[from] pool::PoolError),

    #[error(transparent)]
    Sph(#[from] sph::SphError),

    #[error(transparent)]
    Rope(#[from] rope::RopeError),

    #[error("{0}")]
    Usage(String),
}
