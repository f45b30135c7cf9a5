use thiserror::Error;

/// Failure of a remote query. Always delivered through a completion; never
/// raised across the engine boundary.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid url: {0}")]
    Url(String),

    #[error("request submission failed: {0}")]
    Submission(String),

    #[error("response carried no data")]
    NoData,

    #[error("service returned HTTP {0}")]
    BadResponse(u16),

    #[error("malformed response: {0}")]
    Model(String),

    #[error("service unavailable")]
    Unavailable,

    #[error("{0}")]
    Other(String),
}
