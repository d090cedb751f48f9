use thiserror::Error;

/// Failure reaching the message transport itself.
///
/// A contact not replying is not a transport error; that is `Ok(None)` from
/// the reply-wait operation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport connection failed: {0}")]
    Connection(String),

    #[error("transport rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Failure obtaining a meeting link. Always recovered by the survey engine.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("meeting scheduling is not configured")]
    NotConfigured,

    #[error("scheduling request failed: {0}")]
    Http(String),

    #[error("scheduling API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("scheduling API response has no join_url")]
    MissingJoinUrl,

    #[error("token exchange failed: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for SchedulingError {
    fn from(e: reqwest::Error) -> Self {
        SchedulingError::Http(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("address is not reachable: {0}")]
    Undeliverable(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Lock,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SurveyError>;
