use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid base url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("backend rejected the request")]
    Rejected,
}

pub type ClientResult<T> = Result<T, ClientError>;
