use reqwest::StatusCode;
use std::result::Result as StdResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON marshalling failed {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP IO failed {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed {0}")]
    Server(StatusCode),

    #[error("Request failed {status}: {message}")]
    Service { status: StatusCode, message: String },

    #[error("Book search API key is missing")]
    MissingApiKey,

    #[error("Unexpected response {0}")]
    Unexpected(String),
}

impl Error {
    /// The service answered and refused the request's credentials. Transport
    /// failures and server errors are not rejections.
    pub fn is_rejection(&self) -> bool {
        let status = match self {
            Error::Server(status) | Error::Service { status, .. } => *status,
            _ => return false,
        };
        matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        )
    }
}

pub type Result<A> = StdResult<A, Error>;

/// Turns a non-success response into an error, keeping the service's own
/// message when the body carries one.
pub(crate) async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await?;
    match serde_json::from_slice::<crate::model::ErrorEnvelope>(&body) {
        Ok(envelope) if !envelope.error.message.is_empty() => Err(Error::Service {
            status,
            message: envelope.error.message,
        }),
        _ => Err(Error::Server(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_refused_credentials_are_rejections() {
        let refused = Error::Service {
            status: StatusCode::BAD_REQUEST,
            message: "INVALID_REFRESH_TOKEN".to_owned(),
        };
        assert!(refused.is_rejection());
        assert!(Error::Server(StatusCode::UNAUTHORIZED).is_rejection());

        assert!(!Error::Server(StatusCode::SERVICE_UNAVAILABLE).is_rejection());
        assert!(!Error::Unexpected("truncated body".to_owned()).is_rejection());
    }
}
