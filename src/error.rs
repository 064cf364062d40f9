use std::io;

use thiserror::Error;

use crate::{core::model::BookStatus, validation::ValidationError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Remote call failed {0}")]
    Remote(#[from] api_client::error::Error),

    #[error("Failed to marshall json data {0}")]
    Json(#[from] serde_json::Error),

    #[error("Local storage failed {0}")]
    Storage(#[from] fjall::Error),

    #[error("IO error {0}")]
    IoError(#[from] io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Credentials rejected {0}")]
    Rejected(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Book {id} is {from}, it cannot become {to}")]
    Transition {
        id: String,
        from: BookStatus,
        to: BookStatus,
    },

    #[error("Malformed document `{0}`")]
    MalformedDocument(String),

    #[error("Configuration error {0}")]
    Config(String),

    #[error("Generic error {0}")]
    Generic(String),
}

impl Error {
    /// The identity provider refused the session, as opposed to not being
    /// reachable at all.
    pub fn is_rejection(&self) -> bool {
        match self {
            Error::Remote(error) => error.is_rejection(),
            Error::Rejected(..) => true,
            _ => false,
        }
    }
}

pub type Result<A> = std::result::Result<A, Error>;
