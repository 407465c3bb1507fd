//! UseCase errors

use thiserror::Error;

use crate::{
    domain::{AdmissionError, AuthError, RepositoryError, ValueObjectError},
    infrastructure::registry::RegistryError,
};

/// Admission call failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestAdmissionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Admission(#[from] AdmissionError),
}

impl RequestAdmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Auth(AuthError::Rejected(_)) => "AUTH_REJECTED",
            Self::Auth(AuthError::Timeout(_)) => "AUTH_TIMEOUT",
            Self::Auth(AuthError::Unavailable(_)) => "AUTH_UNAVAILABLE",
            Self::Admission(e) => e.code(),
        }
    }
}

impl From<RepositoryError> for RequestAdmissionError {
    fn from(err: RepositoryError) -> Self {
        Self::Admission(AdmissionError::Repository(err))
    }
}

/// Chat endpoint connection failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectError {
    #[error("ticket is unknown, expired or issued for another room")]
    InvalidTicket,
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<RepositoryError> for ConnectError {
    fn from(err: RepositoryError) -> Self {
        Self::Admission(AdmissionError::Repository(err))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendMessageError {
    #[error("invalid message: {0}")]
    InvalidContent(#[from] ValueObjectError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CloseRoomError {
    #[error("ticket is unknown, expired or issued for another room")]
    InvalidTicket,
    #[error(transparent)]
    Admission(#[from] AdmissionError),
}

impl From<RepositoryError> for CloseRoomError {
    fn from(err: RepositoryError) -> Self {
        Self::Admission(AdmissionError::Repository(err))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GetRoomDetailError {
    #[error("room not found")]
    RoomNotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
