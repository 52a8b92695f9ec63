use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::events::RejectReason;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("authentication failed")]
    Authentication,
}

impl ApplicationError {
    /// 映射为推送给客户端的拒绝原因
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            ApplicationError::Domain(DomainError::NotARoomMember)
            | ApplicationError::Authentication => RejectReason::NotAMember,
            ApplicationError::Domain(DomainError::ReceiverNotInRoom) => {
                RejectReason::ReceiverNotInRoom
            }
            ApplicationError::Domain(DomainError::InvalidArgument { .. })
            | ApplicationError::Domain(DomainError::MissingReceiver) => {
                RejectReason::InvalidArgument
            }
            ApplicationError::Domain(DomainError::SessionClosed)
            | ApplicationError::Repository(_) => RejectReason::InternalError,
        }
    }

    /// 给客户端看的错误描述；存储错误不外泄细节
    pub fn client_message(&self) -> String {
        match self {
            ApplicationError::Repository(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
