//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 参数校验失败
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 用户不是房间成员（房间不存在时同样返回该错误，避免泄露房间是否存在）
    #[error("user is not a member of the room")]
    NotARoomMember,

    /// 单聊房间的接收者不在房间内
    #[error("receiver is not a member of the room")]
    ReceiverNotInRoom,

    /// 单聊房间发送消息时缺少接收者
    #[error("direct room message requires a receiver")]
    MissingReceiver,

    /// 连接已断开，不再接受任何事件
    #[error("session already disconnected")]
    SessionClosed,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 仓储层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 仓储结果类型
pub type RepositoryResult<T> = Result<T, RepositoryError>;
