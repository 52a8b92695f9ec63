use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 消息正文的最大长度（字符数）。
pub const MAX_MESSAGE_BODY_CHARS: usize = 10_000;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

uuid_id!(
    /// 用户唯一标识（由外部认证协作者签发）。
    UserId
);

uuid_id!(
    /// 聊天室唯一标识。
    RoomId
);

uuid_id!(
    /// 消息唯一标识。
    MessageId
);

/// 消息正文内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageBody(String);

impl MessageBody {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_argument("message", "cannot be empty"));
        }
        if value.chars().count() > MAX_MESSAGE_BODY_CHARS {
            return Err(DomainError::invalid_argument("message", "too long"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_rejects_blank_and_oversized_text() {
        assert!(MessageBody::new("hi").is_ok());
        assert!(MessageBody::new("   ").is_err());
        assert!(MessageBody::new("").is_err());
        assert!(MessageBody::new("a".repeat(MAX_MESSAGE_BODY_CHARS)).is_ok());
        assert!(MessageBody::new("a".repeat(MAX_MESSAGE_BODY_CHARS + 1)).is_err());
    }

    #[test]
    fn ids_serialize_as_plain_uuid_strings() {
        let raw = Uuid::new_v4();
        let json = serde_json::to_string(&RoomId::from(raw)).unwrap();
        assert_eq!(json, format!("\"{}\"", raw));
    }
}
