//! 通知实体
//!
//! 发送消息成功后交给通知协作者记录；通知失败不影响消息发送。

use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId};

/// 通知类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ChatMessage,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ChatMessage => "chat_message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: UserId,
    pub text: String,
    pub kind: NotificationKind,
    pub created_at: Timestamp,
}

impl Notification {
    pub fn chat_message(recipient_id: UserId, text: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            recipient_id,
            text: text.into(),
            kind: NotificationKind::ChatMessage,
            created_at,
        }
    }
}
