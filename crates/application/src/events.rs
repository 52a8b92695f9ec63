//! 聊天协议事件
//!
//! 客户端和服务端之间的 JSON 帧，以 `event` 字段区分类型，字段使用 camelCase。

use domain::{Message, MessageId, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// 客户端发起的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomId,
        /// 可选；如提供必须与认证身份一致
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
    },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<UserId>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiver_id: Option<UserId>,
    },
    /// 已读回执
    #[serde(rename_all = "camelCase")]
    MessageSeen {
        message_id: MessageId,
        room_id: RoomId,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::LeaveRoom { .. } => "leaveRoom",
            ClientEvent::SendMessage { .. } => "sendMessage",
            ClientEvent::MessageSeen { .. } => "messageSeen",
        }
    }
}

/// 服务端推送的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RoomJoined { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    RoomLeft { room_id: RoomId },
    ReceiveMessage { message: Message },
    #[serde(rename_all = "camelCase")]
    MessageSeen {
        message_id: MessageId,
        room_id: RoomId,
    },
    ErrorMessage {
        reason: RejectReason,
        message: String,
    },
}

impl ServerEvent {
    pub fn rejected(reason: RejectReason, message: impl Into<String>) -> Self {
        ServerEvent::ErrorMessage {
            reason,
            message: message.into(),
        }
    }
}

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    NotAMember,
    ReceiverNotInRoom,
    InvalidArgument,
    InternalError,
}
