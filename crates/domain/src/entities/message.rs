//! 聊天消息实体
//!
//! 消息只在发送成功时创建一次；之后唯一允许的变化是已读标记从 false 变为 true。

use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageBody, MessageId, RoomId, Timestamp, UserId};

/// 消息实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    /// 仅单聊消息有接收者
    pub receiver_id: Option<UserId>,
    #[serde(rename = "message")]
    pub body: MessageBody,
    #[serde(rename = "sendTime")]
    pub sent_at: Timestamp,
    #[serde(rename = "isSeen")]
    pub seen: bool,
}

impl Message {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        sender_id: UserId,
        receiver_id: Option<UserId>,
        body: MessageBody,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            sender_id,
            receiver_id,
            body,
            sent_at,
            seen: false,
        }
    }

    /// 标记为已读，仅在本次调用完成了 false → true 迁移时返回 true
    pub fn mark_seen(&mut self) -> bool {
        if self.seen {
            return false;
        }
        self.seen = true;
        true
    }

    /// 获取消息的简短预览（用于通知）
    pub fn preview(&self, max_chars: usize) -> String {
        let body = self.body.as_str();
        if body.chars().count() <= max_chars {
            body.to_owned()
        } else {
            let cut: String = body.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(body: &str) -> Message {
        Message::new(
            MessageId::generate(),
            RoomId::generate(),
            UserId::generate(),
            None,
            MessageBody::new(body).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn seen_flag_transitions_only_once() {
        let mut message = sample("hello");
        assert!(!message.seen);

        assert!(message.mark_seen());
        assert!(message.seen);

        assert!(!message.mark_seen());
        assert!(message.seen);
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let message = sample("你好世界，欢迎");
        assert_eq!(message.preview(4), "你好世界...");
        assert_eq!(message.preview(100), "你好世界，欢迎");
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let message = sample("hi");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["message"], "hi");
        assert_eq!(json["isSeen"], false);
        assert!(json.get("sendTime").is_some());
        assert!(json.get("roomId").is_some());
        assert!(json["receiverId"].is_null());
    }
}
