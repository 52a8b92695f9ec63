//! 聊天室与成员关系

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{RoomId, Timestamp};

/// 房间类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    /// 两人单聊，每条消息必须指定接收者
    Direct,
    /// 多人群聊，消息扇出给全部成员
    Group,
}

/// 聊天室实体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// 仅群聊有名称
    pub name: Option<String>,
    pub kind: RoomKind,
    pub created_at: Timestamp,
    /// 软删除时间；已删除房间的历史仍可读取，但拒绝新的加入和发送
    pub deleted_at: Option<Timestamp>,
}

impl Room {
    pub fn new_direct(id: RoomId, created_at: Timestamp) -> Self {
        Self {
            id,
            name: None,
            kind: RoomKind::Direct,
            created_at,
            deleted_at: None,
        }
    }

    pub fn new_group(
        id: RoomId,
        name: impl Into<String>,
        created_at: Timestamp,
    ) -> DomainResult<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("room_name", "cannot be empty"));
        }
        Ok(Self {
            id,
            name: Some(trimmed.to_owned()),
            kind: RoomKind::Group,
            created_at,
            deleted_at: None,
        })
    }

    pub fn is_direct(&self) -> bool {
        self.kind == RoomKind::Direct
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn soft_delete(&mut self, at: Timestamp) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn group_room_requires_name() {
        let id = RoomId::generate();
        assert!(Room::new_group(id, "  ", Utc::now()).is_err());

        let room = Room::new_group(id, " friends ", Utc::now()).unwrap();
        assert_eq!(room.name.as_deref(), Some("friends"));
        assert!(!room.is_direct());
    }

    #[test]
    fn soft_delete_keeps_first_timestamp() {
        let mut room = Room::new_direct(RoomId::generate(), Utc::now());
        assert!(room.is_active());

        let first = Utc::now();
        room.soft_delete(first);
        room.soft_delete(first + chrono::Duration::seconds(5));

        assert!(!room.is_active());
        assert_eq!(room.deleted_at, Some(first));
    }
}
