//! 房间存储接口
//!
//! 房间和成员关系由外部房间管理模块创建和维护，聊天核心只读。

use std::collections::HashSet;

use async_trait::async_trait;

use crate::entities::Room;
use crate::errors::RepositoryResult;
use crate::value_objects::{RoomId, UserId};

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// 房间是否存在且未被软删除
    async fn room_exists(&self, room_id: RoomId) -> RepositoryResult<bool>;

    /// 获取房间成员；未知房间返回空集合。软删除的房间仍返回原成员（用于历史读取授权）
    async fn get_members(&self, room_id: RoomId) -> RepositoryResult<HashSet<UserId>>;

    /// 根据ID查找房间（包含已软删除的房间）
    async fn find_room(&self, room_id: RoomId) -> RepositoryResult<Option<Room>>;
}
