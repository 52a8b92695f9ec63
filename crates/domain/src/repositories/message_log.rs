//! 消息日志接口
//!
//! 只追加的有序消息记录。插入顺序即房间内的规范顺序，
//! 广播和历史读取都按该顺序回放。

use async_trait::async_trait;

use crate::entities::Message;
use crate::errors::RepositoryResult;
use crate::value_objects::{MessageId, RoomId, Timestamp};

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// 持久化一条新消息；返回成功后消息即已落盘
    async fn append(&self, message: Message) -> RepositoryResult<Message>;

    /// 根据ID查找消息
    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>>;

    /// 原子地把属于 room_id 的未读消息标记为已读。
    ///
    /// 只有完成 false → true 迁移的那一次调用返回 true；消息不存在、
    /// 不属于该房间或已读时返回 false。
    async fn mark_seen(&self, id: MessageId, room_id: RoomId) -> RepositoryResult<bool>;

    /// 按追加顺序返回房间消息；`since` 用于断线重连后补拉
    async fn history(
        &self,
        room_id: RoomId,
        since: Option<Timestamp>,
    ) -> RepositoryResult<Vec<Message>>;
}
