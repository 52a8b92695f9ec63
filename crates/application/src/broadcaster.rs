//! 房间广播
//!
//! 只投递给当前加入房间的连接。跨进程扩展时在这里替换为消息总线实现。

use async_trait::async_trait;
use domain::RoomId;
use thiserror::Error;

use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[async_trait]
pub trait RoomBroadcaster: Send + Sync {
    /// 投递给当前加入 `room_id` 的所有在线连接，返回投递的连接数
    async fn deliver(&self, room_id: RoomId, event: ServerEvent) -> Result<usize, BroadcastError>;
}

/// 单进程广播器，基于连接注册表的房间索引定向投递
#[derive(Clone)]
pub struct LocalRoomBroadcaster {
    registry: ConnectionRegistry,
}

impl LocalRoomBroadcaster {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RoomBroadcaster for LocalRoomBroadcaster {
    async fn deliver(&self, room_id: RoomId, event: ServerEvent) -> Result<usize, BroadcastError> {
        Ok(self.registry.deliver(room_id, &event))
    }
}
