//! 房间内消息排序
//!
//! 每个房间一条异步互斥通道，串行化"追加 + 投递"，保证在线成员看到的顺序
//! 与消息日志的追加顺序一致。不同房间互不阻塞。
//!
//! 发送时间也在通道内分配，同一房间内严格递增，`since` 补拉不会漏消息。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, SubsecRound};
use domain::{RoomId, Timestamp};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 超过该数量时清理空闲通道
const PRUNE_THRESHOLD: usize = 1024;

/// 单个房间的通道状态
#[derive(Debug, Default)]
pub struct RoomLane {
    last_stamp: Option<Timestamp>,
}

impl RoomLane {
    /// 分配发送时间：截断到微秒（与存储精度一致），且严格大于上一次分配的时间
    pub fn stamp(&mut self, now: Timestamp) -> Timestamp {
        let now = now.trunc_subsecs(6);
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

pub type LaneGuard = OwnedMutexGuard<RoomLane>;

#[derive(Default)]
pub struct RoomSequencer {
    lanes: Mutex<HashMap<RoomId, Arc<AsyncMutex<RoomLane>>>>,
}

impl RoomSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取房间通道，持有返回的守卫期间同一房间的其他写入会等待
    pub async fn lock(&self, room_id: RoomId) -> LaneGuard {
        let lane = {
            let mut lanes = self
                .lanes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if lanes.len() > PRUNE_THRESHOLD {
                lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
            }
            lanes.entry(room_id).or_default().clone()
        };
        lane.lock_owned().await
    }

    pub fn lane_count(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
