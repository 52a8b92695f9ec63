//! 连接注册表
//!
//! 进程内的在线连接表：连接 → (认证用户, 已加入房间集合, 推送通道)，
//! 同时维护房间 → 连接的反向索引，供房间广播按房间定向投递。
//!
//! 每个连接的已加入房间集合只能通过该连接自己持有的 [`ConnectionHandle`] 修改。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use domain::{RoomId, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::ServerEvent;

/// 连接唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

struct ConnectionEntry {
    user_id: UserId,
    rooms: HashSet<RoomId>,
    sender: EventSender,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl RegistryState {
    fn detach_from_room(&mut self, room_id: RoomId, connection_id: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个已认证的连接，初始时不在任何房间
    pub fn register(&self, user_id: UserId, sender: EventSender) -> ConnectionHandle {
        let id = ConnectionId::generate();
        self.write().connections.insert(
            id,
            ConnectionEntry {
                user_id,
                rooms: HashSet::new(),
                sender,
            },
        );
        info!(connection_id = %id, user_id = %user_id, "connection registered");

        ConnectionHandle {
            id,
            user_id,
            registry: self.clone(),
            closed: false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    pub fn room_connection_count(&self, room_id: RoomId) -> usize {
        self.read().rooms.get(&room_id).map_or(0, HashSet::len)
    }

    pub fn is_registered(&self, connection_id: ConnectionId) -> bool {
        self.read().connections.contains_key(&connection_id)
    }

    /// 向当前加入房间的所有连接投递事件，返回成功投递的连接数。
    ///
    /// 尽力而为：接收端已关闭的连接直接跳过。
    pub fn deliver(&self, room_id: RoomId, event: &ServerEvent) -> usize {
        let state = self.read();
        let Some(members) = state.rooms.get(&room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for connection_id in members {
            let Some(entry) = state.connections.get(connection_id) else {
                continue;
            };
            if entry.sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(
                    connection_id = %connection_id,
                    room_id = %room_id,
                    "skip delivery to closed connection"
                );
            }
        }
        delivered
    }

    fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        self.read()
            .connections
            .get(&connection_id)
            .is_some_and(|entry| entry.sender.send(event).is_ok())
    }

    fn join(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let mut state = self.write();
        let Some(entry) = state.connections.get_mut(&connection_id) else {
            return false;
        };
        entry.rooms.insert(room_id);
        state.rooms.entry(room_id).or_default().insert(connection_id);
        true
    }

    fn leave(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let mut state = self.write();
        let removed = state
            .connections
            .get_mut(&connection_id)
            .is_some_and(|entry| entry.rooms.remove(&room_id));
        state.detach_from_room(room_id, connection_id);
        removed
    }

    fn joined_rooms(&self, connection_id: ConnectionId) -> HashSet<RoomId> {
        self.read()
            .connections
            .get(&connection_id)
            .map(|entry| entry.rooms.clone())
            .unwrap_or_default()
    }

    fn remove(&self, connection_id: ConnectionId) -> HashSet<RoomId> {
        let mut state = self.write();
        let Some(entry) = state.connections.remove(&connection_id) else {
            return HashSet::new();
        };
        for room_id in &entry.rooms {
            state.detach_from_room(*room_id, connection_id);
        }
        info!(
            connection_id = %connection_id,
            user_id = %entry.user_id,
            rooms = entry.rooms.len(),
            "connection unregistered"
        );
        entry.rooms
    }

    // 锁内不会 panic，中毒时直接取回内部状态
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 单个连接对自身会话状态的独占句柄。
///
/// 句柄不可克隆；被 drop 时若尚未断开，会自动从注册表移除。
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    registry: ConnectionRegistry,
    closed: bool,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn join(&self, room_id: RoomId) -> bool {
        self.registry.join(self.id, room_id)
    }

    pub fn leave(&self, room_id: RoomId) -> bool {
        self.registry.leave(self.id, room_id)
    }

    pub fn is_joined(&self, room_id: RoomId) -> bool {
        self.joined_rooms().contains(&room_id)
    }

    pub fn joined_rooms(&self) -> HashSet<RoomId> {
        self.registry.joined_rooms(self.id)
    }

    /// 推送事件到本连接
    pub fn send(&self, event: ServerEvent) -> bool {
        self.registry.send_to(self.id, event)
    }

    /// 原子地移除本连接的全部记录，返回断开前已加入的房间
    pub fn disconnect(mut self) -> HashSet<RoomId> {
        self.closed = true;
        self.registry.remove(self.id)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.registry.remove(self.id);
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .finish()
    }
}
