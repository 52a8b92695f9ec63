//! 内存存储实现
//!
//! 用于测试，语义与 Postgres 实现保持一致：
//! 消息按追加顺序保存，已读标记在写锁内原子迁移。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    Message, MessageId, MessageLog, Notification, NotificationSink, RepositoryError,
    RepositoryResult, Room, RoomId, RoomStore, Timestamp, UserId,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct RoomState {
    rooms: HashMap<RoomId, Room>,
    members: HashMap<RoomId, HashSet<UserId>>,
}

#[derive(Default)]
pub struct InMemoryRoomStore {
    state: RwLock<RoomState>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_room(&self, room: Room, members: impl IntoIterator<Item = UserId>) {
        let mut state = self.state.write().await;
        state
            .members
            .entry(room.id)
            .or_default()
            .extend(members);
        state.rooms.insert(room.id, room);
    }

    pub async fn add_member(&self, room_id: RoomId, user_id: UserId) {
        let mut state = self.state.write().await;
        state.members.entry(room_id).or_default().insert(user_id);
    }

    pub async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> bool {
        let mut state = self.state.write().await;
        state
            .members
            .get_mut(&room_id)
            .is_some_and(|members| members.remove(&user_id))
    }

    pub async fn soft_delete(&self, room_id: RoomId, at: Timestamp) -> bool {
        let mut state = self.state.write().await;
        match state.rooms.get_mut(&room_id) {
            Some(room) if room.is_active() => {
                room.soft_delete(at);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn room_exists(&self, room_id: RoomId) -> RepositoryResult<bool> {
        let state = self.state.read().await;
        Ok(state.rooms.get(&room_id).is_some_and(Room::is_active))
    }

    async fn get_members(&self, room_id: RoomId) -> RepositoryResult<HashSet<UserId>> {
        let state = self.state.read().await;
        Ok(state.members.get(&room_id).cloned().unwrap_or_default())
    }

    async fn find_room(&self, room_id: RoomId) -> RepositoryResult<Option<Room>> {
        let state = self.state.read().await;
        Ok(state.rooms.get(&room_id).cloned())
    }
}

#[derive(Default)]
struct LogState {
    /// 追加顺序即规范顺序
    entries: Vec<Message>,
    index: HashMap<MessageId, usize>,
}

#[derive(Default)]
pub struct InMemoryMessageLog {
    state: RwLock<LogState>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn append(&self, message: Message) -> RepositoryResult<Message> {
        let mut state = self.state.write().await;
        if state.index.contains_key(&message.id) {
            return Err(RepositoryError::Conflict);
        }
        let position = state.entries.len();
        state.index.insert(message.id, position);
        state.entries.push(message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>> {
        let state = self.state.read().await;
        Ok(state
            .index
            .get(&id)
            .and_then(|position| state.entries.get(*position))
            .cloned())
    }

    async fn mark_seen(&self, id: MessageId, room_id: RoomId) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;
        let Some(position) = state.index.get(&id).copied() else {
            return Ok(false);
        };
        match state.entries.get_mut(position) {
            Some(message) if message.room_id == room_id => Ok(message.mark_seen()),
            _ => Ok(false),
        }
    }

    async fn history(
        &self,
        room_id: RoomId,
        since: Option<Timestamp>,
    ) -> RepositoryResult<Vec<Message>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|message| message.room_id == room_id)
            .filter(|message| since.map_or(true, |since| message.sent_at > since))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationSink {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }

    pub async fn notifications_for(&self, user_id: UserId) -> Vec<Notification> {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|notification| notification.recipient_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(&self, notification: Notification) -> RepositoryResult<()> {
        self.notifications.write().await.push(notification);
        Ok(())
    }
}

/// 内存存储集合，与 [`crate::PgStorage`] 对应
#[derive(Clone, Default)]
pub struct MemoryStorage {
    pub room_store: Arc<InMemoryRoomStore>,
    pub message_log: Arc<InMemoryMessageLog>,
    pub notifier: Arc<InMemoryNotificationSink>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domain::MessageBody;

    fn message(room_id: RoomId, body: &str, sent_at: Timestamp) -> Message {
        Message::new(
            MessageId::generate(),
            room_id,
            UserId::generate(),
            None,
            MessageBody::new(body).unwrap(),
            sent_at,
        )
    }

    #[tokio::test]
    async fn history_preserves_append_order_per_room() {
        let log = InMemoryMessageLog::new();
        let room = RoomId::generate();
        let other = RoomId::generate();
        let now = Utc::now();

        // 追加顺序优先于发送时间
        log.append(message(room, "first", now)).await.unwrap();
        log.append(message(other, "elsewhere", now)).await.unwrap();
        log.append(message(room, "second", now - Duration::seconds(1)))
            .await
            .unwrap();

        let bodies: Vec<_> = log
            .history(room, None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body.into_inner())
            .collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn history_since_filters_older_messages() {
        let log = InMemoryMessageLog::new();
        let room = RoomId::generate();
        let start = Utc::now();

        log.append(message(room, "old", start)).await.unwrap();
        log.append(message(room, "new", start + Duration::seconds(10)))
            .await
            .unwrap();

        let recent = log.history(room, Some(start)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].body.as_str(), "new");
    }

    #[tokio::test]
    async fn duplicate_append_is_a_conflict() {
        let log = InMemoryMessageLog::new();
        let msg = message(RoomId::generate(), "hi", Utc::now());

        log.append(msg.clone()).await.unwrap();
        assert_eq!(log.append(msg).await, Err(RepositoryError::Conflict));
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn mark_seen_checks_room_and_transitions_once() {
        let log = InMemoryMessageLog::new();
        let room = RoomId::generate();
        let msg = log.append(message(room, "hi", Utc::now())).await.unwrap();

        assert!(!log.mark_seen(msg.id, RoomId::generate()).await.unwrap());
        assert!(log.mark_seen(msg.id, room).await.unwrap());
        assert!(!log.mark_seen(msg.id, room).await.unwrap());
        assert!(!log.mark_seen(MessageId::generate(), room).await.unwrap());

        let stored = log.find_by_id(msg.id).await.unwrap().unwrap();
        assert!(stored.seen);
    }

    #[tokio::test]
    async fn soft_deleted_room_keeps_members_but_does_not_exist() {
        let store = InMemoryRoomStore::new();
        let room = Room::new_direct(RoomId::generate(), Utc::now());
        let user = UserId::generate();
        store.insert_room(room.clone(), [user]).await;

        assert!(store.room_exists(room.id).await.unwrap());
        assert!(store.soft_delete(room.id, Utc::now()).await);
        assert!(!store.soft_delete(room.id, Utc::now()).await);

        assert!(!store.room_exists(room.id).await.unwrap());
        assert!(store.get_members(room.id).await.unwrap().contains(&user));
        assert!(store.find_room(room.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_room_has_no_members() {
        let store = InMemoryRoomStore::new();
        let room = RoomId::generate();
        assert!(!store.room_exists(room).await.unwrap());
        assert!(store.get_members(room).await.unwrap().is_empty());
    }
}
