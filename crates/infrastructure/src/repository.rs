use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Message, MessageBody, MessageId, MessageLog, Notification, NotificationSink, RepositoryError,
    RepositoryResult, Room, RoomId, RoomKind, RoomStore, Timestamp, UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

/// Postgres 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    let is_conflict = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if is_conflict {
        RepositoryError::Conflict
    } else {
        RepositoryError::storage(err.to_string())
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: Uuid,
    name: Option<String>,
    is_group: bool,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<RoomRecord> for Room {
    fn from(value: RoomRecord) -> Self {
        Room {
            id: RoomId::from(value.id),
            name: value.name,
            kind: if value.is_group {
                RoomKind::Group
            } else {
                RoomKind::Direct
            },
            created_at: value.created_at,
            deleted_at: value.deleted_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    room_id: Uuid,
    sender_id: Uuid,
    receiver_id: Option<Uuid>,
    message: String,
    send_time: DateTime<Utc>,
    is_seen: bool,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let body = MessageBody::new(value.message).map_err(|err| invalid_data(err.to_string()))?;
        let mut message = Message::new(
            MessageId::from(value.id),
            RoomId::from(value.room_id),
            UserId::from(value.sender_id),
            value.receiver_id.map(UserId::from),
            body,
            value.send_time,
        );
        message.seen = value.is_seen;
        Ok(message)
    }
}

const MESSAGE_COLUMNS: &str =
    "id, room_id, sender_id, receiver_id, message, send_time, is_seen";

#[derive(Clone)]
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 房间管理模块使用：在同一事务内创建房间和初始成员
    pub async fn create_room(
        &self,
        room: Room,
        members: impl IntoIterator<Item = UserId>,
    ) -> RepositoryResult<Room> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO chat_rooms (id, name, is_group, created_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, is_group, created_at, deleted_at
            "#,
        )
        .bind(Uuid::from(room.id))
        .bind(room.name.as_deref())
        .bind(room.kind == RoomKind::Group)
        .bind(room.created_at)
        .bind(room.deleted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        for user_id in members {
            sqlx::query(
                "INSERT INTO user_chats (room_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(Uuid::from(room.id))
            .bind(Uuid::from(user_id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(Room::from(record))
    }

    /// 软删除房间，返回是否有房间被删除
    pub async fn soft_delete(&self, room_id: RoomId, at: Timestamp) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE chat_rooms SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(Uuid::from(room_id))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn room_exists(&self, room_id: RoomId) -> RepositoryResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM chat_rooms WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(Uuid::from(room_id))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn get_members(&self, room_id: RoomId) -> RepositoryResult<HashSet<UserId>> {
        let rows = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM user_chats WHERE room_id = $1")
            .bind(Uuid::from(room_id))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(UserId::from).collect())
    }

    async fn find_room(&self, room_id: RoomId) -> RepositoryResult<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(
            "SELECT id, name, is_group, created_at, deleted_at FROM chat_rooms WHERE id = $1",
        )
        .bind(Uuid::from(room_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(record.map(Room::from))
    }
}

#[derive(Clone)]
pub struct PgMessageLog {
    pool: PgPool,
}

impl PgMessageLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLog for PgMessageLog {
    async fn append(&self, message: Message) -> RepositoryResult<Message> {
        let query = format!(
            r#"
            INSERT INTO chats (id, room_id, sender_id, receiver_id, message, send_time, is_seen)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {MESSAGE_COLUMNS}
            "#
        );
        let record = sqlx::query_as::<_, MessageRecord>(&query)
            .bind(Uuid::from(message.id))
            .bind(Uuid::from(message.room_id))
            .bind(Uuid::from(message.sender_id))
            .bind(message.receiver_id.map(Uuid::from))
            .bind(message.body.as_str())
            .bind(message.sent_at)
            .bind(message.seen)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        debug!(message_id = %message.id, room_id = %message.room_id, "message appended");
        Message::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>> {
        let query = format!("SELECT {MESSAGE_COLUMNS} FROM chats WHERE id = $1");
        let record = sqlx::query_as::<_, MessageRecord>(&query)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        record.map(Message::try_from).transpose()
    }

    async fn mark_seen(&self, id: MessageId, room_id: RoomId) -> RepositoryResult<bool> {
        // 条件更新保证并发回执只有一个能完成迁移
        let result = sqlx::query(
            "UPDATE chats SET is_seen = TRUE WHERE id = $1 AND room_id = $2 AND is_seen = FALSE",
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(room_id))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn history(
        &self,
        room_id: RoomId,
        since: Option<Timestamp>,
    ) -> RepositoryResult<Vec<Message>> {
        let query = format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM chats
            WHERE room_id = $1 AND ($2::timestamptz IS NULL OR send_time > $2)
            ORDER BY seq ASC
            "#
        );
        let records = sqlx::query_as::<_, MessageRecord>(&query)
            .bind(Uuid::from(room_id))
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        records.into_iter().map(Message::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(&self, notification: Notification) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, message, type, is_read, created_at)
            VALUES ($1, $2, $3, $4, FALSE, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(Uuid::from(notification.recipient_id))
        .bind(&notification.text)
        .bind(notification.kind.as_str())
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}

pub struct PgStorage {
    pub pool: PgPool,
    pub room_store: Arc<PgRoomStore>,
    pub message_log: Arc<PgMessageLog>,
    pub notifier: Arc<PgNotificationSink>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            room_store: Arc::new(PgRoomStore::new(pool.clone())),
            message_log: Arc::new(PgMessageLog::new(pool.clone())),
            notifier: Arc::new(PgNotificationSink::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
