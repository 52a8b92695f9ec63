//! 基础设施层实现。
//!
//! 提供房间存储、消息日志、通知的 Postgres 与内存适配器，实现领域层定义的接口。

pub mod memory;
pub mod migrations;
pub mod repository;

pub use memory::{InMemoryMessageLog, InMemoryNotificationSink, InMemoryRoomStore, MemoryStorage};
pub use migrations::MIGRATOR;
pub use repository::{
    create_pg_pool, PgMessageLog, PgNotificationSink, PgRoomStore, PgStorage,
};
