//! 领域实体定义
//!
//! 房间与成员关系由外部房间管理协作者拥有，聊天核心只读；
//! 消息由聊天核心负责创建和已读状态迁移。

pub mod message;
pub mod notification;
pub mod room;

pub use message::Message;
pub use notification::{Notification, NotificationKind};
pub use room::{Room, RoomKind};
