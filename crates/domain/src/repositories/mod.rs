//! 外部协作者接口定义
//!
//! 聊天核心只通过这些窄接口访问持久化层，内层定义接口，外层实现接口。

pub mod message_log;
pub mod notification_sink;
pub mod room_store;

pub use message_log::MessageLog;
pub use notification_sink::NotificationSink;
pub use room_store::RoomStore;

#[cfg(any(test, feature = "testing"))]
pub use message_log::MockMessageLog;
#[cfg(any(test, feature = "testing"))]
pub use notification_sink::MockNotificationSink;
#[cfg(any(test, feature = "testing"))]
pub use room_store::MockRoomStore;
