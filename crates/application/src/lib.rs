//! 应用层实现。
//!
//! 聊天核心的用例：成员校验、连接注册、房间广播、消息发送与已读回执，
//! 以及每个连接运行的会话协议状态机。

pub mod broadcaster;
pub mod clock;
pub mod error;
pub mod events;
pub mod membership;
pub mod registry;
pub mod sequencer;
pub mod services;
pub mod session;

pub use broadcaster::{BroadcastError, LocalRoomBroadcaster, RoomBroadcaster};
pub use clock::{Clock, SystemClock};
pub use error::{ApplicationError, ApplicationResult};
pub use events::{ClientEvent, RejectReason, ServerEvent};
pub use membership::MembershipValidator;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, EventSender};
pub use sequencer::{LaneGuard, RoomLane, RoomSequencer};
pub use services::{ChatService, ChatServiceDependencies, SendMessageRequest};
pub use session::{ChatSession, SessionState};
