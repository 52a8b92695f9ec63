//! 实时聊天核心领域模型
//!
//! 包含房间、成员关系、消息等实体，以及聊天核心依赖的外部协作者接口
//! （房间存储、消息日志、通知）。

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use value_objects::*;
