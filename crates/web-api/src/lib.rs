//! Web API 层。
//!
//! 提供 Axum 路由：WebSocket 聊天协议入口和房间历史查询，
//! 请求在进入应用层之前完成 JWT 认证。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::{Claims, JwtService};
pub use config::JwtConfig;
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
