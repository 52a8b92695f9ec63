//! 聊天会话协议
//!
//! 每个连接一个会话：`Connected` 状态下处理客户端事件，可同时加入多个房间；
//! `disconnect` 之后进入终态 `Disconnected`，不再接受任何事件。
//!
//! 每个被拒绝的客户端事件都会向本连接推送且仅推送一条 `errorMessage`。

use std::collections::HashSet;
use std::sync::Arc;

use domain::{DomainError, MessageId, RoomId, UserId};
use tracing::{debug, error, info};

use crate::error::{ApplicationError, ApplicationResult};
use crate::events::{ClientEvent, RejectReason, ServerEvent};
use crate::registry::{ConnectionHandle, ConnectionRegistry, EventSender};
use crate::services::{ChatService, SendMessageRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Disconnected,
}

pub struct ChatSession {
    service: Arc<ChatService>,
    user_id: UserId,
    connection: Option<ConnectionHandle>,
}

impl ChatSession {
    /// 认证通过后建立会话，并把连接登记到注册表
    pub fn open(
        service: Arc<ChatService>,
        registry: &ConnectionRegistry,
        user_id: UserId,
        outbound: EventSender,
    ) -> Self {
        let connection = registry.register(user_id, outbound);
        Self {
            service,
            user_id,
            connection: Some(connection),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn state(&self) -> SessionState {
        if self.connection.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    pub fn joined_rooms(&self) -> HashSet<RoomId> {
        self.connection
            .as_ref()
            .map(ConnectionHandle::joined_rooms)
            .unwrap_or_default()
    }

    /// 处理一个客户端事件。失败时已经向本连接推送了拒绝事件，
    /// 返回的错误只供调用方记录。
    pub async fn handle(&mut self, event: ClientEvent) -> ApplicationResult<()> {
        if self.connection.is_none() {
            return Err(DomainError::SessionClosed.into());
        }

        let name = event.name();
        debug!(user_id = %self.user_id, event = name, "handling client event");

        let result = match event {
            ClientEvent::JoinRoom { room_id, user_id } => self.join(room_id, user_id).await,
            ClientEvent::LeaveRoom { room_id } => self.leave(room_id),
            ClientEvent::SendMessage {
                room_id,
                sender_id,
                message,
                receiver_id,
            } => self.send(room_id, sender_id, message, receiver_id).await,
            ClientEvent::MessageSeen {
                message_id,
                room_id,
            } => self.mark_seen(message_id, room_id).await,
        };

        if let Err(err) = &result {
            match err {
                ApplicationError::Repository(_) => {
                    error!(user_id = %self.user_id, event = name, error = %err, "event failed")
                }
                _ => info!(user_id = %self.user_id, event = name, error = %err, "event rejected"),
            }
            self.push(ServerEvent::rejected(err.reject_reason(), err.client_message()));
        }
        result
    }

    /// 无法解析的帧
    pub fn reject_malformed(&self, detail: impl Into<String>) {
        self.push(ServerEvent::rejected(RejectReason::InvalidArgument, detail));
    }

    /// 断开连接：从注册表移除，不影响消息日志和房间存储。重复调用无效果。
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            let rooms = connection.disconnect();
            info!(user_id = %self.user_id, rooms = rooms.len(), "session disconnected");
        }
    }

    async fn join(&self, room_id: RoomId, claimed: Option<UserId>) -> ApplicationResult<()> {
        self.check_identity(claimed)?;
        self.service.authorize_join(room_id, self.user_id).await?;

        if let Some(connection) = &self.connection {
            connection.join(room_id);
        }
        info!(user_id = %self.user_id, room_id = %room_id, "joined room");
        self.push(ServerEvent::RoomJoined { room_id });
        Ok(())
    }

    fn leave(&self, room_id: RoomId) -> ApplicationResult<()> {
        if let Some(connection) = &self.connection {
            connection.leave(room_id);
        }
        self.push(ServerEvent::RoomLeft { room_id });
        Ok(())
    }

    async fn send(
        &self,
        room_id: RoomId,
        claimed: Option<UserId>,
        body: String,
        receiver_id: Option<UserId>,
    ) -> ApplicationResult<()> {
        self.check_identity(claimed)?;
        self.service
            .send_message(SendMessageRequest {
                room_id,
                sender_id: self.user_id,
                body,
                receiver_id,
            })
            .await?;
        Ok(())
    }

    async fn mark_seen(&self, message_id: MessageId, room_id: RoomId) -> ApplicationResult<()> {
        self.service
            .mark_seen(self.user_id, message_id, room_id)
            .await?;
        Ok(())
    }

    /// 客户端携带的身份必须与认证身份一致
    fn check_identity(&self, claimed: Option<UserId>) -> ApplicationResult<()> {
        match claimed {
            Some(claimed) if claimed != self.user_id => Err(ApplicationError::Authentication),
            _ => Ok(()),
        }
    }

    fn push(&self, event: ServerEvent) {
        if let Some(connection) = &self.connection {
            connection.send(event);
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
