use application::{ChatSession, ClientEvent, ServerEvent};
use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::UserId;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::state::AppState;

/// 单个 WebSocket 连接
///
/// 接收循环在连接自己的任务里按顺序处理客户端事件；发送任务负责所有写操作，
/// 包括会话推送的服务端事件和 pong 回应。
pub struct ChatConnection {
    socket: WebSocket,
    state: AppState,
    user_id: UserId,
}

/// WebSocket 写操作命令
#[derive(Debug)]
enum WsCommand {
    SendPong(Bytes),
}

impl ChatConnection {
    pub fn new(socket: WebSocket, state: AppState, user_id: UserId) -> Self {
        Self {
            socket,
            state,
            user_id,
        }
    }

    pub async fn run(self) {
        let Self {
            socket,
            state,
            user_id,
        } = self;
        let (mut sender, mut incoming) = socket.split();

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);
        let mut session =
            ChatSession::open(state.chat_service.clone(), &state.registry, user_id, event_tx);
        tracing::info!(user_id = %user_id, "WebSocket 连接已建立");

        // 发送任务：推送通道随会话断开而关闭，命令通道随接收循环结束而关闭
        let send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = event_rx.recv() => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(err) => {
                                tracing::warn!(error = %err, "failed to serialize websocket payload");
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                            tracing::debug!("Failed to send text message");
                            break;
                        }
                    }
                    Some(cmd) = cmd_rx.recv() => {
                        match cmd {
                            WsCommand::SendPong(data) => {
                                if sender.send(WsMessage::Pong(data)).await.is_err() {
                                    tracing::debug!("Failed to send pong message");
                                    break;
                                }
                            }
                        }
                    }
                    else => break,
                }
            }
            let _ = sender.close().await;
        });

        while let Some(frame) = incoming.next().await {
            let message = match frame {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(user_id = %user_id, error = %err, "WebSocket 读取失败");
                    break;
                }
            };

            match message {
                WsMessage::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => {
                        // 拒绝已推送给客户端，这里只需继续处理下一帧
                        let _ = session.handle(event).await;
                    }
                    Err(err) => {
                        tracing::debug!(user_id = %user_id, error = %err, "malformed client frame");
                        session.reject_malformed(format!("malformed event: {}", err));
                    }
                },
                WsMessage::Binary(_) => {
                    session.reject_malformed("binary frames are not supported");
                }
                WsMessage::Ping(data) => {
                    if cmd_tx.send(WsCommand::SendPong(data)).await.is_err() {
                        break;
                    }
                }
                WsMessage::Pong(_) => {}
                WsMessage::Close(_) => {
                    tracing::debug!(user_id = %user_id, "WebSocket收到关闭消息");
                    break;
                }
            }

            if send_task.is_finished() {
                break;
            }
        }

        session.disconnect();
        drop(cmd_tx);
        if let Err(err) = send_task.await {
            tracing::warn!(error = %err, "WebSocket发送任务异常结束");
        }
        tracing::info!(user_id = %user_id, "WebSocket 连接已断开");
    }
}
