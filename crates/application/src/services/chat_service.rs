use std::sync::Arc;

use domain::{
    DomainError, Message, MessageBody, MessageId, MessageLog, Notification, NotificationSink,
    RoomId, RoomStore, Timestamp, UserId,
};
use tracing::{debug, error, info, warn};

use crate::{
    broadcaster::RoomBroadcaster,
    clock::Clock,
    error::ApplicationResult,
    events::ServerEvent,
    membership::MembershipValidator,
    sequencer::RoomSequencer,
};

/// 通知中的消息预览长度（字符）
const NOTIFICATION_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub body: String,
    pub receiver_id: Option<UserId>,
}

pub struct ChatServiceDependencies {
    pub room_store: Arc<dyn RoomStore>,
    pub message_log: Arc<dyn MessageLog>,
    pub notifier: Arc<dyn NotificationSink>,
    pub broadcaster: Arc<dyn RoomBroadcaster>,
    pub sequencer: Arc<RoomSequencer>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
    membership: MembershipValidator,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        let membership = MembershipValidator::new(deps.room_store.clone());
        Self { deps, membership }
    }

    /// 加入房间前的授权检查
    pub async fn authorize_join(&self, room_id: RoomId, user_id: UserId) -> ApplicationResult<()> {
        self.membership.ensure_member(room_id, user_id).await
    }

    /// 发送消息：先校验，再持久化，最后广播。
    ///
    /// 任一校验失败都不会写入消息日志。
    pub async fn send_message(&self, request: SendMessageRequest) -> ApplicationResult<Message> {
        let SendMessageRequest {
            room_id,
            sender_id,
            body,
            receiver_id,
        } = request;

        self.membership.ensure_member(room_id, sender_id).await?;
        let body = MessageBody::new(body)?;

        let room = self
            .deps
            .room_store
            .find_room(room_id)
            .await?
            .filter(|room| room.is_active())
            .ok_or(DomainError::NotARoomMember)?;

        let receiver_id = if room.is_direct() {
            let receiver_id = receiver_id.ok_or(DomainError::MissingReceiver)?;
            if !self.membership.is_member(room_id, receiver_id).await? {
                return Err(DomainError::ReceiverNotInRoom.into());
            }
            Some(receiver_id)
        } else {
            // 群聊忽略接收者
            None
        };

        let stored = {
            // 发送时间在通道内分配，保证与追加顺序一致
            let mut lane = self.deps.sequencer.lock(room_id).await;
            let message = Message::new(
                MessageId::generate(),
                room_id,
                sender_id,
                receiver_id,
                body,
                lane.stamp(self.deps.clock.now()),
            );
            let stored = self.deps.message_log.append(message).await?;
            self.deliver(
                room_id,
                ServerEvent::ReceiveMessage {
                    message: stored.clone(),
                },
            )
            .await;
            stored
        };

        info!(
            room_id = %room_id,
            message_id = %stored.id,
            sender_id = %sender_id,
            "message sent"
        );

        self.notify_recipients(&stored).await;
        Ok(stored)
    }

    /// 标记已读。只有完成 false → true 迁移的调用才会广播 `messageSeen`；
    /// 消息不存在、不属于该房间或已读都是静默成功。
    pub async fn mark_seen(
        &self,
        user_id: UserId,
        message_id: MessageId,
        room_id: RoomId,
    ) -> ApplicationResult<bool> {
        self.membership.ensure_member(room_id, user_id).await?;

        let _lane = self.deps.sequencer.lock(room_id).await;
        let flipped = self.deps.message_log.mark_seen(message_id, room_id).await?;
        if flipped {
            debug!(room_id = %room_id, message_id = %message_id, "message marked as seen");
            self.deliver(
                room_id,
                ServerEvent::MessageSeen {
                    message_id,
                    room_id,
                },
            )
            .await;
        }
        Ok(flipped)
    }

    /// 房间历史，按追加顺序升序返回
    pub async fn history(
        &self,
        user_id: UserId,
        room_id: RoomId,
        since: Option<Timestamp>,
    ) -> ApplicationResult<Vec<Message>> {
        if !self.membership.can_read_history(room_id, user_id).await? {
            return Err(DomainError::NotARoomMember.into());
        }
        Ok(self.deps.message_log.history(room_id, since).await?)
    }

    async fn deliver(&self, room_id: RoomId, event: ServerEvent) {
        match self.deps.broadcaster.deliver(room_id, event).await {
            Ok(delivered) => debug!(room_id = %room_id, delivered, "event delivered"),
            // 消息已落盘，离线成员通过历史补拉
            Err(err) => warn!(room_id = %room_id, error = %err, "live delivery failed"),
        }
    }

    async fn notify_recipients(&self, message: &Message) {
        let recipients = match message.receiver_id {
            Some(receiver_id) if receiver_id != message.sender_id => vec![receiver_id],
            Some(_) => Vec::new(),
            None => match self.deps.room_store.get_members(message.room_id).await {
                Ok(members) => {
                    let mut members: Vec<_> = members
                        .into_iter()
                        .filter(|member| *member != message.sender_id)
                        .collect();
                    members.sort();
                    members
                }
                Err(err) => {
                    error!(
                        room_id = %message.room_id,
                        error = %err,
                        "failed to load notification recipients"
                    );
                    return;
                }
            },
        };

        let text = format!(
            "New message: {}",
            message.preview(NOTIFICATION_PREVIEW_CHARS)
        );
        for recipient in recipients {
            let notification =
                Notification::chat_message(recipient, text.clone(), self.deps.clock.now());
            if let Err(err) = self.deps.notifier.notify(notification).await {
                error!(
                    recipient_id = %recipient,
                    message_id = %message.id,
                    error = %err,
                    "failed to record notification"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::BroadcastError;
    use crate::clock::SystemClock;
    use crate::error::ApplicationError;
    use async_trait::async_trait;
    use chrono::Utc;
    use domain::{
        MockMessageLog, MockNotificationSink, MockRoomStore, RepositoryError, Room,
    };
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBroadcaster {
        events: Mutex<Vec<(RoomId, ServerEvent)>>,
    }

    impl RecordingBroadcaster {
        fn events(&self) -> Vec<(RoomId, ServerEvent)> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RoomBroadcaster for RecordingBroadcaster {
        async fn deliver(
            &self,
            room_id: RoomId,
            event: ServerEvent,
        ) -> Result<usize, BroadcastError> {
            self.events.lock().unwrap().push((room_id, event));
            Ok(1)
        }
    }

    struct FailingBroadcaster;

    #[async_trait]
    impl RoomBroadcaster for FailingBroadcaster {
        async fn deliver(&self, _: RoomId, _: ServerEvent) -> Result<usize, BroadcastError> {
            Err(BroadcastError::failed("bus unavailable"))
        }
    }

    fn room_store(room: Room, members: Vec<UserId>) -> MockRoomStore {
        let mut store = MockRoomStore::new();
        let active = room.is_active();
        store.expect_room_exists().returning(move |_| Ok(active));
        store
            .expect_get_members()
            .returning(move |_| Ok(members.iter().copied().collect::<HashSet<_>>()));
        store
            .expect_find_room()
            .returning(move |_| Ok(Some(room.clone())));
        store
    }

    fn service(
        store: MockRoomStore,
        log: MockMessageLog,
        notifier: MockNotificationSink,
        broadcaster: Arc<dyn RoomBroadcaster>,
    ) -> ChatService {
        ChatService::new(ChatServiceDependencies {
            room_store: Arc::new(store),
            message_log: Arc::new(log),
            notifier: Arc::new(notifier),
            broadcaster,
            sequencer: Arc::new(RoomSequencer::new()),
            clock: Arc::new(SystemClock),
        })
    }

    fn request(room_id: RoomId, sender_id: UserId, receiver_id: Option<UserId>) -> SendMessageRequest {
        SendMessageRequest {
            room_id,
            sender_id,
            body: "hi".into(),
            receiver_id,
        }
    }

    #[tokio::test]
    async fn non_member_send_never_touches_the_log() {
        let room = Room::new_direct(RoomId::generate(), Utc::now());
        let member = UserId::generate();
        let outsider = UserId::generate();

        let mut log = MockMessageLog::new();
        log.expect_append().never();
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let service = service(
            room_store(room.clone(), vec![member]),
            log,
            MockNotificationSink::new(),
            broadcaster.clone(),
        );

        let err = service
            .send_message(request(room.id, outsider, Some(member)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::NotARoomMember)
        ));
        assert!(broadcaster.events().is_empty());
    }

    #[tokio::test]
    async fn direct_room_rejects_missing_or_foreign_receiver() {
        let room = Room::new_direct(RoomId::generate(), Utc::now());
        let sender = UserId::generate();

        let mut log = MockMessageLog::new();
        log.expect_append().never();
        let service = service(
            room_store(room.clone(), vec![sender, UserId::generate()]),
            log,
            MockNotificationSink::new(),
            Arc::new(RecordingBroadcaster::default()),
        );

        let missing = service
            .send_message(request(room.id, sender, None))
            .await
            .unwrap_err();
        assert!(matches!(
            missing,
            ApplicationError::Domain(DomainError::MissingReceiver)
        ));

        let foreign = service
            .send_message(request(room.id, sender, Some(UserId::generate())))
            .await
            .unwrap_err();
        assert!(matches!(
            foreign,
            ApplicationError::Domain(DomainError::ReceiverNotInRoom)
        ));
    }

    #[tokio::test]
    async fn failed_append_is_not_broadcast() {
        let room = Room::new_group(RoomId::generate(), "team", Utc::now()).unwrap();
        let sender = UserId::generate();

        let mut log = MockMessageLog::new();
        log.expect_append()
            .times(1)
            .returning(|_| Err(RepositoryError::storage("disk full")));
        let mut notifier = MockNotificationSink::new();
        notifier.expect_notify().never();
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let service = service(
            room_store(room.clone(), vec![sender]),
            log,
            notifier,
            broadcaster.clone(),
        );

        let err = service
            .send_message(request(room.id, sender, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::Repository(_)));
        assert!(broadcaster.events().is_empty());
    }

    #[tokio::test]
    async fn group_send_drops_receiver_and_notifies_other_members() {
        let room = Room::new_group(RoomId::generate(), "team", Utc::now()).unwrap();
        let sender = UserId::generate();
        let others = [UserId::generate(), UserId::generate()];

        let mut log = MockMessageLog::new();
        log.expect_append().times(1).returning(Ok);
        let mut notifier = MockNotificationSink::new();
        notifier
            .expect_notify()
            .withf(move |n| n.recipient_id != sender && n.text.starts_with("New message: "))
            .times(2)
            .returning(|_| Ok(()));
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let service = service(
            room_store(room.clone(), vec![sender, others[0], others[1]]),
            log,
            notifier,
            broadcaster.clone(),
        );

        let message = service
            .send_message(request(room.id, sender, Some(others[0])))
            .await
            .unwrap();

        assert_eq!(message.receiver_id, None);
        assert!(!message.seen);
        let events = broadcaster.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, room.id);
        assert!(matches!(&events[0].1, ServerEvent::ReceiveMessage { message: m } if m.id == message.id));
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_send() {
        let room = Room::new_direct(RoomId::generate(), Utc::now());
        let (sender, receiver) = (UserId::generate(), UserId::generate());

        let mut log = MockMessageLog::new();
        log.expect_append().times(1).returning(Ok);
        let mut notifier = MockNotificationSink::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(RepositoryError::storage("notifications offline")));
        let service = service(
            room_store(room.clone(), vec![sender, receiver]),
            log,
            notifier,
            Arc::new(RecordingBroadcaster::default()),
        );

        let message = service
            .send_message(request(room.id, sender, Some(receiver)))
            .await
            .unwrap();
        assert_eq!(message.receiver_id, Some(receiver));
    }

    #[tokio::test]
    async fn broadcast_failure_keeps_the_appended_message() {
        let room = Room::new_group(RoomId::generate(), "team", Utc::now()).unwrap();
        let sender = UserId::generate();

        let mut log = MockMessageLog::new();
        log.expect_append().times(1).returning(Ok);
        let service = service(
            room_store(room.clone(), vec![sender]),
            log,
            MockNotificationSink::new(),
            Arc::new(FailingBroadcaster),
        );

        assert!(service
            .send_message(request(room.id, sender, None))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn deleted_room_rejects_send() {
        let mut room = Room::new_group(RoomId::generate(), "old", Utc::now()).unwrap();
        room.soft_delete(Utc::now());
        let sender = UserId::generate();

        let mut log = MockMessageLog::new();
        log.expect_append().never();
        let service = service(
            room_store(room.clone(), vec![sender]),
            log,
            MockNotificationSink::new(),
            Arc::new(RecordingBroadcaster::default()),
        );

        let err = service
            .send_message(request(room.id, sender, None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::NotARoomMember)
        ));
    }

    #[tokio::test]
    async fn mark_seen_broadcasts_only_on_first_transition() {
        let room = Room::new_direct(RoomId::generate(), Utc::now());
        let reader = UserId::generate();
        let message_id = MessageId::generate();

        let mut log = MockMessageLog::new();
        let mut flips = vec![false, true];
        log.expect_mark_seen()
            .times(2)
            .returning(move |_, _| Ok(flips.pop().unwrap_or(false)));
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let service = service(
            room_store(room.clone(), vec![reader]),
            log,
            MockNotificationSink::new(),
            broadcaster.clone(),
        );

        assert!(service.mark_seen(reader, message_id, room.id).await.unwrap());
        assert!(!service.mark_seen(reader, message_id, room.id).await.unwrap());

        let events = broadcaster.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].1,
            ServerEvent::MessageSeen {
                message_id,
                room_id: room.id
            }
        );
    }

    #[tokio::test]
    async fn history_requires_membership() {
        let room = Room::new_group(RoomId::generate(), "team", Utc::now()).unwrap();
        let member = UserId::generate();

        let mut log = MockMessageLog::new();
        log.expect_history().times(1).returning(|_, _| Ok(Vec::new()));
        let service = service(
            room_store(room.clone(), vec![member]),
            log,
            MockNotificationSink::new(),
            Arc::new(RecordingBroadcaster::default()),
        );

        assert!(service.history(member, room.id, None).await.is_ok());
        assert!(service
            .history(UserId::generate(), room.id, None)
            .await
            .is_err());
    }
}
