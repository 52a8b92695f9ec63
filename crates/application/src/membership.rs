//! 成员资格校验
//!
//! 每次加入、发送、已读回执之前都要重新校验，不依赖连接已加入的房间集合。

use std::sync::Arc;

use domain::{DomainError, RepositoryResult, RoomId, RoomStore, UserId};

use crate::error::ApplicationResult;

#[derive(Clone)]
pub struct MembershipValidator {
    room_store: Arc<dyn RoomStore>,
}

impl MembershipValidator {
    pub fn new(room_store: Arc<dyn RoomStore>) -> Self {
        Self { room_store }
    }

    /// 用户当前是否是房间成员。
    ///
    /// 房间不存在（或已软删除）与用户不在房间内对调用方不可区分，都返回 false。
    pub async fn is_member(&self, room_id: RoomId, user_id: UserId) -> RepositoryResult<bool> {
        if !self.room_store.room_exists(room_id).await? {
            return Ok(false);
        }
        let members = self.room_store.get_members(room_id).await?;
        Ok(members.contains(&user_id))
    }

    /// 历史读取授权：软删除房间的成员仍然可以读取历史
    pub async fn can_read_history(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> RepositoryResult<bool> {
        let members = self.room_store.get_members(room_id).await?;
        Ok(members.contains(&user_id))
    }

    pub async fn ensure_member(&self, room_id: RoomId, user_id: UserId) -> ApplicationResult<()> {
        if self.is_member(room_id, user_id).await? {
            Ok(())
        } else {
            Err(DomainError::NotARoomMember.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{MockRoomStore, RepositoryError};
    use std::collections::HashSet;

    fn store_with(exists: bool, members: Vec<UserId>) -> MockRoomStore {
        let mut store = MockRoomStore::new();
        store.expect_room_exists().returning(move |_| Ok(exists));
        store
            .expect_get_members()
            .returning(move |_| Ok(members.iter().copied().collect::<HashSet<_>>()));
        store
    }

    #[tokio::test]
    async fn member_of_active_room_is_accepted() {
        let user = UserId::generate();
        let validator = MembershipValidator::new(Arc::new(store_with(true, vec![user])));

        assert!(validator.is_member(RoomId::generate(), user).await.unwrap());
        assert!(!validator
            .is_member(RoomId::generate(), UserId::generate())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unknown_room_is_indistinguishable_from_non_member() {
        let user = UserId::generate();
        let mut store = MockRoomStore::new();
        store.expect_room_exists().returning(|_| Ok(false));
        store.expect_get_members().never();
        let validator = MembershipValidator::new(Arc::new(store));

        assert!(!validator.is_member(RoomId::generate(), user).await.unwrap());
        let err = validator
            .ensure_member(RoomId::generate(), user)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ApplicationError::Domain(DomainError::NotARoomMember)
        ));
    }

    #[tokio::test]
    async fn deleted_room_members_can_still_read_history() {
        let user = UserId::generate();
        let validator = MembershipValidator::new(Arc::new(store_with(false, vec![user])));
        let room = RoomId::generate();

        assert!(!validator.is_member(room, user).await.unwrap());
        assert!(validator.can_read_history(room, user).await.unwrap());
    }

    #[tokio::test]
    async fn storage_failure_is_propagated() {
        let mut store = MockRoomStore::new();
        store
            .expect_room_exists()
            .returning(|_| Err(RepositoryError::storage("connection reset")));
        let validator = MembershipValidator::new(Arc::new(store));

        let result = validator
            .is_member(RoomId::generate(), UserId::generate())
            .await;
        assert!(matches!(result, Err(RepositoryError::Storage { .. })));
    }
}
