use async_trait::async_trait;

use crate::entities::Notification;
use crate::errors::RepositoryResult;

/// 通知协作者
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> RepositoryResult<()>;
}
