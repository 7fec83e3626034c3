use crate::error::Result;
use crate::models::UserRecord;

/// Persistence collaborator for state that must survive restarts
///
/// The SDK holds no durable storage of its own. The only field it needs back
/// after a restart is the user's platform endpoint ARN, which travels inside
/// the record.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Record saved by the last `save_user`, if any
    async fn load_user(&self) -> Result<Option<UserRecord>>;

    async fn save_user(&self, user: &UserRecord) -> Result<()>;
}
