#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::AccountEntity;
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for player accounts.
///
/// Each read-modify-write sequence against a single account is last-write-wins:
/// the game has at most one live session per account in practice, so no
/// optimistic locking is layered on top.
pub trait AccountStore: Send + Sync {
    /// Look up an account by its unique handle.
    fn find(&self, handle: &str) -> BoxFuture<'static, StorageResult<Option<AccountEntity>>>;
    /// Create or fully replace an account record.
    fn upsert(&self, account: AccountEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap connectivity probe used by the supervisor and health route.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a broken connection in place.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
