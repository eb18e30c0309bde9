use std::future::Future;

use time::Duration;

use super::data::SessionData;
use crate::types::SessionId;

/// Error type returned by session store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Server-side session persistence.
///
/// Sessions are identified by opaque [`SessionId`]s generated by the session
/// layer; the store only keeps the data. Implement this for Redis, a database
/// table, etc. [`MemoryStore`](super::MemoryStore) is the in-process default.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for RedisSessions {
///     async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, StoreError> {
///         let raw: Option<String> = self.conn().get(id.as_str()).await?;
///         Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
///     }
///
///     async fn save(&self, id: &SessionId, data: &SessionData, ttl: Duration) -> Result<(), StoreError> {
///         let raw = serde_json::to_string(data)?;
///         self.conn().set_ex(id.as_str(), raw, ttl.whole_seconds() as u64).await?;
///         Ok(())
///     }
///
///     async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
///         self.conn().del(id.as_str()).await?;
///         Ok(())
///     }
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Look up a session. Expired or unknown ids return `None`.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionData>, StoreError>> + Send;

    /// Insert or replace a session, valid for `ttl` from now.
    fn save(
        &self,
        id: &SessionId,
        data: &SessionData,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a session (logout, id rotation). Unknown ids are not an error.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send;
}
