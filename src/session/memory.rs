use std::collections::HashMap;

use parking_lot::RwLock;
use time::{Duration, OffsetDateTime};

use super::data::SessionData;
use super::store::{SessionStore, StoreError};
use crate::types::SessionId;

struct Record {
    data: SessionData,
    expires_at: OffsetDateTime,
}

/// In-process session store.
///
/// Sessions are lost on restart and not shared between instances. Expired
/// entries are dropped when read and swept on every write.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, Record>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        self.sessions
            .read()
            .values()
            .filter(|r| r.expires_at > now)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Data of every live session.
    pub(crate) fn sessions(&self) -> Vec<SessionData> {
        let now = OffsetDateTime::now_utc();
        self.sessions
            .read()
            .values()
            .filter(|r| r.expires_at > now)
            .map(|r| r.data.clone())
            .collect()
    }
}

impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, StoreError> {
        let now = OffsetDateTime::now_utc();
        {
            let sessions = self.sessions.read();
            match sessions.get(id) {
                None => return Ok(None),
                Some(record) if record.expires_at > now => return Ok(Some(record.data.clone())),
                Some(_) => {}
            }
        }
        self.sessions.write().remove(id);
        Ok(None)
    }

    async fn save(
        &self,
        id: &SessionId,
        data: &SessionData,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write();
        sessions.retain(|_, record| record.expires_at > now);
        sessions.insert(
            id.clone(),
            Record {
                data: data.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.sessions.write().remove(id);
        Ok(())
    }
}
