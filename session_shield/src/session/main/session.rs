use async_trait::async_trait;

use crate::session::config::{SHIELD_SESSION_COOKIE_NAME, SHIELD_SESSION_TTL};
use crate::session::errors::SessionError;
use crate::session::types::SessionRecord;
use crate::shield::{
    AuthProvider, SessionStore, ShieldBlock, ShieldConfig, ShieldCookie, ShieldError,
};
use crate::storage::{CacheData, GENERIC_CACHE_STORE};
use crate::utils::gen_random_string;

const SESSION_PREFIX: &str = "session";
const NEW_SESSION_ATTEMPTS: usize = 3;

/// Host session over the generic cache store.
///
/// Keeps a request-local copy of the record. Writes stay local until
/// [`SessionStore::reopen`] or [`CachedSession::commit`] flushes them, and a
/// flush only replaces the fields this request changed.
#[derive(Debug)]
pub struct CachedSession {
    id: String,
    local: SessionRecord,
    shield_dirty: bool,
    member_dirty: bool,
    is_new: bool,
    destroyed: bool,
}

impl CachedSession {
    /// Load the session named by the request's session cookie, or start a new
    /// one. Unknown ids are never adopted.
    pub async fn load_or_create(session_id: Option<&str>) -> Result<Self, SessionError> {
        if let Some(id) = session_id {
            if let Some(record) = load_record(id).await? {
                return Ok(Self {
                    id: id.to_string(),
                    local: record,
                    shield_dirty: false,
                    member_dirty: false,
                    is_new: false,
                    destroyed: false,
                });
            }
            tracing::debug!("Unknown or expired session id presented, starting a new session");
        }

        let record = SessionRecord::default();
        for _ in 0..NEW_SESSION_ATTEMPTS {
            let id = gen_random_string(32)?;
            let stored = GENERIC_CACHE_STORE
                .lock()
                .await
                .put_if_not_exists(
                    SESSION_PREFIX,
                    &id,
                    CacheData::try_from(&record)?,
                    *SHIELD_SESSION_TTL,
                )
                .await?;
            if stored {
                tracing::debug!("New host session created");
                return Ok(Self {
                    id,
                    local: record,
                    shield_dirty: false,
                    member_dirty: false,
                    is_new: true,
                    destroyed: false,
                });
            }
        }

        Err(SessionError::Storage(
            "Failed to allocate a unique session id".to_string(),
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the session was created by this request
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn member_id(&self) -> i64 {
        self.local.member_id
    }

    pub fn set_member_id(&mut self, member_id: i64) {
        self.local.member_id = member_id;
        self.member_dirty = true;
    }

    /// Merge pending local changes into the stored record.
    ///
    /// Only the fields this request changed are written, so a concurrent
    /// login or rotation on the same session survives. The local copy then
    /// holds the merged record. A record that vanished is not recreated.
    pub async fn commit(&mut self) -> Result<(), SessionError> {
        if self.destroyed || !(self.shield_dirty || self.member_dirty) {
            return Ok(());
        }

        let mut store = GENERIC_CACHE_STORE.lock().await;
        let Some(data) = store.get(SESSION_PREFIX, &self.id).await? else {
            drop(store);
            tracing::warn!("Host session vanished before commit");
            self.mark_destroyed();
            return Ok(());
        };

        let mut record = SessionRecord::try_from(data)?;
        if self.shield_dirty {
            record.shield = self.local.shield.clone();
        }
        if self.member_dirty {
            record.member_id = self.local.member_id;
        }
        store
            .put_with_ttl(
                SESSION_PREFIX,
                &self.id,
                CacheData::try_from(&record)?,
                *SHIELD_SESSION_TTL,
            )
            .await?;
        drop(store);

        self.local = record;
        self.shield_dirty = false;
        self.member_dirty = false;
        Ok(())
    }

    fn mark_destroyed(&mut self) {
        self.local = SessionRecord::default();
        self.shield_dirty = false;
        self.member_dirty = false;
        self.destroyed = true;
    }

    /// Session id cookie this response must carry: the new id, an expiry for
    /// a destroyed session, or nothing.
    pub fn session_cookie(&self, config: &ShieldConfig) -> Option<ShieldCookie> {
        let name = SHIELD_SESSION_COOKIE_NAME.as_str();
        if self.destroyed {
            return Some(ShieldCookie {
                http_only: false,
                max_age: Some(0),
                ..ShieldCookie::new(name, "", config)
            });
        }
        if self.is_new {
            let max_age = i64::try_from(config.session_lifetime)
                .ok()
                .filter(|secs| *secs > 0);
            return Some(ShieldCookie {
                max_age,
                ..ShieldCookie::new(name, self.id.as_str(), config)
            });
        }
        None
    }
}

#[async_trait]
impl SessionStore for CachedSession {
    async fn exists(&self) -> bool {
        !self.destroyed
    }

    async fn get_block(&self) -> Result<Option<ShieldBlock>, ShieldError> {
        Ok(self.local.shield.clone())
    }

    async fn set_block(&mut self, block: ShieldBlock) -> Result<(), ShieldError> {
        self.local.shield = Some(block);
        self.shield_dirty = true;
        Ok(())
    }

    async fn reopen(&mut self) -> Result<(), ShieldError> {
        if self.destroyed {
            return Ok(());
        }
        self.commit().await?;
        if self.destroyed {
            return Ok(());
        }

        match load_record(&self.id).await? {
            Some(record) => self.local = record,
            None => {
                tracing::warn!("Host session vanished while reopening");
                self.mark_destroyed();
            }
        }
        Ok(())
    }

    async fn destroy_all(&mut self) -> Result<(), ShieldError> {
        GENERIC_CACHE_STORE
            .lock()
            .await
            .remove(SESSION_PREFIX, &self.id)
            .await
            .map_err(SessionError::from)?;
        self.mark_destroyed();
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for CachedSession {
    async fn current_identity(&self) -> i64 {
        self.local.member_id
    }

    async fn logout(&mut self) -> Result<(), ShieldError> {
        self.set_member_id(0);
        Ok(())
    }
}

/// Change the logged-in member of a stored session, e.g. from a login handler
pub async fn set_session_identity(session_id: &str, member_id: i64) -> Result<(), SessionError> {
    let mut store = GENERIC_CACHE_STORE.lock().await;
    let Some(data) = store.get(SESSION_PREFIX, session_id).await? else {
        return Err(SessionError::Storage("Session not found".to_string()));
    };

    let mut record = SessionRecord::try_from(data)?;
    record.member_id = member_id;
    store
        .put_with_ttl(
            SESSION_PREFIX,
            session_id,
            CacheData::try_from(&record)?,
            *SHIELD_SESSION_TTL,
        )
        .await?;
    tracing::debug!(member_id, "Session identity changed");
    Ok(())
}

async fn load_record(session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
    let data = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(SESSION_PREFIX, session_id)
        .await?;

    data.map(SessionRecord::try_from).transpose()
}
