//! Process-wide session state and its persisted subset.
//!
//! DESIGN
//! ======
//! One [`SessionState`] per client. Fields are private and only change through
//! the mutation methods below; each mutation of the persisted subset
//! (`access_token`, `member`, `is_authenticated`) is written through to the
//! [`SessionStore`]. `is_loading` is runtime-only and never persisted.
//!
//! INVARIANTS
//! ==========
//! `is_authenticated == true` implies `access_token.is_some()`.
//!
//! Every `login` and `clear_auth` starts a new epoch. Work that began under an
//! older epoch (an in-flight token reissue) must not write into the new one.
//!
//! TRADE-OFFS
//! ==========
//! Store write failures are logged, not returned: the in-memory session stays
//! authoritative for the running process.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

// =============================================================================
// MODEL
// =============================================================================

/// Profile of the signed-in member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub login_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Snapshot of the session as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub member: Option<Member>,
    pub is_authenticated: bool,
    /// True until the startup auth-check settles.
    pub is_loading: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self { access_token: None, member: None, is_authenticated: false, is_loading: true }
    }
}

/// The subset of [`Session`] that survives restarts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            member: session.member.clone(),
            is_authenticated: session.is_authenticated,
        }
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Durable home of the persisted session blob.
pub trait SessionStore: Send + Sync {
    /// Read the stored blob, `Ok(None)` when nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionStore`] if the blob exists but cannot be read.
    fn load(&self) -> Result<Option<PersistedSession>, ClientError>;

    /// Replace the stored blob.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionStore`] if the blob cannot be written.
    fn save(&self, session: &PersistedSession) -> Result<(), ClientError>;

    /// Remove the stored blob.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionStore`] if the blob cannot be removed.
    fn clear(&self) -> Result<(), ClientError>;
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<PersistedSession>, ClientError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClientError::SessionStore(format!("{}: {e}", self.path.display()))),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ClientError::SessionStore(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, session: &PersistedSession) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ClientError::SessionStore(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json).map_err(|e| ClientError::SessionStore(format!("{}: {e}", self.path.display())))
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::SessionStore(format!("{}: {e}", self.path.display()))),
        }
    }
}

/// Process-local store, for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    blob: Mutex<Option<PersistedSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a blob, as if written by a previous run.
    #[must_use]
    pub fn with_session(session: PersistedSession) -> Self {
        Self { blob: Mutex::new(Some(session)) }
    }

    /// What is currently stored.
    #[must_use]
    pub fn stored(&self) -> Option<PersistedSession> {
        self.blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<PersistedSession>, ClientError> {
        Ok(self.stored())
    }

    fn save(&self, session: &PersistedSession) -> Result<(), ClientError> {
        *self
            .blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self
            .blob
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Owned session container with a minimal mutation API.
pub struct SessionState {
    inner: Mutex<Session>,
    /// Only changed while `inner` is locked.
    epoch: AtomicU64,
    store: Arc<dyn SessionStore>,
}

impl SessionState {
    /// Create the session from whatever the store holds.
    ///
    /// An unreadable blob is logged and treated as absent.
    #[must_use]
    pub fn hydrate(store: Arc<dyn SessionStore>) -> Self {
        let persisted = match store.load() {
            Ok(persisted) => persisted.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "stored session unreadable, starting signed out");
                PersistedSession::default()
            }
        };
        let is_authenticated = persisted.is_authenticated && persisted.access_token.is_some();
        let session = Session {
            access_token: persisted.access_token,
            member: persisted.member,
            is_authenticated,
            is_loading: true,
        };
        tracing::debug!(
            has_token = session.access_token.is_some(),
            is_authenticated,
            "session hydrated"
        );
        Self { inner: Mutex::new(session), epoch: AtomicU64::new(0), store }
    }

    /// Empty session backed by a fresh [`MemorySessionStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::hydrate(Arc::new(MemorySessionStore::new()))
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(&PersistedSession::from(session)) {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    #[must_use]
    pub fn member(&self) -> Option<Member> {
        self.lock().member.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    /// Current session epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        let _session = self.lock();
        self.epoch.load(Ordering::SeqCst)
    }

    /// Record a successful sign-in.
    pub fn login(&self, token: String, member: Member) {
        let mut session = self.lock();
        session.access_token = Some(token);
        session.member = Some(member);
        session.is_authenticated = true;
        session.is_loading = false;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.persist(&session);
    }

    pub fn set_access_token(&self, token: String) {
        let mut session = self.lock();
        session.access_token = Some(token);
        self.persist(&session);
    }

    /// Store a rotated token only if the session is still in `epoch`.
    ///
    /// Returns `false` and leaves the session unchanged when a `login` or
    /// `clear_auth` happened since `epoch` was read.
    pub fn replace_access_token(&self, epoch: u64, token: String) -> bool {
        let mut session = self.lock();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        session.access_token = Some(token);
        self.persist(&session);
        true
    }

    pub fn set_member(&self, member: Option<Member>) {
        let mut session = self.lock();
        session.member = member;
        self.persist(&session);
    }

    /// Flip the authenticated flag.
    ///
    /// Returns `false` and leaves the session unchanged when asked to mark a
    /// session without an access token as authenticated.
    pub fn set_authenticated(&self, authenticated: bool) -> bool {
        let mut session = self.lock();
        if authenticated && session.access_token.is_none() {
            tracing::warn!("refusing to mark a session without access token as authenticated");
            return false;
        }
        session.is_authenticated = authenticated;
        self.persist(&session);
        true
    }

    pub fn set_loading(&self, loading: bool) {
        self.lock().is_loading = loading;
    }

    /// Drop every credential and the stored blob.
    pub fn clear_auth(&self) {
        let mut session = self.lock();
        session.access_token = None;
        session.member = None;
        session.is_authenticated = false;
        session.is_loading = false;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear stored session");
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
