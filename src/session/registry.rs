use super::meta::SessionMeta;
use super::transcript::{SessionStatus, Utterance};
use super::welcome::WelcomeDedup;
use super::ConnectionId;
use crate::pipeline::TurnTracker;
use crate::speech::VadState;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One live interview conversation
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub meta: SessionMeta,
    pub transcript: Vec<Utterance>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            meta: SessionMeta::default(),
            transcript: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Connection bookkeeping for one session
#[derive(Debug)]
pub struct SessionConnectionState {
    pub connections: HashSet<ConnectionId>,

    /// Becomes true at most once per session lifetime
    pub welcome_sent: bool,

    pub last_activity: Instant,

    /// Deferred purge, armed when the last connection leaves
    cleanup: Option<JoinHandle<()>>,
}

impl SessionConnectionState {
    fn new() -> Self {
        Self {
            connections: HashSet::new(),
            welcome_sent: false,
            last_activity: Instant::now(),
            cleanup: None,
        }
    }

    /// Refresh the activity clock and disarm any pending purge
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.cancel_cleanup();
    }

    pub fn cleanup_armed(&self) -> bool {
        self.cleanup.is_some()
    }

    fn cancel_cleanup(&mut self) {
        if let Some(timer) = self.cleanup.take() {
            timer.abort();
        }
    }
}

/// Everything the registry keeps for a session.
///
/// The gateway and the voice pipeline only mutate an entry while holding its lock,
/// and never hold it while awaiting a port.
#[derive(Debug)]
pub struct SessionEntry {
    pub session: Session,
    pub connection: SessionConnectionState,
    pub vad: VadState,
    pub turn: TurnTracker,
}

impl SessionEntry {
    fn new(id: &str) -> Self {
        Self {
            session: Session::new(id),
            connection: SessionConnectionState::new(),
            vad: VadState::Idle,
            turn: TurnTracker::default(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.session.id.clone(),
            state: self.turn.state,
            vad: self.vad,
            welcome_sent: self.connection.welcome_sent,
            connections: self.connection.connections.len(),
            transcript_len: self.session.transcript.len(),
        }
    }
}

pub type SessionHandle = Arc<Mutex<SessionEntry>>;

/// Result of binding a connection to a session
pub struct BindOutcome {
    pub handle: SessionHandle,

    /// The session had no bound connections before this one
    pub first_binding: bool,
}

/// Owns per-session connection, welcome and VAD state.
///
/// Lock order is always map first, then entry. Code holding an entry lock
/// must not touch the map.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
    welcome: WelcomeDedup,
    retention: Duration,
}

impl SessionRegistry {
    pub fn new(retention: Duration, welcome_cooldown: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            welcome: WelcomeDedup::new(welcome_cooldown),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Return the session's entry, creating it with `welcome_sent = false` if absent
    pub async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.get(session_id).await {
            return handle;
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            info!("Creating session state: {}", session_id);
            Arc::new(Mutex::new(SessionEntry::new(session_id)))
        }))
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Add a connection to a session, creating it if needed and cancelling any pending purge
    pub async fn bind(
        &self,
        session_id: &str,
        connection_id: ConnectionId,
        meta: SessionMeta,
    ) -> BindOutcome {
        let handle = self.get_or_create(session_id).await;

        let first_binding = {
            let mut entry = handle.lock().await;
            let first_binding = entry.connection.connections.is_empty();
            entry.connection.connections.insert(connection_id);
            entry.connection.touch();
            entry.session.meta.merge(meta);
            first_binding
        };

        debug!(
            "Bound connection {} to session {} (first_binding={})",
            connection_id, session_id, first_binding
        );

        BindOutcome {
            handle,
            first_binding,
        }
    }

    /// Remove a connection. Returns true when the session has no connections left,
    /// in which case a deferred purge has been armed.
    pub async fn unbind(&self, session_id: &str, connection_id: ConnectionId) -> bool {
        let Some(handle) = self.get(session_id).await else {
            return false;
        };

        let mut entry = handle.lock().await;
        entry.connection.connections.remove(&connection_id);
        entry.connection.last_activity = Instant::now();

        let now_empty = entry.connection.connections.is_empty();
        if now_empty {
            // Armed under the entry lock; a later bind cancels it
            entry.connection.cancel_cleanup();
            self.arm_cleanup(&mut entry.connection, session_id, self.retention, self.retention);
        }

        now_empty
    }

    /// Update `last_activity` and cancel a pending purge
    pub async fn touch(&self, session_id: &str) {
        if let Some(handle) = self.get(session_id).await {
            handle.lock().await.connection.touch();
        }
    }

    pub async fn mark_welcome_sent(&self, session_id: &str) {
        if let Some(handle) = self.get(session_id).await {
            let mut entry = handle.lock().await;
            entry.connection.welcome_sent = true;
            entry.connection.touch();
        }
    }

    /// Decide whether `text` may be sent as the session's opening utterance.
    ///
    /// On success the session is marked welcomed and the hash recorded, in the same
    /// critical section, so concurrent joins cannot both win.
    pub async fn claim_welcome(&self, entry: &mut SessionEntry, text: &str) -> bool {
        let session_id = entry.session.id.clone();

        if entry.connection.welcome_sent {
            info!(
                "Welcome already sent for session {}, skipping duplicate",
                session_id
            );
            return false;
        }

        let hash = WelcomeDedup::hash_text(text);
        if self.welcome.is_recent(&session_id, &hash).await {
            warn!(
                "Duplicate welcome inside cooldown window suppressed for session {}",
                session_id
            );
            entry.connection.welcome_sent = true;
            return false;
        }

        entry.connection.welcome_sent = true;
        entry.connection.touch();
        self.welcome.record(&session_id, hash).await;
        true
    }

    /// Arm a one-shot purge for a session without connections.
    ///
    /// At most one timer per session; an armed timer is left alone, and a session
    /// that still has connections is skipped.
    pub async fn schedule_cleanup(&self, session_id: &str, retention: Duration) {
        let Some(handle) = self.get(session_id).await else {
            return;
        };

        let mut entry = handle.lock().await;
        if !entry.connection.connections.is_empty() {
            debug!(
                "Session {} still has {} connection(s), not scheduling cleanup",
                session_id,
                entry.connection.connections.len()
            );
            return;
        }
        if entry.connection.cleanup_armed() {
            return;
        }

        self.arm_cleanup(&mut entry.connection, session_id, retention, retention);
    }

    fn arm_cleanup(
        &self,
        connection: &mut SessionConnectionState,
        session_id: &str,
        delay: Duration,
        retention: Duration,
    ) {
        debug!("Scheduling cleanup for session {} in {:?}", session_id, delay);

        let registry = self.clone();
        let id = session_id.to_string();
        connection.cleanup = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.purge_if_idle(&id, retention).await;
        }));
    }

    /// Purge a session that still has no connections and has been idle for `retention`.
    ///
    /// An empty session that saw activity too recently gets a new timer for the
    /// rest of its window.
    pub async fn purge_if_idle(&self, session_id: &str, retention: Duration) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(handle) = sessions.get(session_id).cloned() else {
            return false;
        };

        let mut entry = handle.lock().await;
        // Drop our own timer handle without aborting: this may be running inside it.
        entry.connection.cleanup = None;

        if !entry.connection.connections.is_empty() {
            return false;
        }

        let idle_for = entry.connection.last_activity.elapsed();
        if idle_for < retention {
            self.arm_cleanup(
                &mut entry.connection,
                session_id,
                retention - idle_for,
                retention,
            );
            return false;
        }

        drop(entry);
        sessions.remove(session_id);
        info!("Purged idle session {}", session_id);
        true
    }

    pub async fn status(&self, session_id: &str) -> SessionStatus {
        match self.get(session_id).await {
            Some(handle) => handle.lock().await.status(),
            None => SessionStatus::unknown(session_id),
        }
    }

    pub async fn transcript(&self, session_id: &str) -> Option<Vec<Utterance>> {
        let handle = self.get(session_id).await?;
        let entry = handle.lock().await;
        Some(entry.session.transcript.clone())
    }

    /// Connections currently bound to a session
    pub async fn connections(&self, session_id: &str) -> Vec<ConnectionId> {
        match self.get(session_id).await {
            Some(handle) => handle
                .lock()
                .await
                .connection
                .connections
                .iter()
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }
}
