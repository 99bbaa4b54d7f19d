use {
    super::handle::{Session, now_millis},
    crate::{
        Error, Result,
        config::SessionConfig,
        events::{Event, EventBus, EventKind},
    },
    base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD},
    dashmap::{DashMap, mapref::entry::Entry},
    rand::Rng,
    std::{
        fmt,
        sync::Arc,
        time::Duration,
    },
};

/// Number of random bytes in a session id (256 bits).
const SESSION_ID_BYTES: usize = 32;

fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// State shared between the store and the sessions it hands out.
pub(crate) struct StoreShared {
    sessions: DashMap<String, Session>,
    events: EventBus,
}

impl StoreShared {
    pub(super) fn invalidate(&self, session: &Session) -> Result<()> {
        if !session.mark_invalid() {
            return Err(Error::session_state(format!(
                "session {} already invalidated",
                session.id()
            )));
        }
        self.sessions
            .remove_if(session.id(), |_, stored| stored.same_as(session));

        tracing::debug!(session_id = %session.id(), "Session invalidated");
        self.emit_destroyed(session);
        Ok(())
    }

    /// Removes the session stored under `id` if it is expired at `now`.
    /// The check and the removal happen under the entry's shard lock, so a
    /// concurrent access either lands before (and keeps the session alive)
    /// or after (and finds nothing).
    fn evict_if_expired(&self, id: &str, now: u64) -> bool {
        let Some((_, session)) = self.sessions.remove_if(id, |_, s| s.is_expired_at(now)) else {
            return false;
        };
        if !session.mark_invalid() {
            // explicitly invalidated in the meantime; that path already reported it
            return false;
        }

        tracing::warn!(
            session_id = %session.id(),
            last_accessed = ?session.last_accessed_at(),
            idle_ms = now.saturating_sub(session.last_accessed_millis()),
            timeout = ?session.idle_timeout(),
            "Session expired, evicting"
        );
        self.emit_destroyed(&session);
        true
    }

    fn evict_expired(&self, now: u64) -> usize {
        // Collect first: the iterator holds shard read locks that would
        // deadlock with the removals below.
        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();

        candidates
            .iter()
            .filter(|id| self.evict_if_expired(id, now))
            .count()
    }

    fn emit_destroyed(&self, session: &Session) {
        self.events
            .emit(&Event::new(EventKind::SessionDestroyed).with_session(session.id()));
    }
}

/// Concurrent map from session id to [`Session`].
///
/// Lookups, creation and invalidation may run from many requests at once.
/// Expired sessions are removed by [`reap_expired`](SessionStore::reap_expired),
/// normally driven by [`spawn_reaper`](crate::spawn_reaper), and are also
/// treated as absent (and evicted) when a lookup finds them first.
#[derive(Clone)]
pub struct SessionStore {
    shared: Arc<StoreShared>,
    idle_timeout: Duration,
    adopt_unknown_ids: bool,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, events: EventBus) -> Self {
        Self {
            shared: Arc::new(StoreShared {
                sessions: DashMap::new(),
                events,
            }),
            idle_timeout,
            adopt_unknown_ids: false,
        }
    }

    pub fn from_config(config: &SessionConfig, events: EventBus) -> Self {
        Self::new(config.idle_timeout, events).with_adopt_unknown_ids(config.adopt_unknown_ids)
    }

    /// See [`SessionConfig::adopt_unknown_ids`].
    pub fn with_adopt_unknown_ids(mut self, adopt: bool) -> Self {
        self.adopt_unknown_ids = adopt;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn adopts_unknown_ids(&self) -> bool {
        self.adopt_unknown_ids
    }

    /// Creates a session under a fresh random id.
    pub fn create(&self) -> Session {
        let session = loop {
            match self.shared.sessions.entry(generate_session_id()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(vacant) => {
                    let session = self.new_session(vacant.key().clone());
                    vacant.insert(session.clone());
                    break session;
                }
            }
        };
        self.created(&session);
        session
    }

    /// Returns the live session stored under `id`, recording the access.
    pub fn lookup(&self, id: &str) -> Option<Session> {
        let now = now_millis();
        {
            let entry = self.shared.sessions.get(id)?;
            let session = entry.value();
            if session.is_valid() && !session.is_expired_at(now) {
                session.touch(now);
                return Some(session.clone());
            }
        }
        self.shared.evict_if_expired(id, now);
        None
    }

    /// Returns the session for `id` when it is live. Otherwise creates one:
    /// under a fresh id normally, or under `id` itself when the store adopts
    /// unknown ids.
    pub fn get_or_create(&self, id: Option<&str>) -> Session {
        if let Some(id) = id {
            if let Some(session) = self.lookup(id) {
                return session;
            }
            if self.adopt_unknown_ids {
                return self.adopt(id);
            }
        }
        self.create()
    }

    /// Invalidates `session` and removes it from the store that created it,
    /// which need not be this one. Same as [`Session::invalidate`].
    /// Fails if the session was already invalidated.
    pub fn invalidate(&self, session: &Session) -> Result<()> {
        session.invalidate()
    }

    /// Evicts every session idle for longer than its timeout and returns how
    /// many were evicted. Each eviction is atomic per entry; the store is
    /// never locked as a whole.
    pub fn reap_expired(&self) -> usize {
        self.shared.evict_expired(now_millis())
    }

    pub fn len(&self) -> usize {
        self.shared.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.sessions.is_empty()
    }

    fn adopt(&self, id: &str) -> Session {
        let session = match self.shared.sessions.entry(id.to_owned()) {
            Entry::Occupied(occupied) if occupied.get().is_valid() => {
                return occupied.get().clone();
            }
            // invalidated but not yet removed; the pending removal only
            // matches the old handle, so the replacement survives it
            Entry::Occupied(mut occupied) => {
                let session = self.new_session(id.to_owned());
                occupied.insert(session.clone());
                session
            }
            Entry::Vacant(vacant) => {
                let session = self.new_session(id.to_owned());
                vacant.insert(session.clone());
                session
            }
        };
        self.created(&session);
        session
    }

    fn new_session(&self, id: String) -> Session {
        Session::new(
            id,
            self.idle_timeout,
            self.shared.events.clone(),
            Arc::downgrade(&self.shared),
        )
    }

    fn created(&self, session: &Session) {
        tracing::debug!(session_id = %session.id(), "Session created");
        self.shared
            .events
            .emit(&Event::new(EventKind::SessionCreated).with_session(session.id()));
    }

    #[cfg(test)]
    pub(crate) fn reap_expired_at(&self, now: u64) -> usize {
        self.shared.evict_expired(now)
    }

    #[cfg(test)]
    pub(crate) fn weak_shared(&self) -> std::sync::Weak<StoreShared> {
        Arc::downgrade(&self.shared)
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("idle_timeout", &self.idle_timeout)
            .field("adopt_unknown_ids", &self.adopt_unknown_ids)
            .finish()
    }
}
