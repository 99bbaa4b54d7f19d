use {
    super::store::StoreShared,
    crate::{
        Error, Result,
        events::{Event, EventBus, EventKind},
    },
    dashmap::DashMap,
    serde::{Serialize, de::DeserializeOwned},
    serde_json::Value,
    std::{
        fmt,
        sync::{
            Arc, Weak,
            atomic::{AtomicBool, AtomicU64, Ordering},
        },
        time::{Duration, SystemTime, UNIX_EPOCH},
    },
};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn millis_to_time(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// A handle to one client session.
///
/// Handles are cheap to clone and every clone refers to the same session.
/// Attributes are stored as JSON values, so anything `Serialize` can be
/// stored and read back as any `DeserializeOwned` type:
///
/// ```
/// # use dispatch_engine::{EventBus, SessionStore};
/// # use std::time::Duration;
/// let store = SessionStore::new(Duration::from_secs(600), EventBus::new());
/// let session = store.create();
/// session.insert("username", "hdh").unwrap();
/// assert_eq!(session.get::<String>("username").unwrap().as_deref(), Some("hdh"));
/// ```
///
/// Once a session has been invalidated, explicitly or by the reaper, every
/// attribute operation fails with [`SessionState`](crate::ErrorKind::SessionState).
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    created_at: u64,
    last_accessed_at: AtomicU64,
    idle_timeout: AtomicU64,
    accessed: AtomicBool,
    valid: AtomicBool,
    attributes: DashMap<String, Value>,
    events: EventBus,
    store: Weak<StoreShared>,
}

impl Session {
    pub(super) fn new(
        id: String,
        idle_timeout: Duration,
        events: EventBus,
        store: Weak<StoreShared>,
    ) -> Self {
        let now = now_millis();
        Self {
            inner: Arc::new(SessionInner {
                id,
                created_at: now,
                last_accessed_at: AtomicU64::new(now),
                idle_timeout: AtomicU64::new(duration_millis(idle_timeout)),
                accessed: AtomicBool::new(false),
                valid: AtomicBool::new(true),
                attributes: DashMap::new(),
                events,
                store,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn created_at(&self) -> SystemTime {
        millis_to_time(self.inner.created_at)
    }

    pub fn last_accessed_at(&self) -> SystemTime {
        millis_to_time(self.last_accessed_millis())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.idle_timeout.load(Ordering::Relaxed))
    }

    /// Overrides the store-wide idle timeout for this session only.
    pub fn set_idle_timeout(&self, timeout: Duration) -> Result<()> {
        self.ensure_valid()?;
        self.inner
            .idle_timeout
            .store(duration_millis(timeout), Ordering::Relaxed);
        Ok(())
    }

    /// True until the client comes back with this session's id.
    pub fn is_new(&self) -> bool {
        !self.inner.accessed.load(Ordering::Acquire)
    }

    pub fn is_valid(&self) -> bool {
        self.inner.valid.load(Ordering::Acquire)
    }

    /// Reads an attribute and deserializes it into `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.attribute(name)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Reads an attribute as a raw JSON value.
    pub fn attribute(&self, name: &str) -> Result<Option<Value>> {
        self.ensure_valid()?;
        Ok(self.inner.attributes.get(name).map(|v| v.value().clone()))
    }

    /// Stores an attribute and returns the value it replaced, if any.
    pub fn insert<T: Serialize>(&self, name: &str, value: T) -> Result<Option<Value>> {
        self.ensure_valid()?;
        let value = serde_json::to_value(value)?;
        let previous = self
            .inner
            .attributes
            .insert(name.to_owned(), value.clone());

        let kind = match previous {
            Some(_) => EventKind::SessionAttributeReplaced,
            None => EventKind::SessionAttributeAdded,
        };
        self.emit_attribute(kind, name, Some(value));
        Ok(previous)
    }

    /// Removes an attribute and returns its value, if it was set.
    pub fn remove(&self, name: &str) -> Result<Option<Value>> {
        self.ensure_valid()?;
        let removed = self.inner.attributes.remove(name).map(|(_, v)| v);
        if removed.is_some() {
            self.emit_attribute(EventKind::SessionAttributeRemoved, name, removed.clone());
        }
        Ok(removed)
    }

    pub fn attribute_names(&self) -> Result<Vec<String>> {
        self.ensure_valid()?;
        Ok(self
            .inner
            .attributes
            .iter()
            .map(|entry| entry.key().clone())
            .collect())
    }

    /// Invalidates the session and removes it from its store.
    /// Invalidating an already invalidated session is an error.
    pub fn invalidate(&self) -> Result<()> {
        match self.inner.store.upgrade() {
            Some(store) => store.invalidate(self),
            None => {
                if self.mark_invalid() {
                    Ok(())
                } else {
                    Err(Error::session_state(format!(
                        "session {} already invalidated",
                        self.id()
                    )))
                }
            }
        }
    }

    // ========================================================================
    // Store internals
    // ========================================================================

    /// Records an access. The timestamp never moves backwards, even when
    /// concurrent requests race on the same session.
    pub(crate) fn touch(&self, now: u64) {
        self.inner.last_accessed_at.fetch_max(now, Ordering::AcqRel);
        self.inner.accessed.store(true, Ordering::Release);
    }

    pub(crate) fn last_accessed_millis(&self) -> u64 {
        self.inner.last_accessed_at.load(Ordering::Acquire)
    }

    pub(crate) fn is_expired_at(&self, now: u64) -> bool {
        let last = self.last_accessed_millis();
        let timeout = self.inner.idle_timeout.load(Ordering::Relaxed);
        now.saturating_sub(last) > timeout
    }

    /// Flips the session to invalid. Only the first caller gets `true`.
    pub(crate) fn mark_invalid(&self) -> bool {
        self.inner
            .valid
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::session_state(format!(
                "session {} has been invalidated",
                self.id()
            )))
        }
    }

    fn emit_attribute(&self, kind: EventKind, name: &str, value: Option<Value>) {
        if self.inner.events.is_observed(kind) {
            let event = Event::new(kind)
                .with_session(self.id())
                .with_attribute(name, value);
            self.inner.events.emit(&event);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("valid", &self.is_valid())
            .field("is_new", &self.is_new())
            .field("attributes", &self.inner.attributes.len())
            .finish()
    }
}
