//!
//! Lifecycle events for requests, sessions and attributes.
//!
//! Observers are registered on the [`EngineBuilder`](crate::EngineBuilder)
//! before startup and are immutable afterwards. An observer that returns an
//! error or panics is logged and skipped; it never affects the request that
//! triggered the event nor the other observers.

use {
    crate::{Result, utils::panic_message},
    serde_json::Value,
    std::{
        fmt,
        panic::{self, AssertUnwindSafe},
        sync::Arc,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestStarted,
    RequestFinished,
    SessionCreated,
    SessionDestroyed,
    SessionAttributeAdded,
    SessionAttributeReplaced,
    SessionAttributeRemoved,
    RequestAttributeAdded,
    RequestAttributeReplaced,
    RequestAttributeRemoved,
}

/// Payload delivered to observers. Fields not relevant to the kind are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub request_id: Option<String>,
    pub path: Option<String>,
    pub session_id: Option<String>,
    pub attribute: Option<String>,
    /// The new value for added/replaced attributes, the old one for removals.
    pub value: Option<Value>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            request_id: None,
            path: None,
            session_id: None,
            attribute: None,
            value: None,
        }
    }

    pub fn with_request(mut self, request_id: &str, path: &str) -> Self {
        self.request_id = Some(request_id.to_owned());
        self.path = Some(path.to_owned());
        self
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_owned());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: Option<Value>) -> Self {
        self.attribute = Some(name.to_owned());
        self.value = value;
        self
    }
}

/// Callback invoked for each delivered event.
pub type Observer = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

struct Subscription {
    kind: Option<EventKind>,
    observer: Observer,
}

/// Fans events out to the observers registered at startup.
///
/// Cloning is cheap; every clone delivers to the same observers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<Vec<Subscription>>,
}

impl EventBus {
    /// A bus with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// Delivers `event` to every matching observer in registration order and
    /// returns how many of them handled it without failing.
    pub fn emit(&self, event: &Event) -> usize {
        let mut delivered = 0;
        for subscription in self.subscriptions.iter() {
            if subscription.kind.is_some_and(|kind| kind != event.kind) {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| (subscription.observer)(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    tracing::warn!(
                        kind = ?event.kind,
                        error = %err,
                        "Event observer failed"
                    );
                }
                Err(payload) => {
                    tracing::warn!(
                        kind = ?event.kind,
                        panic = %panic_message(payload.as_ref()),
                        "Event observer panicked"
                    );
                }
            }
        }
        delivered
    }

    /// True when at least one observer would receive events of `kind`.
    /// Lets emitters skip building payloads nobody reads.
    pub fn is_observed(&self, kind: EventKind) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.kind.is_none_or(|k| k == kind))
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observer_count", &self.subscriptions.len())
            .finish()
    }
}

#[derive(Default)]
pub struct EventBusBuilder {
    subscriptions: Vec<Subscription>,
}

impl EventBusBuilder {
    /// Registers an observer for one kind of event.
    pub fn subscribe<F>(mut self, kind: EventKind, observer: F) -> Self
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.subscriptions.push(Subscription {
            kind: Some(kind),
            observer: Arc::new(observer),
        });
        self
    }

    /// Registers an observer for every kind of event.
    pub fn subscribe_all<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.subscriptions.push(Subscription {
            kind: None,
            observer: Arc::new(observer),
        });
        self
    }

    pub fn build(self) -> EventBus {
        EventBus {
            subscriptions: Arc::new(self.subscriptions),
        }
    }
}
