//!
//! The immutable engine value: route and filter tables, the session store and
//! the event bus, assembled once by [`EngineBuilder`] and shared by every
//! request worker.
//!
//! ```
//! use dispatch_engine::{Config, Engine, Request, Response, handler_fn};
//!
//! let engine = Engine::builder(Config::default())
//!     .route("/ping", handler_fn(|_req, res| res.write_str("pong")))
//!     .build()
//!     .unwrap();
//!
//! let mut request = Request::get("/ping");
//! let mut response = Response::new();
//! engine.dispatch(&mut request, &mut response);
//! assert_eq!(response.body(), b"pong");
//! ```

mod builder;
mod dispatch;

pub use builder::EngineBuilder;

use {
    crate::{
        Config, EventBus, FilterTable, RouteTable, SessionStore,
        chain::{Filter, Handler},
        exchange::SessionBinding,
        session::spawn_reaper,
    },
    std::{fmt, sync::Arc},
    tokio_util::{sync::CancellationToken, task::AbortOnDropHandle},
};

/// Cheaply cloneable handle to the engine. All clones share the same tables,
/// store and observers.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: Config,
    routes: RouteTable,
    filters: FilterTable,
    sessions: SessionStore,
    events: EventBus,
    binding: SessionBinding,
}

impl Engine {
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: Config,
        routes: RouteTable,
        filters: FilterTable,
        events: EventBus,
    ) -> Self {
        let sessions = SessionStore::from_config(&config.session, events.clone());
        let binding = SessionBinding {
            store: sessions.clone(),
            cookie_name: config.session.cookie_name.clone(),
            http_only: config.session.http_only,
        };
        Self {
            inner: Arc::new(EngineInner {
                config,
                routes,
                filters,
                sessions,
                events,
                binding,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    pub fn filters(&self) -> &FilterTable {
        &self.inner.filters
    }

    /// Resolves the handler for `path` (first registered match).
    pub fn resolve_route(&self, path: &str) -> Option<Arc<dyn Handler>> {
        self.inner.routes.resolve_route(path)
    }

    /// Resolves every filter for `path`, in registration order.
    pub fn resolve_filters(&self, path: &str) -> Vec<Arc<dyn Filter>> {
        self.inner.filters.resolve_filters(path)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Starts the session reaper with the configured interval. Must be called
    /// from within a Tokio runtime.
    pub fn spawn_reaper(&self, shutdown: CancellationToken) -> AbortOnDropHandle<()> {
        spawn_reaper(
            self.inner.sessions.clone(),
            self.inner.config.session.reaper_interval,
            shutdown,
        )
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("routes", &self.inner.routes)
            .field("filters", &self.inner.filters)
            .field("sessions", &self.inner.sessions)
            .field("events", &self.inner.events)
            .finish()
    }
}
