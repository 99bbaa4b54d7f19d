use {
    super::Engine,
    crate::{
        Config, Error, FilterTable, Result, RouteTable,
        chain::{Filter, Handler},
        events::{Event, EventBus, EventBusBuilder, EventKind},
    },
    std::{collections::HashMap, sync::Arc},
};

type HandlerFactory = Box<dyn Fn(&Config) -> Result<Arc<dyn Handler>> + Send + Sync>;
type FilterFactory = Box<dyn Fn(&Config) -> Result<Arc<dyn Filter>> + Send + Sync>;

/// Collects everything the engine needs before it starts serving.
///
/// Handlers and filters can be registered two ways:
///
/// - by name, through a factory, and bound to patterns by the `[[routes]]`
///   and `[[filters]]` sections of the configuration;
/// - directly, with [`route`](EngineBuilder::route) and
///   [`filter`](EngineBuilder::filter).
///
/// Configured bindings come first (in file order), then direct ones (in call
/// order). Since the first matching route wins, a configured route shadows a
/// direct route with an overlapping pattern.
pub struct EngineBuilder {
    config: Config,
    handler_factories: HashMap<String, HandlerFactory>,
    filter_factories: HashMap<String, FilterFactory>,
    routes: Vec<(String, Arc<dyn Handler>)>,
    filters: Vec<(String, Arc<dyn Filter>)>,
    events: EventBusBuilder,
}

impl EngineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handler_factories: HashMap::new(),
            filter_factories: HashMap::new(),
            routes: Vec::new(),
            filters: Vec::new(),
            events: EventBus::builder(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a named handler factory. The factory runs at most once, on
    /// [`build`](EngineBuilder::build), and only if a configured route names it.
    pub fn handler_factory<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Config) -> Result<Arc<dyn Handler>> + Send + Sync + 'static,
    {
        self.handler_factories
            .insert(name.to_owned(), Box::new(factory));
        self
    }

    /// Registers a named filter factory.
    pub fn filter_factory<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Config) -> Result<Arc<dyn Filter>> + Send + Sync + 'static,
    {
        self.filter_factories
            .insert(name.to_owned(), Box::new(factory));
        self
    }

    /// Binds `handler` to `pattern`. The pattern is checked on build.
    pub fn route<H: Handler + 'static>(self, pattern: &str, handler: H) -> Self {
        self.route_shared(pattern, Arc::new(handler))
    }

    /// Binds an already shared handler, e.g. one serving several patterns.
    pub fn route_shared(mut self, pattern: &str, handler: Arc<dyn Handler>) -> Self {
        self.routes.push((pattern.to_owned(), handler));
        self
    }

    /// Binds `filter` to `pattern`.
    pub fn filter<F: Filter + 'static>(self, pattern: &str, filter: F) -> Self {
        self.filter_shared(pattern, Arc::new(filter))
    }

    pub fn filter_shared(mut self, pattern: &str, filter: Arc<dyn Filter>) -> Self {
        self.filters.push((pattern.to_owned(), filter));
        self
    }

    /// Subscribes to one kind of lifecycle event.
    pub fn subscribe<F>(mut self, kind: EventKind, observer: F) -> Self
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.events = self.events.subscribe(kind, observer);
        self
    }

    /// Subscribes to every lifecycle event.
    pub fn subscribe_all<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.events = self.events.subscribe_all(observer);
        self
    }

    /// Validates the configuration, resolves named bindings and freezes the
    /// tables.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;

        let mut handlers: HashMap<&str, Arc<dyn Handler>> = HashMap::new();
        let mut routes = RouteTable::new();
        for route in &self.config.routes {
            let handler = match handlers.get(route.handler.as_str()) {
                Some(handler) => Arc::clone(handler),
                None => {
                    let factory = self.handler_factories.get(&route.handler).ok_or_else(|| {
                        Error::config(format!(
                            "route '{}' names unknown handler '{}'",
                            route.pattern, route.handler
                        ))
                    })?;
                    let handler = factory(&self.config)?;
                    handlers.insert(&route.handler, Arc::clone(&handler));
                    handler
                }
            };
            routes.register(&route.pattern, handler)?;
        }
        for (pattern, handler) in self.routes {
            routes
                .register(&pattern, handler)
                .map_err(|e| Error::config(format!("Invalid route pattern {pattern:?}: {e}")))?;
        }

        let mut filter_instances: HashMap<&str, Arc<dyn Filter>> = HashMap::new();
        let mut filters = FilterTable::new();
        for binding in &self.config.filters {
            let filter = match filter_instances.get(binding.filter.as_str()) {
                Some(filter) => Arc::clone(filter),
                None => {
                    let factory = self.filter_factories.get(&binding.filter).ok_or_else(|| {
                        Error::config(format!(
                            "filter binding '{}' names unknown filter '{}'",
                            binding.pattern, binding.filter
                        ))
                    })?;
                    let filter = factory(&self.config)?;
                    filter_instances.insert(&binding.filter, Arc::clone(&filter));
                    filter
                }
            };
            filters.register(&binding.pattern, filter)?;
        }
        for (pattern, filter) in self.filters {
            filters
                .register(&pattern, filter)
                .map_err(|e| Error::config(format!("Invalid filter pattern {pattern:?}: {e}")))?;
        }

        tracing::debug!(
            routes = routes.len(),
            filters = filters.len(),
            "Engine tables frozen"
        );
        Ok(Engine::from_parts(
            self.config,
            routes,
            filters,
            self.events.build(),
        ))
    }
}
