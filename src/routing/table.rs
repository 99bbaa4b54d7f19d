use {
    super::UrlPattern,
    crate::{
        Result,
        chain::{Filter, Handler},
    },
    std::{fmt, sync::Arc},
};

/// A pattern bound to a shared target.
pub struct Binding<T: ?Sized> {
    pattern: UrlPattern,
    target: Arc<T>,
}

impl<T: ?Sized> Binding<T> {
    pub fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }
}

impl<T: ?Sized> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            target: Arc::clone(&self.target),
        }
    }
}

/// An ordered list of pattern bindings.
///
/// Bindings are appended during startup and keep their registration order.
/// Once the engine is built the table is only reachable through shared
/// references, so lookups need no locking.
pub struct MappingTable<T: ?Sized> {
    bindings: Vec<Binding<T>>,
}

/// Maps patterns to handlers; the first registered match wins.
pub type RouteTable = MappingTable<dyn Handler>;

/// Maps patterns to filters; every match applies, in registration order.
pub type FilterTable = MappingTable<dyn Filter>;

impl<T: ?Sized> MappingTable<T> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Appends a binding. Registering the same pattern twice keeps both,
    /// and the earlier one shadows the later for first-match lookups.
    pub fn register(&mut self, pattern: &str, target: Arc<T>) -> Result<()> {
        let pattern = pattern.parse()?;
        self.bindings.push(Binding { pattern, target });
        Ok(())
    }

    /// The first binding, in registration order, whose pattern matches `path`.
    pub fn first_match(&self, path: &str) -> Option<&Binding<T>> {
        self.bindings.iter().find(|b| b.pattern.matches(path))
    }

    /// Every binding whose pattern matches `path`, in registration order.
    pub fn all_matches<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Binding<T>> + 'a {
        self.bindings.iter().filter(move |b| b.pattern.matches(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding<T>> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl RouteTable {
    /// Resolves the handler for `path`, or `None` when no route matches.
    pub fn resolve_route(&self, path: &str) -> Option<Arc<dyn Handler>> {
        self.first_match(path).map(|b| Arc::clone(&b.target))
    }
}

impl FilterTable {
    /// Resolves every filter that applies to `path`. May be empty.
    pub fn resolve_filters(&self, path: &str) -> Vec<Arc<dyn Filter>> {
        self.all_matches(path)
            .map(|b| Arc::clone(&b.target))
            .collect()
    }
}

impl<T: ?Sized> Default for MappingTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for MappingTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|b| b.pattern.to_string()))
            .finish()
    }
}
