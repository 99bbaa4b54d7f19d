//!
//! Handlers, filters, and the single-use chain that runs filters in order
//! before handing the request to the handler.
//!
//! A filter decides whether processing continues by calling
//! [`FilterChain::do_filter`]. Code placed after that call runs once the rest
//! of the chain has returned, which is how post-processing is written:
//!
//! ```
//! use dispatch_engine::{Filter, FilterChain, Request, Response, Result};
//!
//! struct Timing;
//!
//! impl Filter for Timing {
//!     fn do_filter(
//!         &self,
//!         request: &mut Request,
//!         response: &mut Response,
//!         chain: &mut FilterChain<'_>,
//!     ) -> Result<()> {
//!         let started = std::time::Instant::now();
//!         chain.do_filter(request, response)?;
//!         tracing::info!(elapsed = ?started.elapsed(), "request done");
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Returning without calling `do_filter` ends processing: the remaining
//! filters and the handler never run, and whatever the filter wrote to the
//! response is what the client receives.

use {
    crate::{Error, Request, Response, Result},
    std::sync::Arc,
};

/// Terminal processor for a request.
pub trait Handler: Send + Sync {
    fn service(&self, request: &mut Request, response: &mut Response) -> Result<()>;
}

/// Interceptor that runs before (and optionally after) the handler.
pub trait Filter: Send + Sync {
    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        chain: &mut FilterChain<'_>,
    ) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync,
{
    fn service(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        self(request, response)
    }
}

impl<F> Filter for F
where
    F: Fn(&mut Request, &mut Response, &mut FilterChain<'_>) -> Result<()> + Send + Sync,
{
    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        chain: &mut FilterChain<'_>,
    ) -> Result<()> {
        self(request, response, chain)
    }
}

/// Wraps a closure as a [`Handler`], letting the compiler infer its argument types.
pub fn handler_fn<F>(f: F) -> F
where
    F: Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync,
{
    f
}

/// Wraps a closure as a [`Filter`], letting the compiler infer its argument types.
pub fn filter_fn<F>(f: F) -> F
where
    F: Fn(&mut Request, &mut Response, &mut FilterChain<'_>) -> Result<()> + Send + Sync,
{
    f
}

/// The remaining work for one request: filters not yet run, then the handler.
///
/// A chain is created per request and can be driven through once. As soon
/// as any filter or the handler returns, the chain is spent: advancing it
/// again is a [`ChainState`](crate::ErrorKind::ChainState) error, so a filter
/// that declined to continue cannot be skipped by calling the chain twice.
pub struct FilterChain<'a> {
    filters: &'a [Arc<dyn Filter>],
    handler: &'a dyn Handler,
    position: usize,
    completed: bool,
    spent: bool,
}

impl<'a> FilterChain<'a> {
    pub fn new(filters: &'a [Arc<dyn Filter>], handler: &'a dyn Handler) -> Self {
        Self {
            filters,
            handler,
            position: 0,
            completed: false,
            spent: false,
        }
    }

    /// Runs the next filter, or the handler once every filter has been entered.
    pub fn do_filter(&mut self, request: &mut Request, response: &mut Response) -> Result<()> {
        if self.spent {
            return Err(Error::chain_state("filter chain has already run"));
        }

        let filters = self.filters;
        let result = match filters.get(self.position) {
            Some(filter) => {
                self.position += 1;
                filter.do_filter(request, response, self)
            }
            None => {
                self.completed = true;
                self.handler.service(request, response)
            }
        };
        self.spent = true;
        result
    }

    /// Number of filters entered so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total number of filters in this chain.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True once the handler has been invoked.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}
