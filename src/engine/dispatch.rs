use {
    super::Engine,
    crate::{
        Request, Response,
        chain::FilterChain,
        events::{Event, EventBus, EventKind},
        utils::panic_message,
    },
    http::StatusCode,
    std::panic::{self, AssertUnwindSafe},
};

/// Emits `RequestStarted` on entry and `RequestFinished` when dropped, so
/// every started request gets exactly one finish, whatever way the chain
/// exits.
struct RequestScope<'a> {
    events: &'a EventBus,
    request_id: String,
    path: String,
}

impl<'a> RequestScope<'a> {
    fn enter(events: &'a EventBus, request_id: &str, path: &str) -> Self {
        let scope = Self {
            events,
            request_id: request_id.to_owned(),
            path: path.to_owned(),
        };
        scope.emit(EventKind::RequestStarted);
        scope
    }

    fn emit(&self, kind: EventKind) {
        if self.events.is_observed(kind) {
            self.events
                .emit(&Event::new(kind).with_request(&self.request_id, &self.path));
        }
    }
}

impl Drop for RequestScope<'_> {
    fn drop(&mut self) {
        self.emit(EventKind::RequestFinished);
    }
}

impl Engine {
    /// Processes one request.
    ///
    /// When no route matches, writes a `404` naming the path and returns
    /// without running any filter. Otherwise runs the matching filters in
    /// registration order, then the route's handler.
    ///
    /// This is the only place failures from filters and handlers are
    /// recovered. Returned errors and panics are logged and swallowed; no
    /// error page is written, so the response holds whatever the chain wrote
    /// before failing.
    pub fn dispatch(&self, request: &mut Request, response: &mut Response) {
        request.bind(self.inner.binding.clone(), self.inner.events.clone());
        let path = request.path().to_owned();
        let _span = tracing::debug_span!(
            "dispatch",
            request_id = %request.request_id(),
            method = %request.method(),
            path = %path,
        )
        .entered();

        let Some(handler) = self.inner.routes.resolve_route(&path) else {
            tracing::debug!("No route matched");
            let message = format!("No mapping for URL: {path}");
            if let Err(err) = response.send_error(StatusCode::NOT_FOUND, &message) {
                tracing::warn!(error = %err, "Could not write 404 response");
            }
            return;
        };
        let filters = self.inner.filters.resolve_filters(&path);

        let _scope = RequestScope::enter(&self.inner.events, request.request_id(), &path);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            FilterChain::new(&filters, handler.as_ref()).do_filter(request, response)
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(
                    error = %err,
                    kind = ?err.kind(),
                    committed = response.is_committed(),
                    "Request processing failed"
                );
            }
            Err(payload) => {
                tracing::error!(
                    panic = %panic_message(payload.as_ref()),
                    committed = response.is_committed(),
                    "Request processing panicked"
                );
            }
        }
    }
}
