use {
    crate::{Filter, FilterChain, Request, Response, Result, config::DemoConfig},
    http::StatusCode,
    std::collections::HashSet,
};

/// Logs every request it sees and always lets it through.
#[derive(Debug, Default)]
pub struct LogFilter;

impl Filter for LogFilter {
    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        chain: &mut FilterChain<'_>,
    ) -> Result<()> {
        tracing::info!(
            method = %request.method(),
            path = request.path(),
            query = request.query().unwrap_or_default(),
            "Incoming request"
        );
        chain.do_filter(request, response)
    }
}

/// Admits a request only when its `name` parameter is on the allow-list.
#[derive(Debug, Clone)]
pub struct NameAllowListFilter {
    names: HashSet<String>,
}

impl NameAllowListFilter {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            names: config.allowed_names.iter().cloned().collect(),
        }
    }
}

impl Filter for NameAllowListFilter {
    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        chain: &mut FilterChain<'_>,
    ) -> Result<()> {
        let name = request.parameter("name");
        tracing::debug!(name, "Checking name against allow-list");
        if name.is_some_and(|n| self.names.contains(n)) {
            chain.do_filter(request, response)
        } else {
            tracing::warn!(name, "Access denied");
            response.send_error(StatusCode::FORBIDDEN, "Forbidden")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Engine, handler_fn};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn guarded(hits: Arc<AtomicUsize>) -> Engine {
        let config = Config::default();
        Engine::builder(config.clone())
            .filter("/*", LogFilter)
            .filter("/hello", NameAllowListFilter::new(&config.demo))
            .route(
                "/hello",
                handler_fn(move |_req, res| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    res.write_str("hi")
                }),
            )
            .build()
            .unwrap()
    }

    fn status_of(engine: &Engine, request: Request) -> StatusCode {
        let mut request = request;
        let mut response = Response::new();
        engine.dispatch(&mut request, &mut response);
        response.status()
    }

    #[test]
    fn test_allowed_names_pass() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = guarded(Arc::clone(&hits));
        assert_eq!(status_of(&engine, Request::get("/hello?name=hdh")), StatusCode::OK);
        assert_eq!(status_of(&engine, Request::get("/hello?name=admin")), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_other_names_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = guarded(Arc::clone(&hits));
        assert_eq!(
            status_of(&engine, Request::get("/hello?name=eve")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(&engine, Request::get("/hello")), StatusCode::FORBIDDEN);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_allow_list_from_config() {
        let demo = DemoConfig {
            allowed_names: vec!["eve".into()],
            ..DemoConfig::default()
        };
        let filter = NameAllowListFilter::new(&demo);
        assert!(filter.names.contains("eve"));
        assert!(!filter.names.contains("hdh"));
    }
}
