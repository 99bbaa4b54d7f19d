//!
//! The bundled login example: a home page, login and logout, and a greeting
//! guarded by an allow-list filter.
//!
//! [`install`] registers everything under these names, for use in the
//! `[[routes]]` and `[[filters]]` sections of the configuration:
//!
//! | Name             | Kind    | Default pattern |
//! |------------------|---------|-----------------|
//! | `index`          | handler | `/`             |
//! | `login`          | handler | `/login`        |
//! | `logout`         | handler | `/logout`       |
//! | `hello`          | handler | `/hello`        |
//! | `log`            | filter  | `/*`            |
//! | `name-allowlist` | filter  | `/hello`        |
//!
//! When the configuration declares no routes, the default patterns are bound.

mod filters;
mod handlers;

pub use {
    filters::{LogFilter, NameAllowListFilter},
    handlers::{HelloHandler, IndexHandler, LoginHandler, LogoutHandler},
};

use {
    crate::{EngineBuilder, Filter, Handler},
    std::sync::Arc,
};

pub fn install(builder: EngineBuilder) -> EngineBuilder {
    let builder = builder
        .handler_factory("index", |_| Ok(Arc::new(IndexHandler) as Arc<dyn Handler>))
        .handler_factory("login", |config| {
            Ok(Arc::new(LoginHandler::new(&config.demo)) as Arc<dyn Handler>)
        })
        .handler_factory("logout", |_| Ok(Arc::new(LogoutHandler) as Arc<dyn Handler>))
        .handler_factory("hello", |_| Ok(Arc::new(HelloHandler) as Arc<dyn Handler>))
        .filter_factory("log", |_| Ok(Arc::new(LogFilter) as Arc<dyn Filter>))
        .filter_factory("name-allowlist", |config| {
            Ok(Arc::new(NameAllowListFilter::new(&config.demo)) as Arc<dyn Filter>)
        });

    if !builder.config().routes.is_empty() {
        return builder;
    }

    tracing::debug!("No routes configured, binding the demo defaults");
    let demo = builder.config().demo.clone();
    builder
        .route("/", IndexHandler)
        .route("/login", LoginHandler::new(&demo))
        .route("/logout", LogoutHandler)
        .route("/hello", HelloHandler)
        .filter("/*", LogFilter)
        .filter("/hello", NameAllowListFilter::new(&demo))
}
