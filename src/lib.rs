//! # dispatch-engine
//!
//! A small in-process request-processing engine: it routes each request to a
//! registered handler, runs the handler behind an ordered chain of filters,
//! and keeps per-client session state with idle expiry.
//!
//! Handlers and filters are plain synchronous code. The bundled axum
//! [`Server`] collects each request, dispatches it on Tokio's blocking pool
//! and writes back whatever the chain produced.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dispatch_engine::{Config, Engine, Result, Server, filter_fn, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_env_or_default();
//!     config.setup_tracing();
//!
//!     let engine = Engine::builder(config)
//!         .route("/hello", handler_fn(|req, res| {
//!             let name = req.parameter("name").unwrap_or("world").to_owned();
//!             res.write_str(&format!("Hello, {name}!"))
//!         }))
//!         .filter("/*", filter_fn(|req, res, chain| {
//!             tracing::info!(path = req.path(), "incoming");
//!             chain.do_filter(req, res)
//!         }))
//!         .build()?;
//!
//!     Server::new(engine).start().await
//! }
//! ```
//!
//! With `config/dev.toml`:
//! ```toml
//! [http]
//! bind_port = 3000
//!
//! [session]
//! idle_timeout = "10m"
//! reaper_interval = "1m"
//! ```
//!
//! Run with `RUST_ENV=dev cargo run`.
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Configuration loading and validation ([`Config`]) |
//! | [`routing`] | URL patterns and the route/filter tables |
//! | [`chain`] | [`Handler`], [`Filter`] and the single-use [`FilterChain`] |
//! | [`session`] | [`SessionStore`], [`Session`] and the background reaper |
//! | [`events`] | Lifecycle events and the [`EventBus`] |
//! | [`engine`] | [`EngineBuilder`] and [`Engine::dispatch`] |
//! | [`server`] | axum transport ([`Server`]) |
//! | [`demo`] | The bundled login example |
//!

pub mod chain;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod events;
pub mod exchange;
pub mod routing;
pub mod server;
pub mod session;
pub mod utils;

pub use {
    chain::{Filter, FilterChain, Handler, filter_fn, handler_fn},
    config::{Config, LogFormat},
    engine::{Engine, EngineBuilder},
    error::{Error, ErrorKind, ErrorResponse, Result},
    events::{Event, EventBus, EventBusBuilder, EventKind, Observer},
    exchange::{Request, Response},
    routing::{Binding, FilterTable, MappingTable, RouteTable, UrlPattern},
    server::Server,
    session::{Session, SessionStore, spawn_reaper},
    utils::{RequestIdGenerator, Sensitive, escape_html, replace_handlebars_with_env},
};
