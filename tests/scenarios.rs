//! End-to-end scenarios for the bundled login example, driven straight
//! through `Engine::dispatch` without a network transport.

use dispatch_engine::{Config, Engine, EventKind, Request, Response, demo};
use http::{HeaderValue, StatusCode, header};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_util::sync::CancellationToken;

fn demo_engine(config: Config) -> Engine {
    demo::install(Engine::builder(config))
        .build()
        .expect("demo engine builds")
}

fn dispatch(engine: &Engine, mut request: Request) -> Response {
    let mut response = Response::new();
    engine.dispatch(&mut request, &mut response);
    response
}

/// Extracts the session id from a `Set-Cookie: SESSIONID=...` header.
fn issued_session_id(response: &Response) -> Option<String> {
    let cookie = response.header(header::SET_COOKIE)?;
    let (name, rest) = cookie.split_once('=')?;
    assert_eq!(name, "SESSIONID");
    rest.split(';').next().map(str::to_owned)
}

fn with_session(request: Request, id: &str) -> Request {
    request.with_header(
        header::COOKIE,
        HeaderValue::from_str(&format!("SESSIONID={id}")).unwrap(),
    )
}

// ============================================================================
// Scenario 1: anonymous visit
// ============================================================================

#[test]
fn test_anonymous_root_gets_cookie_and_login_form() {
    let engine = demo_engine(Config::default());
    let response = dispatch(&engine, Request::get("/"));

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.body_text().contains("You are not logged in."));

    let cookie = response.header(header::SET_COOKIE).unwrap();
    let id = issued_session_id(&response).unwrap();
    assert_eq!(cookie, format!("SESSIONID={id}; Path=/; HttpOnly"));
    assert_eq!(engine.sessions().len(), 1);
}

#[test]
fn test_cookie_without_http_only_when_disabled() {
    let engine = demo_engine(Config::default().with_session_http_only(false));
    let response = dispatch(&engine, Request::get("/"));
    let id = issued_session_id(&response).unwrap();
    assert_eq!(
        response.header(header::SET_COOKIE),
        Some(format!("SESSIONID={id}; Path=/").as_str())
    );
}

// ============================================================================
// Scenarios 2 and 3: login
// ============================================================================

#[test]
fn test_login_with_valid_credentials() {
    let engine = demo_engine(Config::default());
    let first = dispatch(&engine, Request::get("/"));
    let id = issued_session_id(&first).unwrap();

    let login = with_session(
        Request::post_form("/login", "username=hdh&password=123456"),
        &id,
    );
    let response = dispatch(&engine, login);

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.header(header::LOCATION), Some("/"));
    let session = engine.sessions().lookup(&id).unwrap();
    assert_eq!(
        session.get::<String>("username").unwrap().as_deref(),
        Some("hdh")
    );

    // session continuity: the same cookie now sees the greeting
    let home = dispatch(&engine, with_session(Request::get("/"), &id));
    assert!(home.body_text().contains("Welcome, hdh!"));
    assert!(home.header(header::SET_COOKIE).is_none());
}

#[test]
fn test_login_with_wrong_password() {
    let engine = demo_engine(Config::default());
    let first = dispatch(&engine, Request::get("/"));
    let id = issued_session_id(&first).unwrap();

    let login = with_session(
        Request::post_form("/login", "username=hdh&password=nope"),
        &id,
    );
    let response = dispatch(&engine, login);

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.body_text().contains("Login failed"));
    assert!(response.header(header::LOCATION).is_none());
    let session = engine.sessions().lookup(&id).unwrap();
    assert_eq!(session.get::<String>("username").unwrap(), None);
}

#[test]
fn test_logout_ends_session() {
    let engine = demo_engine(Config::default());
    let first = dispatch(&engine, Request::get("/"));
    let id = issued_session_id(&first).unwrap();
    dispatch(
        &engine,
        with_session(
            Request::post_form("/login", "username=hdh&password=123456"),
            &id,
        ),
    );

    let response = dispatch(&engine, with_session(Request::get("/logout"), &id));
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(engine.sessions().lookup(&id).is_none());

    let home = dispatch(&engine, with_session(Request::get("/"), &id));
    assert!(home.body_text().contains("You are not logged in."));
    assert_ne!(issued_session_id(&home).unwrap(), id);
}

// ============================================================================
// Scenario 4: filter-guarded path
// ============================================================================

#[test]
fn test_allow_list_filter_guards_hello() {
    let engine = demo_engine(Config::default());

    let allowed = dispatch(&engine, Request::get("/hello?name=hdh"));
    assert_eq!(allowed.status(), StatusCode::OK);
    assert!(allowed.body_text().contains("Hello, hdh!"));

    let denied = dispatch(&engine, Request::get("/hello?name=mallory"));
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert!(!denied.body_text().contains("Hello"));
}

#[test]
fn test_unknown_path_is_404() {
    let engine = demo_engine(Config::default());
    let response = dispatch(&engine, Request::get("/missing/page"));
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.body_text().contains("/missing/page"));
}

// ============================================================================
// Scenario 5: idle expiry
// ============================================================================

#[tokio::test]
async fn test_reaper_evicts_idle_session() {
    let config = Config::default()
        .with_session_idle_timeout(Duration::from_millis(50))
        .with_reaper_interval(Duration::from_millis(20));
    let destroyed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&destroyed);
    let engine = demo::install(Engine::builder(config))
        .subscribe(EventKind::SessionDestroyed, move |event| {
            sink.lock().unwrap().push(event.session_id.clone());
            Ok(())
        })
        .build()
        .unwrap();
    let token = CancellationToken::new();
    let _reaper = engine.spawn_reaper(token.clone());

    let first = dispatch(&engine, Request::get("/"));
    let id = issued_session_id(&first).unwrap();
    engine
        .sessions()
        .lookup(&id)
        .unwrap()
        .insert("username", "hdh")
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(engine.sessions().is_empty());
    assert_eq!(*destroyed.lock().unwrap(), vec![Some(id.clone())]);

    let later = dispatch(&engine, with_session(Request::get("/"), &id));
    assert!(later.body_text().contains("You are not logged in."));
    let fresh = issued_session_id(&later).unwrap();
    assert_ne!(fresh, id);
    let session = engine.sessions().lookup(&fresh).unwrap();
    assert!(session.attribute_names().unwrap().is_empty());

    token.cancel();
}

#[test]
fn test_adopting_unknown_ids_when_enabled() {
    let engine = demo_engine(Config::default().with_adopt_unknown_session_ids(true));
    let response = dispatch(&engine, with_session(Request::get("/"), "client-chosen"));
    assert!(response.header(header::SET_COOKIE).is_none());
    assert!(engine.sessions().lookup("client-chosen").is_some());
}

#[test]
fn test_unknown_ids_not_adopted_by_default() {
    let engine = demo_engine(Config::default());
    let response = dispatch(&engine, with_session(Request::get("/"), "client-chosen"));
    assert_ne!(issued_session_id(&response).unwrap(), "client-chosen");
    assert!(engine.sessions().lookup("client-chosen").is_none());
}

#[test]
fn test_dev_config_builds_demo_engine() {
    let config = Config::from_toml_file("dev").unwrap();
    let engine = demo_engine(config);
    assert_eq!(engine.routes().len(), 4);
    assert_eq!(engine.filters().len(), 2);

    let response = dispatch(&engine, Request::get("/hello?name=admin"));
    assert_eq!(response.status(), StatusCode::OK);
}
