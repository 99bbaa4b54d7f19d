use {
    super::Response,
    crate::{
        Error, Result,
        events::{Event, EventBus, EventKind},
        session::{Session, SessionStore},
        utils::{RequestIdGenerator, parse_cookie_header, parse_form_urlencoded},
    },
    axum::body::Bytes,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, header, request::Parts},
    serde::Serialize,
    serde_json::Value,
    std::{cell::OnceCell, collections::HashMap, fmt, net::SocketAddr},
};

/// How the request reaches the session store. Bound by the engine before the
/// filter chain runs.
#[derive(Clone)]
pub(crate) struct SessionBinding {
    pub(crate) store: SessionStore,
    pub(crate) cookie_name: String,
    pub(crate) http_only: bool,
}

/// The incoming request as seen by filters and handlers.
///
/// Query and form parameters are decoded on first use. For `POST` requests
/// with an `application/x-www-form-urlencoded` body, form values follow the
/// query string values of the same name.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    request_id: String,
    parameters: OnceCell<HashMap<String, Vec<String>>>,
    attributes: HashMap<String, Value>,
    sessions: Option<SessionBinding>,
    session: Option<Session>,
    events: EventBus,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            local_addr: None,
            request_id: RequestIdGenerator::generate(),
            parameters: OnceCell::new(),
            attributes: HashMap::new(),
            sessions: None,
            session: None,
            events: EventBus::new(),
        }
    }

    /// A `GET` request for a static target such as `"/hello?name=hdh"`.
    ///
    /// # Panics
    ///
    /// Panics if `target` is not a valid request target.
    pub fn get(target: &'static str) -> Self {
        Self::new(Method::GET, Uri::from_static(target))
    }

    /// A `POST` request for a static target carrying a form-encoded body.
    ///
    /// # Panics
    ///
    /// Panics if `target` is not a valid request target.
    pub fn post_form(target: &'static str, form: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, Uri::from_static(target))
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .with_body(form)
    }

    /// Builds the view from the parts of an `http::Request`. The request id is
    /// taken from `x-request-id` when present.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let mut request = Self::new(parts.method, parts.uri);
        request.headers = parts.headers;
        request.body = body;
        if let Some(id) = request_id {
            request.request_id = id;
        }
        request
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    pub(crate) fn bind(&mut self, sessions: SessionBinding, events: EventBus) {
        self.sessions = Some(sessions);
        self.events = events;
    }

    // ========================================================================
    // Request line and headers
    // ========================================================================

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of header `name` when it is valid UTF-8.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// The first value of parameter `name`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameter_map()
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of parameter `name`, query string first.
    pub fn parameter_values(&self, name: &str) -> &[String] {
        self.parameter_map()
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn parameter_map(&self) -> &HashMap<String, Vec<String>> {
        self.parameters.get_or_init(|| {
            let mut parameters: HashMap<String, Vec<String>> = HashMap::new();
            let query = self.uri.query().unwrap_or_default().as_bytes();
            let form: &[u8] = if self.has_form_body() {
                &self.body[..]
            } else {
                &[]
            };
            for (name, value) in parse_form_urlencoded(query)
                .into_iter()
                .chain(parse_form_urlencoded(form))
            {
                parameters.entry(name).or_default().push(value);
            }
            parameters
        })
    }

    fn has_form_body(&self) -> bool {
        self.method == Method::POST
            && self.content_type().is_some_and(|ct| {
                ct.get(..33)
                    .is_some_and(|p| p.eq_ignore_ascii_case("application/x-www-form-urlencoded"))
            })
    }

    // ========================================================================
    // Cookies
    // ========================================================================

    /// Every cookie sent with the request, across all `Cookie` headers.
    pub fn cookies(&self) -> Vec<(&str, &str)> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .collect()
    }

    /// The value of the first cookie called `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Stores a request-scoped attribute and returns the value it replaced.
    pub fn set_attribute<T: Serialize>(&mut self, name: &str, value: T) -> Result<Option<Value>> {
        let value = serde_json::to_value(value)?;
        let previous = self.attributes.insert(name.to_owned(), value.clone());
        let kind = match previous {
            Some(_) => EventKind::RequestAttributeReplaced,
            None => EventKind::RequestAttributeAdded,
        };
        self.emit_attribute(kind, name, Some(value));
        Ok(previous)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.emit_attribute(EventKind::RequestAttributeRemoved, name, removed.clone());
        }
        removed
    }

    fn emit_attribute(&self, kind: EventKind, name: &str, value: Option<Value>) {
        if self.events.is_observed(kind) {
            let event = Event::new(kind)
                .with_request(&self.request_id, self.path())
                .with_attribute(name, value);
            self.events.emit(&event);
        }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Returns the session associated with this request.
    ///
    /// A live session named by the session cookie is returned and its access
    /// time recorded. Otherwise, when `create` is true, a new session is
    /// created and its cookie added to `response`. Creating a session once
    /// the response is committed fails, since the cookie could no longer be
    /// sent.
    ///
    /// With `create == false` and no live session, returns `Ok(None)`.
    pub fn session(&mut self, response: &mut Response, create: bool) -> Result<Option<Session>> {
        if let Some(session) = &self.session
            && session.is_valid()
        {
            return Ok(Some(session.clone()));
        }

        let binding = self
            .sessions
            .clone()
            .ok_or_else(|| Error::internal("request is not bound to a session store"))?;
        let requested = self.cookie(&binding.cookie_name).map(str::to_owned);

        if let Some(id) = requested.as_deref() {
            if let Some(session) = binding.store.lookup(id) {
                self.session = Some(session.clone());
                return Ok(Some(session));
            }
            if binding.store.adopts_unknown_ids() {
                // the client already holds this id; no cookie to send
                let session = binding.store.get_or_create(Some(id));
                self.session = Some(session.clone());
                return Ok(Some(session));
            }
        }

        if !create {
            self.session = None;
            return Ok(None);
        }

        if response.is_committed() {
            return Err(Error::response_committed(
                "cannot create a session after the response has been committed",
            ));
        }

        let session = binding.store.create();
        let mut cookie = format!("{}={}; Path=/", binding.cookie_name, session.id());
        if binding.http_only {
            cookie.push_str("; HttpOnly");
        }
        response.add_header(header::SET_COOKIE, &cookie)?;

        tracing::debug!(
            request_id = %self.request_id,
            session_id = %session.id(),
            replaced_unknown_id = requested.is_some(),
            "Issued session cookie"
        );
        self.session = Some(session.clone());
        Ok(Some(session))
    }

    /// Invalidates the current session, if there is one. Returns whether a
    /// session was invalidated.
    pub fn invalidate_session(&mut self) -> Result<bool> {
        let mut scratch = Response::new();
        match self.session(&mut scratch, false)? {
            Some(session) => {
                self.session = None;
                session.invalidate()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("request_id", &self.request_id)
            .field("remote_addr", &self.remote_addr)
            .field("body_len", &self.body.len())
            .finish()
    }
}
