use {
    crate::{
        Handler, Request, Response, Result, Sensitive, config::DemoConfig, utils::escape_html,
    },
    http::{Method, StatusCode},
    std::collections::BTreeMap,
};

const HTML: &str = "text/html;charset=UTF-8";

/// Home page: a login form for anonymous visitors, a greeting otherwise.
#[derive(Debug, Default)]
pub struct IndexHandler;

impl Handler for IndexHandler {
    fn service(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        let username = match request.session(response, true)? {
            Some(session) => session.get::<String>("username")?,
            None => None,
        };

        let html = match username {
            None => concat!(
                "<h1>Home</h1>\n",
                "<p>You are not logged in.</p>\n",
                "<form method=\"post\" action=\"/login\">\n",
                "    <legend>Login</legend>\n",
                "    <p>Username: <input type=\"text\" name=\"username\"></p>\n",
                "    <p>Password: <input type=\"password\" name=\"password\"></p>\n",
                "    <p><button type=\"submit\">Login</button></p>\n",
                "</form>\n",
            )
            .to_owned(),
            Some(name) => format!(
                "<h1>Home</h1>\n<p>Welcome, {}!</p>\n<p><a href=\"/logout\">Logout</a></p>\n",
                escape_html(&name)
            ),
        };

        response.set_content_type(HTML)?;
        response.write_str(&html)
    }
}

/// Checks posted credentials against the configured users.
#[derive(Debug, Clone)]
pub struct LoginHandler {
    users: BTreeMap<String, Sensitive<String>>,
}

impl LoginHandler {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            users: config.users.clone(),
        }
    }

    fn authenticate(&self, username: Option<&str>, password: Option<&str>) -> Option<String> {
        let (username, password) = (username?, password?);
        let expected = self.users.get(&username.to_lowercase())?;
        expected.matches(password).then(|| username.to_owned())
    }
}

impl Handler for LoginHandler {
    fn service(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        if request.method() != Method::POST {
            response.set_header(http::header::ALLOW, "POST")?;
            return response.send_error(StatusCode::METHOD_NOT_ALLOWED, "Use POST to log in");
        }

        let user = self.authenticate(request.parameter("username"), request.parameter("password"));
        match user {
            Some(username) => {
                if let Some(session) = request.session(response, true)? {
                    session.insert("username", &username)?;
                }
                tracing::info!(%username, "User logged in");
                response.send_redirect("/")
            }
            None => {
                tracing::info!(
                    username = request.parameter("username").unwrap_or_default(),
                    "Login failed"
                );
                response.set_content_type(HTML)?;
                response.write_str(concat!(
                    "<h1>Login failed</h1>\n",
                    "<p>Wrong username or password.</p>\n",
                    "<p><a href=\"/\">Try again</a></p>\n",
                ))
            }
        }
    }
}

/// Ends the current session, if any, and goes back home.
#[derive(Debug, Default)]
pub struct LogoutHandler;

impl Handler for LogoutHandler {
    fn service(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        if request.invalidate_session()? {
            tracing::info!("User logged out");
        }
        response.send_redirect("/")
    }
}

#[derive(Debug, Default)]
pub struct HelloHandler;

impl Handler for HelloHandler {
    fn service(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        let name = request.parameter("name").unwrap_or("world").to_owned();
        response.set_content_type(HTML)?;
        response.write_str(&format!("<h1>Hello, {}!</h1>\n", escape_html(&name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Engine};

    fn engine() -> Engine {
        let config = Config::default();
        Engine::builder(config.clone())
            .route("/", IndexHandler)
            .route("/login", LoginHandler::new(&config.demo))
            .route("/logout", LogoutHandler)
            .route("/hello", HelloHandler)
            .build()
            .unwrap()
    }

    fn dispatch(engine: &Engine, mut request: Request) -> Response {
        let mut response = Response::new();
        engine.dispatch(&mut request, &mut response);
        response
    }

    #[test]
    fn test_authenticate() {
        let login = LoginHandler::new(&DemoConfig::default());
        assert_eq!(
            login.authenticate(Some("HDH"), Some("123456")).as_deref(),
            Some("HDH")
        );
        assert_eq!(login.authenticate(Some("hdh"), Some("wrong")), None);
        assert_eq!(login.authenticate(Some("nobody"), Some("123456")), None);
        assert_eq!(login.authenticate(None, Some("123456")), None);
        assert_eq!(login.authenticate(Some("hdh"), None), None);
    }

    #[test]
    fn test_login_requires_post() {
        let response = dispatch(&engine(), Request::get("/login?username=hdh&password=123456"));
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header(http::header::ALLOW), Some("POST"));
    }

    #[test]
    fn test_login_without_parameters_fails() {
        let engine = engine();
        let response = dispatch(&engine, Request::post_form("/login", ""));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body_text().contains("Login failed"));
        assert!(engine.sessions().is_empty());
    }

    #[test]
    fn test_index_escapes_username() {
        let engine = engine();
        let session = engine.sessions().create();
        session.insert("username", "<script>").unwrap();
        let request = Request::get("/").with_header(
            http::header::COOKIE,
            http::HeaderValue::from_str(&format!("SESSIONID={}", session.id())).unwrap(),
        );

        let response = dispatch(&engine, request);
        assert!(response.body_text().contains("Welcome, &lt;script&gt;!"));
        assert_eq!(response.header(http::header::CONTENT_TYPE), Some(HTML));
    }

    #[test]
    fn test_logout_without_session_redirects() {
        let response = dispatch(&engine(), Request::get("/logout"));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header(http::header::LOCATION), Some("/"));
    }

    #[test]
    fn test_hello() {
        let response = dispatch(&engine(), Request::get("/hello?name=hdh"));
        assert_eq!(response.body_text(), "<h1>Hello, hdh!</h1>\n");
    }
}
