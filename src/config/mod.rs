//!
//! Configuration structures for the engine and its transport.
//!
//! A configuration can be created in many ways:
//! - From an environment-specific TOML file via `Config::from_rust_env` or `Config::from_toml_file`
//! - From a TOML string via `Config::from_toml`
//! - Constructed programmatically via the builder methods on `Config`
//!
//! In both TOML-based methods, environment variables can be referenced using the
//! {{ VAR_NAME }} syntax and are substituted before parsing.
//!
//! Configuration is split into logical sections, each represented by their own struct:
//!
//! - `HttpConfig` for the HTTP transport
//! - `SessionConfig` for the session store and reaper
//! - `LoggingConfig` for logging and tracing settings
//! - `RouteConfig` / `FilterConfig` for the ordered `[[routes]]` and `[[filters]]` tables
//! - `DemoConfig` for the bundled login example
//!
mod http;
mod logging;
mod mappings;
mod session;

pub use http::*;
pub use logging::*;
pub use mappings::*;
pub use session::*;

pub use byte_unit::Byte;

use {
    crate::{Error, Result, utils::replace_handlebars_with_env},
    serde::Deserialize,
    std::{env, fs, str::FromStr, time::Duration},
};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    #[serde(default)]
    pub demo: DemoConfig,
}

impl Config {
    ///
    /// Loads the configuration from `config/{RUST_ENV}.toml`, falling back to
    /// the built-in defaults when `RUST_ENV` is unset or the file cannot be read.
    ///
    pub fn from_env_or_default() -> Config {
        match Self::from_rust_env() {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!("Using default configuration: {}", err);
                Config::default()
            }
        }
    }

    ///
    /// Loads the configuration from a file based on the RUST_ENV environment variable.
    ///
    pub fn from_rust_env() -> Result<Config> {
        Self::from_toml_file(env::var("RUST_ENV")?)
    }

    ///
    /// Given an environment name, loads "config/{env}.toml", substitutes any
    /// environment variables, and returns a Config struct.
    ///
    pub fn from_toml_file(env: impl AsRef<str>) -> Result<Config> {
        let path = format!("config/{}.toml", env.as_ref());
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    ///
    /// Parses a configuration string in TOML format into a Config struct.
    ///
    pub fn from_toml(toml_str: &str) -> Result<Config> {
        toml_str.parse()
    }

    /// Sets the HTTP server bind address of the HttpConfig.
    pub fn with_bind_addr<S: AsRef<str>>(mut self, addr: S) -> Self {
        self.http.bind_addr = addr.as_ref().into();
        self
    }

    /// Sets the HTTP server bind port of the HttpConfig.
    pub fn with_bind_port(mut self, port: u16) -> Self {
        self.http.bind_port = port;
        self
    }

    /// Sets the maximum payload size in bytes of the HttpConfig.
    pub fn with_max_payload_size_bytes(mut self, size: u64) -> Self {
        self.http.max_payload_size_bytes = Byte::from_u64(size);
        self
    }

    /// Sets the graceful shutdown timeout of the HttpConfig.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.http.shutdown_timeout = timeout;
        self
    }

    /// Sets the session idle timeout of the SessionConfig.
    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session.idle_timeout = timeout;
        self
    }

    /// Sets the reaper sweep interval of the SessionConfig.
    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.session.reaper_interval = interval;
        self
    }

    /// Sets the session cookie name of the SessionConfig.
    pub fn with_session_cookie_name(mut self, name: &str) -> Self {
        self.session.cookie_name = name.into();
        self
    }

    /// Enables or disables the HttpOnly attribute on the session cookie.
    pub fn with_session_http_only(mut self, enable: bool) -> Self {
        self.session.http_only = enable;
        self
    }

    /// Enables or disables adoption of unknown client-supplied session ids.
    pub fn with_adopt_unknown_session_ids(mut self, enable: bool) -> Self {
        self.session.adopt_unknown_ids = enable;
        self
    }

    /// Sets the log format of the LoggingConfig.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.logging.format = format;
        self
    }

    /// Appends a `[[routes]]` entry.
    pub fn with_route(mut self, pattern: &str, handler: &str) -> Self {
        self.routes.push(RouteConfig::new(pattern, handler));
        self
    }

    /// Appends a `[[filters]]` entry.
    pub fn with_filter(mut self, pattern: &str, filter: &str) -> Self {
        self.filters.push(FilterConfig::new(pattern, filter));
        self
    }

    /// Replaces the demo section.
    pub fn with_demo_config(mut self, demo: DemoConfig) -> Self {
        self.demo = demo;
        self
    }

    /// Ensures that the configuration is valid.
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        self.session.validate()?;
        self.logging.validate()?;
        for route in &self.routes {
            route.validate()?;
        }
        for filter in &self.filters {
            filter.validate()?;
        }
        Ok(())
    }

    ///
    /// Sets up the tracing subscriber for logging based on the LoggingConfig.
    ///
    /// NOTE: This should be called early during startup to ensure logging is configured
    ///       before any log messages are emitted.
    ///
    pub fn setup_tracing(&self) {
        use tracing_subscriber::{EnvFilter, prelude::*};
        let env_filter = EnvFilter::from_default_env();
        match self.logging.format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().json())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Default => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Compact => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().compact())
                    .with(env_filter)
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer().pretty())
                    .with(env_filter)
                    .try_init();
            }
        }
    }
}

///
/// Parses a configuration string with references to environment variables
/// into a Config struct by substituting the environment variables and then
/// parsing the resulting TOML.
///
impl FromStr for Config {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let config_file = replace_handlebars_with_env(s);
        let config = toml::from_str::<Config>(&config_file)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_config_from_str_full() {
        unsafe {
            env::set_var("DISPATCH_TEST_PORT", "9090");
        }

        let config_str = r#"
[http]
bind_addr = "0.0.0.0"
bind_port = {{ DISPATCH_TEST_PORT }}
max_payload_size_bytes = "1MiB"
shutdown_timeout = "5s"

[session]
idle_timeout = "10m"
reaper_interval = "30s"
cookie_name = "SID"
http_only = false
adopt_unknown_ids = true

[logging]
format = "json"

[[routes]]
pattern = "/"
handler = "index"

[[routes]]
pattern = "/api/*"
handler = "api"

[[filters]]
pattern = "/*"
filter = "log"

[demo]
allowed_names = ["alice"]

[demo.users]
alice = "secret"
        "#;

        let config = config_str.parse::<Config>().unwrap();
        assert_eq!(config.http.bind_addr, "0.0.0.0");
        assert_eq!(config.http.bind_port, 9090);
        assert_eq!(config.http.max_payload_size(), 1024 * 1024);
        assert_eq!(config.http.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.session.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.session.reaper_interval, Duration::from_secs(30));
        assert_eq!(config.session.cookie_name, "SID");
        assert!(!config.session.http_only);
        assert!(config.session.adopt_unknown_ids);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.routes,
            vec![RouteConfig::new("/", "index"), RouteConfig::new("/api/*", "api")]
        );
        assert_eq!(config.filters, vec![FilterConfig::new("/*", "log")]);
        assert!(config.demo.users["alice"].matches("secret"));
        assert_eq!(config.demo.allowed_names, vec!["alice"]);
        assert!(config.validate().is_ok());

        unsafe {
            env::remove_var("DISPATCH_TEST_PORT");
        }
    }

    #[test]
    fn test_config_from_str_empty_uses_defaults() {
        let config = "".parse::<Config>().unwrap();
        assert_eq!(config.http.bind_port, 3000);
        assert_eq!(config.session.idle_timeout, Duration::from_secs(600));
        assert!(config.routes.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_str_invalid_toml() {
        let err = "this is not valid toml".parse::<Config>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_validate_rejects_bad_route_pattern() {
        let config = Config::default().with_route("no-slash", "index");
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_from_toml_file_missing() {
        let err = Config::from_toml_file("does-not-exist").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_config_builder_matches_toml_equivalent() {
        let builder_config = Config::default()
            .with_bind_addr("0.0.0.0")
            .with_bind_port(8080)
            .with_max_payload_size_bytes(2 * 1024 * 1024)
            .with_shutdown_timeout(Duration::from_secs(10))
            .with_session_idle_timeout(Duration::from_secs(120))
            .with_reaper_interval(Duration::from_secs(5))
            .with_session_cookie_name("SID")
            .with_session_http_only(false)
            .with_adopt_unknown_session_ids(true)
            .with_log_format(LogFormat::Compact)
            .with_route("/", "index")
            .with_filter("/*", "log");

        let toml_config = Config::from_toml(
            r#"
[http]
bind_addr = "0.0.0.0"
bind_port = 8080
max_payload_size_bytes = "2MiB"
shutdown_timeout = "10s"

[session]
idle_timeout = "2m"
reaper_interval = "5s"
cookie_name = "SID"
http_only = false
adopt_unknown_ids = true

[logging]
format = "compact"

[[routes]]
pattern = "/"
handler = "index"

[[filters]]
pattern = "/*"
filter = "log"
"#,
        )
        .unwrap();

        assert_eq!(builder_config.http.bind_addr, toml_config.http.bind_addr);
        assert_eq!(builder_config.http.bind_port, toml_config.http.bind_port);
        assert_eq!(
            builder_config.http.max_payload_size_bytes,
            toml_config.http.max_payload_size_bytes
        );
        assert_eq!(
            builder_config.http.shutdown_timeout,
            toml_config.http.shutdown_timeout
        );
        assert_eq!(
            builder_config.session.idle_timeout,
            toml_config.session.idle_timeout
        );
        assert_eq!(
            builder_config.session.reaper_interval,
            toml_config.session.reaper_interval
        );
        assert_eq!(
            builder_config.session.cookie_name,
            toml_config.session.cookie_name
        );
        assert_eq!(builder_config.session.http_only, toml_config.session.http_only);
        assert_eq!(
            builder_config.session.adopt_unknown_ids,
            toml_config.session.adopt_unknown_ids
        );
        assert_eq!(builder_config.logging.format, toml_config.logging.format);
        assert_eq!(builder_config.routes, toml_config.routes);
        assert_eq!(builder_config.filters, toml_config.filters);
    }
}
