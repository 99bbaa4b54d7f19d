use {
    crate::{Error, Result},
    serde::Deserialize,
    std::time::Duration,
};

///
/// Settings for the session store and its background reaper.
///
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are evicted.
    #[serde(
        default = "SessionConfig::default_idle_timeout",
        with = "humantime_serde"
    )]
    pub idle_timeout: Duration,

    /// Period between two reaper sweeps.
    #[serde(
        default = "SessionConfig::default_reaper_interval",
        with = "humantime_serde"
    )]
    pub reaper_interval: Duration,

    /// Name of the cookie carrying the session id.
    #[serde(default = "SessionConfig::default_cookie_name")]
    pub cookie_name: String,

    /// Appends `HttpOnly` to the session cookie.
    #[serde(default = "SessionConfig::default_http_only")]
    pub http_only: bool,

    /// When set, an id presented by the client that the store does not know
    /// is used to create a new session under that same id. This lets clients
    /// choose their own session ids and is therefore off by default.
    #[serde(default)]
    pub adopt_unknown_ids: bool,
}

impl SessionConfig {
    fn default_idle_timeout() -> Duration {
        Duration::from_secs(600)
    }

    fn default_reaper_interval() -> Duration {
        Duration::from_secs(60)
    }

    fn default_cookie_name() -> String {
        "SESSIONID".into()
    }

    fn default_http_only() -> bool {
        true
    }

    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            return Err(Error::config(
                "Session idle_timeout must be > 0. Set [session] idle_timeout = \"600s\" in config.",
            ));
        }

        if self.reaper_interval.is_zero() {
            return Err(Error::config(
                "Session reaper_interval must be > 0. Set [session] reaper_interval = \"60s\" in config.",
            ));
        }

        if self.cookie_name.is_empty() || !self.cookie_name.bytes().all(is_token_byte) {
            return Err(Error::config(format!(
                "Session cookie_name {:?} is not a valid cookie name",
                self.cookie_name
            )));
        }

        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            idle_timeout: Self::default_idle_timeout(),
            reaper_interval: Self::default_reaper_interval(),
            cookie_name: Self::default_cookie_name(),
            http_only: Self::default_http_only(),
            adopt_unknown_ids: false,
        }
    }
}

// RFC 7230 token characters.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
