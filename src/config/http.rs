use {
    crate::{Error, Result},
    serde::Deserialize,
    std::{net::IpAddr, time::Duration},
};

///
/// Settings for the HTTP transport adapter.
///
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "HttpConfig::default_bind_port")]
    pub bind_port: u16,

    /// Request bodies larger than this are rejected with 413 before dispatch.
    #[serde(default = "HttpConfig::default_max_payload_size_bytes")]
    pub max_payload_size_bytes: byte_unit::Byte,

    /// How long in-flight requests may drain after a shutdown signal.
    #[serde(
        default = "HttpConfig::default_shutdown_timeout",
        with = "humantime_serde"
    )]
    pub shutdown_timeout: Duration,
}

impl HttpConfig {
    pub fn full_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }

    /// The payload limit as a `usize`, saturating on narrow targets.
    pub fn max_payload_size(&self) -> usize {
        usize::try_from(self.max_payload_size_bytes.as_u64()).unwrap_or(usize::MAX)
    }

    fn default_bind_addr() -> String {
        "127.0.0.1".into()
    }

    fn default_bind_port() -> u16 {
        3000
    }

    fn default_max_payload_size_bytes() -> byte_unit::Byte {
        byte_unit::Byte::from_u64(32 * 1024)
    }

    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(30)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(Error::config(
                "HTTP bind_addr is required. Set [http] bind_addr = \"0.0.0.0\" or \"127.0.0.1\" in config.",
            ));
        }

        if self.bind_addr.parse::<IpAddr>().is_err() {
            return Err(Error::config(
                "HTTP bind_addr must be a valid IP address. Examples: \"127.0.0.1\", \"0.0.0.0\", \"::1\"",
            ));
        }

        if self.max_payload_size_bytes.as_u64() == 0 {
            return Err(Error::config(
                "HTTP max_payload_size_bytes must be > 0. Set [http] max_payload_size_bytes = \"32KiB\" in config.",
            ));
        }

        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            bind_addr: Self::default_bind_addr(),
            bind_port: Self::default_bind_port(),
            max_payload_size_bytes: Self::default_max_payload_size_bytes(),
            shutdown_timeout: Self::default_shutdown_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.full_bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.max_payload_size(), 32 * 1024);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_bind_addr() {
        let config = HttpConfig {
            bind_addr: "localhost".into(),
            ..HttpConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let config = HttpConfig {
            bind_addr: "  ".into(),
            ..HttpConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_payload_rejected() {
        let config = HttpConfig {
            max_payload_size_bytes: byte_unit::Byte::from_u64(0),
            ..HttpConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
