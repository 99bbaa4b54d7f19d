use {
    crate::{Error, Result, Sensitive, routing::UrlPattern},
    serde::Deserialize,
    std::collections::BTreeMap,
};

///
/// A `[[routes]]` entry binding a URL pattern to a named handler.
/// Routes are matched in declaration order and the first match wins.
///
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
    pub pattern: String,
    pub handler: String,
}

///
/// A `[[filters]]` entry binding a URL pattern to a named filter.
/// Every matching filter runs, in declaration order.
///
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FilterConfig {
    pub pattern: String,
    pub filter: String,
}

impl RouteConfig {
    pub fn new(pattern: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            handler: handler.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_binding(&self.pattern, &self.handler, "handler")
    }
}

impl FilterConfig {
    pub fn new(pattern: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            filter: filter.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_binding(&self.pattern, &self.filter, "filter")
    }
}

fn validate_binding(pattern: &str, target: &str, what: &str) -> Result<()> {
    pattern
        .parse::<UrlPattern>()
        .map_err(|e| Error::config(format!("Invalid pattern {pattern:?}: {e}")))?;
    if target.trim().is_empty() {
        return Err(Error::config(format!(
            "Pattern {pattern:?} must name a {what}"
        )));
    }
    Ok(())
}

///
/// Settings for the bundled login example.
///
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    /// Known users and their passwords. Usernames are matched lowercase.
    #[serde(default = "DemoConfig::default_users")]
    pub users: BTreeMap<String, Sensitive<String>>,

    /// Values of the `name` parameter admitted by the allow-list filter.
    #[serde(default = "DemoConfig::default_allowed_names")]
    pub allowed_names: Vec<String>,
}

impl DemoConfig {
    fn default_users() -> BTreeMap<String, Sensitive<String>> {
        BTreeMap::from([("hdh".to_string(), Sensitive::from("123456"))])
    }

    fn default_allowed_names() -> Vec<String> {
        vec!["hdh".into(), "admin".into()]
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            users: Self::default_users(),
            allowed_names: Self::default_allowed_names(),
        }
    }
}
