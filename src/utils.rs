//!
//! Utility types and functions shared across the engine.
//!
//! This module provides:
//! - [`Sensitive`] - A wrapper type for secrets that hides values in debug output
//! - [`RequestIdGenerator`] - Generates or preserves request IDs for tracing
//! - [`replace_handlebars_with_env`] - Template substitution for environment variables
//! - [`parse_cookie_header`] and [`parse_form_urlencoded`] - request decoding helpers
//! - [`escape_html`] - escaping for values echoed into HTML bodies
//!

use {
    http::{HeaderValue, Request},
    regex::{Captures, Regex},
    serde::Deserialize,
    std::{any::Any, borrow::Cow, env, sync::LazyLock},
    tower_http::request_id::{MakeRequestId, RequestId},
    uuid::{ContextV7, Timestamp, Uuid},
    zeroize::{Zeroize, ZeroizeOnDrop},
};

/// Matches `{{ VAR_NAME }}` with optional whitespace around the variable name.
/// Variable names must be uppercase letters, digits, or underscores.
static HANDLEBAR_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").unwrap());

/// A wrapper type for sensitive data that obscures the value in debug output
/// and zeros its memory when dropped.
///
/// The inner value remains accessible through the public field `0`, but when
/// formatted using `Debug` it displays as `Sensitive(****)`.
///
/// ```
/// use dispatch_engine::Sensitive;
///
/// let password = Sensitive::from("123456");
/// assert_eq!(format!("{:?}", password), "Sensitive(****)");
/// assert_eq!(password.0, "123456");
/// ```
#[derive(Clone, Deserialize, Default, Zeroize, ZeroizeOnDrop)]
pub struct Sensitive<T: Default + Zeroize>(pub T);

impl Sensitive<String> {
    /// Creates a new `Sensitive<String>` from a string slice.
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    /// Compares the secret with a candidate without short-circuiting on the
    /// first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let (a, b) = (self.0.as_bytes(), candidate.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl<T: Default + Zeroize + PartialEq> PartialEq for Sensitive<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Default + Zeroize> std::fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sensitive(****)")
    }
}

/// Request ID generator for request correlation.
///
/// Implements `MakeRequestId` from `tower-http`: an incoming `x-request-id`
/// header is preserved, otherwise a new UUIDv7 is generated. The engine's
/// request view reads the same header, so log lines from the transport and
/// from handlers share one id.
///
/// ```
/// use dispatch_engine::RequestIdGenerator;
/// use tower_http::request_id::SetRequestIdLayer;
///
/// let layer = SetRequestIdLayer::x_request_id(RequestIdGenerator);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestIdGenerator;

impl RequestIdGenerator {
    /// Generates a fresh, time-ordered request id.
    pub fn generate() -> String {
        let cx = ContextV7::new().with_additional_precision();
        Uuid::new_v7(Timestamp::now(cx)).to_string()
    }
}

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, req: &Request<B>) -> Option<RequestId> {
        match req.headers().get("x-request-id") {
            Some(value) => Some(RequestId::new(value.clone())),
            None => {
                let value = HeaderValue::from_str(&Self::generate()).ok()?;
                Some(RequestId::new(value))
            }
        }
    }
}

/// Replaces handlebars-style placeholders with environment variable values.
///
/// Patterns like `{{ VAR_NAME }}` are replaced with the value of the
/// corresponding environment variable. Unset variables become empty strings
/// and are logged as a warning.
///
/// ```
/// use dispatch_engine::replace_handlebars_with_env;
///
/// let result = replace_handlebars_with_env("port = {{ SURELY_NOT_SET_VAR }}");
/// assert_eq!(result, "port = ");
/// ```
pub fn replace_handlebars_with_env(input: &str) -> String {
    HANDLEBAR_REGEXP
        .replace_all(input, |caps: &Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!(
                    variable = %var_name,
                    "Environment variable not found, substituting with empty string"
                );
                String::new()
            })
        })
        .to_string()
}

/// Splits a `Cookie` header value into name/value pairs.
///
/// Pairs are separated by `;`, names and values by the first `=`. Fragments
/// without `=` or with an empty name are skipped, and a value wrapped in
/// double quotes is unquoted.
pub fn parse_cookie_header(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some((name, value))
    })
}

/// Decodes `application/x-www-form-urlencoded` text (query strings and form
/// bodies) into ordered name/value pairs. Pairs with an empty name are dropped.
pub fn parse_form_urlencoded(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input)
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

/// Escapes the characters that are significant in HTML text and attributes.
pub fn escape_html(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }
    let mut escaped = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Extracts the message carried by a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
