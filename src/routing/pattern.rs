use {
    crate::{Error, Result},
    std::{fmt, str::FromStr},
};

/// A URL pattern as used in `[[routes]]` and `[[filters]]`.
///
/// Three forms are supported:
///
/// | Pattern      | Matches                                        |
/// |--------------|------------------------------------------------|
/// | `/*`         | every path                                     |
/// | `/prefix/*`  | `/prefix` itself and anything under `/prefix/` |
/// | `/exact`     | only `/exact`                                  |
///
/// Matching is done against the request path only (never the query string)
/// and is case-sensitive. There are no regular expressions, extension
/// patterns or mid-path wildcards.
///
/// ```
/// use dispatch_engine::UrlPattern;
///
/// let pattern: UrlPattern = "/admin/*".parse().unwrap();
/// assert!(pattern.matches("/admin"));
/// assert!(pattern.matches("/admin/users"));
/// assert!(!pattern.matches("/administrator"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UrlPattern {
    /// `/*`
    Any,
    /// `/prefix/*`, stored without the trailing `/*`.
    Prefix(String),
    /// A literal path.
    Exact(String),
}

impl UrlPattern {
    /// Returns true when `path` is matched by this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            UrlPattern::Any => true,
            UrlPattern::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            UrlPattern::Exact(exact) => path == exact,
        }
    }
}

impl FromStr for UrlPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if !s.starts_with('/') {
            return Err(Error::invalid_input(format!(
                "URL pattern {s:?} must start with '/'"
            )));
        }
        if s == "/*" {
            return Ok(UrlPattern::Any);
        }
        if let Some(prefix) = s.strip_suffix("/*") {
            if prefix.contains('*') {
                return Err(Error::invalid_input(format!(
                    "URL pattern {s:?} may only contain '*' as a trailing \"/*\""
                )));
            }
            return Ok(UrlPattern::Prefix(prefix.to_string()));
        }
        if s.contains('*') {
            return Err(Error::invalid_input(format!(
                "URL pattern {s:?} may only contain '*' as a trailing \"/*\""
            )));
        }
        Ok(UrlPattern::Exact(s.to_string()))
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Any => write!(f, "/*"),
            UrlPattern::Prefix(prefix) => write!(f, "{prefix}/*"),
            UrlPattern::Exact(exact) => write!(f, "{exact}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use proptest::prelude::*;

    fn p(s: &str) -> UrlPattern {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(p("/*"), UrlPattern::Any);
        assert_eq!(p("/admin/*"), UrlPattern::Prefix("/admin".into()));
        assert_eq!(p("/login"), UrlPattern::Exact("/login".into()));
        assert_eq!(p("/"), UrlPattern::Exact("/".into()));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "login", "*", "/a/*/b", "/a*", "/*/*", "*.jsp"] {
            let err = bad.parse::<UrlPattern>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{bad:?}");
        }
    }

    #[test]
    fn test_exact_matching() {
        let pattern = p("/hello");
        assert!(pattern.matches("/hello"));
        assert!(!pattern.matches("/hello/"));
        assert!(!pattern.matches("/hello/world"));
        assert!(!pattern.matches("/Hello"));
        assert!(!pattern.matches("/hellothere"));
    }

    #[test]
    fn test_prefix_matching() {
        let pattern = p("/admin/*");
        assert!(pattern.matches("/admin"));
        assert!(pattern.matches("/admin/"));
        assert!(pattern.matches("/admin/users/42"));
        assert!(!pattern.matches("/administrator"));
        assert!(!pattern.matches("/"));
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let pattern = p("/*");
        assert!(pattern.matches("/"));
        assert!(pattern.matches("/anything/at/all"));
        assert!(pattern.matches(""));
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["/*", "/admin/*", "/login", "/"] {
            assert_eq!(p(s).to_string(), s);
        }
    }

    proptest! {
        #[test]
        fn wildcard_matches_any_path(path in "/[a-z0-9/._-]{0,30}") {
            prop_assert!(UrlPattern::Any.matches(&path));
        }

        #[test]
        fn exact_pattern_matches_only_itself(
            a in "/[a-z0-9]{1,10}",
            b in "/[a-z0-9]{1,10}"
        ) {
            let pattern = p(&a);
            prop_assert!(pattern.matches(&a));
            prop_assert_eq!(pattern.matches(&b), a == b);
        }

        #[test]
        fn prefix_pattern_matches_descendants(
            prefix in "/[a-z]{1,8}",
            rest in "(/[a-z0-9]{0,6}){0,3}"
        ) {
            let pattern = p(&format!("{prefix}/*"));
            let path = format!("{prefix}{rest}");
            prop_assert!(pattern.matches(&path));
        }

        #[test]
        fn prefix_pattern_requires_segment_boundary(
            prefix in "/[a-z]{1,8}",
            tail in "[a-z0-9]{1,6}"
        ) {
            let pattern = p(&format!("{prefix}/*"));
            let path = format!("{prefix}{tail}");
            prop_assert!(!pattern.matches(&path));
        }
    }
}
