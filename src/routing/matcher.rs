//! Request matching primitives used by the classifier.
//!
//! # Design Decisions
//! - Path matching is case-sensitive, except for the scanner denylist
//! - No regex to guarantee O(n) matching
//! - Matchers are composable (AnyOf) and evaluated in a fixed order by the caller

use axum::body::Body;
use axum::http::{Method, Request, Version};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches requests whose target names a host (absolute-form or authority-form).
///
/// HTTP/2 always carries `:authority`, so only HTTP/1.x request lines count.
#[derive(Debug, Clone, Default)]
pub struct AbsoluteTargetMatcher;

impl Matcher for AbsoluteTargetMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.version() <= Version::HTTP_11 && req.uri().authority().is_some()
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.uri().path().starts_with(&self.prefix)
    }
}

/// Matches when the path contains a segment anywhere.
#[derive(Debug, Clone)]
pub struct PathContainsMatcher {
    needle: String,
}

impl PathContainsMatcher {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

impl Matcher for PathContainsMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.uri().path().contains(&self.needle)
    }
}

/// Matches an exact method and path.
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    method: Method,
    path: String,
}

impl ExactMatcher {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl Matcher for ExactMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        *req.method() == self.method && req.uri().path() == self.path
    }
}

/// Path fragments only ever requested by scanners and exploit kits.
const DENIED_SUBSTRINGS: &[&str] = &[
    "/.git",
    "/.svn",
    "/.hg",
    "/.env",
    "/.aws",
    "/.ssh",
    "/.ds_store",
    "/wp-",
    "/cgi-bin",
    "/phpmyadmin",
    "/actuator",
    "/boaform",
    "/hnap1",
    "/vendor/phpunit",
    "/autodiscover",
    "/owa/",
];

/// File extensions (of the last path segment) for config, script and template files.
const DENIED_EXTENSIONS: &[&str] = &[
    "php", "asp", "aspx", "jsp", "cgi", "pl", "py", "sh", "env", "yml", "yaml", "ini",
    "conf", "cfg", "toml", "bak", "sql", "tpl", "twig", "erb", "ejs",
];

/// Matches known scanner noise. Case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct DenylistMatcher;

impl DenylistMatcher {
    pub fn is_denied(path: &str) -> bool {
        let path = path.to_ascii_lowercase();
        if DENIED_SUBSTRINGS.iter().any(|s| path.contains(s)) {
            return true;
        }

        let last_segment = path.rsplit('/').next().unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((_, ext)) => DENIED_EXTENSIONS.contains(&ext),
            None => false,
        }
    }
}

impl Matcher for DenylistMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        Self::is_denied(req.uri().path())
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.iter().any(|m| m.matches(req))
    }
}
