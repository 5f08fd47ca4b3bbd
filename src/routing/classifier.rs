//! Request classification.
//!
//! # Responsibilities
//! - Map an inbound request line to a protocol category
//! - Reject open-relay attempts and scanner noise before anything else
//!
//! # Design Decisions
//! - Ordered rules, first match wins (patterns overlap, e.g. `POST /` vs `GET /`)
//! - Fail closed: anything unrecognised is `Forbidden`
//! - Only `ManagementCommand` is ever migrated; other categories go to legacy

use axum::body::Body;
use axum::http::{Method, Request};

use crate::routing::matcher::{
    AbsoluteTargetMatcher, AnyMatcher, DenylistMatcher, ExactMatcher, Matcher,
    PathContainsMatcher, PathPrefixMatcher,
};

pub const SCEP_SEGMENT: &str = "/scep";
pub const API_PREFIX: &str = "/v1/";
pub const PUSH_PREFIX: &str = "/push/";
pub const REPO_PREFIX: &str = "/repo/";
pub const MDM_PREFIX: &str = "/mdm/";

/// Protocol category of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCategory {
    Forbidden,
    CertificateEnrollment,
    ManagementApi,
    Repository,
    Home,
    ManagementCommand,
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::Forbidden => "forbidden",
            RequestCategory::CertificateEnrollment => "scep",
            RequestCategory::ManagementApi => "api",
            RequestCategory::Repository => "repo",
            RequestCategory::Home => "home",
            RequestCategory::ManagementCommand => "mdm",
        }
    }
}

impl std::fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered rule table.
#[derive(Debug)]
pub struct Classifier {
    rules: Vec<(Box<dyn Matcher>, RequestCategory)>,
}

impl Classifier {
    pub fn new() -> Self {
        let rules: Vec<(Box<dyn Matcher>, RequestCategory)> = vec![
            (Box::new(AbsoluteTargetMatcher), RequestCategory::Forbidden),
            (
                Box::new(AnyMatcher::new(vec![
                    Box::new(DenylistMatcher),
                    Box::new(ExactMatcher::new(Method::POST, "/")),
                ])),
                RequestCategory::Forbidden,
            ),
            (
                Box::new(PathContainsMatcher::new(SCEP_SEGMENT)),
                RequestCategory::CertificateEnrollment,
            ),
            (
                Box::new(AnyMatcher::new(vec![
                    Box::new(PathPrefixMatcher::new(API_PREFIX)),
                    Box::new(PathPrefixMatcher::new(PUSH_PREFIX)),
                ])),
                RequestCategory::ManagementApi,
            ),
            (
                Box::new(ExactMatcher::new(Method::GET, "/")),
                RequestCategory::Home,
            ),
            (
                Box::new(PathPrefixMatcher::new(REPO_PREFIX)),
                RequestCategory::Repository,
            ),
            (
                Box::new(PathPrefixMatcher::new(MDM_PREFIX)),
                RequestCategory::ManagementCommand,
            ),
        ];
        Self { rules }
    }

    /// Classify a request. Pure: looks only at the request line.
    pub fn classify(&self, req: &Request<Body>) -> RequestCategory {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(req))
            .map(|(_, category)| *category)
            .unwrap_or(RequestCategory::Forbidden)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
