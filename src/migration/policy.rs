//! Migration policy and its concurrency-safe store.
//!
//! # Responsibilities
//! - Hold the set of explicitly migrated devices and the rollout percentage
//! - Answer "is this device migrated?" for any number of concurrent requests
//! - Apply admin updates atomically (readers never see a half-updated policy)
//!
//! # Design Decisions
//! - One `RwLock` guards both fields so updates are all-or-nothing
//! - The identifier set is replaced wholesale, never merged
//! - Nothing is persisted: a restart reverts to startup configuration

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;

use crate::migration::router::{route, RouteDecision};

/// Errors produced when mutating the policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Percentage outside `[0, 100]`.
    #[error("percentage {0} is out of range, must be between 0 and 100")]
    InvalidRange(i64),
}

/// Rollout fraction for devices not explicitly listed. Always within `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const FULL: Percentage = Percentage(100);

    /// Get the raw value.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Percentage {
    type Error = PolicyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=100).contains(&value) {
            Ok(Percentage(value as u8))
        } else {
            Err(PolicyError::InvalidRange(value))
        }
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Which devices are served by the new backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPolicy {
    /// Devices that are always migrated, regardless of percentage.
    pub included: HashSet<String>,
    /// Rollout fraction for everyone else.
    pub percentage: Percentage,
}

impl MigrationPolicy {
    pub fn new<I, S>(included: I, percentage: Percentage) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            included: included.into_iter().map(Into::into).collect(),
            percentage,
        }
    }
}

/// In-memory policy store shared by every request handler.
#[derive(Debug, Default)]
pub struct PolicyStore {
    inner: RwLock<MigrationPolicy>,
}

impl PolicyStore {
    pub fn new(initial: MigrationPolicy) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    /// Route a device against the current policy (shared lock).
    pub fn decide(&self, identifier: &str) -> RouteDecision {
        let policy = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        route(identifier, &policy)
    }

    /// Returns true if the device should be served by the new backend.
    pub fn is_migrated(&self, identifier: &str) -> bool {
        self.decide(identifier) == RouteDecision::New
    }

    /// Replace the rollout percentage. Out-of-range values leave the policy untouched.
    pub fn set_percentage(&self, value: i64) -> Result<Percentage, PolicyError> {
        let percentage = Percentage::try_from(value)?;
        let mut policy = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        policy.percentage = percentage;
        Ok(percentage)
    }

    /// Replace the whole explicit-inclusion set. Returns the new set size.
    pub fn replace_identifier_set<I, S>(&self, identifiers: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // Built outside the lock so writers hold it only for the swap.
        let included: HashSet<String> = identifiers.into_iter().map(Into::into).collect();
        let count = included.len();
        let mut policy = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        policy.included = included;
        count
    }

    /// A consistent copy of the current policy.
    pub fn snapshot(&self) -> MigrationPolicy {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
