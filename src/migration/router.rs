//! Deterministic per-device routing.
//!
//! A device's bucket is `crc32(udid) % 100`. The bucket never changes for a
//! given identifier, so raising the percentage only ever moves devices from
//! legacy to new, and lowering it moves them back.

use serde::Serialize;

use crate::migration::policy::MigrationPolicy;

/// Number of rollout buckets.
pub const BUCKETS: u32 = 100;

/// Which backend serves a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteDecision {
    Legacy,
    New,
}

impl RouteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::Legacy => "legacy",
            RouteDecision::New => "new",
        }
    }
}

impl std::fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable bucket in `[0, 100)` for an identifier.
///
/// IEEE CRC-32 carries no per-process seed, so buckets survive restarts.
pub fn bucket(identifier: &str) -> u32 {
    crc32fast::hash(identifier.as_bytes()) % BUCKETS
}

/// Decide the backend for a device under the given policy.
pub fn route(identifier: &str, policy: &MigrationPolicy) -> RouteDecision {
    if policy.included.contains(identifier) {
        return RouteDecision::New;
    }
    if bucket(identifier) < u32::from(policy.percentage.get()) {
        RouteDecision::New
    } else {
        RouteDecision::Legacy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::policy::Percentage;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn policy(included: &[&str], percentage: i64) -> MigrationPolicy {
        MigrationPolicy::new(
            included.iter().copied(),
            Percentage::try_from(percentage).unwrap(),
        )
    }

    #[test]
    fn bucket_is_stable_across_runs() {
        // CRC-32 (IEEE) of "123456789" is 0xCBF43926.
        assert_eq!(bucket("123456789"), 0xCBF4_3926 % 100);
    }

    #[test]
    fn boundaries() {
        let zero = policy(&[], 0);
        let full = policy(&[], 100);
        for i in 0..1000 {
            let id = format!("device-{i}");
            assert_eq!(route(&id, &zero), RouteDecision::Legacy);
            assert_eq!(route(&id, &full), RouteDecision::New);
        }
    }

    #[test]
    fn distribution_tracks_percentage() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let ids: Vec<String> = (0..100_000)
            .map(|_| {
                let bytes: [u8; 16] = rng.gen();
                bytes.iter().map(|b| format!("{b:02X}")).collect()
            })
            .collect();

        for p in [1, 10, 25, 50, 75, 99] {
            let policy = policy(&[], p);
            let migrated = ids
                .iter()
                .filter(|id| route(id, &policy) == RouteDecision::New)
                .count();
            let observed = migrated as f64 / ids.len() as f64;
            let expected = p as f64 / 100.0;
            assert!(
                (observed - expected).abs() < 0.01,
                "p={p}: observed {observed}, expected {expected}"
            );
        }
    }

    proptest! {
        #[test]
        fn deterministic(id in "[A-Za-z0-9-]{1,40}", p in 0i64..=100) {
            let policy = policy(&[], p);
            prop_assert_eq!(route(&id, &policy), route(&id, &policy));
        }

        #[test]
        fn explicit_member_always_new(id in "[A-Za-z0-9-]{1,40}", p in 0i64..=100) {
            let policy = policy(&[id.as_str()], p);
            prop_assert_eq!(route(&id, &policy), RouteDecision::New);
        }

        #[test]
        fn monotonic_in_percentage(id in "[A-Za-z0-9-]{1,40}", a in 0i64..=100, b in 0i64..=100) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            if route(&id, &policy(&[], lo)) == RouteDecision::New {
                prop_assert_eq!(route(&id, &policy(&[], hi)), RouteDecision::New);
            }
        }
    }
}
