//! Pluggable, pure, thread-safe load-balancer policies (spec §4.5).

use crate::registry::ServiceInstance;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The request-scoped key used by selection-sensitive policies
/// (`Rendezvous`); ignored by the others. Typically the service name or a
/// request/session identifier the caller wants consistently routed.
#[derive(Debug, Clone)]
pub struct SelectionKey(String);

impl SelectionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerPolicyKind {
    RoundRobin,
    Random,
    WeightedRandom,
    Rendezvous,
}

impl LoadBalancerPolicyKind {
    pub fn build(self) -> Arc<dyn LoadBalancerPolicy> {
        match self {
            LoadBalancerPolicyKind::RoundRobin => Arc::new(RoundRobinPolicy::default()),
            LoadBalancerPolicyKind::Random => Arc::new(RandomPolicy),
            LoadBalancerPolicyKind::WeightedRandom => Arc::new(WeightedRandomPolicy),
            LoadBalancerPolicyKind::Rendezvous => Arc::new(RendezvousPolicy),
        }
    }
}

pub trait LoadBalancerPolicy: Send + Sync {
    fn select<'a>(&self, key: &SelectionKey, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance>;
}

/// Per-call-site monotonic counter mod N; ties broken by instance list
/// order. One counter is shared across every service name selected through
/// the same policy instance, which is fine since callers build a fresh
/// policy per `LoadBalancerPolicyKind::build` call in practice.
#[derive(Default)]
pub struct RoundRobinPolicy {
    counter: AtomicU64,
}

impl LoadBalancerPolicy for RoundRobinPolicy {
    fn select<'a>(&self, _key: &SelectionKey, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) as usize % instances.len();
        instances.get(index)
    }
}

pub struct RandomPolicy;

impl LoadBalancerPolicy for RandomPolicy {
    fn select<'a>(&self, _key: &SelectionKey, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        use rand::Rng;
        let index = rand::thread_rng().gen_range(0..instances.len());
        instances.get(index)
    }
}

/// Reads an integer `weight` from instance metadata (default/invalid -> 1)
/// and selects by a cumulative-weight interval.
pub struct WeightedRandomPolicy;

fn weight_of(metadata: &HashMap<String, String>) -> u64 {
    metadata.get("weight").and_then(|w| w.parse::<u64>().ok()).filter(|w| *w > 0).unwrap_or(1)
}

impl LoadBalancerPolicy for WeightedRandomPolicy {
    fn select<'a>(&self, _key: &SelectionKey, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let total: u64 = instances.iter().map(|i| weight_of(&i.metadata)).sum();
        use rand::Rng;
        let mut pick = rand::thread_rng().gen_range(0..total.max(1));
        for instance in instances {
            let weight = weight_of(&instance.metadata);
            if pick < weight {
                return Some(instance);
            }
            pick -= weight;
        }
        instances.last()
    }
}

/// Rendezvous (highest random weight) hashing: for request key `k` and each
/// instance `i`, scores `h(k || i.instance_id)` and picks the max scorer.
/// Hash = first 8 bytes of MD5 read as a big-endian `u64`; ties broken by
/// first-seen order. Adding/removing one instance reassigns only ~1/N of
/// keys, unlike mod-N hashing.
pub struct RendezvousPolicy;

fn rendezvous_score(key: &str, instance_id: &str) -> u64 {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    hasher.update(instance_id.as_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[0..8].try_into().expect("md5 digest is at least 8 bytes"))
}

impl LoadBalancerPolicy for RendezvousPolicy {
    fn select<'a>(&self, key: &SelectionKey, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        instances
            .iter()
            .enumerate()
            .max_by_key(|(order, instance)| (rendezvous_score(key.as_str(), &instance.instance_id), std::cmp::Reverse(*order)))
            .map(|(_, instance)| instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances(n: usize) -> Vec<ServiceInstance> {
        (0..n).map(|i| ServiceInstance::new("svc-a", format!("svc-a-{i}"), "h", 8080)).collect()
    }

    #[test]
    fn round_robin_cycles_through_every_instance() {
        let policy = RoundRobinPolicy::default();
        let pool = instances(3);
        let key = SelectionKey::new("svc-a");
        let picks: Vec<_> = (0..6).map(|_| policy.select(&key, &pool).unwrap().instance_id.clone()).collect();
        assert_eq!(picks, vec!["svc-a-0", "svc-a-1", "svc-a-2", "svc-a-0", "svc-a-1", "svc-a-2"]);
    }

    #[test]
    fn weighted_random_never_picks_a_zero_weight_entry_alone() {
        let policy = WeightedRandomPolicy;
        let pool = vec![
            ServiceInstance::new("svc-a", "heavy", "h", 8080).with_metadata("weight", "1000"),
            ServiceInstance::new("svc-a", "light", "h", 8080).with_metadata("weight", "not-a-number"),
        ];
        let key = SelectionKey::new("svc-a");
        let mut heavy_hits = 0;
        for _ in 0..200 {
            if policy.select(&key, &pool).unwrap().instance_id == "heavy" {
                heavy_hits += 1;
            }
        }
        assert!(heavy_hits > 150, "heavy instance should dominate selection, got {heavy_hits}/200");
    }

    #[test]
    fn rendezvous_is_deterministic_for_a_fixed_key_and_pool() {
        let policy = RendezvousPolicy;
        let pool = instances(5);
        let key = SelectionKey::new("request-42");
        let first = policy.select(&key, &pool).unwrap().instance_id.clone();
        let second = policy.select(&key, &pool).unwrap().instance_id.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn rendezvous_minimal_disruption_under_one_removal() {
        let policy = RendezvousPolicy;
        let pool = instances(20);
        let sample_keys: Vec<_> = (0..500).map(|i| SelectionKey::new(format!("key-{i}"))).collect();

        let before: Vec<_> = sample_keys.iter().map(|k| policy.select(k, &pool).unwrap().instance_id.clone()).collect();

        let reduced: Vec<_> = pool[1..].to_vec();
        let after: Vec<_> = sample_keys.iter().map(|k| policy.select(k, &reduced).unwrap().instance_id.clone()).collect();

        let reassigned = before.iter().zip(after.iter()).filter(|(a, b)| a != b).count();
        let bound = sample_keys.len() / pool.len() + sample_keys.len() / 10;
        assert!(reassigned <= bound, "reassigned {reassigned} keys, expected at most {bound}");
    }
}
