//! Deduplicates concurrent L2 lookups for the same key (spec §4.4
//! "Concurrency"): the first caller for a key performs the backend call;
//! every other concurrent caller for that key awaits the same result instead
//! of issuing a redundant request, mirroring `spark-switch`'s use of
//! `dashmap` for concurrent registry access.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use tokio::sync::broadcast;

pub struct SingleFlight {
    inflight: DashMap<String, broadcast::Sender<Option<Vec<u8>>>>,
}

enum Role {
    Leader(broadcast::Sender<Option<Vec<u8>>>),
    Follower(broadcast::Receiver<Option<Vec<u8>>>),
}

impl SingleFlight {
    pub fn new() -> Self {
        Self { inflight: DashMap::new() }
    }

    /// Runs `op` for `key` if no call for that key is already in flight;
    /// otherwise awaits the in-flight call's result. All waiters receive the
    /// same value. The check-or-register step happens under the `DashMap`
    /// shard lock (`entry`) so two concurrent misses can never both become
    /// leaders for the same key.
    pub async fn run<F, Fut>(&self, key: &str, op: F) -> Option<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Vec<u8>>>,
    {
        let role = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(entry) => Role::Follower(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (sender, _) = broadcast::channel(1);
                entry.insert(sender.clone());
                Role::Leader(sender)
            }
        };

        match role {
            Role::Leader(sender) => {
                let result = op().await;
                self.inflight.remove(key);
                let _ = sender.send(result.clone());
                result
            }
            Role::Follower(mut receiver) => receiver.recv().await.unwrap_or(None),
        }
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}
