//! Coalescing of concurrent cache misses.
//!
//! The first caller to miss on a key becomes the leader and registers a
//! shared future; callers arriving while it is pending await the same
//! future instead of starting their own upstream fetch.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

type SharedFetch<T> = Shared<BoxFuture<'static, T>>;

/// How a caller took part in a coalesced fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

pub struct InFlight<T: Clone> {
    pending: Arc<DashMap<String, (u64, SharedFetch<T>)>>,
    tickets: Arc<AtomicU64>,
}

impl<T: Clone> Clone for InFlight<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            tickets: Arc::clone(&self.tickets),
        }
    }
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the pending fetch for `key`, or start one with `start`.
    ///
    /// `start` is only invoked by the leader. The registration is released
    /// when the leader finishes or is dropped; followers already holding the
    /// shared future keep driving it to completion.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> (T, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (fetch, role, _guard) = match self.pending.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().1.clone(), Role::Follower, None),
            Entry::Vacant(entry) => {
                let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                let fetch = start().boxed().shared();
                entry.insert((ticket, fetch.clone()));
                let guard = InFlightGuard {
                    key: key.to_string(),
                    ticket,
                    pending: Arc::clone(&self.pending),
                };
                (fetch, Role::Leader, Some(guard))
            }
        };

        (fetch.await, role)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Detach the pending fetch for `key` so later callers start afresh.
    pub fn forget(&self, key: &str) {
        self.pending.remove(key);
    }
}

struct InFlightGuard<T: Clone> {
    key: String,
    ticket: u64,
    pending: Arc<DashMap<String, (u64, SharedFetch<T>)>>,
}

impl<T: Clone> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        // A newer leader may own the slot after `forget`; leave it alone.
        self.pending
            .remove_if(&self.key, |_, (ticket, _)| *ticket == self.ticket);
    }
}
