//! Keyed debounce timers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Pending {
  ticket: u64,
  handle: JoinHandle<()>,
}

/// At most one delayed task per key. Scheduling again for a key cancels the
/// task that was waiting and starts the delay over.
///
/// Once a task's delay has elapsed it leaves the pending map before it runs,
/// so a later reschedule never cancels work that has already started.
pub struct Debouncer<K> {
  pending: Arc<Mutex<HashMap<K, Pending>>>,
  next_ticket: AtomicU64,
}

impl<K> Debouncer<K>
where
  K: Eq + Hash + Clone + Send + 'static,
{
  pub fn new() -> Self {
    Self {
      pending: Arc::new(Mutex::new(HashMap::new())),
      next_ticket: AtomicU64::new(0),
    }
  }

  /// Run `task` after `delay` unless `key` is scheduled again first.
  pub fn schedule<F>(&self, key: K, delay: Duration, task: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
    let pending = Arc::clone(&self.pending);
    let own_key = key.clone();

    let mut map = self.pending.lock();
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;

      let still_current = {
        let mut map = pending.lock();
        match map.get(&own_key) {
          Some(p) if p.ticket == ticket => {
            map.remove(&own_key);
            true
          }
          _ => false,
        }
      };
      if still_current {
        task.await;
      }
    });

    if let Some(previous) = map.insert(key, Pending { ticket, handle }) {
      previous.handle.abort();
    }
  }

  pub fn is_pending(&self, key: &K) -> bool {
    self.pending.lock().contains_key(key)
  }

  /// Number of keys still waiting on their delay.
  pub fn pending(&self) -> usize {
    self.pending.lock().len()
  }
}

impl<K> Default for Debouncer<K>
where
  K: Eq + Hash + Clone + Send + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
