//! Per-document debounced scheduling.
//!
//! Every `schedule` call for a key cancels the pending task for that key.
//! Only the last task scheduled within the delay window runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` after the delay unless `key` is rescheduled first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: &str, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let owned_key = key.to_string();

        // Hold the lock across spawn so the task cannot finish before it is registered.
        let mut guard = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = {
                let mut pending = pending.lock();
                match pending.get(&owned_key) {
                    Some(entry) if entry.generation == generation => {
                        pending.remove(&owned_key);
                        true
                    }
                    _ => false,
                }
            };
            if current {
                trace!(key = %owned_key, generation, "debounced task running");
                task();
            }
        });

        if let Some(previous) = guard.insert(key.to_string(), Pending { generation, handle }) {
            previous.handle.abort();
            debug!(key, generation, "rescheduled pending task");
        }
    }

    /// Cancel the pending task for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.pending.lock().remove(key) {
            Some(previous) => {
                previous.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Number of keys with a pending task.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for (_, pending) in self.pending.lock().drain() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&count);
        let make = move || {
            let shared = Arc::clone(&shared);
            Box::new(move || {
                shared.fetch_add(1, Ordering::SeqCst);
            }) as Box<dyn FnOnce() + Send>
        };
        (count, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_schedule_runs() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let (count, make) = counter();

        for _ in 0..5 {
            debouncer.schedule("doc", make());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(debouncer.pending(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let (count, make) = counter();

        debouncer.schedule("a", make());
        debouncer.schedule("b", make());
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let (count, make) = counter();

        debouncer.schedule("doc", make());
        assert!(debouncer.cancel("doc"));
        assert!(!debouncer.cancel("doc"));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
