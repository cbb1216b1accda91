use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(1000);

struct Pending {
    generation: u64,
    token: CancellationToken,
}

struct Slots<K> {
    next_generation: u64,
    pending: HashMap<K, Pending>,
}

/// Runs at most one task per key per quiet period. Scheduling under a key
/// cancels whatever was still waiting under it. Dropping the debouncer
/// cancels everything still pending.
pub struct Debouncer<K> {
    slots: Arc<Mutex<Slots<K>>>,
}

impl<K> Default for Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_generation: 0,
                pending: HashMap::new(),
            })),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: K, delay: Duration, task: F) -> CancellationToken
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = {
            let mut slots = lock(&self.slots);
            slots.next_generation += 1;
            let generation = slots.next_generation;
            if let Some(previous) = slots.pending.insert(
                key.clone(),
                Pending {
                    generation,
                    token: token.clone(),
                },
            ) {
                previous.token.cancel();
            }
            generation
        };

        let slots = Arc::clone(&self.slots);
        let guard = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {
                    debug!(generation, "debounced task cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    let current = {
                        let mut slots = lock(&slots);
                        match slots.pending.get(&key) {
                            Some(pending) if pending.generation == generation => {
                                slots.pending.remove(&key);
                                true
                            }
                            _ => false,
                        }
                    };
                    if current && !guard.is_cancelled() {
                        task.await;
                    }
                }
            }
        });

        token
    }

    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.slots).pending.remove(key) {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.slots).pending.contains_key(key)
    }
}

impl<K> Debouncer<K> {
    pub fn cancel_all(&self) {
        for (_, pending) in lock(&self.slots).pending.drain() {
            pending.token.cancel();
        }
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
