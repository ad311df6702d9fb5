use homemon_common::types::ChangeKind;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// One edge observation: the subject's value and what it was compared
/// against at that instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub current_value: f64,
    pub compare_to: f64,
}

/// Debounce state key: canonical rule identity plus the change kind.
pub type Key = (String, ChangeKind);

struct Pending {
    first: Observation,
    last: Observation,
    epoch: u64,
    timer: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<Key, Pending>>>;

fn lock(map: &PendingMap) -> MutexGuard<'_, HashMap<Key, Pending>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Trailing-edge debounce with hysteresis, one window per (rule, change
/// kind).
///
/// Every observation resets the countdown to `stable_seconds` after the
/// most recent observation. When the quiet period finally elapses, the
/// window fires: the alert is confirmed only when the change kind's
/// predicate held at both the first and the last observation of the window,
/// i.e. the crossing did not revert partway through. A negative decision is
/// a normal bounce and discards the window silently.
///
/// Only `first` and `last` are kept; the intermediate observations do not
/// influence the decision.
#[derive(Default)]
pub struct DebounceAccumulator {
    pending: PendingMap,
    epochs: AtomicU64,
}

impl DebounceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observation under `(rule_key, change)` and (re)schedules
    /// the quiet-period timer. `on_confirmed` runs with the last
    /// observation iff the window fires with a positive decision.
    ///
    /// Must be called from within a tokio runtime.
    pub fn observe<F, Fut>(
        &self,
        rule_key: String,
        change: ChangeKind,
        stable_seconds: u64,
        observation: Observation,
        on_confirmed: F,
    ) where
        F: FnOnce(Observation) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key: Key = (rule_key, change);
        let epoch = self.epochs.fetch_add(1, Ordering::Relaxed);

        let mut pending = lock(&self.pending);
        // A window that is already open keeps its first observation; only
        // the countdown restarts.
        let first = match pending.remove(&key) {
            Some(open) => {
                open.timer.abort();
                open.first
            }
            None => observation,
        };

        let map = Arc::clone(&self.pending);
        let task_key = key.clone();
        let timer = tokio::spawn(async move {
            sleep(Duration::from_secs(stable_seconds)).await;
            let window = {
                let mut pending = lock(&map);
                // The epoch guards against a reset that raced with this
                // wakeup: if someone replaced the window after the sleep
                // completed, it is theirs to fire, not ours.
                let ours = pending
                    .get(&task_key)
                    .is_some_and(|open| open.epoch == epoch);
                if ours {
                    pending.remove(&task_key)
                } else {
                    None
                }
            };
            let Some(window) = window else {
                return;
            };
            let stable = change.is_active(window.first.current_value, window.first.compare_to)
                && change.is_active(window.last.current_value, window.last.compare_to);
            if stable {
                on_confirmed(window.last).await;
            } else {
                tracing::debug!(change = %change, "edge bounced, discarding window");
            }
        });

        pending.insert(
            key,
            Pending {
                first,
                last: observation,
                epoch,
                timer,
            },
        );
    }

    /// Drops every pending window belonging to `rule_key`, cancelling the
    /// timers so a deleted rule can no longer fire.
    pub fn cancel_rule(&self, rule_key: &str) {
        let mut pending = lock(&self.pending);
        pending.retain(|(key, _), open| {
            if key.as_str() == rule_key {
                open.timer.abort();
                false
            } else {
                true
            }
        });
    }

    /// Number of currently open windows.
    pub fn pending_windows(&self) -> usize {
        lock(&self.pending).len()
    }
}
