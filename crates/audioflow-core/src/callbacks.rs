//! Subscriber registry for transient trigger notifications.
//!
//! Detectors notify subscribers synchronously, inside the evaluation that
//! triggered. A failing subscriber must never prevent the remaining
//! subscribers from running, so each invocation's result is captured and
//! failures are reported through tracing instead of propagating.

use tracing::warn;

/// Callback invoked with `(strength, label)` when a transient fires.
///
/// `label` identifies the detection variant (`"kick"`, `"spectral_flux"`,
/// `"band_3"`, ...).
pub type OnsetCallback = Box<dyn FnMut(f32, &str) -> anyhow::Result<()> + Send>;

/// Handle returned by [`CallbackRegistry::add`], used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Ordered list of subscribers with per-subscriber failure isolation
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: u64,
    subscribers: Vec<(CallbackId, OnsetCallback)>,
    failures: u64,
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber and return its removal handle
    pub fn add(&mut self, callback: OnsetCallback) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, callback));
        id
    }

    /// Remove a previously registered subscriber. Returns `false` if the
    /// handle is unknown (already removed).
    pub fn remove(&mut self, id: CallbackId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Total number of subscriber invocations that returned an error
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Invoke every subscriber in registration order. Errors are logged
    /// and counted; dispatch always continues to the next subscriber.
    pub fn fire(&mut self, strength: f32, label: &str) {
        for (id, callback) in &mut self.subscribers {
            if let Err(e) = callback(strength, label) {
                self.failures += 1;
                warn!(
                    subscriber = id.0,
                    label,
                    strength,
                    error = %e,
                    "transient callback failed"
                );
            }
        }
    }
}
