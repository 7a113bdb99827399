//! Stream Registry
//!
//! Owns the active broadcast subscriptions.
//!
//! Two duplicate policies are supported, chosen once at construction:
//!
//! | Policy | Key | Colliding subscribe | `lookup(name)` |
//! |---|---|---|---|
//! | `OverwriteByName` | event name | evicts every same-named entry | at most one |
//! | `RejectDuplicateId` | [`StreamKey`] | `RegistryError::DuplicateIdentifier` | every entry with that name |
//!
//! Under `RejectDuplicateId` an entry without an identifier is keyed by its
//! event name. That key only collides with other entries lacking an
//! identifier; `Id("light")` and an unidentified `"light"` coexist.
//!
//! Cancelling either drops matching entries (`CancelDiscipline::Remove`) or
//! keeps them with `listening = false` (`CancelDiscipline::Deactivate`).
//! Deactivated entries never receive events and never block a new subscribe
//! with the same key.

use std::sync::Arc;

use bridge_traits::EventSink;
use core_runtime::config::{CancelDiscipline, DuplicatePolicy, RegistryConfig};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RegistryError, Result};
use crate::subscription::{StreamKey, Subscription};

/// Result of a successful subscribe.
#[derive(Debug, Clone)]
pub struct Subscribed {
    /// The entry now in the registry
    pub subscription: Subscription,
    /// Same-named entries evicted to make room (overwrite policy only)
    pub evicted: usize,
}

#[derive(Debug, Default)]
pub struct StreamRegistry {
    config: RegistryConfig,
    entries: Mutex<Vec<Subscription>>,
}

impl StreamRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    /// Adds a listener for `event_name`.
    ///
    /// # Errors
    ///
    /// Under [`DuplicatePolicy::RejectDuplicateId`], returns
    /// `DuplicateIdentifier` when a listening entry already has the same
    /// [`StreamKey`]. The registry is left unchanged.
    pub fn subscribe(
        &self,
        event_name: &str,
        identifier: Option<&str>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Subscribed> {
        let subscription = Subscription::new(event_name, identifier.map(str::to_string), sink);
        let mut entries = self.entries.lock();

        let evicted = match self.config.duplicate_policy {
            DuplicatePolicy::OverwriteByName => {
                let before = entries.len();
                entries.retain(|s| s.event_name() != event_name);
                let evicted = before - entries.len();
                if evicted > 0 {
                    debug!(
                        event_name,
                        evicted, "Duplicate stream name; existing listener overwritten"
                    );
                }
                evicted
            }
            DuplicatePolicy::RejectDuplicateId => {
                let key = subscription.key();
                if entries.iter().any(|s| s.is_listening() && s.key() == key) {
                    warn!(event_name, %key, "Duplicate stream identifier rejected");
                    return Err(RegistryError::DuplicateIdentifier {
                        event_name: event_name.to_string(),
                        identifier: key.as_str().to_string(),
                    });
                }
                // Deactivated entries with this key are dead weight.
                entries.retain(|s| s.key() != key);
                0
            }
        };

        entries.push(subscription.clone());
        debug!(
            event_name,
            identifier = subscription.identifier(),
            total = entries.len(),
            "Stream subscribed"
        );

        Ok(Subscribed {
            subscription,
            evicted,
        })
    }

    /// Cancels every listening entry matching `key` and returns how many were
    /// affected. Unknown keys are a no-op.
    ///
    /// Under the overwrite policy only [`StreamKey::Name`] matches, by event
    /// name. Under the reject policy `Id` matches entries with that
    /// identifier and `Name` matches same-named entries without one.
    pub fn cancel(&self, key: StreamKey<'_>) -> usize {
        let policy = self.config.duplicate_policy;
        let is_target = |s: &Subscription| match (policy, key) {
            (DuplicatePolicy::OverwriteByName, StreamKey::Name(name)) => s.event_name() == name,
            (DuplicatePolicy::OverwriteByName, StreamKey::Id(_)) => false,
            (DuplicatePolicy::RejectDuplicateId, _) => s.key() == key,
        };

        let mut entries = self.entries.lock();
        let affected = match self.config.cancel_discipline {
            CancelDiscipline::Remove => {
                let before = entries.len();
                entries.retain(|s| !is_target(s));
                before - entries.len()
            }
            CancelDiscipline::Deactivate => {
                let mut affected = 0;
                for subscription in entries.iter_mut() {
                    if subscription.is_listening() && is_target(subscription) {
                        subscription.deactivate();
                        affected += 1;
                    }
                }
                affected
            }
        };

        debug!(%key, affected, "Stream cancelled");
        affected
    }

    /// Listening subscriptions for `event_name`, in subscribe order.
    pub fn lookup(&self, event_name: &str) -> Vec<Subscription> {
        self.entries
            .lock()
            .iter()
            .filter(|s| s.is_listening() && s.event_name() == event_name)
            .cloned()
            .collect()
    }

    /// Delivers `event` to every listener of `event_name` and returns the
    /// number of sinks written. Sinks are written after the lock is released.
    pub fn emit(&self, event_name: &str, event: Value) -> usize {
        let targets = self.lookup(event_name);
        if let Some((last, rest)) = targets.split_last() {
            for subscription in rest {
                subscription.send(event.clone());
            }
            last.send(event);
        }
        targets.len()
    }

    /// Delivers an error event to every listener of `event_name`.
    pub fn emit_error(
        &self,
        event_name: &str,
        code: &str,
        message: &str,
        details: Option<Value>,
    ) -> usize {
        let targets = self.lookup(event_name);
        for subscription in &targets {
            subscription
                .sink()
                .error(code, message, details.clone());
        }
        targets.len()
    }

    /// Snapshot of every entry, including deactivated ones.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.entries.lock().clone()
    }

    /// Removes every entry and returns them.
    pub fn clear(&self) -> Vec<Subscription> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Total entries, including deactivated ones.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn listening_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|s| s.is_listening())
            .count()
    }
}
