//! Reference sensor for desktop hosts and tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bridge_traits::{InitializationTrigger, SensorCapability, SensorInitializer};
use parking_lot::Mutex;
use tracing::debug;

/// Observable state of an [`InMemorySensor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    pub running: bool,
    pub enabled: bool,
    pub label: Option<String>,
    pub start_count: usize,
    pub stop_count: usize,
    /// `force` flag of every sync, oldest first
    pub syncs: Vec<bool>,
}

/// A sensor that samples nothing and remembers every control call.
#[derive(Debug, Default)]
pub struct InMemorySensor {
    state: Mutex<SensorSnapshot>,
}

impl InMemorySensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        self.state.lock().clone()
    }
}

impl SensorCapability for InMemorySensor {
    fn start(&self) {
        let mut state = self.state.lock();
        state.running = true;
        state.start_count += 1;
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        state.stop_count += 1;
    }

    fn sync(&self, force: bool) {
        self.state.lock().syncs.push(force);
    }

    fn enable(&self) {
        self.state.lock().enabled = true;
    }

    fn disable(&self) {
        self.state.lock().enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    fn set_label(&self, label: &str) {
        self.state.lock().label = Some(label.to_string());
    }
}

/// Hands out one shared [`InMemorySensor`] and counts how often it was asked.
#[derive(Debug, Default)]
pub struct InMemoryInitializer {
    sensor: Arc<InMemorySensor>,
    calls: AtomicUsize,
}

impl InMemoryInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sensor this initializer produces.
    pub fn sensor(&self) -> Arc<InMemorySensor> {
        Arc::clone(&self.sensor)
    }

    /// Number of construction requests received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SensorInitializer for InMemoryInitializer {
    fn initialize_sensor(
        &self,
        trigger: InitializationTrigger<'_>,
    ) -> Option<Arc<dyn SensorCapability>> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match trigger {
            InitializationTrigger::Registration => debug!(calls, "Sensor built at registration"),
            InitializationTrigger::MethodCall(call) => {
                debug!(calls, method = %call.method, "Sensor built on demand")
            }
        }
        Some(self.sensor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::MethodCall;

    #[test]
    fn test_sensor_records_calls() {
        let sensor = InMemorySensor::new();
        sensor.start();
        sensor.enable();
        sensor.sync(true);
        sensor.sync(false);
        sensor.set_label("walking");
        sensor.stop();

        let snapshot = sensor.snapshot();
        assert!(!snapshot.running);
        assert!(snapshot.enabled);
        assert!(sensor.is_enabled());
        assert_eq!(snapshot.label.as_deref(), Some("walking"));
        assert_eq!(snapshot.syncs, vec![true, false]);
        assert_eq!((snapshot.start_count, snapshot.stop_count), (1, 1));

        sensor.disable();
        assert!(!sensor.is_enabled());
    }

    #[test]
    fn test_initializer_shares_one_sensor() {
        let initializer = InMemoryInitializer::new();
        let call = MethodCall::new("start");

        let first = initializer
            .initialize_sensor(InitializationTrigger::MethodCall(&call))
            .unwrap();
        first.enable();
        let second = initializer
            .initialize_sensor(InitializationTrigger::Registration)
            .unwrap();

        assert!(second.is_enabled());
        assert!(initializer.sensor().snapshot().enabled);
        assert_eq!(initializer.calls(), 2);
    }
}
