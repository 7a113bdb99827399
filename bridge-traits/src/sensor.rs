//! Sensor Capability and Plugin Hooks
//!
//! The bridge never samples, persists or negotiates permissions itself; it
//! delegates every domain operation to a [`SensorCapability`] supplied by the
//! concrete plugin.

use std::sync::Arc;

use crate::{channel::MethodCall, platform::PlatformSendSync};

/// The wrapped sensor.
///
/// Implementations are shared between the control channel and whatever
/// background context samples data, so every method takes `&self`.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::sensor::SensorCapability;
///
/// fn restart(sensor: &dyn SensorCapability) {
///     sensor.stop();
///     sensor.start();
/// }
/// ```
pub trait SensorCapability: PlatformSendSync {
    fn start(&self);

    fn stop(&self);

    /// Push buffered readings upstream; `force` ignores sync conditions
    fn sync(&self, force: bool);

    fn enable(&self);

    fn disable(&self);

    fn is_enabled(&self) -> bool;

    fn set_label(&self, label: &str);
}

/// Hooks run around every method-channel call.
///
/// Both hooks receive the same call and run exactly once per dispatch,
/// including calls the bridge does not recognise. Use them to add
/// plugin-specific behaviour before or after the built-in handling.
pub trait MethodHandler: PlatformSendSync {
    fn begin_method_handle(&self, _call: &MethodCall) {}

    fn end_method_handle(&self, _call: &MethodCall) {}
}

/// What caused a sensor construction attempt.
#[derive(Debug, Clone, Copy)]
pub enum InitializationTrigger<'a> {
    /// Eager construction while the bridge registers with the host
    Registration,
    /// Lazy construction on the first call that needs the sensor
    MethodCall(&'a MethodCall),
}

/// Factory for the plugin's sensor.
///
/// Lets the plugin apply sensor configuration at construction time. Returning
/// `None` leaves the bridge without a capability; a lazy bridge will ask again
/// on the next call.
pub trait SensorInitializer: PlatformSendSync {
    fn initialize_sensor(
        &self,
        trigger: InitializationTrigger<'_>,
    ) -> Option<Arc<dyn SensorCapability>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub Sensor {}

        impl SensorCapability for Sensor {
            fn start(&self);
            fn stop(&self);
            fn sync(&self, force: bool);
            fn enable(&self);
            fn disable(&self);
            fn is_enabled(&self) -> bool;
            fn set_label(&self, label: &str);
        }
    }

    struct NoopHooks;

    impl MethodHandler for NoopHooks {}

    #[test]
    fn test_capability_is_object_safe() {
        let mut sensor = MockSensor::new();
        sensor.expect_is_enabled().times(1).return_const(true);
        sensor
            .expect_set_label()
            .withf(|label: &str| label == "walk")
            .times(1)
            .return_const(());

        let sensor: Arc<dyn SensorCapability> = Arc::new(sensor);
        assert!(sensor.is_enabled());
        sensor.set_label("walk");
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let hooks = NoopHooks;
        let call = MethodCall::new("start");
        hooks.begin_method_handle(&call);
        hooks.end_method_handle(&call);
    }

    #[test]
    fn test_initializer_sees_trigger() {
        struct OnlyOnCall;

        impl SensorInitializer for OnlyOnCall {
            fn initialize_sensor(
                &self,
                trigger: InitializationTrigger<'_>,
            ) -> Option<Arc<dyn SensorCapability>> {
                match trigger {
                    InitializationTrigger::Registration => None,
                    InitializationTrigger::MethodCall(_) => {
                        let mut sensor = MockSensor::new();
                        sensor.expect_is_enabled().return_const(false);
                        Some(Arc::new(sensor))
                    }
                }
            }
        }

        let init = OnlyOnCall;
        assert!(init
            .initialize_sensor(InitializationTrigger::Registration)
            .is_none());
        let call = MethodCall::new("start");
        let sensor = init
            .initialize_sensor(InitializationTrigger::MethodCall(&call))
            .unwrap();
        assert!(!sensor.is_enabled());
    }
}
