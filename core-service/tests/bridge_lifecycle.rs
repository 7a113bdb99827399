//! Bridge registration, lazy/eager construction and teardown over the
//! in-process transport.

use std::sync::{Arc, Mutex};

use bridge_desktop::{InMemoryInitializer, InMemorySensor, LocalTransport, StreamItem};
use bridge_traits::{
    HostChannelTransport, InitializationTrigger, MethodCall, MethodHandler, MethodResponse,
    SensorCapability, SensorInitializer,
};
use core_runtime::config::{BridgeConfig, InitializationPolicy};
use core_runtime::events::{BridgeEvent, LifecycleEvent};
use core_service::{BridgeState, CoreError, SensorBridge, UNAVAILABLE_CODE};
use mockall::mock;
use serde_json::json;

const METHOD: &str = "awareframework_core/method";
const EVENT: &str = "awareframework_core/event";

mock! {
    pub Hooks {}

    impl MethodHandler for Hooks {
        fn begin_method_handle(&self, call: &MethodCall);
        fn end_method_handle(&self, call: &MethodCall);
    }
}

/// Declines the first request, then builds a sensor; records what asked.
#[derive(Default)]
struct ReluctantInitializer {
    triggers: Mutex<Vec<String>>,
}

impl SensorInitializer for ReluctantInitializer {
    fn initialize_sensor(
        &self,
        trigger: InitializationTrigger<'_>,
    ) -> Option<Arc<dyn SensorCapability>> {
        let mut triggers = self.triggers.lock().unwrap();
        triggers.push(match trigger {
            InitializationTrigger::Registration => "registration".to_string(),
            InitializationTrigger::MethodCall(call) => call.method.clone(),
        });
        if triggers.len() == 1 {
            return None;
        }
        let sensor: Arc<dyn SensorCapability> = Arc::new(InMemorySensor::new());
        Some(sensor)
    }
}

fn bridge_with(
    initializer: Arc<InMemoryInitializer>,
    policy: InitializationPolicy,
) -> SensorBridge {
    let config = BridgeConfig::for_plugin("awareframework_core")
        .initialization(policy)
        .sensor_initializer(initializer)
        .build()
        .unwrap();
    SensorBridge::new(config).unwrap()
}

fn registered(
    policy: InitializationPolicy,
) -> (SensorBridge, Arc<LocalTransport>, Arc<InMemoryInitializer>) {
    let initializer = Arc::new(InMemoryInitializer::new());
    let bridge = bridge_with(initializer.clone(), policy);
    let transport = Arc::new(LocalTransport::new());
    bridge.register(transport.clone()).unwrap();
    (bridge, transport, initializer)
}

fn invoke(transport: &LocalTransport, call: MethodCall) -> MethodResponse {
    transport.invoke(METHOD, &call).unwrap()
}

#[test]
fn test_register_binds_channels() {
    let (bridge, transport, _) = registered(InitializationPolicy::Lazy);

    assert!(transport.is_method_channel_bound(METHOD));
    assert!(transport.is_stream_channel_bound(EVENT));
    assert_eq!(bridge.state(), BridgeState::Registered { sensor_present: false });

    let second = Arc::new(LocalTransport::new());
    assert!(matches!(
        bridge.register(second.clone()),
        Err(CoreError::AlreadyRegistered(channel)) if channel == METHOD
    ));
    assert_eq!(second.bound_channels(), 0);
}

#[test]
fn test_lazy_initialization_happens_once() {
    let (bridge, transport, initializer) = registered(InitializationPolicy::Lazy);
    assert_eq!(initializer.calls(), 0);

    invoke(&transport, MethodCall::new("start"));
    invoke(&transport, MethodCall::new("enable"));

    assert_eq!(initializer.calls(), 1);
    assert_eq!(bridge.state(), BridgeState::Registered { sensor_present: true });

    let snapshot = initializer.sensor().snapshot();
    assert!(snapshot.running);
    assert!(snapshot.enabled);
}

#[test]
fn test_lazy_initializer_sees_triggering_call() {
    let initializer = Arc::new(ReluctantInitializer::default());
    let config = BridgeConfig::for_plugin("awareframework_core")
        .sensor_initializer(initializer.clone())
        .build()
        .unwrap();
    let bridge = SensorBridge::new(config).unwrap();
    let transport = Arc::new(LocalTransport::new());
    bridge.register(transport.clone()).unwrap();

    // No sensor produced: the call is a no-op and the next call asks again
    assert_eq!(invoke(&transport, MethodCall::new("sync")), MethodResponse::empty());
    assert!(bridge.capability().is_none());

    invoke(&transport, MethodCall::new("start"));
    invoke(&transport, MethodCall::new("stop"));
    assert!(bridge.capability().is_some());
    assert_eq!(*initializer.triggers.lock().unwrap(), vec!["sync", "start"]);
}

#[test]
fn test_unknown_call_does_not_build_sensor() {
    let (bridge, transport, initializer) = registered(InitializationPolicy::Lazy);

    let response = invoke(&transport, MethodCall::new("calibrate"));

    assert_eq!(response, MethodResponse::NotImplemented);
    assert_eq!(initializer.calls(), 0);
    assert!(bridge.capability().is_none());
}

#[test]
fn test_eager_initialization_at_registration() {
    let initializer = Arc::new(InMemoryInitializer::new());
    let bridge = bridge_with(initializer.clone(), InitializationPolicy::Eager);
    let mut events = bridge.events();

    bridge.register(Arc::new(LocalTransport::new())).unwrap();

    assert_eq!(initializer.calls(), 1);
    assert_eq!(bridge.state(), BridgeState::Registered { sensor_present: true });
    assert!(matches!(
        events.try_recv().unwrap(),
        BridgeEvent::Lifecycle(LifecycleEvent::Registered { .. })
    ));
    assert_eq!(
        events.try_recv().unwrap(),
        BridgeEvent::Lifecycle(LifecycleEvent::CapabilityInitialized {
            trigger: "registration".to_string()
        })
    );

    bridge.dispatch(&MethodCall::new("start"));
    assert_eq!(initializer.calls(), 1);
}

#[test]
fn test_full_control_surface() {
    let (_bridge, transport, initializer) = registered(InitializationPolicy::Lazy);

    invoke(&transport, MethodCall::new("enable"));
    assert_eq!(
        invoke(&transport, MethodCall::new("is_enable")),
        MethodResponse::value(true)
    );
    invoke(
        &transport,
        MethodCall::new("sync").with_arguments(json!({ "force": true })),
    );
    invoke(&transport, MethodCall::new("sync"));
    invoke(
        &transport,
        MethodCall::new("set_label").with_arguments(json!({ "label": "walking" })),
    );
    invoke(&transport, MethodCall::new("set_label"));
    invoke(&transport, MethodCall::new("disable"));
    invoke(&transport, MethodCall::new("stop"));

    let snapshot = initializer.sensor().snapshot();
    assert_eq!(snapshot.syncs, vec![true, false]);
    assert_eq!(snapshot.label.as_deref(), Some("walking"));
    assert!(!snapshot.enabled);
    assert_eq!(snapshot.stop_count, 1);
}

#[test]
fn test_hooks_run_for_every_call() {
    let mut hooks = MockHooks::new();
    hooks.expect_begin_method_handle().times(3).return_const(());
    hooks.expect_end_method_handle().times(3).return_const(());

    let config = BridgeConfig::for_plugin("awareframework_core")
        .sensor_initializer(Arc::new(InMemoryInitializer::new()))
        .method_handler(Arc::new(hooks))
        .build()
        .unwrap();
    let bridge = SensorBridge::new(config).unwrap();
    let transport = Arc::new(LocalTransport::new());
    bridge.register(transport.clone()).unwrap();

    invoke(&transport, MethodCall::new("start"));
    invoke(&transport, MethodCall::new("calibrate"));
    invoke(
        &transport,
        MethodCall::new("cancel_broadcast_stream").with_arguments(json!({ "name": "light" })),
    );
}

#[test]
fn test_injected_capability() {
    let (bridge, transport, initializer) = registered(InitializationPolicy::Lazy);
    let injected = Arc::new(InMemorySensor::new());

    bridge.set_capability(injected.clone()).unwrap();
    invoke(&transport, MethodCall::new("start"));

    assert_eq!(initializer.calls(), 0);
    assert!(injected.snapshot().running);
}

#[test]
fn test_teardown_releases_everything() {
    let (bridge, transport, _) = registered(InitializationPolicy::Eager);
    let mut stream = transport
        .listen(EVENT, Some(json!({ "name": "light" })))
        .unwrap();
    let mut events = bridge.events();

    bridge.teardown().unwrap();

    assert_eq!(bridge.state(), BridgeState::Unregistered);
    assert!(bridge.capability().is_none());
    assert!(bridge.subscriptions("light").is_empty());
    assert_eq!(transport.bound_channels(), 0);
    assert_eq!(stream.try_recv(), None);
    assert!(stream.is_finished());
    assert_eq!(
        events.try_recv().unwrap(),
        BridgeEvent::Lifecycle(LifecycleEvent::TornDown)
    );

    // Second teardown is a no-op
    bridge.teardown().unwrap();
    assert!(events.try_recv().is_err());
}

#[test]
fn test_calls_after_teardown_are_unavailable() {
    let mut hooks = MockHooks::new();
    hooks.expect_begin_method_handle().never();
    hooks.expect_end_method_handle().never();

    let initializer = Arc::new(InMemoryInitializer::new());
    let config = BridgeConfig::for_plugin("awareframework_core")
        .sensor_initializer(initializer.clone())
        .method_handler(Arc::new(hooks))
        .build()
        .unwrap();
    let bridge = SensorBridge::new(config).unwrap();

    // Before registration
    let response = bridge.dispatch(&MethodCall::new("start"));
    assert!(matches!(response, MethodResponse::Error { ref code, .. } if code == UNAVAILABLE_CODE));

    let transport = Arc::new(LocalTransport::new());
    bridge.register(transport.clone()).unwrap();
    bridge.teardown().unwrap();

    // Transport no longer routes to the bridge, and direct calls are refused
    assert!(transport.invoke(METHOD, &MethodCall::new("start")).is_err());
    let response = bridge.dispatch(&MethodCall::new("start"));
    assert!(matches!(response, MethodResponse::Error { ref code, .. } if code == UNAVAILABLE_CODE));
    assert_eq!(initializer.calls(), 0);
    assert!(matches!(
        bridge.set_capability(initializer.sensor()),
        Err(CoreError::NotRegistered)
    ));
}

#[test]
fn test_dropping_registered_bridge_releases_it() {
    let (bridge, transport, initializer) = registered(InitializationPolicy::Eager);
    assert_eq!(Arc::strong_count(&initializer), 2);

    drop(bridge);

    // Nothing but the test holds the initializer any more
    assert_eq!(Arc::strong_count(&initializer), 1);
    let response = invoke(&transport, MethodCall::new("start"));
    assert!(matches!(response, MethodResponse::Error { ref code, .. } if code == UNAVAILABLE_CODE));

    let mut stream = transport
        .listen(EVENT, Some(json!({ "name": "light" })))
        .unwrap();
    assert!(matches!(
        stream.try_recv(),
        Some(StreamItem::Error(err)) if err.code == UNAVAILABLE_CODE
    ));
    assert_eq!(initializer.sensor().snapshot().start_count, 0);
}

#[test]
fn test_reregister_after_teardown() {
    let (bridge, transport, initializer) = registered(InitializationPolicy::Lazy);
    invoke(&transport, MethodCall::new("start"));
    bridge.teardown().unwrap();

    bridge.register(transport.clone()).unwrap();
    assert_eq!(bridge.state(), BridgeState::Registered { sensor_present: false });

    invoke(&transport, MethodCall::new("start"));
    assert_eq!(initializer.calls(), 2);
}

struct RefusingTransport {
    inner: LocalTransport,
}

impl HostChannelTransport for RefusingTransport {
    fn set_method_call_handler(
        &self,
        channel: &str,
        handler: Option<Arc<dyn bridge_traits::MethodCallHandler>>,
    ) -> bridge_traits::error::Result<()> {
        self.inner.set_method_call_handler(channel, handler)
    }

    fn set_stream_handler(
        &self,
        channel: &str,
        handler: Option<Arc<dyn bridge_traits::StreamHandler>>,
    ) -> bridge_traits::error::Result<()> {
        if handler.is_some() {
            return Err(bridge_traits::BridgeError::OperationFailed(format!(
                "{} is reserved",
                channel
            )));
        }
        self.inner.set_stream_handler(channel, None)
    }
}

#[test]
fn test_failed_binding_rolls_back() {
    let bridge = bridge_with(Arc::new(InMemoryInitializer::new()), InitializationPolicy::Lazy);
    let transport = Arc::new(RefusingTransport {
        inner: LocalTransport::new(),
    });

    let result = bridge.register(transport.clone());

    assert!(matches!(result, Err(CoreError::Bridge(_))));
    assert!(!bridge.is_registered());
    assert_eq!(transport.inner.bound_channels(), 0);
}

#[test]
fn test_stream_item_for_emitted_reading() {
    let (bridge, transport, _) = registered(InitializationPolicy::Lazy);
    let mut stream = transport
        .listen(EVENT, Some(json!({ "name": "accelerometer" })))
        .unwrap();

    assert_eq!(bridge.emit("accelerometer", json!({ "x": 0.5 })), 1);
    assert_eq!(stream.try_recv(), Some(StreamItem::Event(json!({ "x": 0.5 }))));
}
