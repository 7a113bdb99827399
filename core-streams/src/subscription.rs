use std::fmt;
use std::sync::Arc;

use bridge_traits::EventSink;
use serde_json::Value;

/// Registry key of a subscription.
///
/// Identifiers and event names never compare equal to each other: `Id("light")`
/// does not match a subscription to `"light"` that carries no identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKey<'a> {
    Id(&'a str),
    Name(&'a str),
}

impl<'a> StreamKey<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            StreamKey::Id(key) | StreamKey::Name(key) => key,
        }
    }
}

impl fmt::Display for StreamKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKey::Id(id) => write!(f, "id '{}'", id),
            StreamKey::Name(name) => write!(f, "name '{}'", name),
        }
    }
}

/// One broadcast-channel listener.
///
/// Cloning is cheap and shares the sink; the registry hands out clones so
/// delivery can happen without holding the registry lock.
#[derive(Clone)]
pub struct Subscription {
    event_name: String,
    identifier: Option<String>,
    sink: Arc<dyn EventSink>,
    listening: bool,
}

impl Subscription {
    pub fn new(
        event_name: impl Into<String>,
        identifier: Option<String>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            identifier,
            sink,
            listening: true,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Key used under identifier-keyed registries. Entries without an
    /// identifier are keyed by event name, in a space of their own.
    pub fn key(&self) -> StreamKey<'_> {
        match &self.identifier {
            Some(identifier) => StreamKey::Id(identifier),
            None => StreamKey::Name(&self.event_name),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub(crate) fn deactivate(&mut self) {
        self.listening = false;
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Whether both handles write to the same sink.
    pub fn shares_sink(&self, sink: &Arc<dyn EventSink>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.sink), Arc::as_ptr(sink))
    }

    /// Writes one event to the sink.
    pub fn send(&self, event: Value) {
        self.sink.success(event);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event_name", &self.event_name)
            .field("identifier", &self.identifier)
            .field("listening", &self.listening)
            .finish_non_exhaustive()
    }
}

/// Listen arguments sent by a caller: `{ "name": String, "id": String? }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub event_name: String,
    pub identifier: Option<String>,
}

impl SubscriptionRequest {
    /// Decodes listen arguments.
    ///
    /// Returns `None` unless the arguments are a mapping with a string
    /// `name`. A non-string `id` is treated as absent.
    pub fn from_arguments(arguments: Option<&Value>) -> Option<Self> {
        let args = arguments?.as_object()?;
        let event_name = args.get("name")?.as_str()?;
        let identifier = args.get("id").and_then(Value::as_str).map(str::to_string);

        Some(Self {
            event_name: event_name.to_string(),
            identifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub Sink {}

        impl EventSink for Sink {
            fn success(&self, event: Value);
            fn error(&self, code: &str, message: &str, details: Option<Value>);
            fn end_of_stream(&self);
        }
    }

    #[test]
    fn test_request_from_arguments() {
        let args = json!({ "name": "accelerometer", "id": "a-1" });
        let request = SubscriptionRequest::from_arguments(Some(&args)).unwrap();
        assert_eq!(request.event_name, "accelerometer");
        assert_eq!(request.identifier.as_deref(), Some("a-1"));

        let args = json!({ "name": "accelerometer", "id": 7 });
        let request = SubscriptionRequest::from_arguments(Some(&args)).unwrap();
        assert_eq!(request.identifier, None);
    }

    #[test]
    fn test_malformed_request_is_ignored() {
        assert!(SubscriptionRequest::from_arguments(None).is_none());
        assert!(SubscriptionRequest::from_arguments(Some(&json!("accelerometer"))).is_none());
        assert!(SubscriptionRequest::from_arguments(Some(&json!({ "name": 1 }))).is_none());
        assert!(SubscriptionRequest::from_arguments(Some(&json!({ "id": "a" }))).is_none());
    }

    #[test]
    fn test_key_without_identifier_is_name_keyed() {
        let sink: Arc<dyn EventSink> = Arc::new(MockSink::new());
        let named = Subscription::new("gyroscope", None, sink.clone());
        let keyed = Subscription::new("gyroscope", Some("g-2".to_string()), sink.clone());

        assert_eq!(named.key(), StreamKey::Name("gyroscope"));
        assert_eq!(keyed.key(), StreamKey::Id("g-2"));
        assert_ne!(StreamKey::Id("gyroscope"), named.key());
        assert_eq!(named.key().as_str(), "gyroscope");
        assert!(keyed.shares_sink(&sink));
        assert!(!keyed.shares_sink(&(Arc::new(MockSink::new()) as Arc<dyn EventSink>)));
    }

    #[test]
    fn test_send_writes_to_sink() {
        let mut sink = MockSink::new();
        sink.expect_success()
            .withf(|event| event == &json!({ "x": 1.5 }))
            .times(1)
            .return_const(());

        let subscription = Subscription::new("accelerometer", None, Arc::new(sink));
        assert!(subscription.is_listening());
        subscription.send(json!({ "x": 1.5 }));
    }
}
