//! Startup-registered event subscribers.
//!
//! Side effects of a state change (notifications, calendar entries, ...)
//! are plain [`EventSubscriber`] implementations collected into a
//! [`SubscriberRegistry`] before the server starts.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::bus::LifecycleEvent;
use crate::delivery::webhook::WebhookError;

/// Error returned by a subscriber. Never propagated to the emitter.
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("{0}")]
    Other(String),
}

/// A consumer of lifecycle events.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this subscriber wants `event_type`. Defaults to everything.
    fn accepts(&self, _event_type: &str) -> bool {
        true
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<(), SubscriberError>;
}

/// Ordered set of subscribers fed from one bus receiver.
#[derive(Default, Clone)]
pub struct SubscriberRegistry {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, subscriber: Arc<dyn EventSubscriber>) -> &mut Self {
        tracing::info!(subscriber = subscriber.name(), "Registered event subscriber");
        self.subscribers.push(subscriber);
        self
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Hand one event to every interested subscriber, in registration
    /// order. Failures are logged and do not stop the remaining subscribers.
    /// Returns how many subscribers handled the event successfully.
    pub async fn dispatch(&self, event: &LifecycleEvent) -> usize {
        let mut delivered = 0;
        for subscriber in &self.subscribers {
            if !subscriber.accepts(&event.event_type) {
                continue;
            }
            match subscriber.handle(event).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        event_type = %event.event_type,
                        error = %e,
                        "Event subscriber failed"
                    );
                }
            }
        }
        delivered
    }

    /// Dispatch every event from `receiver` until the bus closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<LifecycleEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.dispatch(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Subscriber registry lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, subscriber registry shutting down");
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::bus::EventBus;

    struct Recorder {
        prefix: &'static str,
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn new(prefix: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                prefix,
                seen: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn accepts(&self, event_type: &str) -> bool {
            event_type.starts_with(self.prefix)
        }

        async fn handle(&self, event: &LifecycleEvent) -> Result<(), SubscriberError> {
            self.seen.lock().unwrap().push(event.event_type.clone());
            if self.fail {
                Err(SubscriberError::Other("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn dispatch_respects_filters_and_isolates_failures() {
        let contracts = Recorder::new("contract.", false);
        let failing = Recorder::new("", true);
        let mut registry = SubscriberRegistry::new();
        registry.register(failing.clone()).register(contracts.clone());

        let delivered = registry.dispatch(&LifecycleEvent::new("contract.signed")).await;
        assert_eq!(delivered, 1);
        let delivered = registry.dispatch(&LifecycleEvent::new("call.finished")).await;
        assert_eq!(delivered, 0);

        assert_eq!(contracts.seen(), vec!["contract.signed"]);
        assert_eq!(failing.seen(), vec!["contract.signed", "call.finished"]);
    }

    #[tokio::test]
    async fn run_drains_until_bus_is_dropped() {
        let bus = EventBus::default();
        let recorder = Recorder::new("", false);
        let mut registry = SubscriberRegistry::new();
        registry.register(recorder.clone());

        let handle = tokio::spawn(registry.run(bus.subscribe()));
        bus.publish(LifecycleEvent::new("project.submitted"));
        bus.publish(LifecycleEvent::new("project.evaluated"));
        drop(bus);
        handle.await.unwrap();

        assert_eq!(recorder.seen(), vec!["project.submitted", "project.evaluated"]);
    }
}
