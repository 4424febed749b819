//! Lifecycle event bus and notification plumbing.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`LifecycleEvent`]: the event envelope every transition emits.
//! - [`names`]: the closed set of event type names.
//! - [`EventPersistence`]: background service writing every event to the
//!   `events` table.
//! - [`SubscriberRegistry`]: fans events out to [`EventSubscriber`]s
//!   registered at startup.
//! - [`delivery`]: webhook delivery to the external notification dispatcher.

pub mod bus;
pub mod delivery;
pub mod names;
pub mod persistence;
pub mod subscriber;

pub use bus::{EventBus, LifecycleEvent};
pub use delivery::webhook::{WebhookDelivery, WebhookError, WebhookSubscriber};
pub use persistence::EventPersistence;
pub use subscriber::{EventSubscriber, SubscriberError, SubscriberRegistry};
