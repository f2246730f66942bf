//! Change notification for refreshed layers.

mod subscriber;

pub use subscriber::{ChangeCallback, SubscriberRegistry, SubscriptionHandle};
