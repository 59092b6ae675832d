//! Change notifications
//!
//! [`SwitchLogic`](crate::SwitchLogic) publishes every observable change on
//! a broadcast channel. Any number of observers (a GUI, the daemon's log
//! output, tests) can subscribe independently.
//!
//! ## Delivery
//!
//! - Publishing never blocks. With no subscribers the notification is dropped.
//! - A subscriber that falls more than the channel capacity behind loses the
//!   oldest notifications; the stream adapter logs how many were skipped.

use std::pin::Pin;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{trace, warn};

use crate::traits::StateSnapshot;

/// Notifications emitted by the synchronization core
///
/// Notifications are published after the operation that caused them has
/// released the core's lock. Notifications of one operation keep their
/// order, but when several tasks call the core at once the notifications of
/// two operations may reach subscribers in a different order than the
/// operations ran. Observers that need the current state should re-read it
/// with `get_all_states` rather than replay notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchEvent {
    /// One or more switches have a new (actual) state
    ///
    /// The payload is never empty and only names the switches concerned.
    SwitchesChanged(StateSnapshot),

    /// The watchdog was switched on or off
    WatchdogToggled(bool),
}

/// Publishing side of the notification channel
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<SwitchEvent>,
}

impl Notifier {
    /// Create a channel with room for `capacity` pending notifications
    ///
    /// The returned receiver is the first subscription.
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<SwitchEvent>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    /// Subscribe to all notifications published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a stream
    ///
    /// Lagged notifications are skipped with a warning instead of ending the stream.
    pub fn stream(&self) -> Pin<Box<dyn Stream<Item = SwitchEvent> + Send + 'static>> {
        let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(
                    "Notification subscriber lagged behind, skipped {} notification(s)",
                    skipped
                );
                None
            }
        });
        Box::pin(stream)
    }

    /// Publish a notification to every current subscriber
    pub fn publish(&self, event: SwitchEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            trace!("No subscribers, dropping notification {:?}", event);
        }
    }

    /// Publish notifications in order
    pub fn publish_all(&self, events: impl IntoIterator<Item = SwitchEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
