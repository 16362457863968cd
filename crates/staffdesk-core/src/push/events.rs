use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content of a delivered push notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Delivered while the app is running.
    Received(PushNotification),
    /// The user tapped the notification or one of its actions.
    Responded {
        notification: PushNotification,
        action: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&PushEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

/// Fan-out of push events to explicitly registered listeners.
#[derive(Clone, Default)]
pub struct NotificationEvents {
    registry: Arc<Mutex<Registry>>,
}

impl NotificationEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the listener was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(existing, _)| *existing != id);
        registry.listeners.len() != before
    }

    /// Deliver an event to every current listener, in subscription order.
    pub fn publish(&self, event: &PushEvent) {
        // Listeners run unlocked so they may (un)subscribe.
        let listeners: Vec<Listener> = self
            .registry
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_subscribe_publish_unsubscribe() {
        let events = NotificationEvents::new();
        let received = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&received);
        let id = events.subscribe(move |event| {
            if matches!(event, PushEvent::Received(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        events.publish(&PushEvent::Received(PushNotification::default()));
        events.publish(&PushEvent::Responded {
            notification: PushNotification::default(),
            action: None,
        });
        assert_eq!(received.load(Ordering::SeqCst), 1);

        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        events.publish(&PushEvent::Received(PushNotification::default()));
        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let events = NotificationEvents::new();
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let hub = events.clone();
        let own_id = Arc::clone(&slot);
        let id = events.subscribe(move |_| {
            if let Some(id) = *own_id.lock() {
                hub.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        events.publish(&PushEvent::Received(PushNotification::default()));
        assert_eq!(events.listener_count(), 0);
    }
}
