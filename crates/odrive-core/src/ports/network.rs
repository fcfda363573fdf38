//! Connectivity feedback: the core publishes transitions of its
//! `operationalOffline` flag through a small observer bus rather than a
//! global callback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A point-in-time connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityStatus {
    pub connected: bool,
}

/// Receives connectivity transitions published by the HTTP session layer.
#[async_trait]
pub trait NetworkObserver: Send + Sync {
    async fn on_connected(&self) {}
    async fn on_disconnected(&self) {}
    async fn on_status_update(&self, _connected: bool, _last_check: DateTime<Utc>) {}
}

/// A fan-out bus of [`NetworkObserver`]s. Cheap to clone; intended to be
/// shared by every collaborator that wants connectivity notifications.
#[derive(Clone, Default)]
pub struct NetworkFeedbackBus {
    observers: std::sync::Arc<std::sync::RwLock<Vec<std::sync::Arc<dyn NetworkObserver>>>>,
}

impl NetworkFeedbackBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: std::sync::Arc<dyn NetworkObserver>) {
        self.observers
            .write()
            .expect("network feedback bus lock poisoned")
            .push(observer);
    }

    pub async fn publish(&self, connected: bool) {
        let observers = self
            .observers
            .read()
            .expect("network feedback bus lock poisoned")
            .clone();
        let now = Utc::now();
        for observer in observers {
            observer.on_status_update(connected, now).await;
            if connected {
                observer.on_connected().await;
            } else {
                observer.on_disconnected().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingObserver {
        connected: AtomicUsize,
        disconnected: AtomicUsize,
    }

    #[async_trait]
    impl NetworkObserver for CountingObserver {
        async fn on_connected(&self) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_disconnected(&self) {
            self.disconnected.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn bus_fans_out_to_all_subscribers() {
        let bus = NetworkFeedbackBus::new();
        let observer = Arc::new(CountingObserver {
            connected: AtomicUsize::new(0),
            disconnected: AtomicUsize::new(0),
        });
        bus.subscribe(observer.clone());

        bus.publish(true).await;
        bus.publish(false).await;

        assert_eq!(observer.connected.load(Ordering::SeqCst), 1);
        assert_eq!(observer.disconnected.load(Ordering::SeqCst), 1);
    }
}
