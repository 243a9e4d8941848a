//! Session diagnostics feed.
//!
//! Instruments and the session driver report user-visible notices through an
//! append-only log of `(domain, message)` pairs. Consumers observe the feed
//! through an insertion protocol: subscribing yields an initial
//! [`ItemsChanged`] covering everything already appended, then one
//! notification per subsequent append. Items are retrieved by position and
//! are never removed.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// An immutable reported notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    domain: String,
    message: String,
}

impl Diagnostic {
    pub fn new(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self { domain: domain.into(), message: message.into() }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Insertion notification delivered to feed observers.
///
/// `removed` is always zero today; it is carried so the protocol matches a
/// general list-model contract and observers can be written against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemsChanged {
    pub position: usize,
    pub removed: usize,
    pub added: usize,
}

#[derive(Default)]
struct FeedInner {
    items: Vec<Arc<Diagnostic>>,
    observers: Vec<mpsc::UnboundedSender<ItemsChanged>>,
}

/// Append-only, observable diagnostics log for one recording.
///
/// Cheap to clone; all clones share the same log. Appends may come from any
/// task; observers receive notifications in append order.
#[derive(Clone, Default)]
pub struct DiagnosticsFeed {
    inner: Arc<Mutex<FeedInner>>,
}

impl DiagnosticsFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one diagnostic and notify every observer.
    pub fn append(&self, domain: impl Into<String>, message: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        let position = inner.items.len();
        inner.items.push(Arc::new(Diagnostic::new(domain, message)));

        let change = ItemsChanged { position, removed: 0, added: 1 };
        inner.observers.retain(|tx| tx.send(change).is_ok());
    }

    /// Retrieve the diagnostic at `position`, if it exists.
    pub fn get(&self, position: usize) -> Option<Arc<Diagnostic>> {
        self.inner.lock().unwrap().items.get(position).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the full log, in append order.
    pub fn snapshot(&self) -> Vec<Arc<Diagnostic>> {
        self.inner.lock().unwrap().items.clone()
    }

    /// Subscribe to insertion notifications.
    ///
    /// The first message on the returned channel is an initial drain
    /// covering every entry appended before the subscription (with
    /// `added == 0` when the feed was empty); each later append produces
    /// exactly one further message.
    pub fn watch(&self) -> mpsc::UnboundedReceiver<ItemsChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap();
        let initial = ItemsChanged { position: 0, removed: 0, added: inner.items.len() };
        // An unbounded send only fails when the receiver is gone, which
        // cannot happen while we still hold it.
        let _ = tx.send(initial);
        inner.observers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_get_by_position() {
        let feed = DiagnosticsFeed::new();
        feed.append("io", "slow disk");
        feed.append("cpu", "throttled");

        assert_eq!(feed.len(), 2);
        assert_eq!(feed.get(0).unwrap().domain(), "io");
        assert_eq!(feed.get(1).unwrap().message(), "throttled");
        assert!(feed.get(2).is_none());
    }

    #[tokio::test]
    async fn test_observer_gets_initial_drain_then_per_append_notifications() {
        let feed = DiagnosticsFeed::new();
        feed.append("a", "one");
        feed.append("a", "two");
        feed.append("b", "three");

        let mut rx = feed.watch();

        let initial = rx.recv().await.expect("initial drain");
        assert_eq!(initial, ItemsChanged { position: 0, removed: 0, added: 3 });

        feed.append("c", "four");
        feed.append("c", "five");

        let fourth = rx.recv().await.expect("append notification");
        assert_eq!(fourth, ItemsChanged { position: 3, removed: 0, added: 1 });
        let fifth = rx.recv().await.expect("append notification");
        assert_eq!(fifth, ItemsChanged { position: 4, removed: 0, added: 1 });

        assert_eq!(feed.get(fourth.position).unwrap().message(), "four");
    }

    #[tokio::test]
    async fn test_observer_on_empty_feed_sees_empty_drain() {
        let feed = DiagnosticsFeed::new();
        let mut rx = feed.watch();

        let initial = rx.recv().await.expect("initial drain");
        assert_eq!(initial, ItemsChanged { position: 0, removed: 0, added: 0 });
    }

    #[tokio::test]
    async fn test_dropped_observer_is_pruned() {
        let feed = DiagnosticsFeed::new();
        let rx = feed.watch();
        drop(rx);

        // Appending after the observer is gone must not error or leak.
        feed.append("a", "orphaned");
        assert_eq!(feed.len(), 1);
    }
}
