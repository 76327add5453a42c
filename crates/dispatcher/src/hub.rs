//! StreamHub - node-side signal hub for the four event streams
//!
//! Observers are called synchronously on the emitting thread, in connection
//! order. The observer list is snapshotted before each emit, so an observer
//! may disconnect itself (or others) from inside its callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use contracts::{ChainObserver, EventStream, NodeEvent};
use tracing::debug;

struct Slot {
    id: u64,
    stream: EventStream,
    observer: Arc<dyn ChainObserver>,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    slots: Mutex<Vec<Slot>>,
}

impl HubInner {
    fn remove(&self, id: u64) -> bool {
        let Ok(mut slots) = self.slots.lock() else {
            return false;
        };
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        before != slots.len()
    }
}

/// Shared handle to the hub
#[derive(Clone, Default)]
pub struct StreamHub {
    inner: Arc<HubInner>,
}

impl StreamHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer to one stream
    pub fn connect(&self, stream: EventStream, observer: Arc<dyn ChainObserver>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut slots) = self.inner.slots.lock() {
            slots.push(Slot {
                id,
                stream,
                observer,
            });
        }
        debug!(stream = %stream, subscription = id, "Observer connected");
        Subscription {
            id,
            stream,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver one event to every observer of its stream
    ///
    /// Returns the number of observers called.
    pub fn emit(&self, event: &NodeEvent) -> usize {
        let stream = event.stream();
        let observers: Vec<Arc<dyn ChainObserver>> = match self.inner.slots.lock() {
            Ok(slots) => slots
                .iter()
                .filter(|slot| slot.stream == stream)
                .map(|slot| Arc::clone(&slot.observer))
                .collect(),
            Err(_) => return 0,
        };
        for observer in &observers {
            observer.on_event(stream, event.as_event());
        }
        observers.len()
    }

    /// Number of observers on a stream
    pub fn observer_count(&self, stream: EventStream) -> usize {
        self.inner
            .slots
            .lock()
            .map(|slots| slots.iter().filter(|s| s.stream == stream).count())
            .unwrap_or(0)
    }
}

/// Connection handle returned by [`StreamHub::connect`]
///
/// Dropping it does not disconnect.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    stream: EventStream,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn stream(&self) -> EventStream {
        self.stream
    }

    /// Detach from the hub; false when already detached or the hub is gone
    pub fn disconnect(&self) -> bool {
        let removed = self
            .hub
            .upgrade()
            .map(|hub| hub.remove(self.id))
            .unwrap_or(false);
        if removed {
            debug!(stream = %self.stream, subscription = self.id, "Observer disconnected");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::EventRef;
    use extractors::fixtures;

    #[derive(Default)]
    struct Counter {
        seen: Mutex<Vec<(EventStream, &'static str)>>,
    }

    impl ChainObserver for Counter {
        fn on_event(&self, stream: EventStream, event: EventRef<'_>) {
            self.seen.lock().unwrap().push((stream, event.kind()));
        }
    }

    #[test]
    fn test_emit_routes_by_stream() {
        let hub = StreamHub::new();
        let counter = Arc::new(Counter::default());
        hub.connect(EventStream::IrreversibleBlock, counter.clone());

        let block = fixtures::block(1);
        assert_eq!(hub.emit(&NodeEvent::AcceptedBlock(block.clone())), 0);
        assert_eq!(hub.emit(&NodeEvent::IrreversibleBlock(block)), 1);
        assert_eq!(
            *counter.seen.lock().unwrap(),
            vec![(EventStream::IrreversibleBlock, "block")]
        );
    }

    #[test]
    fn test_disconnect() {
        let hub = StreamHub::new();
        let counter = Arc::new(Counter::default());
        let sub = hub.connect(EventStream::AcceptedTransaction, counter.clone());
        assert_eq!(hub.observer_count(EventStream::AcceptedTransaction), 1);

        assert!(sub.disconnect());
        assert!(!sub.disconnect());
        let meta = fixtures::metadata("t");
        assert_eq!(hub.emit(&NodeEvent::AcceptedTransaction(meta)), 0);
        assert!(counter.seen.lock().unwrap().is_empty());
    }

    struct SelfDetaching {
        sub: Mutex<Option<Subscription>>,
        calls: AtomicU64,
    }

    impl ChainObserver for SelfDetaching {
        fn on_event(&self, _stream: EventStream, _event: EventRef<'_>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = self.sub.lock().unwrap().take() {
                sub.disconnect();
            }
        }
    }

    #[test]
    fn test_disconnect_from_callback() {
        let hub = StreamHub::new();
        let observer = Arc::new(SelfDetaching {
            sub: Mutex::new(None),
            calls: AtomicU64::new(0),
        });
        let sub = hub.connect(EventStream::AcceptedBlock, observer.clone());
        *observer.sub.lock().unwrap() = Some(sub);

        let block = fixtures::block(2);
        hub.emit(&NodeEvent::AcceptedBlock(block.clone()));
        hub.emit(&NodeEvent::AcceptedBlock(block));
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
    }
}
