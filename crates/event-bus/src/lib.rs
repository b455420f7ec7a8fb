use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use traceview_core_types::TraceError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Synchronous subscriber for one notification type.
pub trait Observer<E>: Send + Sync
where
    E: Event,
{
    fn notify(&self, event: &E);
}

impl<E, F> Observer<E> for F
where
    E: Event,
    F: Fn(&E) + Send + Sync,
{
    fn notify(&self, event: &E) {
        self(event)
    }
}

/// Ordered list of observers; notifications are delivered in registration order.
pub struct ObserverList<E>
where
    E: Event,
{
    observers: RwLock<Vec<Arc<dyn Observer<E>>>>,
}

impl<E> Default for ObserverList<E>
where
    E: Event,
{
    fn default() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }
}

impl<E> ObserverList<E>
where
    E: Event,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer<E>>) {
        self.observers.write().push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn emit(&self, event: &E) {
        // Clone the list so observers may subscribe further observers.
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.notify(event);
        }
    }
}

/// Simple in-memory broadcast bus. Also usable as an [`Observer`] so a
/// synchronous producer can fan out to async consumers.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Returns the number of receivers the event was delivered to.
    pub fn publish(&self, event: E) -> Result<usize, TraceError> {
        self.sender
            .send(event)
            .map_err(|err| TraceError::new(err.to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E> Observer<E> for InMemoryBus<E>
where
    E: Event,
{
    fn notify(&self, event: &E) {
        if self.sender.receiver_count() == 0 {
            return;
        }
        if let Err(err) = self.publish(event.clone()) {
            trace!(%err, "bus publish dropped");
        }
    }
}
