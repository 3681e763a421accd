//! # Event Bus System
//!
//! Broadcast channel for catalog activity, built on `tokio::sync::broadcast`.
//! Mutations, propagation attempts and reconcile runs are published here so
//! hosts can observe sync progress without polling the store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │ CatalogService   ├──────────>│           │
//! └──────────────────┘           │           │   subscribe   ┌────────────┐
//! ┌──────────────────┐   emit    │ EventBus  ├──────────────>│ Subscriber │
//! │ PropagationWorker├──────────>│           │               └────────────┘
//! └──────────────────┘           │           │
//! ┌──────────────────┐   emit    │           │
//! │ CatalogReconciler├──────────>│           │
//! └──────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Catalog(CatalogEvent::ProductCreated {
//!         product_id: 1,
//!         sku: Some("MUG-1".to_string()),
//!     }))
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! Emitting with no subscribers returns `Err(SendError)`. Publishers call
//! `.ok()` on the result; events are advisory and never block a mutation.
//!
//! Slow subscribers receive `RecvError::Lagged(n)` and can keep reading.
//! `RecvError::Closed` means every sender was dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Local catalog mutations
    Catalog(CatalogEvent),
    /// Outbound create/update propagation
    Propagation(PropagationEvent),
    /// Inbound pull from the remote store
    Reconcile(ReconcileEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Catalog(e) => e.description(),
            CoreEvent::Propagation(e) => e.description(),
            CoreEvent::Reconcile(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Propagation(PropagationEvent::PermanentlyFailed { .. }) => {
                EventSeverity::Error
            }
            CoreEvent::Reconcile(ReconcileEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Propagation(PropagationEvent::AttemptFailed { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Propagation(PropagationEvent::Succeeded { .. }) => EventSeverity::Info,
            CoreEvent::Reconcile(ReconcileEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Local store mutations made through the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    ProductCreated {
        product_id: i64,
        sku: Option<String>,
    },
    ProductUpdated {
        product_id: i64,
        external_id: Option<i64>,
    },
    /// Either id may be missing when the product existed on one side only.
    ProductDeleted {
        product_id: Option<i64>,
        external_id: Option<i64>,
    },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::ProductCreated { .. } => "Product created locally",
            CatalogEvent::ProductUpdated { .. } => "Product updated locally",
            CatalogEvent::ProductDeleted { .. } => "Product deleted",
        }
    }
}

// ============================================================================
// Propagation Events
// ============================================================================

/// Progress of pushing a local change to the remote store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PropagationEvent {
    Queued {
        task_id: String,
        product_id: i64,
        /// `create` or `update`
        operation: String,
    },
    Succeeded {
        product_id: i64,
        external_id: i64,
        operation: String,
        /// 1-based attempt that succeeded
        attempt: u32,
    },
    AttemptFailed {
        product_id: i64,
        operation: String,
        attempt: u32,
        message: String,
        will_retry: bool,
    },
    PermanentlyFailed {
        product_id: i64,
        operation: String,
        attempts: u32,
        message: String,
    },
}

impl PropagationEvent {
    fn description(&self) -> &str {
        match self {
            PropagationEvent::Queued { .. } => "Propagation queued",
            PropagationEvent::Succeeded { .. } => "Propagation succeeded",
            PropagationEvent::AttemptFailed { .. } => "Propagation attempt failed",
            PropagationEvent::PermanentlyFailed { .. } => "Propagation permanently failed",
        }
    }
}

// ============================================================================
// Reconcile Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ReconcileEvent {
    Started {
        run_id: String,
        page_size: u32,
    },
    PageFetched {
        run_id: String,
        /// 1-based remote page number
        page: u32,
        items: u64,
    },
    Completed {
        run_id: String,
        total_synced: u64,
        new_products: u64,
        updated_products: u64,
        skipped_conflicts: u64,
        duration_ms: u64,
    },
    /// Pages fetched before the failure stay committed.
    Failed {
        run_id: String,
        message: String,
        pages_committed: u32,
    },
}

impl ReconcileEvent {
    fn description(&self) -> &str {
        match self {
            ReconcileEvent::Started { .. } => "Reconcile started",
            ReconcileEvent::PageFetched { .. } => "Reconcile page fetched",
            ReconcileEvent::Completed { .. } => "Reconcile completed",
            ReconcileEvent::Failed { .. } => "Reconcile failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall more than `capacity` events behind receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let failures = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Propagation(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: i64) -> CoreEvent {
        CoreEvent::Catalog(CatalogEvent::ProductCreated {
            product_id: id,
            sku: Some(format!("SKU-{}", id)),
        })
    }

    fn permanently_failed(id: i64) -> CoreEvent {
        CoreEvent::Propagation(PropagationEvent::PermanentlyFailed {
            product_id: id,
            operation: "create".to_string(),
            attempts: 3,
            message: "permanently failed after 3 attempts: timeout".to_string(),
        })
    }

    #[tokio::test]
    async fn test_emission_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(created(1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(created(7)).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), created(7));
        assert_eq!(second.recv().await.unwrap(), created(7));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Propagation(_)));

        bus.emit(created(1)).unwrap();
        bus.emit(permanently_failed(1)).unwrap();

        assert_eq!(stream.recv().await.unwrap(), permanently_failed(1));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut subscriber = bus.subscribe();

        for id in 0..5 {
            bus.emit(created(id)).ok();
        }

        assert!(matches!(
            subscriber.recv().await,
            Err(RecvError::Lagged(_))
        ));
        // Still usable after lagging
        assert!(subscriber.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_after_bus_dropped() {
        let bus = EventBus::new(4);
        let mut stream = EventStream::new(bus.subscribe());
        drop(bus);
        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Closed))));
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(permanently_failed(1).severity(), EventSeverity::Error);
        assert_eq!(created(1).severity(), EventSeverity::Debug);

        let retrying = CoreEvent::Propagation(PropagationEvent::AttemptFailed {
            product_id: 1,
            operation: "update".to_string(),
            attempt: 1,
            message: "503".to_string(),
            will_retry: true,
        });
        assert_eq!(retrying.severity(), EventSeverity::Warning);

        let done = CoreEvent::Reconcile(ReconcileEvent::Completed {
            run_id: "r".to_string(),
            total_synced: 2,
            new_products: 2,
            updated_products: 0,
            skipped_conflicts: 0,
            duration_ms: 5,
        });
        assert_eq!(done.severity(), EventSeverity::Info);
        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_event_description() {
        assert_eq!(created(1).description(), "Product created locally");
        assert_eq!(
            permanently_failed(1).description(),
            "Propagation permanently failed"
        );
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(created(3)).unwrap();
        assert_eq!(json["type"], "Catalog");
        assert_eq!(json["payload"]["event"], "ProductCreated");
        assert_eq!(json["payload"]["sku"], "SKU-3");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, created(3));
    }
}
