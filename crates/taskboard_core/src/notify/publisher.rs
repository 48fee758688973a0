//! Event publisher seam and in-process implementations.

use crate::notify::{DomainEvent, PublishError};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

/// Sink for committed domain events.
pub trait EventPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

impl<P: EventPublisher + ?Sized> EventPublisher for &P {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        (**self).publish(event)
    }
}

impl<P: EventPublisher + ?Sized> EventPublisher for Box<P> {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        (**self).publish(event)
    }
}

/// Fan-out: delivers to both sinks, reporting the first failure.
impl<A: EventPublisher, B: EventPublisher> EventPublisher for (A, B) {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let first = self.0.publish(event);
        let second = self.1.publish(event);
        first.and(second)
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: &DomainEvent) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Records events in memory; used by tests and the smoke binary.
#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event published so far.
    pub fn events(&self) -> Vec<DomainEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Event kinds in publish order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::kind).collect()
    }
}

impl EventPublisher for InMemoryPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| PublishError::Rejected("event buffer lock poisoned".to_string()))?;
        events.push(event.clone());
        Ok(())
    }
}

/// Forwards events to a consumer thread over a std channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: Sender<DomainEvent>,
}

impl ChannelPublisher {
    pub fn new(sender: Sender<DomainEvent>) -> Self {
        Self { sender }
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.sender
            .send(event.clone())
            .map_err(|_| PublishError::ChannelClosed)
    }
}
