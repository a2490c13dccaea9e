//! Mutation event publishing.
//!
//! Stores hand every committed change to an [`EventPublisher`]. Publishing
//! never blocks or fails the write; a closed channel only drops the event.
use geoacl_authz::AclEvent;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{trace, warn};

pub trait EventPublisher: Send + Sync + fmt::Debug {
    fn publish(&self, event: AclEvent);
}

/// Discards events. Used when nothing consumes store changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, event: AclEvent) {
        trace!(kind = event.kind(), "dropping event without subscribers");
    }
}

/// Forwards events onto an unbounded queue drained by an invalidation worker.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<AclEvent>,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::UnboundedSender<AclEvent>) -> Self {
        Self { tx }
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: AclEvent) {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(()) => {
                metrics::counter!("geoacl_events_published_total", "kind" => kind).increment(1);
            }
            Err(mpsc::error::SendError(event)) => {
                warn!(kind, event_type = ?event.event_type(), "event channel closed; dropping event");
            }
        }
    }
}

/// A publisher plus the receiving end for the worker that consumes it.
pub fn event_channel() -> (ChannelPublisher, mpsc::UnboundedReceiver<AclEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelPublisher::new(tx), rx)
}
