//! Event producers
//!
//! Each producer watches one source (connectivity, the decoder session, the
//! quality policy timer, the retry timer, a held seek gesture, the current
//! item) and turns what it sees into [`Event`]s.
//!
//! Producers never call the player. They push into an [`EventSink`], which
//! is the sending half of an unbounded channel whose receiver the player
//! drains on its own execution context. Draining that receiver is the single
//! dispatch point: handlers never run concurrently or re-entrantly.
//!
//! Producers emit nothing until started, and starting or stopping twice is
//! a no-op.

mod item;
mod network;
mod player;
mod quality;
mod retry;
mod seek;
mod timer;

pub use item::AudioItemEventProducer;
pub use network::NetworkEventProducer;
pub use player::PlayerEventProducer;
pub use quality::QualityAdjustmentEventProducer;
pub use retry::RetryEventProducer;
pub use seek::SeekEventProducer;

use crate::event::Event;
use tokio::sync::mpsc;
use tracing::trace;

/// A source of [`Event`]s that can be switched on and off
pub trait EventProducer {
    /// Begin emitting; no-op while already producing
    fn start_producing_events(&mut self);

    /// Stop emitting; safe to call when never started
    fn stop_producing_events(&mut self);

    fn is_producing_events(&self) -> bool;
}

/// Sending half of the player's event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    /// Create a sink and the receiver the listener drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event to the listener
    ///
    /// Returns `false` once the listener is gone; the event is dropped.
    pub fn emit(&self, event: impl Into<Event>) -> bool {
        let event = event.into();
        trace!(?event, "Emitting event");
        if self.tx.send(event).is_err() {
            trace!("Event listener dropped, discarding event");
            return false;
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
