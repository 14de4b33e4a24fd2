//! Events emitted by the producers
//!
//! Every asynchronous input the player reacts to is turned into one of these
//! values and delivered through the [`EventSink`](crate::producer::EventSink).

use crate::error::EndedError;
use crate::item::{ItemChange, MetadataItem};
use crate::types::TimeRange;
use std::time::Duration;
use tokio::time::Instant;

/// A discrete occurrence the player reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Network(NetworkEvent),
    Player(PlayerEvent),
    QualityAdjustment(QualityAdjustmentEvent),
    Retry(RetryEvent),
    Seek(SeekEvent),
    AudioItem(AudioItemEvent),
}

/// Connectivity changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// Went from reachable to unreachable
    ConnectionLost,

    /// Went from unreachable to reachable
    ConnectionRetrieved {
        /// When connectivity was lost, if known
        lost_at: Option<Instant>,
    },

    /// Switched transport while staying reachable
    NetworkChanged,
}

/// Decoder session and system audio notifications
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StartedBuffering,
    ReadyToPlay,
    LoadedMoreRange(TimeRange),
    LoadedMetadata(Vec<MetadataItem>),
    LoadedDuration(Duration),
    Progressed(Duration),

    /// `None` for a natural end of media
    EndedPlaying(Option<EndedError>),

    InterruptionBegan,
    InterruptionEnded,
    RouteChanged,
    SessionMessedUp,
}

/// Quality-adjustment policy decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityAdjustmentEvent {
    GoDown,
    GoUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryEvent {
    RetryAvailable,
    RetryFailed,
}

/// Ticks of a held seek gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekEvent {
    SeekBackward,
    SeekForward,
}

/// Changes to the current item's descriptive fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioItemEvent {
    Updated(ItemChange),
}

impl From<NetworkEvent> for Event {
    fn from(event: NetworkEvent) -> Self {
        Event::Network(event)
    }
}

impl From<PlayerEvent> for Event {
    fn from(event: PlayerEvent) -> Self {
        Event::Player(event)
    }
}

impl From<QualityAdjustmentEvent> for Event {
    fn from(event: QualityAdjustmentEvent) -> Self {
        Event::QualityAdjustment(event)
    }
}

impl From<RetryEvent> for Event {
    fn from(event: RetryEvent) -> Self {
        Event::Retry(event)
    }
}

impl From<SeekEvent> for Event {
    fn from(event: SeekEvent) -> Self {
        Event::Seek(event)
    }
}

impl From<AudioItemEvent> for Event {
    fn from(event: AudioItemEvent) -> Self {
        Event::AudioItem(event)
    }
}
