//! Notifications exposed to the player's owner
//!
//! The player queues these as it handles events and commands; callers collect
//! them with [`AudioPlayer::drain_notifications`](crate::AudioPlayer::drain_notifications)
//! or, when running as a service, by subscribing to the broadcast channel.

use crate::item::{AudioItem, MetadataItem};
use crate::types::{PlayerState, TimeRange};
use std::time::Duration;

/// Point-in-time notifications emitted by the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotification {
    /// Only emitted when the state value actually changed
    StateChanged { from: PlayerState, to: PlayerState },

    /// A new item is about to play
    WillStartPlaying { item: AudioItem },

    /// Periodic progress update
    ProgressionUpdated {
        time: Duration,
        /// 0 to 100
        percentage: f32,
    },

    DurationFound { duration: Duration, item: AudioItem },

    MetadataFound {
        item: AudioItem,
        metadata: Vec<MetadataItem>,
    },

    LoadedRange { range: TimeRange, item: AudioItem },
}
