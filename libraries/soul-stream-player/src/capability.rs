//! Platform capabilities consumed by the player
//!
//! The player never talks to a platform API directly. Everything it needs
//! (decoding, reachability, the system audio session, background execution
//! and the now-playing display) is injected through these traits, assembled
//! once into [`PlayerCapabilities`].

use crate::error::DecoderError;
use crate::item::MetadataItem;
use crate::now_playing::NowPlayingInfo;
use crate::types::{BufferingStrategy, TimeRange};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

// ===== Decoder =====

/// Opens decoder sessions for source locators
pub trait MediaDecoder: Send + Sync {
    /// Start loading `source`; readiness is reported through the session observer
    fn load(
        &self,
        source: &Url,
        strategy: BufferingStrategy,
    ) -> Result<Arc<dyn DecoderSession>, DecoderError>;

    /// Start fetching `source` ahead of time so a later `load` begins warm
    ///
    /// Decoders without a cache can ignore this.
    fn preload(&self, _source: &Url) {}

    /// Forget everything fetched by `preload`
    fn clear_cache(&self) {}
}

/// Readiness of a decoder session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Unknown,
    ReadyToPlay,
    Failed(DecoderError),
}

/// A loaded media item inside the decoder
///
/// Sessions are shared between the player (which owns them) and the player
/// event producer (which only observes them), hence `&self` methods.
pub trait DecoderSession: Send + Sync {
    fn set_rate(&self, rate: f32);

    fn rate(&self) -> f32;

    fn set_volume(&self, volume: f32);

    /// Seek with optional tolerances; `None` lets the decoder pick
    fn seek(
        &self,
        time: Duration,
        tolerance_before: Option<Duration>,
        tolerance_after: Option<Duration>,
    );

    fn current_time(&self) -> Option<Duration>;

    fn duration(&self) -> Option<Duration>;

    fn loaded_ranges(&self) -> Vec<TimeRange>;

    fn seekable_ranges(&self) -> Vec<TimeRange>;

    fn status(&self) -> SessionStatus;

    fn is_playback_buffer_empty(&self) -> bool;

    /// Swap the underlying source in place (used for quality changes)
    fn replace_source(&self, source: &Url) -> Result<(), DecoderError>;

    /// Start delivering notifications, with progress ticks every `progress_interval`
    fn observe(&self, observer: Arc<dyn SessionObserver>, progress_interval: Duration);

    fn stop_observing(&self);
}

/// Raw notifications from a decoder session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    PlaybackBufferEmpty,
    PlaybackLikelyToKeepUp,
    StatusChanged(SessionStatus),
    DurationAvailable(Duration),
    LoadedRangesChanged(Vec<TimeRange>),
    TimedMetadata(Vec<MetadataItem>),
    /// Common metadata discovered alongside the duration
    CommonMetadata(Vec<MetadataItem>),
    PeriodicTime(Duration),
    DidPlayToEnd,
}

pub trait SessionObserver: Send + Sync {
    fn on_session_notification(&self, notification: SessionNotification);
}

// ===== Reachability =====

/// Tri-state connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReachabilityStatus {
    ReachableViaWifi,
    ReachableViaCellular,
    Unreachable,
}

impl ReachabilityStatus {
    pub fn is_reachable(self) -> bool {
        !matches!(self, ReachabilityStatus::Unreachable)
    }
}

/// Invoked by the reachability source whenever its status may have changed
pub type ReachabilityCallback = Arc<dyn Fn() + Send + Sync>;

pub trait Reachability: Send + Sync {
    fn current_status(&self) -> ReachabilityStatus;

    fn subscribe(&self, callback: ReachabilityCallback);

    fn unsubscribe(&self);
}

// ===== Audio session =====

/// System-level audio notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAudioNotification {
    InterruptionBegan,
    InterruptionEnded {
        /// Whether the system suggests resuming
        should_resume: bool,
    },
    RouteChanged,
    MediaServicesLost,
    MediaServicesReset,
}

pub trait SystemAudioObserver: Send + Sync {
    fn on_system_notification(&self, notification: SystemAudioNotification);
}

pub trait AudioSession: Send + Sync {
    fn activate(&self, active: bool);

    fn observe(&self, observer: Arc<dyn SystemAudioObserver>);

    fn stop_observing(&self);
}

// ===== Background execution & now playing =====

/// Identifier of an OS-granted background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

pub trait BackgroundTasks: Send + Sync {
    fn begin_background_task(&self) -> BackgroundTaskId;

    fn end_background_task(&self, id: BackgroundTaskId);
}

/// Lock screen / system media display
pub trait NowPlayingCenter: Send + Sync {
    /// `None` clears the display
    fn update(&self, info: Option<NowPlayingInfo>);
}

/// Every platform collaborator the player needs
#[derive(Clone)]
pub struct PlayerCapabilities {
    pub decoder: Arc<dyn MediaDecoder>,
    pub reachability: Arc<dyn Reachability>,
    pub audio_session: Arc<dyn AudioSession>,
    pub background_tasks: Arc<dyn BackgroundTasks>,
    pub now_playing: Arc<dyn NowPlayingCenter>,
}
