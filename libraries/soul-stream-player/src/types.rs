//! Core types for the streaming player

use crate::error::{FailureReason, PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Player state
///
/// Exactly one value is current at any time. Failed states compare equal
/// when their [`FailureReason`] is of the same kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerState {
    /// Waiting for enough data to play
    Buffering,

    /// Audio is rendering
    Playing,

    /// Paused by the user, an interruption or a route change
    Paused,

    /// Nothing loaded
    Stopped,

    /// Streaming source unavailable until connectivity returns
    WaitingForConnection,

    /// Playback failed; sticky until a new play command
    Failed(FailureReason),
}

impl PlayerState {
    pub fn is_buffering(&self) -> bool {
        matches!(self, PlayerState::Buffering)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlayerState::Paused)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, PlayerState::Stopped)
    }

    pub fn is_waiting_for_connection(&self) -> bool {
        matches!(self, PlayerState::WaitingForConnection)
    }

    /// The failure reason, if the player failed
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            PlayerState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Queue ordering mode
///
/// Three independent flags. `repeat` replays the anchored item forever,
/// `repeat_all` wraps to the start after the last item, and `shuffle`
/// randomizes the order. Any combination is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerMode {
    /// Randomized order
    #[serde(default)]
    pub shuffle: bool,

    /// Repeat the current item
    #[serde(default)]
    pub repeat: bool,

    /// Loop the whole queue
    #[serde(default)]
    pub repeat_all: bool,
}

impl PlayerMode {
    /// Sequential, no repeat
    pub const NORMAL: Self = Self {
        shuffle: false,
        repeat: false,
        repeat_all: false,
    };

    pub const SHUFFLE: Self = Self {
        shuffle: true,
        repeat: false,
        repeat_all: false,
    };

    pub const REPEAT: Self = Self {
        shuffle: false,
        repeat: true,
        repeat_all: false,
    };

    pub const REPEAT_ALL: Self = Self {
        shuffle: false,
        repeat: false,
        repeat_all: true,
    };

    pub fn is_shuffle_active(self) -> bool {
        self.shuffle
    }

    pub fn is_repeat_one(self) -> bool {
        self.repeat
    }

    pub fn is_repeat_all(self) -> bool {
        self.repeat_all
    }

    /// No flag set
    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }

    #[must_use]
    pub fn with_shuffle(self, shuffle: bool) -> Self {
        Self { shuffle, ..self }
    }

    #[must_use]
    pub fn with_repeat(self, repeat: bool) -> Self {
        Self { repeat, ..self }
    }

    #[must_use]
    pub fn with_repeat_all(self, repeat_all: bool) -> Self {
        Self { repeat_all, ..self }
    }
}

/// Quality tier of an item source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    Medium,
    High,
}

impl AudioQuality {
    /// Lookup order used when the requested tier is missing
    pub fn fallback_order(self) -> [AudioQuality; 3] {
        match self {
            AudioQuality::High => [AudioQuality::High, AudioQuality::Medium, AudioQuality::Low],
            AudioQuality::Medium => [AudioQuality::Medium, AudioQuality::Low, AudioQuality::High],
            AudioQuality::Low => [AudioQuality::Low, AudioQuality::Medium, AudioQuality::High],
        }
    }

    /// One tier down, if any
    pub fn lower(self) -> Option<AudioQuality> {
        match self {
            AudioQuality::High => Some(AudioQuality::Medium),
            AudioQuality::Medium => Some(AudioQuality::Low),
            AudioQuality::Low => None,
        }
    }

    /// One tier up, if any
    pub fn higher(self) -> Option<AudioQuality> {
        match self {
            AudioQuality::Low => Some(AudioQuality::Medium),
            AudioQuality::Medium => Some(AudioQuality::High),
            AudioQuality::High => None,
        }
    }
}

/// A span of media time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub earliest: Duration,
    pub latest: Duration,
}

impl TimeRange {
    pub fn new(earliest: Duration, latest: Duration) -> Self {
        Self { earliest, latest }
    }

    /// Bring `time` back inside the range
    ///
    /// Times before the range land `padding` after its start, times after it
    /// land `padding` before its end. Times inside are returned unchanged.
    pub fn clamp_with_padding(&self, time: Duration, padding: Duration) -> Duration {
        if time < self.earliest {
            (self.earliest + padding).min(self.latest)
        } else if time > self.latest {
            self.latest.saturating_sub(padding).max(self.earliest)
        } else {
            time
        }
    }

    pub fn contains(&self, time: Duration) -> bool {
        self.earliest <= time && time <= self.latest
    }
}

/// Direction of a held seek gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeekDirection {
    Backward,
    Forward,
}

/// What a held seek gesture does
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeekingBehavior {
    /// Jump by `delta` every `every`
    ChangeTime {
        #[serde(with = "duration_secs")]
        every: Duration,
        #[serde(with = "duration_secs")]
        delta: Duration,
    },

    /// Play faster (or backwards) by a factor
    MultiplyRate { factor: f32 },
}

impl Default for SeekingBehavior {
    fn default() -> Self {
        SeekingBehavior::MultiplyRate { factor: 2.0 }
    }
}

/// How eagerly the decoder buffers ahead of the playhead
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferingStrategy {
    /// Let the decoder pick its buffer size
    #[default]
    Default,

    /// Buffer as much as the decoder allows
    Aggressive,
}

/// Commands coming from a remote control surface (media keys, headset, lock screen)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    Stop,
    BeginSeeking(SeekDirection),
    EndSeeking(SeekDirection),
}

/// Configuration for the audio player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// How long a connection loss may last before resuming is abandoned (default: 60s)
    #[serde(
        default = "default_maximum_connection_loss_time",
        with = "duration_secs"
    )]
    pub maximum_connection_loss_time: Duration,

    /// Switch quality tiers based on interruptions (default: true)
    #[serde(default = "default_true")]
    pub adjust_quality_automatically: bool,

    /// Tier used for new items (default: medium)
    #[serde(default = "default_quality")]
    pub default_quality: AudioQuality,

    /// Period after which quality goes up if nothing was interrupted (default: 10min)
    #[serde(
        default = "default_adjust_quality_time_interval",
        with = "duration_secs"
    )]
    pub adjust_quality_time_interval: Duration,

    /// Interruptions within a period that force quality down (default: 3)
    #[serde(default = "default_adjust_quality_after_interruption_count")]
    pub adjust_quality_after_interruption_count: u32,

    /// Retries on the same item before moving on (default: 10)
    #[serde(default = "default_maximum_retry_count")]
    pub maximum_retry_count: u32,

    /// Delay between retries (default: 10s)
    #[serde(default = "default_retry_timeout", with = "duration_secs")]
    pub retry_timeout: Duration,

    /// Resume once a system interruption ends (default: true)
    #[serde(default = "default_true")]
    pub resume_after_interruption: bool,

    /// Resume once connectivity returns (default: true)
    #[serde(default = "default_true")]
    pub resume_after_connection_loss: bool,

    /// Initial volume, 0.0 to 1.0 (default: 1.0)
    #[serde(default = "default_one")]
    pub volume: f32,

    /// Initial playback rate (default: 1.0)
    #[serde(default = "default_one")]
    pub rate: f32,

    /// Gesture behavior while a seek key is held
    #[serde(default)]
    pub seeking_behavior: SeekingBehavior,

    /// Interval between progress ticks (default: 0.5s)
    #[serde(default = "default_progress_interval", with = "duration_secs")]
    pub progress_interval: Duration,

    /// Distance kept from seekable range bounds (default: 1s)
    #[serde(default = "default_seek_padding", with = "duration_secs")]
    pub seek_padding: Duration,

    /// Initial queue mode (default: normal)
    #[serde(default)]
    pub mode: PlayerMode,

    /// Passed to the decoder with every load (default: default)
    #[serde(default)]
    pub buffering_strategy: BufferingStrategy,

    /// Warm up the next queue item once the current one can play (default: true)
    #[serde(default = "default_true")]
    pub preload_next_item: bool,
}

fn default_maximum_connection_loss_time() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

fn default_quality() -> AudioQuality {
    AudioQuality::Medium
}

fn default_adjust_quality_time_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_adjust_quality_after_interruption_count() -> u32 {
    3
}

fn default_maximum_retry_count() -> u32 {
    10
}

fn default_retry_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_one() -> f32 {
    1.0
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_seek_padding() -> Duration {
    Duration::from_secs(1)
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            maximum_connection_loss_time: default_maximum_connection_loss_time(),
            adjust_quality_automatically: true,
            default_quality: default_quality(),
            adjust_quality_time_interval: default_adjust_quality_time_interval(),
            adjust_quality_after_interruption_count:
                default_adjust_quality_after_interruption_count(),
            maximum_retry_count: default_maximum_retry_count(),
            retry_timeout: default_retry_timeout(),
            resume_after_interruption: true,
            resume_after_connection_loss: true,
            volume: 1.0,
            rate: 1.0,
            seeking_behavior: SeekingBehavior::default(),
            progress_interval: default_progress_interval(),
            seek_padding: default_seek_padding(),
            mode: PlayerMode::NORMAL,
            buffering_strategy: BufferingStrategy::Default,
            preload_next_item: true,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from an optional file, then the environment
    ///
    /// Environment variables use the `SOUL_PLAYER` prefix and a double
    /// underscore separator, e.g. `SOUL_PLAYER__MAXIMUM_RETRY_COUNT=3`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path.to_path_buf()).required(false));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SOUL_PLAYER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))
    }
}

/// Serde helper writing durations as fractional seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
