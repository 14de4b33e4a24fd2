//! Soul Player - Streaming Playback Controller
//!
//! Resilient playback of remote audio items for Soul Player.
//!
//! This crate provides:
//! - A playback state machine (buffering, playing, paused, stopped, waiting
//!   for connection, failed)
//! - Items with up to three quality tiers and nearest-tier fallback
//! - A play queue with shuffle, repeat-one and repeat-all
//! - Automatic retries after decoder failures
//! - Waiting out connectivity loss and resuming afterwards
//! - Automatic quality adjustment based on buffering interruptions
//! - Seeking, held seek gestures and remote control commands
//!
//! # Architecture
//!
//! `soul-stream-player` never talks to a platform API itself. Decoding,
//! reachability, the system audio session, background execution and the
//! now-playing display are injected through the traits in [`capability`].
//!
//! Observation is split into event producers (see [`producer`]) that push
//! [`Event`]s into a channel. The [`AudioPlayer`] drains that channel on its
//! own execution context, so every state change happens on one thread of
//! control. [`PlayerService`] runs that loop on a tokio task.
//!
//! # Example: Driving the player directly
//!
//! ```no_run
//! use soul_stream_player::{AudioItem, AudioPlayer, PlayerCapabilities, PlayerConfig};
//! use url::Url;
//!
//! # async fn run(capabilities: PlayerCapabilities) -> soul_stream_player::Result<()> {
//! let item = AudioItem::with_urls(
//!     Some(Url::parse("https://cdn.example.com/song-320.mp3").unwrap()),
//!     Some(Url::parse("https://cdn.example.com/song-128.mp3").unwrap()),
//!     None,
//! )?;
//!
//! let mut player = AudioPlayer::new(PlayerConfig::default(), capabilities);
//! player.play_item(item);
//!
//! while let Some(event) = player.next_event().await {
//!     player.handle_event(event);
//!     for notification in player.drain_notifications() {
//!         println!("{notification:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Running as a service
//!
//! ```no_run
//! use soul_stream_player::{AudioPlayer, PlayerCapabilities, PlayerConfig, PlayerService};
//!
//! # async fn run(capabilities: PlayerCapabilities) -> soul_stream_player::Result<()> {
//! let config = PlayerConfig::load(None)?;
//! let handle = PlayerService::spawn(AudioPlayer::new(config, capabilities))?;
//! let mut notifications = handle.subscribe();
//!
//! handle.resume().await?;
//! while let Ok(notification) = notifications.recv().await {
//!     println!("{notification:?}");
//! }
//!
//! let _player = handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod capability;
pub mod error;
pub mod event;
pub mod item;
pub mod notification;
pub mod now_playing;
pub mod player;
pub mod producer;
pub mod queue;
pub mod service;
pub mod shuffle;
pub mod types;

pub use capability::{
    AudioSession, BackgroundTaskId, BackgroundTasks, DecoderSession, MediaDecoder,
    NowPlayingCenter, PlayerCapabilities, Reachability, ReachabilityStatus, SessionNotification,
    SessionObserver, SessionStatus, SystemAudioNotification, SystemAudioObserver,
};
pub use error::{DecoderError, EndedError, FailureReason, PlaybackError, Result};
pub use event::{
    AudioItemEvent, Event, NetworkEvent, PlayerEvent, QualityAdjustmentEvent, RetryEvent,
    SeekEvent,
};
pub use item::{AudioItem, ItemChange, ItemMetadata, MetadataItem, MetadataKey, MetadataValue};
pub use notification::PlayerNotification;
pub use now_playing::NowPlayingInfo;
pub use player::AudioPlayer;
pub use producer::{EventProducer, EventSink};
pub use queue::{AudioItemQueue, AudioItemQueueDelegate};
pub use service::{PlayerCommand, PlayerHandle, PlayerService};
pub use types::{
    AudioQuality, BufferingStrategy, PlayerConfig, PlayerMode, PlayerState, RemoteCommand,
    SeekDirection, SeekingBehavior, TimeRange,
};
