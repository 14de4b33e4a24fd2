//! The audio player controller
//!
//! [`AudioPlayer`] owns the queue, the decoder session, the state machine and
//! every event producer. It is a plain `&mut self` state machine: producers
//! push [`Event`]s into a channel, and the player handles them one at a time
//! when [`process_pending_events`](AudioPlayer::process_pending_events) or
//! [`next_event`](AudioPlayer::next_event) is driven by its owner. Commands
//! and events therefore never interleave.

mod control;
mod handlers;

use crate::background::BackgroundHandler;
use crate::capability::{DecoderSession, PlayerCapabilities};
use crate::event::Event;
use crate::item::AudioItem;
use crate::notification::PlayerNotification;
use crate::now_playing::NowPlayingInfo;
use crate::producer::{
    AudioItemEventProducer, EventProducer, EventSink, NetworkEventProducer, PlayerEventProducer,
    QualityAdjustmentEventProducer, RetryEventProducer, SeekEventProducer,
};
use crate::queue::{AudioItemQueue, AudioItemQueueDelegate};
use crate::types::{
    AudioQuality, BufferingStrategy, PlayerConfig, PlayerMode, PlayerState, SeekingBehavior,
    TimeRange,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Seek tick interval used until a `ChangeTime` behavior is configured
const DEFAULT_SEEK_INTERVAL: Duration = Duration::from_secs(1);

/// Streaming audio player
///
/// # Examples
///
/// ```no_run
/// # use soul_stream_player::{AudioItem, AudioPlayer, PlayerCapabilities, PlayerConfig};
/// # async fn run(capabilities: PlayerCapabilities, item: AudioItem) {
/// let mut player = AudioPlayer::new(PlayerConfig::default(), capabilities);
/// player.play_item(item);
///
/// while let Some(event) = player.next_event().await {
///     player.handle_event(event);
///     for notification in player.drain_notifications() {
///         println!("{notification:?}");
///     }
/// }
/// # }
/// ```
pub struct AudioPlayer {
    config: PlayerConfig,
    capabilities: PlayerCapabilities,
    state: PlayerState,

    // Playback
    current_item: Option<AudioItem>,
    queue: Option<AudioItemQueue>,
    queue_delegate: Option<Arc<dyn AudioItemQueueDelegate>>,
    session: Option<Arc<dyn DecoderSession>>,
    current_quality: AudioQuality,

    // Recovery bookkeeping
    retry_count: u32,
    paused_for_interruption: bool,
    quality_is_being_changed: bool,
    state_before_buffering: Option<PlayerState>,
    state_when_connection_lost: Option<PlayerState>,
    waiting_since: Option<Instant>,
    current_item_since: Option<Instant>,
    rate_before_seeking: Option<f32>,
    preloaded_source: Option<Url>,
    background: BackgroundHandler,

    // Event producers
    network_events: NetworkEventProducer,
    player_events: PlayerEventProducer,
    quality_events: QualityAdjustmentEventProducer,
    retry_events: RetryEventProducer,
    seek_events: SeekEventProducer,
    item_events: AudioItemEventProducer,
    events: Option<UnboundedReceiver<Event>>,

    pending_notifications: Vec<PlayerNotification>,
}

impl AudioPlayer {
    /// Create a stopped player
    ///
    /// Producers that rely on timers need a tokio runtime when they start;
    /// constructing the player does not.
    pub fn new(config: PlayerConfig, capabilities: PlayerCapabilities) -> Self {
        let (sink, events) = EventSink::channel();
        let seek_interval = match config.seeking_behavior {
            SeekingBehavior::ChangeTime { every, .. } => every,
            SeekingBehavior::MultiplyRate { .. } => DEFAULT_SEEK_INTERVAL,
        };

        Self {
            network_events: NetworkEventProducer::new(
                Arc::clone(&capabilities.reachability),
                sink.clone(),
            ),
            player_events: PlayerEventProducer::new(
                Arc::clone(&capabilities.audio_session),
                sink.clone(),
                config.progress_interval,
            ),
            quality_events: QualityAdjustmentEventProducer::new(
                sink.clone(),
                config.adjust_quality_time_interval,
                config.adjust_quality_after_interruption_count,
            ),
            retry_events: RetryEventProducer::new(
                sink.clone(),
                config.retry_timeout,
                config.maximum_retry_count,
            ),
            seek_events: SeekEventProducer::new(sink.clone(), seek_interval),
            item_events: AudioItemEventProducer::new(sink),
            events: Some(events),
            background: BackgroundHandler::new(Arc::clone(&capabilities.background_tasks)),
            current_quality: config.default_quality,
            state: PlayerState::Stopped,
            current_item: None,
            queue: None,
            queue_delegate: None,
            session: None,
            retry_count: 0,
            paused_for_interruption: false,
            quality_is_being_changed: false,
            state_before_buffering: None,
            state_when_connection_lost: None,
            waiting_since: None,
            current_item_since: None,
            rate_before_seeking: None,
            preloaded_source: None,
            pending_notifications: Vec::new(),
            config,
            capabilities,
        }
    }

    // ===== State =====

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    /// Move to `state`, notifying only when the value changes
    ///
    /// Entering `Buffering` holds a background task, leaving it releases one.
    /// Entering `Failed` cancels any armed retry timer. The now-playing
    /// display is refreshed on every call.
    fn set_state(&mut self, state: PlayerState) {
        let old = std::mem::replace(&mut self.state, state);
        self.update_now_playing_info();
        if old == self.state {
            return;
        }

        if self.state.is_buffering() {
            self.background.begin();
        } else if old.is_buffering() {
            self.background.end();
        }

        if self.state.failure().is_some() {
            self.retry_events.stop_producing_events();
        }

        if self.state.is_waiting_for_connection() {
            self.waiting_since = Some(Instant::now());
        } else if old.is_waiting_for_connection() {
            self.waiting_since = None;
        }

        debug!(from = ?old, to = ?self.state, "Player state changed");
        self.notify(PlayerNotification::StateChanged {
            from: old,
            to: self.state.clone(),
        });
    }

    /// Whether playback should continue once data is available again
    fn should_resume_playing(&self) -> bool {
        !self.state.is_paused()
            && !self.paused_for_interruption
            && !self
                .state_when_connection_lost
                .as_ref()
                .is_some_and(PlayerState::is_paused)
            && !self
                .state_before_buffering
                .as_ref()
                .is_some_and(PlayerState::is_paused)
    }

    // ===== Item & Queue Accessors =====

    pub fn current_item(&self) -> Option<&AudioItem> {
        self.current_item.as_ref()
    }

    /// Quality tier of the source currently loaded
    pub fn current_quality(&self) -> AudioQuality {
        self.current_quality
    }

    /// Items in play order, if a queue exists
    pub fn items(&self) -> Option<&[AudioItem]> {
        self.queue.as_ref().map(AudioItemQueue::queue)
    }

    pub fn queue(&self) -> Option<&AudioItemQueue> {
        self.queue.as_ref()
    }

    /// Position of the current item in play order
    pub fn current_item_index_in_queue(&self) -> Option<usize> {
        let item = self.current_item.as_ref()?;
        self.queue.as_ref()?.queue().iter().position(|i| i == item)
    }

    pub fn has_next(&self) -> bool {
        self.queue.as_ref().is_some_and(AudioItemQueue::has_next_item)
    }

    pub fn has_previous(&self) -> bool {
        self.queue
            .as_ref()
            .is_some_and(AudioItemQueue::has_previous_item)
    }

    // ===== Session Accessors =====

    pub fn current_item_progression(&self) -> Option<Duration> {
        self.session.as_ref()?.current_time()
    }

    /// Duration of the current item, once the decoder knows it
    pub fn current_item_duration(&self) -> Option<Duration> {
        self.session
            .as_ref()?
            .duration()
            .filter(|duration| !duration.is_zero())
    }

    pub fn current_item_loaded_range(&self) -> Option<TimeRange> {
        self.session.as_ref()?.loaded_ranges().last().copied()
    }

    /// Last seekable range, or a zero-width range at the current time
    pub fn current_item_seekable_range(&self) -> Option<TimeRange> {
        let session = self.session.as_ref()?;
        session
            .seekable_ranges()
            .last()
            .copied()
            .or_else(|| session.current_time().map(|time| TimeRange::new(time, time)))
    }

    fn current_item_is_offline(&self) -> bool {
        self.current_item
            .as_ref()
            .is_some_and(|item| item.url_for_quality(self.current_quality).is_offline())
    }

    // ===== Configuration =====

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn mode(&self) -> PlayerMode {
        self.config.mode
    }

    pub fn volume(&self) -> f32 {
        self.config.volume
    }

    pub fn rate(&self) -> f32 {
        self.config.rate
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Interruptions counted toward the next quality downgrade
    pub fn interruption_count(&self) -> u32 {
        self.quality_events.interruption_count()
    }

    pub fn is_reachable(&self) -> bool {
        self.network_events.is_reachable()
    }

    pub fn set_maximum_connection_loss_time(&mut self, time: Duration) {
        self.config.maximum_connection_loss_time = time;
    }

    pub fn set_adjust_quality_automatically(&mut self, enabled: bool) {
        self.config.adjust_quality_automatically = enabled;
    }

    pub fn set_default_quality(&mut self, quality: AudioQuality) {
        self.config.default_quality = quality;
    }

    pub fn set_adjust_quality_time_interval(&mut self, interval: Duration) {
        self.config.adjust_quality_time_interval = interval;
        self.quality_events.set_adjust_quality_time_interval(interval);
    }

    pub fn set_adjust_quality_after_interruption_count(&mut self, count: u32) {
        self.config.adjust_quality_after_interruption_count = count;
        self.quality_events
            .set_adjust_quality_after_interruption_count(count);
    }

    /// Applies to the next armed retry timer
    pub fn set_maximum_retry_count(&mut self, count: u32) {
        self.config.maximum_retry_count = count;
        self.retry_events.set_maximum_retry_count(count);
    }

    pub fn set_retry_timeout(&mut self, timeout: Duration) {
        self.config.retry_timeout = timeout;
        self.retry_events.set_retry_timeout(timeout);
    }

    pub fn set_resume_after_interruption(&mut self, resume: bool) {
        self.config.resume_after_interruption = resume;
    }

    pub fn set_resume_after_connection_loss(&mut self, resume: bool) {
        self.config.resume_after_connection_loss = resume;
    }

    pub fn set_seeking_behavior(&mut self, behavior: SeekingBehavior) {
        self.seek_events.stop_producing_events();
        self.rate_before_seeking = None;
        self.config.seeking_behavior = behavior;
    }

    pub fn set_seek_padding(&mut self, padding: Duration) {
        self.config.seek_padding = padding;
    }

    pub fn set_buffering_strategy(&mut self, strategy: BufferingStrategy) {
        self.config.buffering_strategy = strategy;
    }

    pub fn set_preload_next_item(&mut self, enabled: bool) {
        self.config.preload_next_item = enabled;
    }

    // ===== Events =====

    /// Handle every event already waiting in the channel
    ///
    /// Returns how many were handled. Does nothing once the receiver has been
    /// handed to a [`PlayerService`](crate::PlayerService).
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.events.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next producer event
    ///
    /// The caller passes it to [`handle_event`](Self::handle_event).
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.as_mut()?.recv().await
    }

    pub(crate) fn take_events(&mut self) -> Option<UnboundedReceiver<Event>> {
        self.events.take()
    }

    pub(crate) fn restore_events(&mut self, events: UnboundedReceiver<Event>) {
        self.events = Some(events);
    }

    // ===== Notifications =====

    /// Drain all pending notifications
    ///
    /// Returns everything queued since the last drain, oldest first.
    pub fn drain_notifications(&mut self) -> Vec<PlayerNotification> {
        std::mem::take(&mut self.pending_notifications)
    }

    pub fn has_pending_notifications(&self) -> bool {
        !self.pending_notifications.is_empty()
    }

    fn notify(&mut self, notification: PlayerNotification) {
        self.pending_notifications.push(notification);
    }

    fn update_now_playing_info(&self) {
        let info = self.current_item.as_ref().map(|item| {
            NowPlayingInfo::for_item(
                item,
                self.current_item_duration(),
                self.current_item_progression(),
                self.session.as_ref().map_or(0.0, |session| session.rate()),
            )
        });
        self.capabilities.now_playing.update(info);
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.retry_events.stop_producing_events();
        self.seek_events.stop_producing_events();
        self.quality_events.stop_producing_events();
        self.player_events.stop_producing_events();
        self.network_events.stop_producing_events();
        self.item_events.stop_producing_events();
        self.background.end();
    }
}
