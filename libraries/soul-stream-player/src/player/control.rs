use super::AudioPlayer;
use crate::capability::DecoderSession;
use crate::error::{EndedError, FailureReason, PlaybackError, Result};
use crate::item::AudioItem;
use crate::notification::PlayerNotification;
use crate::producer::EventProducer;
use crate::queue::{AudioItemQueue, AudioItemQueueDelegate};
use crate::types::{
    AudioQuality, PlayerMode, PlayerState, RemoteCommand, SeekDirection, SeekingBehavior,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

impl AudioPlayer {
    // ===== Queue =====

    /// Play a single item, replacing the queue
    pub fn play_item(&mut self, item: AudioItem) {
        // A one-item list always has index 0.
        let _ = self.play_items(vec![item], 0);
    }

    /// Replace the queue with `items` and start at `start_index`
    ///
    /// `start_index` refers to `items` as given. In shuffle mode the queue
    /// cursor is moved to wherever that item landed.
    pub fn play_items(&mut self, items: Vec<AudioItem>, start_index: usize) -> Result<()> {
        if items.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        let start = items
            .get(start_index)
            .cloned()
            .ok_or(PlaybackError::IndexOutOfBounds(start_index))?;

        let mut queue = AudioItemQueue::new(items, self.config.mode);
        queue.set_delegate(self.queue_delegate.clone());
        if let Some(position) = queue.queue().iter().position(|item| *item == start) {
            queue.set_next_position(position);
        }
        info!(items = queue.len(), start_index, "Playing new queue");

        self.queue = Some(queue);
        self.retry_count = 0;
        self.clear_resume_flags();

        match self.queue.as_mut().and_then(AudioItemQueue::next_item) {
            Some(item) => self.set_current_item(item),
            None => self.stop(),
        }
        Ok(())
    }

    /// Append to the queue, or start playing if there is none
    pub fn add_item(&mut self, item: AudioItem) {
        self.add_items(vec![item]);
    }

    pub fn add_items(&mut self, items: Vec<AudioItem>) {
        match &mut self.queue {
            Some(queue) => queue.add(items),
            None => {
                let _ = self.play_items(items, 0);
            }
        }
    }

    /// Remove the item at `index` in play order
    pub fn remove_item(&mut self, index: usize) -> Result<AudioItem> {
        let queue = self.queue.as_mut().ok_or(PlaybackError::QueueEmpty)?;
        queue
            .remove(index)
            .ok_or(PlaybackError::IndexOutOfBounds(index))
    }

    /// Install a filter deciding which items the queue may return
    pub fn set_queue_delegate(&mut self, delegate: Option<Arc<dyn AudioItemQueueDelegate>>) {
        if let Some(queue) = &mut self.queue {
            queue.set_delegate(delegate.clone());
        }
        self.queue_delegate = delegate;
    }

    pub fn set_mode(&mut self, mode: PlayerMode) {
        self.config.mode = mode;
        if let Some(queue) = &mut self.queue {
            queue.set_mode(mode);
        }
    }

    // ===== Playback Control =====

    /// Resume playback
    ///
    /// While waiting for connectivity this only marks playback to continue once
    /// the connection returns. With no usable decoder session the current item
    /// is loaded again.
    pub fn resume(&mut self) {
        if self.current_item.is_none() {
            return;
        }
        if self.state.is_waiting_for_connection() {
            self.paused_for_interruption = false;
            self.state_before_buffering = None;
            self.state_when_connection_lost = Some(PlayerState::Playing);
            return;
        }
        self.clear_resume_flags();

        let failed = self.state.failure().is_some();
        if failed {
            self.retry_count = 0;
        }
        let session = match self.session.clone() {
            Some(session) if !failed => session,
            _ => {
                self.retry_or_play_next();
                return;
            }
        };

        session.set_rate(self.config.rate);
        if !self.state.is_playing() && !self.state.is_buffering() {
            self.set_state(PlayerState::Playing);
        }
        if !self.state.is_playing() {
            self.retry_events.start_producing_events();
        }
    }

    pub fn pause(&mut self) {
        if self.current_item.is_none() || self.state.failure().is_some() {
            return;
        }
        self.paused_for_interruption = false;
        for remembered in [
            &mut self.state_when_connection_lost,
            &mut self.state_before_buffering,
        ] {
            if let Some(state) = remembered {
                *state = PlayerState::Paused;
            }
        }
        if let Some(session) = &self.session {
            session.set_rate(0.0);
        }
        self.set_state(PlayerState::Paused);
        self.retry_events.stop_producing_events();
        self.background.begin();
    }

    pub fn toggle_play_pause(&mut self) {
        if self.state.is_playing() || self.state.is_buffering() {
            self.pause();
        } else {
            self.resume();
        }
    }

    /// Skip to the next item the queue yields, stopping if there is none
    pub fn next(&mut self) {
        match self.queue.as_mut().and_then(AudioItemQueue::next_item) {
            Some(item) => self.set_current_item(item),
            None => self.stop(),
        }
    }

    /// Go back one item, or restart the current one when there is no previous
    pub fn previous(&mut self) {
        let previous = if self.has_previous() {
            self.queue.as_mut().and_then(AudioItemQueue::previous_item)
        } else {
            None
        };

        match previous {
            Some(item) => self.set_current_item(item),
            None => {
                let _ = self.seek_unclamped(Duration::ZERO);
            }
        }
    }

    /// Called when the current item finished
    pub fn next_or_stop(&mut self) {
        if self.config.mode.is_repeat_one() {
            let _ = self.seek_unclamped(Duration::ZERO);
            self.resume();
            if let Some(item) = self.current_item.clone() {
                self.notify(PlayerNotification::WillStartPlaying { item });
            }
        } else if self.has_next() {
            self.next();
        } else {
            self.stop();
        }
    }

    /// Stop everything and clear the queue
    pub fn stop(&mut self) {
        self.retry_events.stop_producing_events();
        self.seek_events.stop_producing_events();
        self.replace_session(None);
        self.network_events.stop_producing_events();
        self.item_events.set_item(None);

        self.current_item = None;
        self.queue = None;
        self.capabilities.audio_session.activate(false);

        self.retry_count = 0;
        self.quality_events.reset_interruption_count();
        self.quality_is_being_changed = false;
        self.rate_before_seeking = None;
        self.current_item_since = None;
        self.preloaded_source = None;
        self.clear_resume_flags();

        self.set_state(PlayerState::Stopped);
        self.background.end();
    }

    /// Reload the current item at the same position, or move on once the
    /// retry budget is spent
    ///
    /// Does nothing but cancel the retry timer while playing.
    pub fn retry_or_play_next(&mut self) {
        if self.state.is_playing() {
            self.retry_events.stop_producing_events();
            return;
        }
        self.retry_or_advance();
    }

    pub(super) fn retry_or_advance(&mut self) {
        if let Some(item) = self.current_item.clone() {
            if self.retry_count < self.config.maximum_retry_count {
                let progression = self.current_item_progression();
                self.retry_count += 1;
                info!(
                    retry = self.retry_count,
                    maximum = self.config.maximum_retry_count,
                    "Retrying current item"
                );

                self.set_current_item(item);
                if self.state.failure().is_some() {
                    return;
                }
                if let (Some(time), Some(session)) = (progression, &self.session) {
                    session.seek(time, None, None);
                }
                self.retry_events.start_producing_events();
                return;
            }
            warn!(retries = self.retry_count, "Retry budget exhausted");
        }

        self.retry_count = 0;
        self.retry_events.stop_producing_events();
        self.next_or_stop();
    }

    // ===== Seeking =====

    /// Seek within the current item
    ///
    /// Times outside the decoder's seekable range are brought back inside it,
    /// `seek_padding` away from the edge.
    pub fn seek(&mut self, time: Duration) -> Result<()> {
        self.seek_with_tolerance(time, None, None)
    }

    pub fn seek_with_tolerance(
        &mut self,
        time: Duration,
        tolerance_before: Option<Duration>,
        tolerance_after: Option<Duration>,
    ) -> Result<()> {
        let session = self.session.clone().ok_or(PlaybackError::NoItemLoaded)?;
        let target = match session.seekable_ranges().last() {
            Some(range) => range.clamp_with_padding(time, self.config.seek_padding),
            None => time,
        };
        debug!(requested = ?time, ?target, "Seeking");
        session.seek(target, tolerance_before, tolerance_after);
        self.update_now_playing_info();
        Ok(())
    }

    /// Seek to a fraction (0.0 to 1.0) of the current item
    pub fn seek_to_percent(&mut self, percent: f32) -> Result<()> {
        let duration = self
            .current_item_duration()
            .ok_or(PlaybackError::NoItemLoaded)?;
        self.seek(duration.mul_f32(percent.clamp(0.0, 1.0)))
    }

    fn seek_unclamped(&mut self, time: Duration) -> Result<()> {
        let session = self.session.as_ref().ok_or(PlaybackError::NoItemLoaded)?;
        session.seek(time, None, None);
        self.update_now_playing_info();
        Ok(())
    }

    /// Start a held seek gesture
    pub fn begin_seeking(&mut self, direction: SeekDirection) {
        match self.config.seeking_behavior {
            SeekingBehavior::MultiplyRate { factor } => {
                let base = *self.rate_before_seeking.get_or_insert(self.config.rate);
                let rate = match direction {
                    SeekDirection::Forward => base * factor,
                    SeekDirection::Backward => -(base * factor),
                };
                if let Some(session) = &self.session {
                    session.set_rate(rate);
                }
            }
            SeekingBehavior::ChangeTime { every, .. } => {
                self.seek_events.stop_producing_events();
                self.seek_events.set_interval(every);
                self.seek_events
                    .set_backward(direction == SeekDirection::Backward);
                self.seek_events.start_producing_events();
            }
        }
    }

    /// Release a held seek gesture
    pub fn end_seeking(&mut self, _direction: SeekDirection) {
        match self.config.seeking_behavior {
            SeekingBehavior::MultiplyRate { .. } => {
                let Some(rate) = self.rate_before_seeking.take() else {
                    return;
                };
                if let Some(session) = &self.session {
                    let rate = if self.state.is_playing() { rate } else { 0.0 };
                    session.set_rate(rate);
                }
            }
            SeekingBehavior::ChangeTime { .. } => self.seek_events.stop_producing_events(),
        }
    }

    /// Route a command from a remote control surface
    pub fn remote_control_received(&mut self, command: RemoteCommand) {
        debug!(?command, "Remote command");
        match command {
            RemoteCommand::Play => self.resume(),
            RemoteCommand::Pause => self.pause(),
            RemoteCommand::TogglePlayPause => self.toggle_play_pause(),
            RemoteCommand::Next => self.next(),
            RemoteCommand::Previous => self.previous(),
            RemoteCommand::Stop => self.stop(),
            RemoteCommand::BeginSeeking(direction) => self.begin_seeking(direction),
            RemoteCommand::EndSeeking(direction) => self.end_seeking(direction),
        }
    }

    // ===== Volume & Rate =====

    /// Set volume (0.0 to 1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.config.volume = volume.clamp(0.0, 1.0);
        if let Some(session) = &self.session {
            session.set_volume(self.config.volume);
        }
    }

    /// Set the playback rate, applied right away while playing
    pub fn set_rate(&mut self, rate: f32) {
        self.config.rate = rate;
        if self.state.is_playing() {
            if let Some(session) = &self.session {
                session.set_rate(rate);
            }
        }
        self.update_now_playing_info();
    }

    // ===== Quality =====

    /// Pick a quality tier by hand
    ///
    /// Applies to the loaded item right away (falling back to the nearest
    /// tier it has) and to every item loaded afterwards.
    pub fn set_quality(&mut self, quality: AudioQuality) {
        let Some(item) = self.current_item.clone() else {
            self.current_quality = quality;
            return;
        };
        let source = item.url_for_quality(quality);
        if self.session.is_none() {
            self.current_quality = source.quality;
            return;
        }
        self.switch_quality(source.quality);
    }

    /// Swap the loaded source for another tier of the same item
    ///
    /// Playback resumes from the current position.
    pub(super) fn switch_quality(&mut self, quality: AudioQuality) {
        if quality == self.current_quality {
            return;
        }
        let (Some(item), Some(session)) = (self.current_item.clone(), self.session.clone()) else {
            return;
        };
        let Some(url) = item.source(quality).cloned() else {
            return;
        };

        let progression = self.current_item_progression();
        // Cleared once the new source reports it can play.
        self.quality_is_being_changed = true;
        match session.replace_source(&url) {
            Ok(()) => {
                if let Some(time) = progression {
                    session.seek(time, Some(Duration::ZERO), Some(Duration::ZERO));
                }
                info!(from = ?self.current_quality, to = ?quality, "Quality changed");
                self.current_quality = quality;
                self.quality_events.reset_interruption_count();
            }
            Err(error) => {
                warn!(%error, ?quality, "Could not switch quality");
                self.quality_is_being_changed = false;
            }
        }
    }

    // ===== Preloading =====

    /// Ask the decoder to start fetching the item that plays after the current one
    ///
    /// Uses the current quality tier. Does nothing when there is no distinct
    /// next item, when that item streams and the network is down, or when its
    /// source was already handed to the decoder.
    pub fn preload_next_item(&mut self) {
        let Some(next) = self.queue.as_ref().and_then(AudioItemQueue::peek_next_item) else {
            return;
        };
        if self.current_item.as_ref() == Some(next) {
            return;
        }
        let source = next.url_for_quality(self.current_quality);
        if !source.is_offline() && !self.network_events.is_reachable() {
            return;
        }
        if self.preloaded_source.as_ref() == Some(&source.url) {
            return;
        }

        debug!(url = %source.url, quality = ?source.quality, "Preloading next item");
        self.capabilities.decoder.preload(&source.url);
        self.preloaded_source = Some(source.url);
    }

    /// Drop whatever the decoder fetched ahead of time
    pub fn clear_preload_cache(&mut self) {
        self.preloaded_source = None;
        self.capabilities.decoder.clear_cache();
    }

    // ===== Internals =====

    /// Load `item` and make it current
    ///
    /// Streaming items are only loaded while the network is reachable;
    /// otherwise the player waits for the connection to come back.
    pub(super) fn set_current_item(&mut self, item: AudioItem) {
        let source = item.url_for_quality(self.current_quality);
        let changed = self.current_item.as_ref() != Some(&item);

        self.replace_session(None);
        self.quality_is_being_changed = false;
        self.current_item = Some(item.clone());
        self.item_events.set_item(Some(item.clone()));
        self.item_events.start_producing_events();
        self.network_events.start_producing_events();
        self.capabilities.audio_session.activate(true);

        if changed {
            self.current_item_since = Some(Instant::now());
            info!(item = %item.id(), quality = ?source.quality, "Starting item");
            self.notify(PlayerNotification::WillStartPlaying { item: item.clone() });
        }

        if !self.network_events.is_reachable() && !source.is_offline() {
            debug!("Network unreachable, waiting before loading");
            self.state_when_connection_lost
                .get_or_insert(PlayerState::Buffering);
            self.set_state(PlayerState::WaitingForConnection);
            self.background.begin();
            return;
        }

        match self
            .capabilities
            .decoder
            .load(&source.url, self.config.buffering_strategy)
        {
            Ok(session) => {
                self.current_quality = source.quality;
                self.set_state(PlayerState::Buffering);
                self.replace_session(Some(session));
                self.update_now_playing_info();
            }
            Err(error) => {
                warn!(%error, url = %source.url, "Decoder could not open item");
                self.set_state(PlayerState::Failed(FailureReason::UnderlyingDecoderError(
                    EndedError::Decoder(error),
                )));
            }
        }
    }

    /// Release the current decoder session and attach `session`, if any
    fn replace_session(&mut self, session: Option<Arc<dyn DecoderSession>>) {
        self.player_events.set_session(None);
        self.quality_events.stop_producing_events();
        if let Some(old) = self.session.take() {
            old.set_rate(0.0);
        }

        let Some(session) = session else {
            return;
        };
        session.set_volume(self.config.volume);
        session.set_rate(self.config.rate);
        self.player_events.set_session(Some(&session));
        self.session = Some(session);
        self.player_events.start_producing_events();
        self.quality_events.start_producing_events();
    }

    fn clear_resume_flags(&mut self) {
        self.paused_for_interruption = false;
        self.state_before_buffering = None;
        self.state_when_connection_lost = None;
    }
}
