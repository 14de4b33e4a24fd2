use super::AudioPlayer;
use crate::error::{EndedError, FailureReason};
use crate::event::{
    Event, NetworkEvent, PlayerEvent, QualityAdjustmentEvent, RetryEvent, SeekEvent,
};
use crate::notification::PlayerNotification;
use crate::producer::EventProducer;
use crate::types::{PlayerState, SeekingBehavior};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

impl AudioPlayer {
    /// Apply one producer event to the player
    ///
    /// Events that no longer match the player's situation (a retry tick after
    /// the timer was cancelled, a seek tick after the gesture ended) are
    /// ignored.
    pub fn handle_event(&mut self, event: Event) {
        trace!(?event, "Handling event");
        match event {
            Event::Network(event) => self.handle_network_event(event),
            Event::Player(event) => self.handle_player_event(event),
            Event::QualityAdjustment(event) => self.handle_quality_event(event),
            Event::Retry(event) => self.handle_retry_event(event),
            Event::Seek(event) => self.handle_seek_event(event),
            Event::AudioItem(_) => self.update_now_playing_info(),
        }
    }

    // ===== Network =====

    fn handle_network_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::ConnectionLost => self.on_connection_lost(),
            NetworkEvent::ConnectionRetrieved { lost_at } => self.on_connection_retrieved(lost_at),
            NetworkEvent::NetworkChanged => debug!("Network transport changed"),
        }
    }

    fn on_connection_lost(&mut self) {
        if self.current_item.is_none()
            || self.current_item_is_offline()
            || self.state.is_waiting_for_connection()
            || self.state.is_stopped()
            || self.state.failure().is_some()
        {
            return;
        }

        info!(state = ?self.state, "Connection lost");
        self.state_when_connection_lost = Some(self.state.clone());

        let buffer_empty = self
            .session
            .as_ref()
            .map_or(true, |session| session.is_playback_buffer_empty());
        if buffer_empty {
            if self.state.is_playing() && !self.quality_is_being_changed {
                self.quality_events.increment_interruption_count();
            }
            self.set_state(PlayerState::WaitingForConnection);
            self.background.begin();
        }
    }

    fn on_connection_retrieved(&mut self, lost_at: Option<Instant>) {
        let Some(lost_state) = self.state_when_connection_lost.clone() else {
            return;
        };
        if !self.config.resume_after_connection_loss {
            return;
        }

        // A loss that predates this item only counts from the moment the
        // player started waiting.
        let since = lost_at
            .filter(|lost| self.current_item_since.map_or(true, |start| *lost >= start))
            .or(self.waiting_since);
        let within_window =
            since.map_or(true, |at| at.elapsed() < self.config.maximum_connection_loss_time);

        if within_window && !lost_state.is_stopped() {
            info!(?lost_state, "Connection retrieved, resuming");
            self.retry_or_play_next();
        } else if !within_window && self.state.is_waiting_for_connection() {
            warn!(
                limit = ?self.config.maximum_connection_loss_time,
                "Connection was lost for too long, stopping"
            );
            self.stop();
        }
    }

    // ===== Player =====

    fn handle_player_event(&mut self, event: PlayerEvent) {
        let failed = self.state.failure().is_some();
        match event {
            PlayerEvent::LoadedDuration(duration) => self.on_loaded_duration(duration),
            PlayerEvent::LoadedMetadata(metadata) => {
                if let Some(item) = self.current_item.clone() {
                    item.parse_metadata(&metadata);
                    self.notify(PlayerNotification::MetadataFound { item, metadata });
                }
            }
            PlayerEvent::LoadedMoreRange(range) => {
                if let Some(item) = self.current_item.clone() {
                    self.notify(PlayerNotification::LoadedRange { range, item });
                }
            }
            PlayerEvent::Progressed(time) => self.on_progressed(time),
            _ if failed => trace!("Player event ignored while failed"),
            PlayerEvent::StartedBuffering => self.on_started_buffering(),
            PlayerEvent::ReadyToPlay => self.on_ready_to_play(),
            PlayerEvent::EndedPlaying(None) => self.next_or_stop(),
            PlayerEvent::EndedPlaying(Some(error)) => self.on_ended_with_error(error),
            PlayerEvent::InterruptionBegan => {
                if self.state.is_playing() || self.state.is_buffering() {
                    debug!("Interruption began, pausing");
                    self.background.begin();
                    self.pause();
                    self.paused_for_interruption = true;
                }
            }
            PlayerEvent::InterruptionEnded => {
                if self.paused_for_interruption {
                    if self.config.resume_after_interruption {
                        debug!("Interruption ended, resuming");
                        self.resume();
                    }
                    self.paused_for_interruption = false;
                    self.background.end();
                }
            }
            PlayerEvent::RouteChanged => {
                let stopped_rendering = self
                    .session
                    .as_ref()
                    .is_some_and(|session| session.rate() == 0.0);
                if stopped_rendering && (self.state.is_playing() || self.state.is_buffering()) {
                    debug!("Audio route changed and output stopped, pausing");
                    self.set_state(PlayerState::Paused);
                }
            }
            PlayerEvent::SessionMessedUp => {
                warn!("Media services were reset, reloading");
                self.capabilities.audio_session.activate(true);
                self.set_state(PlayerState::Stopped);
                self.quality_events.increment_interruption_count();
                self.retry_or_play_next();
            }
        }
    }

    fn on_ready_to_play(&mut self) {
        self.quality_is_being_changed = false;
        if self.should_resume_playing() {
            self.state_before_buffering = None;
            self.state_when_connection_lost = None;
            self.set_state(PlayerState::Playing);
            if let Some(session) = &self.session {
                session.set_rate(self.config.rate);
            }
        } else {
            if let Some(session) = &self.session {
                session.set_rate(0.0);
            }
            self.set_state(PlayerState::Paused);
        }

        self.retry_count = 0;
        self.retry_events.stop_producing_events();
        self.background.end();

        if self.config.preload_next_item {
            self.preload_next_item();
        }
    }

    fn on_started_buffering(&mut self) {
        if self.state.is_playing() && !self.quality_is_being_changed {
            self.quality_events.increment_interruption_count();
        }
        self.state_before_buffering = Some(self.state.clone());

        if self.network_events.is_reachable() || self.current_item_is_offline() {
            self.set_state(PlayerState::Buffering);
        } else {
            if self.state_when_connection_lost.is_none() {
                self.state_when_connection_lost = Some(self.state.clone());
            }
            self.set_state(PlayerState::WaitingForConnection);
        }
        self.background.begin();
    }

    fn on_progressed(&mut self, time: Duration) {
        let Some(duration) = self.current_item_duration() else {
            return;
        };

        if self.state.is_buffering() || self.state.is_waiting_for_connection() {
            if self.should_resume_playing() {
                self.state_before_buffering = None;
                self.set_state(PlayerState::Playing);
                if let Some(session) = &self.session {
                    session.set_rate(self.config.rate);
                }
            } else {
                self.set_state(PlayerState::Paused);
            }
            self.background.end();
        }

        let percentage = (time.as_secs_f64() / duration.as_secs_f64() * 100.0).clamp(0.0, 100.0);
        self.notify(PlayerNotification::ProgressionUpdated {
            time,
            percentage: percentage as f32,
        });
    }

    fn on_loaded_duration(&mut self, duration: Duration) {
        let Some(item) = self.current_item.clone() else {
            return;
        };
        if duration.is_zero() {
            return;
        }
        self.update_now_playing_info();
        self.notify(PlayerNotification::DurationFound { duration, item });
    }

    fn on_ended_with_error(&mut self, error: EndedError) {
        if error.is_connectivity_related() && !self.current_item_is_offline() {
            if self.network_events.is_reachable() {
                info!(%error, "Playback ended early, retrying");
                self.retry_or_advance();
            } else {
                info!(%error, "Playback ended early while offline, waiting");
                if self.state_when_connection_lost.is_none() {
                    self.state_when_connection_lost = Some(self.state.clone());
                }
                self.set_state(PlayerState::WaitingForConnection);
                self.background.begin();
            }
            return;
        }

        warn!(%error, "Playback failed");
        self.set_state(PlayerState::Failed(FailureReason::UnderlyingDecoderError(
            error,
        )));
    }

    // ===== Quality =====

    fn handle_quality_event(&mut self, event: QualityAdjustmentEvent) {
        if !self.config.adjust_quality_automatically {
            return;
        }
        let Some(item) = self.current_item.clone() else {
            return;
        };

        let target = match event {
            QualityAdjustmentEvent::GoDown => item.lower_quality_than(self.current_quality),
            QualityAdjustmentEvent::GoUp => item.higher_quality_than(self.current_quality),
        };
        match target {
            Some(quality) => self.switch_quality(quality),
            None => trace!(?event, quality = ?self.current_quality, "No tier to switch to"),
        }
    }

    // ===== Retry =====

    fn handle_retry_event(&mut self, event: RetryEvent) {
        match event {
            RetryEvent::RetryAvailable => {
                if !self.retry_events.is_producing_events() || self.state.failure().is_some() {
                    trace!("Stale retry tick");
                    return;
                }
                self.retry_or_play_next();
            }
            RetryEvent::RetryFailed => {
                if self.current_item.is_none()
                    || self.state.is_playing()
                    || self.state.is_stopped()
                    || self.state.failure().is_some()
                {
                    return;
                }
                warn!("Giving up after the maximum number of retries");
                self.set_state(PlayerState::Failed(FailureReason::MaximumRetryCountHit));
            }
        }
    }

    // ===== Seek =====

    fn handle_seek_event(&mut self, event: SeekEvent) {
        if !self.seek_events.is_producing_events() {
            return;
        }
        let SeekingBehavior::ChangeTime { delta, .. } = self.config.seeking_behavior else {
            return;
        };
        let Some(progression) = self.current_item_progression() else {
            return;
        };

        let target = match event {
            SeekEvent::SeekForward => progression + delta,
            SeekEvent::SeekBackward => progression.saturating_sub(delta),
        };
        let _ = self.seek(target);
    }
}
