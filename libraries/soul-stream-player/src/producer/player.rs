//! Decoder session and system audio observation

use super::{EventProducer, EventSink};
use crate::capability::{
    AudioSession, DecoderSession, SessionNotification, SessionObserver, SessionStatus,
    SystemAudioNotification, SystemAudioObserver,
};
use crate::error::{DecoderError, EndedError};
use crate::event::PlayerEvent;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

/// End-of-media reports closer than this to the duration count as natural ends
const END_OF_MEDIA_TOLERANCE: Duration = Duration::from_millis(500);

/// Observes the current decoder session and the system audio session
///
/// Holds only a weak reference to the session; the player owns it. The
/// producer must be pointed at the new session (which stops observation of
/// the old one) before the player replaces it.
pub struct PlayerEventProducer {
    session: Option<Weak<dyn DecoderSession>>,
    audio_session: Arc<dyn AudioSession>,
    sink: EventSink,
    progress_interval: Duration,
    forwarder: Option<Arc<PlayerEventForwarder>>,
}

impl PlayerEventProducer {
    pub fn new(
        audio_session: Arc<dyn AudioSession>,
        sink: EventSink,
        progress_interval: Duration,
    ) -> Self {
        Self {
            session: None,
            audio_session,
            sink,
            progress_interval,
            forwarder: None,
        }
    }

    /// Point the producer at another session, stopping observation of the old one
    pub fn set_session(&mut self, session: Option<&Arc<dyn DecoderSession>>) {
        self.stop_producing_events();
        self.session = session.map(Arc::downgrade);
    }

    fn current_session(&self) -> Option<Arc<dyn DecoderSession>> {
        self.session.as_ref().and_then(Weak::upgrade)
    }
}

impl EventProducer for PlayerEventProducer {
    fn start_producing_events(&mut self) {
        if self.forwarder.is_some() {
            return;
        }
        let Some(session) = self.current_session() else {
            trace!("No decoder session to observe");
            return;
        };

        let forwarder = Arc::new(PlayerEventForwarder {
            sink: self.sink.clone(),
            session: Arc::downgrade(&session),
            active: Mutex::new(true),
        });

        session.observe(forwarder.clone(), self.progress_interval);
        self.audio_session.observe(forwarder.clone());
        self.forwarder = Some(forwarder);
    }

    fn stop_producing_events(&mut self) {
        let Some(forwarder) = self.forwarder.take() else {
            return;
        };

        *forwarder.active.lock() = false;
        if let Some(session) = self.current_session() {
            session.stop_observing();
        }
        self.audio_session.stop_observing();
    }

    fn is_producing_events(&self) -> bool {
        self.forwarder.is_some()
    }
}

impl Drop for PlayerEventProducer {
    fn drop(&mut self) {
        self.stop_producing_events();
    }
}

/// Observer installed on the session; translates raw notifications
struct PlayerEventForwarder {
    sink: EventSink,
    session: Weak<dyn DecoderSession>,
    active: Mutex<bool>,
}

impl PlayerEventForwarder {
    fn forward(&self, event: Option<PlayerEvent>) {
        let active = self.active.lock();
        if !*active {
            return;
        }
        if let Some(event) = event {
            self.sink.emit(event);
        }
    }

    fn ended_playing(&self) -> PlayerEvent {
        let ended_early = self
            .session
            .upgrade()
            .and_then(|session| Some((session.current_time()?, session.duration()?)))
            .is_some_and(|(current, duration)| current + END_OF_MEDIA_TOLERANCE < duration);

        PlayerEvent::EndedPlaying(ended_early.then_some(EndedError::ItemEndedEarly))
    }
}

impl SessionObserver for PlayerEventForwarder {
    fn on_session_notification(&self, notification: SessionNotification) {
        let event = match notification {
            SessionNotification::PlaybackBufferEmpty => Some(PlayerEvent::StartedBuffering),
            SessionNotification::PlaybackLikelyToKeepUp
            | SessionNotification::StatusChanged(SessionStatus::ReadyToPlay) => {
                Some(PlayerEvent::ReadyToPlay)
            }
            SessionNotification::StatusChanged(SessionStatus::Failed(error)) => Some(
                PlayerEvent::EndedPlaying(Some(EndedError::Decoder(error))),
            ),
            SessionNotification::StatusChanged(SessionStatus::Unknown) => None,
            SessionNotification::DurationAvailable(duration) => {
                Some(PlayerEvent::LoadedDuration(duration))
            }
            SessionNotification::LoadedRangesChanged(ranges) => {
                ranges.last().copied().map(PlayerEvent::LoadedMoreRange)
            }
            SessionNotification::TimedMetadata(items)
            | SessionNotification::CommonMetadata(items) => {
                (!items.is_empty()).then_some(PlayerEvent::LoadedMetadata(items))
            }
            SessionNotification::PeriodicTime(time) => Some(PlayerEvent::Progressed(time)),
            SessionNotification::DidPlayToEnd => Some(self.ended_playing()),
        };
        self.forward(event);
    }
}

impl SystemAudioObserver for PlayerEventForwarder {
    fn on_system_notification(&self, notification: SystemAudioNotification) {
        let event = match notification {
            SystemAudioNotification::InterruptionBegan => Some(PlayerEvent::InterruptionBegan),
            SystemAudioNotification::InterruptionEnded { should_resume } => {
                should_resume.then_some(PlayerEvent::InterruptionEnded)
            }
            SystemAudioNotification::RouteChanged => Some(PlayerEvent::RouteChanged),
            SystemAudioNotification::MediaServicesLost
            | SystemAudioNotification::MediaServicesReset => Some(PlayerEvent::SessionMessedUp),
        };
        self.forward(event);
    }
}

impl From<DecoderError> for PlayerEvent {
    fn from(error: DecoderError) -> Self {
        PlayerEvent::EndedPlaying(Some(EndedError::Decoder(error)))
    }
}
