//! Fake platform capabilities shared by the integration tests
//!
//! Every fake records what the player asked of it and lets the test push
//! notifications back. None of them hold a lock while calling an observer.
#![allow(dead_code)]

use parking_lot::Mutex;
use soul_stream_player::capability::ReachabilityCallback;
use soul_stream_player::{
    AudioItem, AudioPlayer, AudioSession, BackgroundTaskId, BackgroundTasks, BufferingStrategy,
    DecoderError,
    DecoderSession, MediaDecoder, NowPlayingCenter, NowPlayingInfo, PlayerCapabilities,
    PlayerConfig, PlayerNotification, PlayerState, Reachability, ReachabilityStatus,
    SessionNotification, SessionObserver, SessionStatus, SystemAudioNotification,
    SystemAudioObserver, TimeRange,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use url::Url;

// ===== Decoder =====

#[derive(Default)]
pub struct FakeDecoder {
    loads: Mutex<Vec<Url>>,
    strategies: Mutex<Vec<BufferingStrategy>>,
    preloads: Mutex<Vec<Url>>,
    cache_clears: AtomicU64,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    failure: Mutex<Option<DecoderError>>,
}

impl FakeDecoder {
    /// Every source passed to `load`, in order
    pub fn loads(&self) -> Vec<Url> {
        self.loads.lock().clone()
    }

    /// Buffering strategy passed with each load
    pub fn strategies(&self) -> Vec<BufferingStrategy> {
        self.strategies.lock().clone()
    }

    /// Every source passed to `preload`, in order
    pub fn preloads(&self) -> Vec<Url> {
        self.preloads.lock().clone()
    }

    pub fn cache_clears(&self) -> u64 {
        self.cache_clears.load(Ordering::SeqCst)
    }

    pub fn last_session(&self) -> Arc<FakeSession> {
        self.sessions
            .lock()
            .last()
            .cloned()
            .expect("no session was loaded")
    }

    /// Make every following load fail with `error` (`None` restores success)
    pub fn fail_loads(&self, error: Option<DecoderError>) {
        *self.failure.lock() = error;
    }
}

impl MediaDecoder for FakeDecoder {
    fn load(
        &self,
        source: &Url,
        strategy: BufferingStrategy,
    ) -> Result<Arc<dyn DecoderSession>, DecoderError> {
        self.loads.lock().push(source.clone());
        self.strategies.lock().push(strategy);
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        let session = Arc::new(FakeSession::new(source.clone()));
        self.sessions.lock().push(Arc::clone(&session));
        Ok(session)
    }

    fn preload(&self, source: &Url) {
        self.preloads.lock().push(source.clone());
    }

    fn clear_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub source: Url,
    pub rate: f32,
    pub volume: f32,
    pub current_time: Option<Duration>,
    pub duration: Option<Duration>,
    pub loaded: Vec<TimeRange>,
    pub seekable: Vec<TimeRange>,
    pub buffer_empty: bool,
    pub seeks: Vec<Duration>,
    pub replaced_sources: Vec<Url>,
}

pub struct FakeSession {
    state: Mutex<SessionState>,
    observer: Mutex<Option<Arc<dyn SessionObserver>>>,
}

impl FakeSession {
    fn new(source: Url) -> Self {
        Self {
            state: Mutex::new(SessionState {
                source,
                rate: 0.0,
                volume: 1.0,
                current_time: Some(Duration::ZERO),
                duration: None,
                loaded: Vec::new(),
                seekable: Vec::new(),
                buffer_empty: false,
                seeks: Vec::new(),
                replaced_sources: Vec::new(),
            }),
            observer: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut SessionState)) {
        apply(&mut self.state.lock());
    }

    pub fn is_observed(&self) -> bool {
        self.observer.lock().is_some()
    }

    /// Deliver a notification to whoever observes the session
    pub fn notify(&self, notification: SessionNotification) {
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_session_notification(notification);
        }
    }
}

impl DecoderSession for FakeSession {
    fn set_rate(&self, rate: f32) {
        self.state.lock().rate = rate;
    }

    fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume;
    }

    fn seek(
        &self,
        time: Duration,
        _tolerance_before: Option<Duration>,
        _tolerance_after: Option<Duration>,
    ) {
        let mut state = self.state.lock();
        state.seeks.push(time);
        state.current_time = Some(time);
    }

    fn current_time(&self) -> Option<Duration> {
        self.state.lock().current_time
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().duration
    }

    fn loaded_ranges(&self) -> Vec<TimeRange> {
        self.state.lock().loaded.clone()
    }

    fn seekable_ranges(&self) -> Vec<TimeRange> {
        self.state.lock().seekable.clone()
    }

    fn status(&self) -> SessionStatus {
        SessionStatus::Unknown
    }

    fn is_playback_buffer_empty(&self) -> bool {
        self.state.lock().buffer_empty
    }

    fn replace_source(&self, source: &Url) -> Result<(), DecoderError> {
        let mut state = self.state.lock();
        state.replaced_sources.push(source.clone());
        state.source = source.clone();
        Ok(())
    }

    fn observe(&self, observer: Arc<dyn SessionObserver>, _progress_interval: Duration) {
        *self.observer.lock() = Some(observer);
    }

    fn stop_observing(&self) {
        *self.observer.lock() = None;
    }
}

// ===== Reachability =====

pub struct FakeReachability {
    status: Mutex<ReachabilityStatus>,
    callback: Mutex<Option<ReachabilityCallback>>,
}

impl FakeReachability {
    pub fn new(status: ReachabilityStatus) -> Self {
        Self {
            status: Mutex::new(status),
            callback: Mutex::new(None),
        }
    }

    /// Change the status and notify the subscriber
    pub fn set_status(&self, status: ReachabilityStatus) {
        *self.status.lock() = status;
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.callback.lock().is_some()
    }
}

impl Reachability for FakeReachability {
    fn current_status(&self) -> ReachabilityStatus {
        *self.status.lock()
    }

    fn subscribe(&self, callback: ReachabilityCallback) {
        *self.callback.lock() = Some(callback);
    }

    fn unsubscribe(&self) {
        *self.callback.lock() = None;
    }
}

// ===== Audio session =====

#[derive(Default)]
pub struct FakeAudioSession {
    activations: Mutex<Vec<bool>>,
    observer: Mutex<Option<Arc<dyn SystemAudioObserver>>>,
}

impl FakeAudioSession {
    pub fn activations(&self) -> Vec<bool> {
        self.activations.lock().clone()
    }

    pub fn notify(&self, notification: SystemAudioNotification) {
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_system_notification(notification);
        }
    }
}

impl AudioSession for FakeAudioSession {
    fn activate(&self, active: bool) {
        self.activations.lock().push(active);
    }

    fn observe(&self, observer: Arc<dyn SystemAudioObserver>) {
        *self.observer.lock() = Some(observer);
    }

    fn stop_observing(&self) {
        *self.observer.lock() = None;
    }
}

// ===== Background tasks & now playing =====

#[derive(Default)]
pub struct FakeBackgroundTasks {
    next_id: AtomicU64,
    active: Mutex<HashSet<u64>>,
}

impl FakeBackgroundTasks {
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

impl BackgroundTasks for FakeBackgroundTasks {
    fn begin_background_task(&self) -> BackgroundTaskId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.active.lock().insert(id);
        BackgroundTaskId(id)
    }

    fn end_background_task(&self, id: BackgroundTaskId) {
        self.active.lock().remove(&id.0);
    }
}

#[derive(Default)]
pub struct FakeNowPlaying {
    current: Mutex<Option<NowPlayingInfo>>,
    updates: AtomicU64,
}

impl FakeNowPlaying {
    pub fn current(&self) -> Option<NowPlayingInfo> {
        self.current.lock().clone()
    }

    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }
}

impl NowPlayingCenter for FakeNowPlaying {
    fn update(&self, info: Option<NowPlayingInfo>) {
        self.updates.fetch_add(1, Ordering::SeqCst);
        *self.current.lock() = info;
    }
}

// ===== Harness =====

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

pub struct Harness {
    pub decoder: Arc<FakeDecoder>,
    pub reachability: Arc<FakeReachability>,
    pub audio_session: Arc<FakeAudioSession>,
    pub background: Arc<FakeBackgroundTasks>,
    pub now_playing: Arc<FakeNowPlaying>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_status(ReachabilityStatus::ReachableViaWifi)
    }

    pub fn with_status(status: ReachabilityStatus) -> Self {
        init_tracing();
        Self {
            decoder: Arc::new(FakeDecoder::default()),
            reachability: Arc::new(FakeReachability::new(status)),
            audio_session: Arc::new(FakeAudioSession::default()),
            background: Arc::new(FakeBackgroundTasks::default()),
            now_playing: Arc::new(FakeNowPlaying::default()),
        }
    }

    pub fn capabilities(&self) -> PlayerCapabilities {
        PlayerCapabilities {
            decoder: self.decoder.clone(),
            reachability: self.reachability.clone(),
            audio_session: self.audio_session.clone(),
            background_tasks: self.background.clone(),
            now_playing: self.now_playing.clone(),
        }
    }

    pub fn player(&self) -> AudioPlayer {
        self.player_with(PlayerConfig::default())
    }

    pub fn player_with(&self, config: PlayerConfig) -> AudioPlayer {
        AudioPlayer::new(config, self.capabilities())
    }

    /// Report the latest session as ready and let the player react
    pub fn make_ready(&self, player: &mut AudioPlayer) {
        self.decoder
            .last_session()
            .notify(SessionNotification::PlaybackLikelyToKeepUp);
        player.process_pending_events();
    }

    /// Let the latest session reach `position` (in seconds) of a `duration`
    /// long item and report end of media
    pub fn end_latest_session(&self, position: u64, duration: u64) {
        let session = self.decoder.last_session();
        session.update(|state| {
            state.current_time = Some(Duration::from_secs(position));
            state.duration = Some(Duration::from_secs(duration));
        });
        session.notify(SessionNotification::DidPlayToEnd);
    }
}

// ===== Items =====

pub fn url(s: &str) -> Url {
    Url::parse(s).expect("valid test url")
}

/// Streaming item with only a medium tier
pub fn item(name: &str) -> AudioItem {
    AudioItem::with_urls(
        None,
        Some(url(&format!("https://cdn.example.com/{name}-medium.mp3"))),
        None,
    )
    .expect("item with a source")
}

/// Streaming item with all three tiers
pub fn tiered_item(name: &str) -> AudioItem {
    AudioItem::with_urls(
        Some(url(&format!("https://cdn.example.com/{name}-high.mp3"))),
        Some(url(&format!("https://cdn.example.com/{name}-medium.mp3"))),
        Some(url(&format!("https://cdn.example.com/{name}-low.mp3"))),
    )
    .expect("item with sources")
}

/// Item stored on the device
pub fn offline_item(name: &str) -> AudioItem {
    AudioItem::with_urls(None, Some(url(&format!("file:///music/{name}.mp3"))), None)
        .expect("item with a source")
}

/// Target states of every `StateChanged` notification, in order
pub fn state_changes(notifications: &[PlayerNotification]) -> Vec<PlayerState> {
    notifications
        .iter()
        .filter_map(|notification| match notification {
            PlayerNotification::StateChanged { to, .. } => Some(to.clone()),
            _ => None,
        })
        .collect()
}
