//! Held seek gestures

use super::timer::ScheduledTask;
use super::{EventProducer, EventSink};
use crate::event::SeekEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Emits a seek tick every `interval` while a seek key is held
pub struct SeekEventProducer {
    sink: EventSink,
    emit_lock: Arc<Mutex<()>>,
    interval: Duration,
    is_backward: bool,
    timer: Option<ScheduledTask>,
}

impl SeekEventProducer {
    pub fn new(sink: EventSink, interval: Duration) -> Self {
        Self {
            sink,
            emit_lock: Arc::new(Mutex::new(())),
            interval,
            is_backward: false,
            timer: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn is_backward(&self) -> bool {
        self.is_backward
    }

    pub fn set_backward(&mut self, is_backward: bool) {
        self.is_backward = is_backward;
    }
}

impl EventProducer for SeekEventProducer {
    fn start_producing_events(&mut self) {
        if self.is_producing_events() {
            return;
        }

        let sink = self.sink.clone();
        let emit_lock = Arc::clone(&self.emit_lock);
        let interval = self.interval.max(Duration::from_millis(1));
        let event = if self.is_backward {
            SeekEvent::SeekBackward
        } else {
            SeekEvent::SeekForward
        };

        self.timer = ScheduledTask::spawn("seek", move |cancel| {
            run_seek_timer(sink, emit_lock, interval, event, cancel)
        });
    }

    fn stop_producing_events(&mut self) {
        let _guard = self.emit_lock.lock();
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn is_producing_events(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

async fn run_seek_timer(
    sink: EventSink,
    emit_lock: Arc<Mutex<()>>,
    interval: Duration,
    event: SeekEvent,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let delivered = {
            let _guard = emit_lock.lock();
            !cancel.is_cancelled() && sink.emit(event)
        };
        if !delivered {
            return;
        }
    }
}
