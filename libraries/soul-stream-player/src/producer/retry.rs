//! Retry timer

use super::timer::ScheduledTask;
use super::{EventProducer, EventSink};
use crate::event::RetryEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Emits `RetryAvailable` every `retry_timeout`, up to `maximum_retry_count`
/// times, then a final `RetryFailed` before stopping on its own
pub struct RetryEventProducer {
    sink: EventSink,
    emit_lock: Arc<Mutex<()>>,
    retry_timeout: Duration,
    maximum_retry_count: u32,
    timer: Option<ScheduledTask>,
}

impl RetryEventProducer {
    pub fn new(sink: EventSink, retry_timeout: Duration, maximum_retry_count: u32) -> Self {
        Self {
            sink,
            emit_lock: Arc::new(Mutex::new(())),
            retry_timeout,
            maximum_retry_count,
            timer: None,
        }
    }

    pub fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }

    /// Takes effect on the next start
    pub fn set_retry_timeout(&mut self, retry_timeout: Duration) {
        self.retry_timeout = retry_timeout;
    }

    pub fn maximum_retry_count(&self) -> u32 {
        self.maximum_retry_count
    }

    /// Takes effect on the next start
    pub fn set_maximum_retry_count(&mut self, maximum_retry_count: u32) {
        self.maximum_retry_count = maximum_retry_count;
    }
}

impl EventProducer for RetryEventProducer {
    fn start_producing_events(&mut self) {
        if self.is_producing_events() {
            return;
        }

        let sink = self.sink.clone();
        let emit_lock = Arc::clone(&self.emit_lock);
        let timeout = self.retry_timeout;
        let maximum = self.maximum_retry_count;
        debug!(?timeout, maximum, "Retry timer armed");

        self.timer = ScheduledTask::spawn("retry", move |cancel| {
            run_retry_timer(sink, emit_lock, timeout, maximum, cancel)
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

async fn run_retry_timer(
    sink: EventSink,
    emit_lock: Arc<Mutex<()>>,
    timeout: Duration,
    maximum: u32,
    cancel: CancellationToken,
) {
    let mut emitted = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(timeout) => {}
        }

        let finished = {
            let _guard = emit_lock.lock();
            if cancel.is_cancelled() {
                return;
            }
            if emitted < maximum {
                emitted += 1;
                sink.emit(RetryEvent::RetryAvailable);
                false
            } else {
                sink.emit(RetryEvent::RetryFailed);
                true
            }
        };

        if finished {
            return;
        }
    }
}
