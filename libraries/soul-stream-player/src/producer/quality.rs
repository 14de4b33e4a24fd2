//! Automatic quality adjustment policy

use super::timer::ScheduledTask;
use super::{EventProducer, EventSink};
use crate::event::QualityAdjustmentEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Decides when quality should go down or up
///
/// Counts interruptions (buffering stalls while playing). Reaching the
/// threshold emits `GoDown` immediately. A full interval without any
/// interruption emits `GoUp`. Either way the count and period start over.
pub struct QualityAdjustmentEventProducer {
    monitor: Arc<QualityMonitor>,
    timer: Option<ScheduledTask>,
}

struct QualityMonitor {
    sink: EventSink,
    state: Mutex<QualityState>,
}

struct QualityState {
    listening: bool,
    interruption_count: u32,
    threshold: u32,
    interval: Duration,
    period_start: Instant,
}

impl QualityAdjustmentEventProducer {
    pub fn new(sink: EventSink, interval: Duration, threshold: u32) -> Self {
        Self {
            monitor: Arc::new(QualityMonitor {
                sink,
                state: Mutex::new(QualityState {
                    listening: false,
                    interruption_count: 0,
                    threshold,
                    interval,
                    period_start: Instant::now(),
                }),
            }),
            timer: None,
        }
    }

    pub fn interruption_count(&self) -> u32 {
        self.monitor.state.lock().interruption_count
    }

    /// Set the interruption count, going down right away if it hits the threshold
    pub fn set_interruption_count(&mut self, count: u32) {
        self.monitor.update_count(|_| count);
    }

    pub fn increment_interruption_count(&mut self) {
        self.monitor.update_count(|count| count.saturating_add(1));
    }

    /// Clear the count without emitting anything
    pub fn reset_interruption_count(&mut self) {
        self.monitor.state.lock().interruption_count = 0;
    }

    pub fn adjust_quality_time_interval(&self) -> Duration {
        self.monitor.state.lock().interval
    }

    /// Change the period; a running timer is re-armed against the new deadline
    ///
    /// If the new interval has already elapsed since the period started, the
    /// timer fires immediately.
    pub fn set_adjust_quality_time_interval(&mut self, interval: Duration) {
        self.monitor.state.lock().interval = interval;
        if self.timer.is_some() {
            self.arm_timer();
        }
    }

    pub fn adjust_quality_after_interruption_count(&self) -> u32 {
        self.monitor.state.lock().threshold
    }

    pub fn set_adjust_quality_after_interruption_count(&mut self, threshold: u32) {
        self.monitor.state.lock().threshold = threshold;
        self.monitor.update_count(|count| count);
    }

    fn arm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }

        let monitor = Arc::clone(&self.monitor);
        self.timer = ScheduledTask::spawn("quality adjustment", move |cancel| {
            run_quality_timer(monitor, cancel)
        });
    }
}

impl EventProducer for QualityAdjustmentEventProducer {
    fn start_producing_events(&mut self) {
        {
            let mut state = self.monitor.state.lock();
            if state.listening {
                return;
            }
            state.listening = true;
            state.period_start = Instant::now();
        }
        self.arm_timer();
    }

    fn stop_producing_events(&mut self) {
        let mut state = self.monitor.state.lock();
        state.listening = false;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn is_producing_events(&self) -> bool {
        self.monitor.state.lock().listening
    }
}

impl QualityMonitor {
    fn update_count(&self, update: impl FnOnce(u32) -> u32) {
        let mut state = self.state.lock();
        state.interruption_count = update(state.interruption_count);

        if state.listening && state.threshold > 0 && state.interruption_count >= state.threshold {
            info!(
                interruptions = state.interruption_count,
                "Interruption threshold reached, lowering quality"
            );
            self.sink.emit(QualityAdjustmentEvent::GoDown);
            state.interruption_count = 0;
            state.period_start = Instant::now();
        }
    }

    fn deadline(&self) -> Instant {
        let state = self.state.lock();
        state.period_start + state.interval
    }

    fn on_deadline(&self, cancel: &CancellationToken) {
        let mut state = self.state.lock();
        if !state.listening || cancel.is_cancelled() {
            return;
        }

        let now = Instant::now();
        if now < state.period_start + state.interval {
            // Period restarted since the timer was armed.
            return;
        }

        if state.interruption_count == 0 {
            debug!("No interruption during the period, raising quality");
            self.sink.emit(QualityAdjustmentEvent::GoUp);
        }
        state.interruption_count = 0;
        state.period_start = now;
    }
}

async fn run_quality_timer(monitor: Arc<QualityMonitor>, cancel: CancellationToken) {
    loop {
        let deadline = monitor.deadline();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep_until(deadline) => monitor.on_deadline(&cancel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use tokio::sync::mpsc::UnboundedReceiver;

    const HOUR: Duration = Duration::from_secs(3600);

    fn producer(
        interval: Duration,
        threshold: u32,
    ) -> (QualityAdjustmentEventProducer, UnboundedReceiver<Event>) {
        let (sink, rx) = EventSink::channel();
        (QualityAdjustmentEventProducer::new(sink, interval, threshold), rx)
    }

    #[test]
    fn threshold_emits_go_down_once_synchronously() {
        let (mut producer, mut rx) = producer(HOUR, 3);
        producer.start_producing_events();

        producer.set_interruption_count(3);

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::QualityAdjustment(QualityAdjustmentEvent::GoDown)
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(producer.interruption_count(), 0);
    }

    #[test]
    fn increments_reach_threshold() {
        let (mut producer, mut rx) = producer(HOUR, 2);
        producer.start_producing_events();

        producer.increment_interruption_count();
        assert!(rx.try_recv().is_err());
        assert_eq!(producer.interruption_count(), 1);

        producer.increment_interruption_count();
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::QualityAdjustment(QualityAdjustmentEvent::GoDown)
        );
    }

    #[test]
    fn counting_while_stopped_is_silent() {
        let (mut producer, mut rx) = producer(HOUR, 1);
        producer.set_interruption_count(5);
        assert!(rx.try_recv().is_err());
        assert_eq!(producer.interruption_count(), 5);

        producer.reset_interruption_count();
        assert_eq!(producer.interruption_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_period_emits_go_up() {
        let (mut producer, mut rx) = producer(Duration::from_secs(10), 3);
        let started = Instant::now();
        producer.start_producing_events();

        let event = rx.recv().await.unwrap();
        assert_eq!(event, Event::QualityAdjustment(QualityAdjustmentEvent::GoUp));
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_period_resets_without_go_up() {
        let (mut producer, mut rx) = producer(Duration::from_secs(10), 3);
        producer.start_producing_events();
        producer.increment_interruption_count();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(producer.interruption_count(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::QualityAdjustment(QualityAdjustmentEvent::GoUp)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shortening_interval_fires_immediately_when_overdue() {
        let (mut producer, mut rx) = producer(Duration::from_secs(600), 3);
        producer.start_producing_events();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());

        let changed_at = Instant::now();
        producer.set_adjust_quality_time_interval(Duration::from_secs(60));
        let event = rx.recv().await.unwrap();

        assert_eq!(event, Event::QualityAdjustment(QualityAdjustmentEvent::GoUp));
        assert!(changed_at.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_timer() {
        let (mut producer, mut rx) = producer(Duration::from_secs(10), 3);
        producer.start_producing_events();
        producer.stop_producing_events();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
        assert!(!producer.is_producing_events());
    }
}
