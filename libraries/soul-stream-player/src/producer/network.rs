//! Connectivity monitoring

use super::{EventProducer, EventSink};
use crate::capability::{Reachability, ReachabilityStatus};
use crate::event::NetworkEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Turns reachability changes into [`NetworkEvent`]s
///
/// Identical consecutive statuses are ignored, so a burst of reachability
/// callbacks collapses to the latest status.
pub struct NetworkEventProducer {
    monitor: Arc<NetworkMonitor>,
}

struct NetworkMonitor {
    reachability: Arc<dyn Reachability>,
    sink: EventSink,
    state: Mutex<NetworkState>,
}

struct NetworkState {
    listening: bool,
    last_status: ReachabilityStatus,
    connection_loss_date: Option<Instant>,
}

impl NetworkEventProducer {
    pub fn new(reachability: Arc<dyn Reachability>, sink: EventSink) -> Self {
        let status = reachability.current_status();
        let connection_loss_date = (!status.is_reachable()).then(Instant::now);

        Self {
            monitor: Arc::new(NetworkMonitor {
                reachability,
                sink,
                state: Mutex::new(NetworkState {
                    listening: false,
                    last_status: status,
                    connection_loss_date,
                }),
            }),
        }
    }

    /// Live reachability, independent of whether the producer is running
    pub fn is_reachable(&self) -> bool {
        self.monitor.reachability.current_status().is_reachable()
    }

    /// When connectivity was last lost, cleared once it returns
    pub fn connection_loss_date(&self) -> Option<Instant> {
        self.monitor.state.lock().connection_loss_date
    }
}

impl EventProducer for NetworkEventProducer {
    fn start_producing_events(&mut self) {
        {
            let mut state = self.monitor.state.lock();
            if state.listening {
                return;
            }
            state.listening = true;
            state.last_status = self.monitor.reachability.current_status();
            if !state.last_status.is_reachable() && state.connection_loss_date.is_none() {
                state.connection_loss_date = Some(Instant::now());
            }
        }

        let monitor = Arc::downgrade(&self.monitor);
        self.monitor.reachability.subscribe(Arc::new(move || {
            if let Some(monitor) = monitor.upgrade() {
                monitor.update_status();
            }
        }));
    }

    fn stop_producing_events(&mut self) {
        {
            let mut state = self.monitor.state.lock();
            if !state.listening {
                return;
            }
            state.listening = false;
        }
        self.monitor.reachability.unsubscribe();
    }

    fn is_producing_events(&self) -> bool {
        self.monitor.state.lock().listening
    }
}

impl Drop for NetworkEventProducer {
    fn drop(&mut self) {
        self.stop_producing_events();
    }
}

impl NetworkMonitor {
    fn update_status(&self) {
        let status = self.reachability.current_status();
        let mut state = self.state.lock();
        if !state.listening || status == state.last_status {
            return;
        }

        match (state.last_status.is_reachable(), status.is_reachable()) {
            (true, false) => {
                info!("Connection lost");
                state.connection_loss_date = Some(Instant::now());
                self.sink.emit(NetworkEvent::ConnectionLost);
            }
            (false, true) => {
                let lost_at = state.connection_loss_date.take();
                info!(
                    offline_for = ?lost_at.map(|at| at.elapsed()),
                    "Connection retrieved"
                );
                self.sink.emit(NetworkEvent::ConnectionRetrieved { lost_at });
            }
            _ => {
                debug!(from = ?state.last_status, to = ?status, "Network changed");
                self.sink.emit(NetworkEvent::NetworkChanged);
            }
        }
        state.last_status = status;
    }
}
