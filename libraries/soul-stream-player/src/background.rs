//! Background task bookkeeping

use crate::capability::{BackgroundTaskId, BackgroundTasks};
use std::sync::Arc;
use tracing::trace;

/// Keeps at most one background task alive
pub struct BackgroundHandler {
    tasks: Arc<dyn BackgroundTasks>,
    active: Option<BackgroundTaskId>,
}

impl BackgroundHandler {
    pub fn new(tasks: Arc<dyn BackgroundTasks>) -> Self {
        Self {
            tasks,
            active: None,
        }
    }

    /// Begin a task unless one is already running
    ///
    /// Returns whether a new task was started.
    pub fn begin(&mut self) -> bool {
        if self.active.is_some() {
            return false;
        }

        let id = self.tasks.begin_background_task();
        trace!(?id, "Background task started");
        self.active = Some(id);
        true
    }

    /// End the running task, if any
    ///
    /// Returns whether a task was ended.
    pub fn end(&mut self) -> bool {
        match self.active.take() {
            Some(id) => {
                self.tasks.end_background_task(id);
                trace!(?id, "Background task ended");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}
