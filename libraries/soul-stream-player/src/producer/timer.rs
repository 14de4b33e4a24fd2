//! Cancellable timer tasks owned by producers

use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A spawned timer task that is cancelled when stopped or dropped
///
/// Each task gets its own [`CancellationToken`]. Producers check it under
/// their emission lock, so a cancelled task can never emit again even if it
/// is mid-tick when the producer stops.
pub(crate) struct ScheduledTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn `task` on the current tokio runtime
    ///
    /// Returns `None` (and logs) when called outside a runtime.
    pub(crate) fn spawn<F, Fut>(name: &'static str, task: F) -> Option<Self>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(timer = name, "No tokio runtime available, timer not scheduled");
            return None;
        };

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(task(cancel.clone()));
        Some(Self { cancel, handle })
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task ran to completion (or was cancelled and exited)
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
