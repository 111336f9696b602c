use tokio::sync::watch;

use crate::{Error, Result};

/// Lifecycle of a background service.
///
/// `New → Starting → Running → Stopping → Terminated`. `Failed` is only entered when `start()` is
/// called outside of a Tokio runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    New,
    Starting,
    Running,
    Stopping,
    Terminated,
    Failed,
}

impl ServiceState {
    pub fn is_finished(self) -> bool {
        matches!(self, ServiceState::Terminated | ServiceState::Failed)
    }
}

#[derive(Debug, Clone, Copy)]
struct Status {
    state: ServiceState,
    /// Whether the service has ever been running. Lets `on_running()` waiters that missed the
    /// `Running` state (e.g. started then stopped quickly) still succeed.
    reached_running: bool,
}

/// Shared state cell that async callers can wait on.
#[derive(Debug)]
pub(crate) struct ServiceStatus {
    sender: watch::Sender<Status>,
}

impl ServiceStatus {
    pub(crate) fn new() -> ServiceStatus {
        let (sender, _) = watch::channel(Status {
            state: ServiceState::New,
            reached_running: false,
        });
        ServiceStatus { sender }
    }

    pub(crate) fn get(&self) -> ServiceState {
        self.sender.borrow().state
    }

    pub(crate) fn set(&self, state: ServiceState) {
        self.sender.send_modify(|status| {
            status.state = state;
            status.reached_running |= state == ServiceState::Running;
        });
    }

    /// Resolves once the service has been running, or fails if it terminated or failed first.
    pub(crate) async fn on_running(&self) -> Result<()> {
        let mut receiver = self.sender.subscribe();
        let status = *receiver
            .wait_for(|status| status.reached_running || status.state.is_finished())
            .await
            .map_err(|_| Error::ServiceStopped)?;

        match status {
            Status {
                reached_running: true,
                ..
            } => Ok(()),
            Status {
                state: ServiceState::Failed,
                ..
            } => Err(Error::ServiceFailed),
            Status { .. } => Err(Error::ServiceStopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ServiceState, ServiceStatus};
    use crate::Error;

    #[tokio::test]
    async fn on_running_resolves_when_running() {
        let status = Arc::new(ServiceStatus::new());

        let waiter = tokio::spawn({
            let status = status.clone();
            async move { status.on_running().await }
        });
        tokio::task::yield_now().await;

        status.set(ServiceState::Starting);
        status.set(ServiceState::Running);
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn on_running_succeeds_after_stop_if_it_ran() {
        let status = ServiceStatus::new();
        status.set(ServiceState::Running);
        status.set(ServiceState::Stopping);
        status.set(ServiceState::Terminated);
        assert!(status.on_running().await.is_ok());
    }

    #[tokio::test]
    async fn on_running_rejects_when_stopped_before_running() {
        let status = ServiceStatus::new();
        status.set(ServiceState::Terminated);
        assert!(matches!(
            status.on_running().await,
            Err(Error::ServiceStopped)
        ));

        let status = ServiceStatus::new();
        status.set(ServiceState::Starting);
        status.set(ServiceState::Failed);
        assert!(matches!(status.on_running().await, Err(Error::ServiceFailed)));
    }
}
