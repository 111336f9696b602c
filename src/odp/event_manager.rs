use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use tokio::{runtime::Handle, task::JoinHandle};

use super::{
    event::CommonData, service::ServiceStatus, ClientInfo, OdpConfig, OdpEvent, OdpEventApiManager,
    OdpIntegration, RetryConfig, ServiceState, UserAgentInfo, DEFAULT_EVENT_TYPE, FS_USER_ID,
    VUID,
};
use crate::{Error, Result};

/// Configuration for [`OdpEventManager`].
#[derive(Debug, Clone)]
pub struct OdpEventManagerConfig {
    /// Number of queued events that triggers an immediate flush.
    pub batch_size: usize,
    /// Maximum time a partial batch waits in the queue.
    pub flush_interval: Duration,
    /// Events sent while the queue holds this many are dropped.
    pub queue_size: usize,
    pub retry: RetryConfig,
    /// Send every event as soon as it is queued. For short-lived processes.
    pub disposable: bool,
    pub client: ClientInfo,
    pub user_agent: Option<UserAgentInfo>,
}

impl OdpEventManagerConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_QUEUE_SIZE: usize = 10_000;

    pub fn new() -> OdpEventManagerConfig {
        OdpEventManagerConfig {
            batch_size: OdpEventManagerConfig::DEFAULT_BATCH_SIZE,
            flush_interval: OdpEventManagerConfig::DEFAULT_FLUSH_INTERVAL,
            queue_size: OdpEventManagerConfig::DEFAULT_QUEUE_SIZE,
            retry: RetryConfig::default(),
            disposable: false,
            client: ClientInfo::default(),
            user_agent: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> OdpEventManagerConfig {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> OdpEventManagerConfig {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> OdpEventManagerConfig {
        self.queue_size = queue_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> OdpEventManagerConfig {
        self.retry = retry;
        self
    }

    pub fn with_disposable(mut self, disposable: bool) -> OdpEventManagerConfig {
        self.disposable = disposable;
        self
    }

    pub fn with_client(mut self, client: ClientInfo) -> OdpEventManagerConfig {
        self.client = client;
        self
    }

    pub fn with_user_agent(mut self, user_agent: UserAgentInfo) -> OdpEventManagerConfig {
        self.user_agent = Some(user_agent);
        self
    }
}

impl Default for OdpEventManagerConfig {
    fn default() -> OdpEventManagerConfig {
        OdpEventManagerConfig::new()
    }
}

/// Queues ODP events and sends them in batches.
///
/// A batch is sent as soon as `batch_size` events are queued, or `flush_interval` after the first
/// event of a partial batch. Each flush takes the whole queue. Failed batches are retried in the
/// background and dropped once retries are exhausted.
///
/// Events are only accepted while the manager is running and ODP is integrated. Rejected events
/// are logged and dropped; `send_event` never fails.
pub struct OdpEventManager {
    inner: Arc<Inner>,
}

struct Inner {
    batch_size: usize,
    flush_interval: Duration,
    queue_size: usize,
    retry: RetryConfig,
    common_data: CommonData,
    api_manager: Arc<dyn OdpEventApiManager>,
    status: ServiceStatus,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    integration: Option<OdpIntegration>,
    queue: Vec<OdpEvent>,
    /// Runtime captured by `start()`. Background tasks are spawned here.
    runtime: Option<Handle>,
    flush_timer: Option<JoinHandle<()>>,
    /// Bumped whenever a timer is armed or cancelled. A timer only flushes if it is current.
    timer_generation: u64,
    dispatches: Vec<JoinHandle<()>>,
}

impl OdpEventManager {
    pub fn new(
        config: OdpEventManagerConfig,
        api_manager: Arc<dyn OdpEventApiManager>,
    ) -> OdpEventManager {
        let common_data = CommonData::new(&config.client, config.user_agent.as_ref());
        let (batch_size, retry) = if config.disposable {
            (
                1,
                config
                    .retry
                    .with_max_retries(RetryConfig::DEFAULT_MAX_RETRIES),
            )
        } else {
            (config.batch_size.max(1), config.retry)
        };

        OdpEventManager {
            inner: Arc::new(Inner {
                batch_size,
                flush_interval: config.flush_interval,
                queue_size: config.queue_size,
                retry,
                common_data,
                api_manager,
                status: ServiceStatus::new(),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.inner.status.get()
    }

    /// Start accepting events. Background tasks are spawned on the current Tokio runtime.
    ///
    /// Does nothing unless the manager is new. Fails with [`Error::NoRuntime`] when called outside
    /// of a runtime, leaving the manager failed.
    pub fn start(&self) -> Result<()> {
        let mut state = self.inner.lock_state();
        if self.inner.status.get() != ServiceState::New {
            return Ok(());
        }

        let Ok(runtime) = Handle::try_current() else {
            log::error!(target: "optimizely", "ODP event manager must be started within a Tokio runtime");
            self.inner.status.set(ServiceState::Failed);
            return Err(Error::NoRuntime);
        };
        state.runtime = Some(runtime);

        if state.integration.is_some() {
            self.inner.status.set(ServiceState::Running);
        } else {
            self.inner.status.set(ServiceState::Starting);
        }
        Ok(())
    }

    /// Resolves once the manager is running. Fails if it is stopped or fails first.
    pub async fn on_running(&self) -> Result<()> {
        self.inner.status.on_running().await
    }

    /// Switch to a new ODP configuration.
    ///
    /// Events queued under the previous configuration are flushed with it first.
    pub fn update_config(&self, integration: OdpIntegration) {
        let mut state = self.inner.lock_state();
        match self.inner.status.get() {
            ServiceState::New => {
                state.integration = Some(integration);
            }
            ServiceState::Starting => {
                state.integration = Some(integration);
                self.inner.status.set(ServiceState::Running);
            }
            ServiceState::Running => {
                if state.integration.as_ref() == Some(&integration) {
                    return;
                }
                self.inner.flush_locked(&mut state);
                state.integration = Some(integration);
            }
            status @ (ServiceState::Stopping | ServiceState::Terminated | ServiceState::Failed) => {
                log::debug!(target: "optimizely", state:? = status; "ignoring ODP config update for inactive event manager");
            }
        }
    }

    /// Queue an event. Invalid events and events sent while inactive are logged and dropped.
    pub fn send_event(&self, event: OdpEvent) {
        self.inner.send_event(event);
    }

    /// Associate a known user with a visitor id.
    pub fn identify_user(&self, user_id: Option<&str>, vuid: Option<&str>) {
        let mut identifiers = HashMap::new();
        if let Some(vuid) = vuid {
            identifiers.insert(VUID.to_owned(), vuid.to_owned());
        }
        if let Some(user_id) = user_id {
            identifiers.insert(FS_USER_ID.to_owned(), user_id.to_owned());
        }
        if identifiers.is_empty() {
            log::debug!(target: "optimizely", "skipping identify event: no user id or vuid");
            return;
        }

        self.send_event(OdpEvent::new(
            DEFAULT_EVENT_TYPE,
            "identified",
            identifiers,
            HashMap::new(),
        ));
    }

    /// Report a newly created visitor id.
    pub fn register_vuid(&self, vuid: &str) {
        self.send_event(OdpEvent::new(
            DEFAULT_EVENT_TYPE,
            "client_initialized",
            HashMap::from([(VUID.to_owned(), vuid.to_owned())]),
            HashMap::new(),
        ));
    }

    /// Send all queued events now and wait until in-flight batches are done.
    pub async fn flush(&self) {
        let pending = {
            let mut state = self.inner.lock_state();
            self.inner.flush_locked(&mut state);
            std::mem::take(&mut state.dispatches)
        };
        wait_for_dispatches(pending).await;
    }

    /// Flush the queue, wait for in-flight batches, then stop accepting events.
    pub async fn stop(&self) {
        let pending = {
            let mut state = self.inner.lock_state();
            match self.inner.status.get() {
                ServiceState::New => {
                    self.inner.status.set(ServiceState::Terminated);
                    return;
                }
                ServiceState::Stopping | ServiceState::Terminated | ServiceState::Failed => {
                    return;
                }
                ServiceState::Starting | ServiceState::Running => {}
            }

            self.inner.status.set(ServiceState::Stopping);
            self.inner.flush_locked(&mut state);
            std::mem::take(&mut state.dispatches)
        };

        wait_for_dispatches(pending).await;
        self.inner.status.set(ServiceState::Terminated);
        log::debug!(target: "optimizely", "ODP event manager stopped");
    }

    #[cfg(test)]
    fn queue_len(&self) -> usize {
        self.inner.lock_state().queue.len()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .expect("thread holding ODP event manager lock should not panic")
    }

    fn send_event(self: &Arc<Self>, mut event: OdpEvent) {
        let mut state = self.lock_state();

        let status = self.status.get();
        if status != ServiceState::Running {
            log::warn!(target: "optimizely", state:? = status, action = event.action.as_str(); "ODP event manager is not running, dropping event");
            return;
        }
        if !state
            .integration
            .as_ref()
            .is_some_and(OdpIntegration::is_integrated)
        {
            log::debug!(target: "optimizely", action = event.action.as_str(); "ODP is not integrated, dropping event");
            return;
        }
        if let Err(err) = event.validate() {
            log::error!(target: "optimizely", action = event.action.as_str(); "dropping invalid ODP event: {err}");
            return;
        }
        if state.queue.len() >= self.queue_size {
            log::warn!(target: "optimizely", queue_size = self.queue_size; "ODP event queue is full, dropping event");
            return;
        }

        event.normalize();
        event.add_common_data(&self.common_data);
        state.queue.push(event);

        if state.queue.len() >= self.batch_size {
            self.flush_locked(&mut state);
        } else {
            self.arm_flush_timer(&mut state);
        }
    }

    /// Take the whole queue and send it in the background.
    fn flush_locked(&self, state: &mut State) {
        if let Some(timer) = state.flush_timer.take() {
            timer.abort();
            state.timer_generation += 1;
        }
        state.dispatches.retain(|dispatch| !dispatch.is_finished());

        if state.queue.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut state.queue);

        let Some(config) = state
            .integration
            .as_ref()
            .and_then(OdpIntegration::config)
            .cloned()
        else {
            log::debug!(target: "optimizely", batch_size = batch.len(); "ODP is not integrated, dropping queued events");
            return;
        };
        let Some(runtime) = state.runtime.as_ref() else {
            log::warn!(target: "optimizely", batch_size = batch.len(); "ODP event manager is not started, dropping queued events");
            return;
        };

        let task = dispatch(
            Arc::clone(&self.api_manager),
            self.retry.clone(),
            config,
            batch,
        );
        state.dispatches.push(runtime.spawn(task));
    }

    /// Make sure a partial batch gets flushed within `flush_interval`.
    fn arm_flush_timer(self: &Arc<Self>, state: &mut State) {
        if state
            .flush_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
        {
            return;
        }
        let Some(runtime) = state.runtime.as_ref() else {
            return;
        };

        state.timer_generation += 1;
        let generation = state.timer_generation;
        let inner: Weak<Inner> = Arc::downgrade(self);
        let flush_interval = self.flush_interval;
        state.flush_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(flush_interval).await;
            if let Some(inner) = inner.upgrade() {
                inner.on_flush_timer(generation);
            }
        }));
    }

    /// A timer may fire after it was cancelled while waiting for the lock. Only the timer that is
    /// currently armed flushes.
    fn on_flush_timer(&self, generation: u64) {
        let mut state = self.lock_state();
        if state.timer_generation != generation {
            return;
        }
        state.flush_timer = None;
        self.flush_locked(&mut state);
    }
}

/// Send `batch`, retrying failed attempts with backoff. Errors that would repeat on every attempt
/// drop the batch right away.
async fn dispatch(
    api_manager: Arc<dyn OdpEventApiManager>,
    retry: RetryConfig,
    config: OdpConfig,
    batch: Vec<OdpEvent>,
) {
    let mut backoff = (retry.backoff_provider)();
    let max_attempts = retry.max_attempts();

    for attempt in 1..=max_attempts {
        match api_manager.send_events(&config, &batch).await {
            Ok(response) if response.is_success() => {
                log::debug!(target: "optimizely", batch_size = batch.len(), attempt = attempt; "sent ODP events");
                return;
            }
            Ok(response) => {
                let err = Error::from_status(response.status_code);
                log::debug!(target: "optimizely", err:% = err, attempt = attempt; "ODP events request failed");
            }
            Err(err) if !err.is_retryable() => {
                log::error!(target: "optimizely", err:% = err, batch_size = batch.len(); "ODP events can't be sent, dropping batch");
                return;
            }
            Err(err) => {
                log::debug!(target: "optimizely", err:? = err, attempt = attempt; "failed to send ODP events");
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(backoff.backoff()).await;
        }
    }

    log::error!(target: "optimizely", batch_size = batch.len(), attempts = max_attempts; "failed to send ODP events after {max_attempts} attempts, dropping batch");
}

async fn wait_for_dispatches(dispatches: Vec<JoinHandle<()>>) {
    for dispatch in dispatches {
        if let Err(err) = dispatch.await {
            if err.is_panic() {
                log::error!(target: "optimizely", err:? = err; "ODP event dispatch panicked");
            }
        }
    }
}
