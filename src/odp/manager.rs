use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use super::{
    service::ServiceStatus, GraphqlSegmentApiManager, OdpEvent, OdpEventManager,
    OdpEventManagerConfig, OdpIntegration, OdpSegmentManager, OdpSegmentManagerConfig,
    OptimizelySegmentOption, RestOdpEventApiManager, ServiceState, FS_USER_ID, VUID,
};
use crate::{
    request_handler::{RequestHandler, ReqwestRequestHandler},
    Result,
};

const VUID_PREFIX: &str = "vuid_";

/// Configuration for [`OdpManager::new`].
#[derive(Debug, Clone)]
pub struct OdpManagerConfig {
    pub event_manager: OdpEventManagerConfig,
    pub segment_manager: OdpSegmentManagerConfig,
    /// Timeout for every ODP HTTP request.
    pub request_timeout: Duration,
}

impl OdpManagerConfig {
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = ReqwestRequestHandler::DEFAULT_TIMEOUT;

    pub fn new() -> OdpManagerConfig {
        OdpManagerConfig {
            event_manager: OdpEventManagerConfig::default(),
            segment_manager: OdpSegmentManagerConfig::default(),
            request_timeout: OdpManagerConfig::DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_event_manager(mut self, event_manager: OdpEventManagerConfig) -> OdpManagerConfig {
        self.event_manager = event_manager;
        self
    }

    pub fn with_segment_manager(
        mut self,
        segment_manager: OdpSegmentManagerConfig,
    ) -> OdpManagerConfig {
        self.segment_manager = segment_manager;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> OdpManagerConfig {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for OdpManagerConfig {
    fn default() -> OdpManagerConfig {
        OdpManagerConfig::new()
    }
}

/// Entry point to the ODP integration.
///
/// Typical lifecycle:
///
/// 1. Create with [`OdpManager::new`] and call [`OdpManager::start`] from within a Tokio runtime.
/// 2. Call [`OdpManager::update_config`] every time a new datafile is parsed.
/// 3. Fetch segments and send events.
/// 4. Call [`OdpManager::stop`] before shutting down to flush pending events.
pub struct OdpManager {
    status: ServiceStatus,
    integration: Mutex<Option<OdpIntegration>>,
    segment_manager: OdpSegmentManager,
    event_manager: OdpEventManager,
}

impl OdpManager {
    /// Create a manager that talks to ODP over HTTP with `reqwest`.
    pub fn new(config: OdpManagerConfig) -> OdpManager {
        let request_handler: Arc<dyn RequestHandler> =
            Arc::new(ReqwestRequestHandler::with_timeout(config.request_timeout));

        let segment_manager = OdpSegmentManager::new(
            Arc::new(GraphqlSegmentApiManager::new(request_handler.clone())),
            Arc::new(config.segment_manager.to_cache()),
        );
        let event_manager = OdpEventManager::new(
            config.event_manager,
            Arc::new(RestOdpEventApiManager::new(request_handler)),
        );

        OdpManager::with_managers(segment_manager, event_manager)
    }

    pub fn with_managers(
        segment_manager: OdpSegmentManager,
        event_manager: OdpEventManager,
    ) -> OdpManager {
        OdpManager {
            status: ServiceStatus::new(),
            integration: Mutex::new(None),
            segment_manager,
            event_manager,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.status.get()
    }

    /// Start the event manager. Must be called from within a Tokio runtime.
    ///
    /// The manager is running once an ODP configuration is known.
    pub fn start(&self) -> Result<()> {
        let integration = self.lock_integration();
        if self.status.get() != ServiceState::New {
            return Ok(());
        }

        self.status.set(ServiceState::Starting);
        if let Err(err) = self.event_manager.start() {
            self.status.set(ServiceState::Failed);
            return Err(err);
        }

        if integration.is_some() {
            self.status.set(ServiceState::Running);
        }
        Ok(())
    }

    /// Resolves once the manager is running. Fails if it is stopped or fails first.
    pub async fn on_running(&self) -> Result<()> {
        self.status.on_running().await
    }

    /// Flush pending events and stop.
    pub async fn stop(&self) {
        match self.status.get() {
            ServiceState::New => {
                self.status.set(ServiceState::Terminated);
                self.event_manager.stop().await;
                return;
            }
            ServiceState::Stopping | ServiceState::Terminated | ServiceState::Failed => return,
            ServiceState::Starting | ServiceState::Running => {}
        }

        self.status.set(ServiceState::Stopping);
        self.event_manager.stop().await;
        self.status.set(ServiceState::Terminated);
    }

    /// Apply the ODP settings of a new datafile. Returns `false` if nothing changed.
    pub fn update_config(&self, integration: OdpIntegration) -> bool {
        let mut current = self.lock_integration();
        if current.as_ref() == Some(&integration) {
            return false;
        }
        *current = Some(integration.clone());

        self.segment_manager.update_config(integration.clone());
        self.event_manager.update_config(integration);

        if self.status.get() == ServiceState::Starting {
            self.status.set(ServiceState::Running);
        }
        true
    }

    /// Fetch the segments `user_id` qualifies for. Ids starting with `vuid_` are looked up as
    /// visitor ids.
    pub async fn fetch_qualified_segments(
        &self,
        user_id: &str,
        options: &[OptimizelySegmentOption],
    ) -> Option<Vec<String>> {
        let user_key = if is_vuid(user_id) { VUID } else { FS_USER_ID };
        self.segment_manager
            .fetch_qualified_segments(user_key, user_id, options)
            .await
    }

    pub fn identify_user(&self, user_id: Option<&str>, vuid: Option<&str>) {
        self.event_manager.identify_user(user_id, vuid);
    }

    pub fn register_vuid(&self, vuid: &str) {
        self.event_manager.register_vuid(vuid);
    }

    pub fn send_event(&self, event: OdpEvent) {
        self.event_manager.send_event(event);
    }

    fn lock_integration(&self) -> std::sync::MutexGuard<'_, Option<OdpIntegration>> {
        self.integration
            .lock()
            .expect("thread holding ODP manager lock should not panic")
    }
}

fn is_vuid(user_id: &str) -> bool {
    user_id.starts_with(VUID_PREFIX)
}
