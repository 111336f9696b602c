//! ODP (Optimizely Data Platform) integration.
//!
//! [`OdpManager`] is the entry point. It composes:
//!
//! - [`OdpSegmentManager`] that fetches the segments a user qualifies for (through
//!   [`OdpSegmentApiManager`]) and caches them in an [`LruCache`].
//! - [`OdpEventManager`] that validates, queues and sends events in batches (through
//!   [`OdpEventApiManager`]), retrying failed batches with backoff.
//!
//! Both managers are driven by the currently active [`OdpIntegration`], which comes from the
//! datafile. Whenever it changes, cached segments are dropped and queued events are flushed with
//! the old configuration before the new one takes effect.
//!
//! Background work (flush timer, batch dispatch) runs on the Tokio runtime that was current when
//! the managers were started.
mod backoff;
mod config;
mod event;
mod event_api;
mod event_manager;
mod lru_cache;
mod manager;
mod segment_api;
mod segment_manager;
mod service;

pub use backoff::{
    BackoffController, BackoffProvider, ConstantBackoff, ExponentialBackoff, RetryConfig,
};
pub use config::{ClientInfo, OdpConfig, OdpIntegration, UserAgentInfo};
pub use event::{OdpEvent, DEFAULT_EVENT_TYPE};
pub use event_api::{
    EventDispatchResponse, OdpEventApiManager, PixelOdpEventApiManager, RestOdpEventApiManager,
};
pub use event_manager::{OdpEventManager, OdpEventManagerConfig};
pub use lru_cache::{Cache, LruCache};
pub use manager::{OdpManager, OdpManagerConfig};
pub use segment_api::{GraphqlSegmentApiManager, OdpSegmentApiManager};
pub use segment_manager::{OdpSegmentManager, OdpSegmentManagerConfig, OptimizelySegmentOption};
pub use service::ServiceState;

/// Identifier key for known users.
pub const FS_USER_ID: &str = "fs_user_id";
/// Identifier key for anonymous visitors.
pub const VUID: &str = "vuid";
