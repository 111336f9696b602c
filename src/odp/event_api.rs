use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{OdpConfig, OdpEvent};
use crate::{
    request_handler::{Request, RequestHandler},
    Error, Result,
};

/// Outcome of a delivered batch. Anything outside 2xx is retried by the event manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDispatchResponse {
    pub status_code: u16,
}

impl EventDispatchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Sends batches of events to ODP.
#[async_trait]
pub trait OdpEventApiManager: Send + Sync {
    /// `Err` means the batch never reached ODP (transport error or a batch this API can't send).
    async fn send_events(
        &self,
        config: &OdpConfig,
        events: &[OdpEvent],
    ) -> Result<EventDispatchResponse>;
}

/// Sends batches as JSON to `POST {api_host}/v3/events`.
pub struct RestOdpEventApiManager {
    request_handler: Arc<dyn RequestHandler>,
}

impl RestOdpEventApiManager {
    pub fn new(request_handler: Arc<dyn RequestHandler>) -> RestOdpEventApiManager {
        RestOdpEventApiManager { request_handler }
    }
}

#[async_trait]
impl OdpEventApiManager for RestOdpEventApiManager {
    async fn send_events(
        &self,
        config: &OdpConfig,
        events: &[OdpEvent],
    ) -> Result<EventDispatchResponse> {
        let request = Request::post(
            format!("{}/v3/events", config.api_host),
            serde_json::to_string(events)?,
        )
        .with_header("content-type", "application/json")
        .with_header("x-api-key", &config.api_key);

        let response = self.request_handler.make_request(request).await?;
        Ok(EventDispatchResponse {
            status_code: response.status_code,
        })
    }
}

/// Sends one event at a time as query parameters of `GET {pixel_url}/v2/zaius.gif`.
///
/// Used where only simple GET requests are possible. Should be paired with an event manager
/// that sends batches of one.
pub struct PixelOdpEventApiManager {
    request_handler: Arc<dyn RequestHandler>,
}

impl PixelOdpEventApiManager {
    pub fn new(request_handler: Arc<dyn RequestHandler>) -> PixelOdpEventApiManager {
        PixelOdpEventApiManager { request_handler }
    }

    fn pixel_url(config: &OdpConfig, event: &OdpEvent) -> Result<Url> {
        let mut params: Vec<(&str, String)> = vec![
            ("tracker_id", config.api_key.clone()),
            ("event_type", event.event_type.clone()),
            ("vdl_action", event.action.clone()),
        ];
        params.extend(
            event
                .identifiers
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone())),
        );
        params.extend(
            event
                .data
                .iter()
                .map(|(key, value)| (key.as_str(), query_value(value))),
        );

        Ok(Url::parse_with_params(
            &format!("{}/v2/zaius.gif", config.pixel_url),
            params,
        )?)
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl OdpEventApiManager for PixelOdpEventApiManager {
    async fn send_events(
        &self,
        config: &OdpConfig,
        events: &[OdpEvent],
    ) -> Result<EventDispatchResponse> {
        let [event] = events else {
            log::error!(target: "optimizely", count = events.len(); "pixel API can only send one event at a time");
            return Err(Error::TooManyEvents(events.len()));
        };

        let url = Self::pixel_url(config, event)?;
        let response = self
            .request_handler
            .make_request(Request::get(url.as_str()))
            .await?;
        Ok(EventDispatchResponse {
            status_code: response.status_code,
        })
    }
}
