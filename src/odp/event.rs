use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ClientInfo, UserAgentInfo, FS_USER_ID};

/// Event type used when the caller doesn't set one.
pub const DEFAULT_EVENT_TYPE: &str = "fullstack";

/// An event sent to ODP.
///
/// Serializes to the shape expected by the ODP REST API:
/// `{"type": ..., "action": ..., "identifiers": {...}, "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdpEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub action: String,
    pub identifiers: HashMap<String, String>,
    /// Scalar values only: strings, numbers, booleans or null.
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

/// Why an event was refused by the event manager.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum InvalidEvent {
    #[error("ODP event must have at least one identifier")]
    NoIdentifiers,
    #[error("ODP event must have a non-empty action")]
    EmptyAction,
    #[error("ODP event data must be scalar values; \"{key}\" is not")]
    InvalidData { key: String },
}

impl OdpEvent {
    pub fn new(
        event_type: impl Into<String>,
        action: impl Into<String>,
        identifiers: HashMap<String, String>,
        data: HashMap<String, Value>,
    ) -> OdpEvent {
        OdpEvent {
            event_type: event_type.into(),
            action: action.into(),
            identifiers,
            data,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidEvent> {
        if self.identifiers.is_empty() {
            return Err(InvalidEvent::NoIdentifiers);
        }
        if self.action.is_empty() {
            return Err(InvalidEvent::EmptyAction);
        }
        if let Some((key, _)) = self.data.iter().find(|(_, value)| !is_scalar(value)) {
            return Err(InvalidEvent::InvalidData { key: key.clone() });
        }
        Ok(())
    }

    /// Fill in the default event type and rename `fs-user-id` spellings to `fs_user_id`.
    ///
    /// If the canonical key is already present, it is kept and aliases are dropped.
    pub(crate) fn normalize(&mut self) {
        if self.event_type.is_empty() {
            self.event_type = DEFAULT_EVENT_TYPE.to_owned();
        }

        let aliases: Vec<String> = self
            .identifiers
            .keys()
            .filter(|key| key.as_str() != FS_USER_ID && is_fs_user_id_alias(key))
            .cloned()
            .collect();
        for alias in aliases {
            if let Some(value) = self.identifiers.remove(&alias) {
                self.identifiers
                    .entry(FS_USER_ID.to_owned())
                    .or_insert(value);
            }
        }
    }

    /// Add SDK-wide data to the event. Values already present in the event win.
    pub(crate) fn add_common_data(&mut self, common: &CommonData) {
        self.data
            .entry("idempotence_id".to_owned())
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        for (key, value) in &common.0 {
            self.data
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn is_fs_user_id_alias(key: &str) -> bool {
    key.eq_ignore_ascii_case("fs-user-id") || key.eq_ignore_ascii_case(FS_USER_ID)
}

/// Data attached to every event sent by this SDK instance.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommonData(HashMap<String, Value>);

impl CommonData {
    pub(crate) fn new(client: &ClientInfo, user_agent: Option<&UserAgentInfo>) -> CommonData {
        let mut data = HashMap::from([
            ("data_source_type".to_owned(), Value::from("sdk")),
            ("data_source".to_owned(), Value::from(client.name.as_str())),
            (
                "data_source_version".to_owned(),
                Value::from(client.version.as_str()),
            ),
        ]);

        if let Some(user_agent) = user_agent {
            let fields = [
                ("os", &user_agent.os),
                ("os_version", &user_agent.os_version),
                ("device_type", &user_agent.device_type),
                ("model", &user_agent.model),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    data.insert(key.to_owned(), Value::from(value.as_str()));
                }
            }
        }

        CommonData(data)
    }
}
