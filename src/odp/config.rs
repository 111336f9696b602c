/// Connection settings for ODP, taken from the datafile.
///
/// Compared by value: any change means cached segments and queued events belong to a different
/// configuration epoch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OdpConfig {
    /// Public API key, sent as `x-api-key` and as the pixel `tracker_id`.
    pub api_key: String,
    /// Base URL of the REST and GraphQL APIs, e.g. `https://api.zaius.com`.
    pub api_host: String,
    /// Base URL of the pixel API, e.g. `https://jumbe.zaius.com`.
    pub pixel_url: String,
    /// Segments referenced by audiences in the datafile. Only these are requested for users.
    pub segments_to_check: Vec<String>,
}

impl OdpConfig {
    pub fn new(
        api_key: impl Into<String>,
        api_host: impl Into<String>,
        pixel_url: impl Into<String>,
        segments_to_check: Vec<String>,
    ) -> OdpConfig {
        OdpConfig {
            api_key: api_key.into(),
            api_host: api_host.into(),
            pixel_url: pixel_url.into(),
            segments_to_check,
        }
    }
}

/// Whether the project is integrated with ODP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OdpIntegration {
    NotIntegrated,
    Integrated(OdpConfig),
}

impl OdpIntegration {
    pub fn config(&self) -> Option<&OdpConfig> {
        match self {
            OdpIntegration::Integrated(config) => Some(config),
            OdpIntegration::NotIntegrated => None,
        }
    }

    pub fn is_integrated(&self) -> bool {
        self.config().is_some()
    }
}

impl From<OdpConfig> for OdpIntegration {
    fn from(config: OdpConfig) -> OdpIntegration {
        OdpIntegration::Integrated(config)
    }
}

/// SDK identification stamped on every event as `data_source`/`data_source_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> ClientInfo {
        ClientInfo {
            name: "rust-sdk".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// Device information added to event data when the host knows it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserAgentInfo {
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub device_type: Option<String>,
    pub model: Option<String>,
}
