use serde::{Deserialize, Serialize};

/// mDNS advertisement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Advertise the service on the local network.
    pub enabled: bool,

    /// Instance name shown to browsing clients.
    pub instance_name: String,

    /// DNS-SD service type, without the domain.
    pub service_type: String,

    /// Domain the service type is registered under.
    pub domain: String,
}

impl DiscoveryConfig {
    /// Fully qualified service type, e.g. `_cyprus._tcp.local.`
    pub fn qualified_service_type(&self) -> String {
        let domain = self.domain.trim_end_matches('.');
        format!("{}.{}.", self.service_type.trim_end_matches('.'), domain)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            instance_name: "Cyprus".to_string(),
            service_type: "_cyprus._tcp".to_string(),
            domain: "local.".to_string(),
        }
    }
}
