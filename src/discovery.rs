//! mDNS/DNS-SD advertisement of the bridge.
//!
//! Best-effort: a failure is logged by the orchestrator and the server keeps
//! running unadvertised.

use std::collections::HashMap;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{info, warn};

use crate::config::DiscoveryConfig;

/// Version of the TXT record layout.
const TXT_VERSION: &str = "0";

/// Errors raised while advertising the service.
#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    /// The mDNS daemon or registration failed
    #[error("mDNS failure: {0}")]
    Mdns(#[from] mdns_sd::Error),

    /// Advertisement is turned off in the configuration
    #[error("network discovery is disabled")]
    Disabled,
}

/// A running advertisement that can be withdrawn.
pub trait Advertiser: Send {
    /// Withdraws the advertisement. Calling it again is a no-op.
    fn shutdown(&mut self);
}

/// Starts an advertisement on demand; called again whenever the server
/// wants to be discoverable after a client leaves.
pub type AdvertiserFactory =
    Box<dyn Fn() -> Result<Box<dyn Advertiser>, DiscoveryError> + Send + Sync>;

/// Advertises the bridge via the local mDNS responder.
pub struct NetworkDiscovery {
    daemon: ServiceDaemon,
    fullname: String,
    stopped: bool,
}

impl NetworkDiscovery {
    /// Registers the service for `port`.
    ///
    /// # Errors
    /// Returns an error if the daemon cannot start or registration fails.
    pub fn advertise(
        config: &DiscoveryConfig,
        port: u16,
        secure: bool,
    ) -> Result<Self, DiscoveryError> {
        if !config.enabled {
            return Err(DiscoveryError::Disabled);
        }

        let daemon = ServiceDaemon::new()?;

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "cyprus".to_string());

        let service_type = config.qualified_service_type();
        let service = ServiceInfo::new(
            &service_type,
            &config.instance_name,
            &format!("{}.local.", dns_hostname(&hostname)),
            "",
            port,
            Some(txt_records(secure)),
        )?
        .enable_addr_auto();

        let fullname = service.get_fullname().to_string();
        daemon.register(service)?;

        info!(
            instance = %config.instance_name,
            %service_type,
            port,
            secure,
            "Advertising service"
        );

        Ok(Self {
            daemon,
            fullname,
            stopped: false,
        })
    }

    /// Factory that advertises with fixed settings every time it is called.
    pub fn factory(config: DiscoveryConfig, port: u16, secure: bool) -> AdvertiserFactory {
        Box::new(move || {
            let discovery = Self::advertise(&config, port, secure)?;
            Ok(Box::new(discovery) as Box<dyn Advertiser>)
        })
    }
}

impl Advertiser for NetworkDiscovery {
    fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Err(e) = self.daemon.unregister(&self.fullname) {
            warn!("Failed to unregister service: {e}");
        }
        if let Err(e) = self.daemon.shutdown() {
            warn!("Failed to stop mDNS daemon: {e}");
        }

        info!(service = %self.fullname, "Advertisement withdrawn");
    }
}

impl Drop for NetworkDiscovery {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// TXT properties published with the service.
pub fn txt_records(secure: bool) -> HashMap<String, String> {
    let mut txt = HashMap::new();
    txt.insert("txtv".to_string(), TXT_VERSION.to_string());
    txt.insert(
        "secure".to_string(),
        if secure { "1" } else { "0" }.to_string(),
    );
    txt.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());
    txt
}

/// Lowercase, dash-separated label safe for a `.local.` host name.
fn dns_hostname(hostname: &str) -> String {
    let label: String = hostname
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    if label.is_empty() {
        "cyprus".to_string()
    } else {
        label
    }
}
