//! Self-signed TLS for the secure listener.

use std::net::Ipv4Addr;

use axum_server::tls_rustls::RustlsConfig;
use tracing::info;

use super::TransportError;

/// PEM-encoded certificate and key generated at startup.
#[derive(Debug, Clone)]
pub struct SelfSignedCertificate {
    /// Certificate chain with a single self-signed certificate
    pub cert_pem: String,
    /// PKCS#8 private key
    pub key_pem: String,
    /// Names and addresses the certificate is valid for
    pub subject_alt_names: Vec<String>,
}

/// Generates a certificate valid for `localhost` and every given address.
///
/// # Errors
/// Returns [`TransportError::Tls`] if key generation or signing fails.
pub fn self_signed(addresses: &[Ipv4Addr]) -> Result<SelfSignedCertificate, TransportError> {
    let mut subject_alt_names = vec!["localhost".to_string()];
    subject_alt_names.extend(addresses.iter().map(ToString::to_string));

    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(subject_alt_names.clone())
            .map_err(|e| TransportError::Tls(e.to_string()))?;

    Ok(SelfSignedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        subject_alt_names,
    })
}

/// Builds the rustls server configuration for the listener.
///
/// # Errors
/// Returns [`TransportError::Tls`] if the certificate cannot be generated
/// or loaded.
pub async fn server_config(addresses: &[Ipv4Addr]) -> Result<RustlsConfig, TransportError> {
    let certificate = self_signed(addresses)?;
    info!(names = ?certificate.subject_alt_names, "Generated self-signed certificate");

    RustlsConfig::from_pem(
        certificate.cert_pem.into_bytes(),
        certificate.key_pem.into_bytes(),
    )
    .await
    .map_err(|e| TransportError::Tls(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn certificate_covers_localhost_and_addresses() {
        let certificate = self_signed(&[Ipv4Addr::new(192, 168, 0, 7)]).unwrap();

        assert_eq!(
            certificate.subject_alt_names,
            vec!["localhost".to_string(), "192.168.0.7".to_string()]
        );
        assert!(certificate.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(certificate.key_pem.contains("PRIVATE KEY"));
    }
}
