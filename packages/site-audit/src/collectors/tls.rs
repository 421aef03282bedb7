//! TLS probe: one handshake, certificate facts, no cipher scanning.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, ProtocolVersion, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

use crate::types::collector::CollectorOutput;
use crate::types::raw::TlsFacts;

use super::CollectorContext;

/// Perform a single TLS handshake against port 443 and record the
/// negotiated protocol plus leaf-certificate facts.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<TlsFacts> {
    let host = ctx.identity.host();
    let timeout = ctx.config.timeouts.tls();

    match tokio::time::timeout(timeout, handshake(&host)).await {
        Ok(result) => result,
        Err(_) => CollectorOutput::err(format!(
            "TLS handshake timed out after {}s for {}",
            timeout.as_secs(),
            host
        )),
    }
}

async fn handshake(host: &str) -> CollectorOutput<TlsFacts> {
    debug!(host = %host, "tls probe");

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = match ServerName::try_from(host.to_string()) {
        Ok(name) => name,
        Err(_) => return CollectorOutput::err(format!("invalid TLS server name: {}", host)),
    };

    let tcp = match TcpStream::connect((host, 443)).await {
        Ok(stream) => stream,
        Err(e) => return CollectorOutput::err(format!("TCP connect failed: {}", e)),
    };

    let tls = match connector.connect(server_name, tcp).await {
        Ok(stream) => stream,
        Err(e) => return CollectorOutput::err(format!("TLS handshake failed: {}", e)),
    };

    let (_, connection) = tls.get_ref();

    let protocol = connection
        .protocol_version()
        .map(protocol_name)
        .unwrap_or_else(|| "unknown".to_string());

    let mut facts = TlsFacts {
        protocol,
        issuer: None,
        subject: None,
        not_after: None,
        days_until_expiry: None,
        subject_alt_names: Vec::new(),
    };

    if let Some(certs) = connection.peer_certificates() {
        if let Some(leaf) = certs.first() {
            if let Ok((_, cert)) = X509Certificate::from_der(leaf.as_ref()) {
                facts.issuer = Some(cert.issuer().to_string());
                facts.subject = Some(cert.subject().to_string());

                let not_after = cert.validity().not_after.timestamp();
                if let Some(expiry) = DateTime::<Utc>::from_timestamp(not_after, 0) {
                    facts.days_until_expiry = Some((expiry - Utc::now()).num_days());
                    facts.not_after = Some(expiry);
                }

                if let Ok(Some(san)) = cert.subject_alternative_name() {
                    facts.subject_alt_names = san
                        .value
                        .general_names
                        .iter()
                        .filter_map(|name| match name {
                            GeneralName::DNSName(dns) => Some(dns.to_string()),
                            _ => None,
                        })
                        .collect();
                }
            }
        }
    }

    CollectorOutput::ok(facts)
}

fn protocol_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLSv1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLSv1.0".to_string(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_names() {
        assert_eq!(protocol_name(ProtocolVersion::TLSv1_3), "TLSv1.3");
        assert_eq!(protocol_name(ProtocolVersion::TLSv1_2), "TLSv1.2");
    }
}
