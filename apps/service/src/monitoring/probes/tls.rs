//! Certificate inspection over a TLS handshake.
//!
//! The handshake accepts any certificate, self-signed and expired included, because the
//! point is to read the certificate, not to trust it.

use chrono::{DateTime, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::target::host_and_port;
use super::{Probe, ProbeRequest, elapsed_ms};
use crate::monitoring::types::{CertificateInfo, CheckResult};

const CRITICAL_DAYS: i64 = 7;
const WARNING_DAYS: i64 = 30;
const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug)]
struct InspectOnlyVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for InspectOnlyVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// Whole days from `now` until `valid_to`, rounded down
pub fn days_until_expiry(valid_to: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (valid_to - now).num_milliseconds().div_euclid(MS_PER_DAY)
}

/// Map certificate facts to a check result
pub fn evaluate_certificate(info: CertificateInfo, latency: u64) -> CheckResult {
    let days = info.days_until_expiry;
    let result = if days < 0 {
        CheckResult::offline(latency, format!("Certificate expired {} days ago", -days))
    } else if days < CRITICAL_DAYS {
        CheckResult::degraded(latency, format!("Certificate expires in {days} days (critical)"))
    } else if days < WARNING_DAYS {
        CheckResult::degraded(latency, format!("Certificate expires in {days} days"))
    } else {
        CheckResult::online(latency, format!("Certificate valid for {days} more days"))
    };
    result.with_data(crate::monitoring::types::ProbeData::Certificate(info))
}

/// Read the fields we report from a DER certificate
pub fn parse_certificate(der: &[u8], now: DateTime<Utc>) -> Result<CertificateInfo, String> {
    let (_, certificate) = X509Certificate::from_der(der).map_err(|e| format!("unreadable certificate: {e}"))?;
    let validity = certificate.validity();

    let valid_from = DateTime::from_timestamp(validity.not_before.timestamp(), 0)
        .ok_or_else(|| "certificate start date out of range".to_string())?;
    let valid_to = DateTime::from_timestamp(validity.not_after.timestamp(), 0)
        .ok_or_else(|| "certificate end date out of range".to_string())?;

    Ok(CertificateInfo {
        subject: certificate.subject().to_string(),
        issuer: certificate.issuer().to_string(),
        valid_from,
        valid_to,
        days_until_expiry: days_until_expiry(valid_to, now),
    })
}

/// TLS certificate checker
pub struct TlsProbe {
    connector: TlsConnector,
    timeout_duration: Duration,
}

impl TlsProbe {
    pub fn new(timeout_duration: Duration) -> Result<Self, rustls::Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InspectOnlyVerifier { provider }))
            .with_no_client_auth();

        Ok(Self { connector: TlsConnector::from(Arc::new(config)), timeout_duration })
    }

    async fn fetch_leaf_certificate(&self, host: &str, port: u16) -> Result<Option<Vec<u8>>, String> {
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|e| format!("invalid server name '{host}': {e}"))?;
        let tcp = TcpStream::connect((host, port)).await.map_err(|e| format!("TCP connection failed: {e}"))?;
        let stream = self.connector.connect(server_name, tcp).await.map_err(|e| format!("TLS handshake failed: {e}"))?;

        let (_, session) = stream.get_ref();
        Ok(session.peer_certificates().and_then(|chain| chain.first()).map(|leaf| leaf.as_ref().to_vec()))
    }
}

#[async_trait::async_trait]
impl Probe for TlsProbe {
    async fn probe(&self, request: &ProbeRequest<'_>) -> CheckResult {
        let (host, port) = match host_and_port(request.target, Some(443)) {
            Ok(parts) => parts,
            Err(error) => return CheckResult::offline(0, format!("Invalid TLS target: {error}")),
        };

        let start = Instant::now();
        let fetched = match timeout(self.timeout_duration, self.fetch_leaf_certificate(&host, port)).await {
            Ok(fetched) => fetched,
            Err(_) => {
                return CheckResult::timeout(
                    elapsed_ms(start),
                    format!("TLS handshake timed out after {}s", self.timeout_duration.as_secs_f32()),
                );
            }
        };
        let latency = elapsed_ms(start);

        let der = match fetched {
            Ok(Some(der)) => der,
            Ok(None) => return CheckResult::offline(latency, format!("{host}:{port} presented no certificate")),
            Err(error) => {
                debug!(%host, port, %error, "TLS probe failed");
                return CheckResult::offline(latency, error);
            }
        };

        match parse_certificate(&der, request.checked_at) {
            Ok(info) => evaluate_certificate(info, latency),
            Err(error) => CheckResult::offline(latency, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ServiceStatus;
    use chrono::Duration as ChronoDuration;

    fn certificate(days: i64) -> CertificateInfo {
        let now = Utc::now();
        CertificateInfo {
            subject: "CN=example.com".into(),
            issuer: "CN=Example CA".into(),
            valid_from: now - ChronoDuration::days(90),
            valid_to: now + ChronoDuration::days(days),
            days_until_expiry: days,
        }
    }

    #[test]
    fn expired_certificate_is_offline() {
        let result = evaluate_certificate(certificate(-5), 20);
        assert_eq!(result.status, ServiceStatus::Offline);
        assert!(result.message.contains("expired"));
        assert_eq!(result.certificate().map(|c| c.days_until_expiry), Some(-5));
    }

    #[test]
    fn expiry_bands() {
        assert_eq!(evaluate_certificate(certificate(0), 1).status, ServiceStatus::Degraded);
        assert_eq!(evaluate_certificate(certificate(6), 1).status, ServiceStatus::Degraded);
        assert_eq!(evaluate_certificate(certificate(29), 1).status, ServiceStatus::Degraded);
        assert_eq!(evaluate_certificate(certificate(30), 1).status, ServiceStatus::Online);
        assert!(evaluate_certificate(certificate(3), 1).message.contains("critical"));
    }

    #[test]
    fn days_round_down() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(days_until_expiry(now + ChronoDuration::hours(47), now), 1);
        assert_eq!(days_until_expiry(now + ChronoDuration::hours(48), now), 2);
        assert_eq!(days_until_expiry(now - ChronoDuration::hours(1), now), -1);
        assert_eq!(days_until_expiry(now - ChronoDuration::days(5), now), -5);
    }

    #[test]
    fn garbage_der_is_rejected() {
        assert!(parse_certificate(b"not a certificate", Utc::now()).is_err());
    }

    #[tokio::test]
    async fn plain_tcp_server_fails_the_handshake() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and immediately hang up.
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let probe = TlsProbe::new(Duration::from_secs(2)).unwrap();
        let headers = std::collections::BTreeMap::new();
        let target = address.to_string();
        let result = probe.probe(&ProbeRequest::new(&target, &headers)).await;

        assert_eq!(result.status, ServiceStatus::Offline);
        assert!(result.certificate().is_none());
    }

    #[tokio::test]
    async fn reads_served_certificate_relative_to_check_time() {
        let address = test_server::spawn().await;
        let valid_to = parse_certificate(test_server::CERTIFICATE, Utc::now()).unwrap().valid_to;

        let probe = TlsProbe::new(Duration::from_secs(2)).unwrap();
        let headers = std::collections::BTreeMap::new();
        let target = address.to_string();
        let request = ProbeRequest::new(&target, &headers).at(valid_to - ChronoDuration::days(10));
        let result = probe.probe(&request).await;

        assert_eq!(result.status, ServiceStatus::Degraded);
        let certificate = result.certificate().unwrap();
        assert_eq!(certificate.days_until_expiry, 10);
        assert_eq!(certificate.subject, "CN=localhost");
    }
}

/// A local TLS listener serving a fixed self-signed `localhost` certificate
#[cfg(test)]
pub(crate) mod test_server {
    use rustls::ServerConfig;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    pub const CERTIFICATE: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/localhost.cert.der"));
    const PRIVATE_KEY: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/localhost.key.der"));

    /// Serve on an ephemeral port; connections close after the handshake
    pub async fn spawn() -> SocketAddr {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(
                vec![CertificateDer::from(CERTIFICATE.to_vec())],
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(PRIVATE_KEY.to_vec())),
            )
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let _ = acceptor.accept(socket).await;
                });
            }
        });
        address
    }
}
