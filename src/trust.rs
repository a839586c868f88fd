//! How clients decide whether to believe the certificate a server presents.
//!
//! Verification is normally performed by [`WebPkiServerVerifier`] against
//! the configured trust anchors. A client may instead opt out of it for
//! every server ([`TrustPolicy::InsecureAll`]) or for a fixed list of
//! server hostnames ([`TrustPolicy::InsecureHosts`]). Only the chain of
//! trust is skipped: signatures over the handshake transcript are still
//! checked using the presented certificate's key.

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{
    CryptoProvider, WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature,
};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, DistinguishedName, RootCertStore, SignatureScheme};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::hostname::normalize;
use crate::provider::TlsProviderError;

/// Peer certificate verification strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Verify every peer against the trust anchors.
    #[default]
    Default,
    /// Accept any certificate chain from any server.
    InsecureAll,
    /// Accept any certificate chain from servers with these normalized
    /// hostnames; verify all others.
    InsecureHosts(Arc<BTreeSet<String>>),
}

impl TrustPolicy {
    /// Whether chain verification is bypassed when connecting to `hostname`.
    pub fn skips_verification_for(&self, hostname: &str) -> bool {
        match self {
            Self::Default => false,
            Self::InsecureAll => true,
            Self::InsecureHosts(hosts) => hosts.contains(&normalize(hostname)),
        }
    }

    pub(crate) fn server_cert_verifier(
        &self,
        roots: Arc<RootCertStore>,
        crypto_provider: &Arc<CryptoProvider>,
    ) -> Result<Arc<dyn ServerCertVerifier>, TlsProviderError> {
        let verifier: Arc<dyn ServerCertVerifier> = match self {
            Self::InsecureAll => {
                log::warn!("TLS server certificate verification is disabled for all hosts");
                Arc::new(InsecureVerifier::new(crypto_provider))
            }
            Self::Default => {
                WebPkiServerVerifier::builder_with_provider(roots, Arc::clone(crypto_provider))
                    .build()?
            }
            Self::InsecureHosts(hosts) => {
                log::warn!(
                    "TLS server certificate verification is disabled for {}",
                    hosts.iter().cloned().collect::<Vec<_>>().join(", ")
                );
                let inner =
                    WebPkiServerVerifier::builder_with_provider(roots, Arc::clone(crypto_provider))
                        .build()?;
                Arc::new(InsecureHostsVerifier::new(Arc::clone(hosts), inner))
            }
        };
        Ok(verifier)
    }
}

/// Trust anchors from `trusted`, or the `webpki-roots` bundle if there are
/// none.
pub(crate) fn root_store(
    trusted: &[CertificateDer<'static>],
) -> Result<RootCertStore, rustls::Error> {
    if trusted.is_empty() {
        return Ok(RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        });
    }
    let mut roots = RootCertStore::empty();
    for cert in trusted {
        roots.add(cert.clone())?;
    }
    Ok(roots)
}

fn server_name_to_host(server_name: &ServerName<'_>) -> Option<String> {
    match server_name {
        ServerName::DnsName(name) => Some(normalize(name.as_ref())),
        ServerName::IpAddress(ip) => Some(std::net::IpAddr::from(*ip).to_string()),
        _ => None,
    }
}

/// Accepts any certificate chain. Handshake signatures are still verified.
#[derive(Debug)]
pub struct InsecureVerifier {
    supported_algs: WebPkiSupportedAlgorithms,
}

impl InsecureVerifier {
    /// Build using the signature algorithms of `crypto_provider`.
    pub fn new(crypto_provider: &CryptoProvider) -> Self {
        Self {
            supported_algs: crypto_provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for InsecureVerifier {
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
        verify_tls12_signature(message, cert, dss, &self.supported_algs)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.supported_algs)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported_algs.supported_schemes()
    }
}

/// Skips chain verification for a fixed set of server hostnames and
/// delegates everything else to another verifier.
#[derive(Debug)]
pub struct InsecureHostsVerifier {
    hosts: Arc<BTreeSet<String>>,
    inner: Arc<dyn ServerCertVerifier>,
}

impl InsecureHostsVerifier {
    /// `hosts` must contain normalized hostnames or textual IP addresses.
    pub fn new(hosts: Arc<BTreeSet<String>>, inner: Arc<dyn ServerCertVerifier>) -> Self {
        Self { hosts, inner }
    }
}

impl ServerCertVerifier for InsecureHostsVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if server_name_to_host(server_name).is_some_and(|host| self.hosts.contains(&host)) {
            log::debug!("Skipping TLS certificate verification for {:?}", server_name);
            return Ok(ServerCertVerified::assertion());
        }
        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }

    fn root_hint_subjects(&self) -> Option<&[DistinguishedName]> {
        self.inner.root_hint_subjects()
    }
}
