//! The immutable [`TlsProvider`] and its integration with rustls.
//!
//! A provider is consulted on every handshake to pick the certificate to
//! present for the peer hostname, and supplies the verifier for the
//! peer's certificate. Servers get a [`ServerConfig`] from
//! [`TlsProvider::server_config`]:
//!
//! ```no_run
//! use comprehensive_tls_provider::{ClientAuthDisabled, ProviderBuilder, TlsProvider};
//! # use comprehensive_tls_provider::rustls::sign::CertifiedKey;
//! # use std::sync::Arc;
//! # fn load(_: &str) -> Arc<CertifiedKey> { unimplemented!() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let provider = TlsProvider::builder()
//!     .set("www.example.com", load("www"))?
//!     .set("*.api.example.com", load("api"))?
//!     .tls_customizer(|ctx| *ctx.alpn_protocols_mut() = vec![b"h2".to_vec()])
//!     .build()?;
//! let server_config = Arc::new(provider.server_config::<ClientAuthDisabled>()?);
//! # Ok(())
//! # }
//! ```
//!
//! and clients a [`ClientConfig`] per target from
//! [`TlsProvider::client_config`].

use rustls::client::ResolvesClientCert;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::server::{ClientHello, ResolvesServerCert, VerifierBuilderError, WebPkiClientVerifier};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, ConfigBuilder, RootCertStore, ServerConfig, SignatureScheme};
use std::sync::Arc;
use thiserror::Error;

use crate::builder::{ClientTlsProviderBuilder, ProviderBuilder, TlsProviderBuilder};
use crate::customizer::{CustomizerChain, TlsContext};
use crate::hostname::ANY_HOST;
use crate::registry::Registry;
use crate::trust::TrustPolicy;

/// Error type returned by comprehensive_tls_provider functions
#[derive(Debug, Error)]
pub enum TlsProviderError {
    /// Wrapper for rustls::Error
    #[error("{0}")]
    TLSError(#[from] rustls::Error),
    /// The trust anchors could not be turned into a certificate verifier.
    #[error("{0}")]
    VerifierError(#[from] VerifierBuilderError),
    /// A hostname or hostname pattern was empty or malformed.
    #[error("Invalid hostname {0:?}")]
    InvalidHostname(String),
    /// Certificate verification was disabled both for all hosts and for
    /// selected hosts.
    #[error("tls_no_verify and tls_no_verify_hosts are mutually exclusive")]
    NoVerifyConflict,
}

#[derive(Debug)]
pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) trust_policy: TrustPolicy,
    pub(crate) roots: Arc<RootCertStore>,
    pub(crate) server_cert_verifier: Arc<dyn ServerCertVerifier>,
    pub(crate) customizers: CustomizerChain,
    pub(crate) crypto_provider: Arc<CryptoProvider>,
    pub(crate) allows_unsafe_ciphers: bool,
    pub(crate) meter_id_prefix: Option<String>,
}

/// Frozen per-hostname identities and peer trust policy.
///
/// Cloning is cheap and clones share state. A provider never changes
/// after it is built so it may be consulted concurrently from any number
/// of handshakes.
#[derive(Clone, Debug)]
pub struct TlsProvider(Arc<ProviderInner>);

impl TlsProvider {
    pub(crate) fn from_inner(inner: ProviderInner) -> Self {
        Self(Arc::new(inner))
    }

    /// Start configuring a provider.
    pub fn builder() -> TlsProviderBuilder {
        TlsProviderBuilder::default()
    }

    /// Start configuring a provider for clients, which may relax server
    /// certificate verification.
    pub fn client_builder() -> ClientTlsProviderBuilder {
        ClientTlsProviderBuilder::default()
    }

    /// A provider that presents `credential` regardless of hostname.
    pub fn of(credential: Arc<CertifiedKey>) -> Result<Self, TlsProviderError> {
        Self::builder().set_default(credential).build()
    }

    /// The credential to present to a peer known as `hostname`: an exact
    /// match if any, else the first matching wildcard, else the default.
    pub fn find(&self, hostname: &str) -> Option<Arc<CertifiedKey>> {
        let found = self.0.registry.find(hostname);
        if found.is_none() {
            log::debug!("No TLS identity for {:?}", hostname);
        }
        found
    }

    /// All registered identities.
    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    /// How server certificates are verified by [`TlsProvider::client_config`].
    pub fn trust_policy(&self) -> &TrustPolicy {
        &self.0.trust_policy
    }

    /// Whether cipher suites unsafe for HTTP/2 were allowed.
    pub fn allows_unsafe_ciphers(&self) -> bool {
        self.0.allows_unsafe_ciphers
    }

    /// Label for certificate metrics, if one was configured.
    pub fn meter_id_prefix(&self) -> Option<&str> {
        self.0.meter_id_prefix.as_deref()
    }

    /// The crypto provider for all configs built from this provider.
    pub fn crypto_provider(&self) -> &Arc<CryptoProvider> {
        &self.0.crypto_provider
    }

    /// Registered customizers.
    pub fn customizers(&self) -> &CustomizerChain {
        &self.0.customizers
    }

    /// Apply the customizers to an engine config built elsewhere.
    pub fn customize(&self, context: &mut TlsContext<'_>) {
        self.0.customizers.apply(context);
    }

    /// The verifier [`TlsProvider::client_config`] installs, for callers
    /// that assemble their own [`ClientConfig`].
    pub fn server_cert_verifier(&self) -> Arc<dyn ServerCertVerifier> {
        Arc::clone(&self.0.server_cert_verifier)
    }

    /// Returns a TLS [`ServerConfig`] that picks the certificate to present
    /// using the client's SNI. A client that sends no SNI gets the default
    /// identity.
    ///
    /// `CA` is one of [`ClientAuthDisabled`], [`ClientAuthEnabled`] or
    /// [`ClientAuthOptional`]. Client certificates are verified against the
    /// trusted certificates.
    pub fn server_config<CA: ClientAuthMode>(&self) -> Result<ServerConfig, TlsProviderError> {
        let builder = ServerConfig::builder_with_provider(Arc::clone(&self.0.crypto_provider))
            .with_safe_default_protocol_versions()?;
        let mut config = CA::configure_client_auth(&self.0, builder)?
            .with_cert_resolver(Arc::new(SniResolver(self.clone())));
        self.customize(&mut TlsContext::Server(&mut config));
        Ok(config)
    }

    /// Returns a TLS [`ClientConfig`] for connecting to `hostname`.
    ///
    /// If the server asks for a client certificate, the identity for
    /// `hostname` is presented. The server's certificate is verified
    /// according to [`TlsProvider::trust_policy`].
    pub fn client_config(&self, hostname: &str) -> Result<ClientConfig, TlsProviderError> {
        let resolver = ClientCertResolver(self.find(hostname));
        let mut config = ClientConfig::builder_with_provider(Arc::clone(&self.0.crypto_provider))
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(self.server_cert_verifier())
            .with_client_cert_resolver(Arc::new(resolver));
        self.customize(&mut TlsContext::Client(&mut config));
        Ok(config)
    }
}

#[derive(Debug)]
struct SniResolver(TlsProvider);

impl ResolvesServerCert for SniResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.0.find(client_hello.server_name().unwrap_or(ANY_HOST))
    }
}

#[derive(Debug)]
struct ClientCertResolver(Option<Arc<CertifiedKey>>);

impl ResolvesClientCert for ClientCertResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        self.0.clone()
    }

    fn has_certs(&self) -> bool {
        self.0.is_some()
    }
}

/// Trait for [`ClientAuthEnabled`], [`ClientAuthOptional`] or
/// [`ClientAuthDisabled`].
pub trait ClientAuthMode {
    #[doc(hidden)]
    #[allow(private_interfaces)]
    fn configure_client_auth(
        provider: &ProviderInner,
        scb: ConfigBuilder<ServerConfig, rustls::WantsVerifier>,
    ) -> Result<ConfigBuilder<ServerConfig, rustls::server::WantsServerCert>, TlsProviderError>;
}

/// Type argument for [`TlsProvider::server_config`] to require mutual TLS auth.
pub enum ClientAuthEnabled {}

impl ClientAuthMode for ClientAuthEnabled {
    #[allow(private_interfaces)]
    fn configure_client_auth(
        provider: &ProviderInner,
        scb: ConfigBuilder<ServerConfig, rustls::WantsVerifier>,
    ) -> Result<ConfigBuilder<ServerConfig, rustls::server::WantsServerCert>, TlsProviderError>
    {
        let verifier = WebPkiClientVerifier::builder_with_provider(
            Arc::clone(&provider.roots),
            Arc::clone(&provider.crypto_provider),
        )
        .build()?;
        Ok(scb.with_client_cert_verifier(verifier))
    }
}

/// Type argument for [`TlsProvider::server_config`] to verify client
/// certificates when presented but also admit anonymous clients.
pub enum ClientAuthOptional {}

impl ClientAuthMode for ClientAuthOptional {
    #[allow(private_interfaces)]
    fn configure_client_auth(
        provider: &ProviderInner,
        scb: ConfigBuilder<ServerConfig, rustls::WantsVerifier>,
    ) -> Result<ConfigBuilder<ServerConfig, rustls::server::WantsServerCert>, TlsProviderError>
    {
        let verifier = WebPkiClientVerifier::builder_with_provider(
            Arc::clone(&provider.roots),
            Arc::clone(&provider.crypto_provider),
        )
        .allow_unauthenticated()
        .build()?;
        Ok(scb.with_client_cert_verifier(verifier))
    }
}

/// Type argument for [`TlsProvider::server_config`] to request no client auth.
pub enum ClientAuthDisabled {}

impl ClientAuthMode for ClientAuthDisabled {
    #[allow(private_interfaces)]
    fn configure_client_auth(
        _: &ProviderInner,
        scb: ConfigBuilder<ServerConfig, rustls::WantsVerifier>,
    ) -> Result<ConfigBuilder<ServerConfig, rustls::server::WantsServerCert>, TlsProviderError>
    {
        Ok(scb.with_no_client_auth())
    }
}
