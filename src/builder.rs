//! Fluent construction of [`TlsProvider`].
//!
//! [`TlsProviderBuilder`] makes providers suitable for servers and for
//! clients that verify every peer. [`ClientTlsProviderBuilder`] adds the
//! client-only ability to skip server certificate verification, either
//! entirely or for chosen hostnames. The methods they share live on the
//! [`ProviderBuilder`] trait and return the concrete builder type so that
//! chains of calls keep access to everything.
//!
//! ```no_run
//! use comprehensive_tls_provider::{ProviderBuilder, TlsProvider};
//! # use comprehensive_tls_provider::rustls::sign::CertifiedKey;
//! # use std::sync::Arc;
//! # fn load(_: &str) -> Arc<CertifiedKey> { unimplemented!() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let provider = TlsProvider::builder()
//!     .set_default(load("default"))
//!     .set("example.com", load("example.com"))?
//!     .set("*.example.com", load("wildcard.example.com"))?
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::crypto_provider::default_crypto_provider;
use crate::customizer::{CustomizerChain, TlsContext};
use crate::hostname::HostnamePattern;
use crate::provider::{ProviderInner, TlsProvider, TlsProviderError};
use crate::registry::Registry;
use crate::trust::{TrustPolicy, root_store};

/// State shared by all builders.
#[derive(Clone, Debug, Default)]
pub(crate) struct ProviderSettings {
    registry: Registry,
    customizers: CustomizerChain,
    trusted_certificates: Vec<CertificateDer<'static>>,
    crypto_provider: Option<Arc<CryptoProvider>>,
    allows_unsafe_ciphers: bool,
    meter_id_prefix: Option<String>,
}

impl ProviderSettings {
    pub(crate) fn crypto_provider(&self) -> Arc<CryptoProvider> {
        self.crypto_provider
            .clone()
            .unwrap_or_else(default_crypto_provider)
    }

    fn freeze(&self, trust_policy: TrustPolicy) -> Result<TlsProvider, TlsProviderError> {
        let crypto_provider = self.crypto_provider();
        let roots = Arc::new(root_store(&self.trusted_certificates)?);
        let server_cert_verifier =
            trust_policy.server_cert_verifier(Arc::clone(&roots), &crypto_provider)?;
        if self.allows_unsafe_ciphers {
            log::warn!("TLS provider built with unsafe cipher suites allowed");
        }
        if self.registry.is_empty() {
            log::debug!("TLS provider built without any identity");
        }
        Ok(TlsProvider::from_inner(ProviderInner {
            registry: self.registry.clone(),
            trust_policy,
            roots,
            server_cert_verifier,
            customizers: self.customizers.clone(),
            crypto_provider,
            allows_unsafe_ciphers: self.allows_unsafe_ciphers,
            meter_id_prefix: self.meter_id_prefix.clone(),
        }))
    }
}

/// Configuration methods common to [`TlsProviderBuilder`] and
/// [`ClientTlsProviderBuilder`].
pub trait ProviderBuilder: Sized {
    #[doc(hidden)]
    #[allow(private_interfaces)]
    fn settings_mut(&mut self) -> &mut ProviderSettings;

    /// Present `credential` to peers using `hostname`.
    ///
    /// `hostname` may be a wildcard such as `*.example.com` which matches
    /// exactly one extra leading label: `foo.example.com` but neither
    /// `example.com` nor `bar.foo.example.com`. An exact hostname always
    /// takes precedence over a wildcard. `"*"` sets the default credential.
    ///
    /// Setting the same hostname again replaces the earlier credential.
    fn set(
        mut self,
        hostname: &str,
        credential: Arc<CertifiedKey>,
    ) -> Result<Self, TlsProviderError> {
        let pattern = HostnamePattern::parse(hostname)?;
        self.settings_mut().registry.insert(pattern, credential);
        Ok(self)
    }

    /// Present `credential` when no other hostname matches.
    fn set_default(mut self, credential: Arc<CertifiedKey>) -> Self {
        self.settings_mut()
            .registry
            .insert(HostnamePattern::Any, credential);
        self
    }

    /// Add trust anchors for verifying peers. If none are ever added then
    /// the Mozilla root program bundle from `webpki-roots` is used.
    fn trusted_certificates<I>(mut self, certificates: I) -> Self
    where
        I: IntoIterator<Item = CertificateDer<'static>>,
    {
        self.settings_mut()
            .trusted_certificates
            .extend(certificates);
        self
    }

    /// Use `crypto_provider` instead of
    /// [`crate::crypto_provider::default_crypto_provider`].
    fn crypto_provider(mut self, crypto_provider: Arc<CryptoProvider>) -> Self {
        self.settings_mut().crypto_provider = Some(crypto_provider);
        self
    }

    /// Append a customizer for the [`rustls::ClientConfig`] and
    /// [`rustls::ServerConfig`] built from the provider. See
    /// [`crate::customizer`].
    fn tls_customizer<F>(mut self, customizer: F) -> Self
    where
        F: Fn(&mut TlsContext<'_>) + Send + Sync + 'static,
    {
        self.settings_mut().customizers.push(customizer);
        self
    }

    /// Label under which certificate metrics about this provider should be
    /// reported by whoever collects them. Unset means the collector's
    /// default for clients or servers.
    fn meter_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings_mut().meter_id_prefix = Some(prefix.into());
        self
    }

    /// Permit cipher suites listed as unsafe for HTTP/2 in RFC 7540
    /// Appendix A. The flag is only recorded on the provider for the
    /// benefit of protocol layers that consult it.
    #[deprecated(note = "Weakens connection security. Use only to reach legacy peers.")]
    fn allows_unsafe_ciphers(mut self, allows_unsafe_ciphers: bool) -> Self {
        self.settings_mut().allows_unsafe_ciphers = allows_unsafe_ciphers;
        self
    }
}

/// Builder for a [`TlsProvider`] that verifies every peer.
#[derive(Clone, Debug, Default)]
pub struct TlsProviderBuilder {
    settings: ProviderSettings,
}

impl ProviderBuilder for TlsProviderBuilder {
    #[allow(private_interfaces)]
    fn settings_mut(&mut self) -> &mut ProviderSettings {
        &mut self.settings
    }
}

impl TlsProviderBuilder {
    /// Snapshot the configuration so far into a [`TlsProvider`]. The
    /// builder may be modified further without affecting the result.
    pub fn build(&self) -> Result<TlsProvider, TlsProviderError> {
        self.settings.freeze(TrustPolicy::Default)
    }
}

#[derive(Clone, Debug, Default)]
enum NoVerify {
    #[default]
    Unset,
    All,
    Hosts(BTreeSet<String>),
}

/// Builder for a [`TlsProvider`] used by clients.
///
/// On top of [`ProviderBuilder`] this can turn off server certificate
/// verification with [`ClientTlsProviderBuilder::tls_no_verify`] or
/// [`ClientTlsProviderBuilder::tls_no_verify_hosts`]. The two are mutually
/// exclusive and calling the second one fails immediately.
#[derive(Clone, Debug, Default)]
pub struct ClientTlsProviderBuilder {
    settings: ProviderSettings,
    no_verify: NoVerify,
}

impl ProviderBuilder for ClientTlsProviderBuilder {
    #[allow(private_interfaces)]
    fn settings_mut(&mut self) -> &mut ProviderSettings {
        &mut self.settings
    }
}

impl ClientTlsProviderBuilder {
    /// Accept any certificate from any server.
    pub fn tls_no_verify(mut self) -> Result<Self, TlsProviderError> {
        if let NoVerify::Hosts(_) = self.no_verify {
            return Err(TlsProviderError::NoVerifyConflict);
        }
        self.no_verify = NoVerify::All;
        Ok(self)
    }

    /// Accept any certificate from servers reached as one of `hosts`.
    /// May be called repeatedly to add more hosts.
    pub fn tls_no_verify_hosts<I>(mut self, hosts: I) -> Result<Self, TlsProviderError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        if let NoVerify::All = self.no_verify {
            return Err(TlsProviderError::NoVerifyConflict);
        }
        let mut added = BTreeSet::new();
        for host in hosts {
            let host = host.as_ref();
            match HostnamePattern::parse(host)? {
                HostnamePattern::Exact(name) => {
                    added.insert(name);
                }
                _ => return Err(TlsProviderError::InvalidHostname(host.to_owned())),
            }
        }
        if !added.is_empty() {
            match &mut self.no_verify {
                NoVerify::Hosts(existing) => existing.extend(added),
                no_verify => *no_verify = NoVerify::Hosts(added),
            }
        }
        Ok(self)
    }

    /// Snapshot the configuration so far into a [`TlsProvider`]. The
    /// builder may be modified further without affecting the result.
    pub fn build(&self) -> Result<TlsProvider, TlsProviderError> {
        let trust_policy = match &self.no_verify {
            NoVerify::Unset => TrustPolicy::Default,
            NoVerify::All => TrustPolicy::InsecureAll,
            NoVerify::Hosts(hosts) => TrustPolicy::InsecureHosts(Arc::new(hosts.clone())),
        };
        self.settings.freeze(trust_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::TestIdentity;

    fn credential(name: &str) -> Arc<CertifiedKey> {
        TestIdentity::new(&default_crypto_provider(), &[name]).certified_key
    }

    fn is(got: Option<Arc<CertifiedKey>>, want: &Arc<CertifiedKey>) -> bool {
        got.is_some_and(|got| Arc::ptr_eq(&got, want))
    }

    #[test]
    fn set_and_find() {
        let d = credential("default");
        let foo = credential("foo.com");
        let sub = credential("sub.foo.com");
        let provider = TlsProvider::builder()
            .set("*.foo.com", Arc::clone(&sub))
            .unwrap()
            .set("foo.com", Arc::clone(&foo))
            .unwrap()
            .set_default(Arc::clone(&d))
            .build()
            .unwrap();
        assert!(is(provider.find("foo.com"), &foo));
        assert!(is(provider.find("sub.foo.com"), &sub));
        assert!(is(provider.find("deep.sub.foo.com"), &d));
        assert!(is(provider.find("127.0.0.1"), &d));
    }

    #[test]
    fn no_default_means_no_match() {
        let provider = TlsProvider::builder()
            .set("a.com", credential("a.com"))
            .unwrap()
            .build()
            .unwrap();
        assert!(provider.find("b.com").is_none());
    }

    #[test]
    fn overwrite() {
        let c1 = credential("a.com");
        let c2 = credential("a.com");
        let provider = TlsProvider::builder()
            .set("a.com", c1)
            .unwrap()
            .set("a.com", Arc::clone(&c2))
            .unwrap()
            .build()
            .unwrap();
        assert!(is(provider.find("a.com"), &c2));
    }

    #[test]
    fn invalid_hostname_rejected_at_call() {
        assert!(matches!(
            TlsProvider::builder().set("", credential("x")),
            Err(TlsProviderError::InvalidHostname(_))
        ));
        assert!(matches!(
            TlsProvider::builder().set("a.*.com", credential("x")),
            Err(TlsProviderError::InvalidHostname(_))
        ));
    }

    #[test]
    fn no_verify_then_hosts_conflicts() {
        let b = TlsProvider::client_builder().tls_no_verify().unwrap();
        assert!(matches!(
            b.tls_no_verify_hosts(["a.com"]),
            Err(TlsProviderError::NoVerifyConflict)
        ));
    }

    #[test]
    fn hosts_then_no_verify_conflicts() {
        let b = TlsProvider::client_builder()
            .tls_no_verify_hosts(["a.com"])
            .unwrap();
        assert!(matches!(
            b.tls_no_verify(),
            Err(TlsProviderError::NoVerifyConflict)
        ));
    }

    #[test]
    fn empty_hosts_leave_policy_unset() {
        let provider = TlsProvider::client_builder()
            .tls_no_verify_hosts(Vec::<String>::new())
            .unwrap()
            .tls_no_verify()
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(provider.trust_policy(), &TrustPolicy::InsecureAll);
    }

    #[test]
    fn no_verify_hosts_accumulate_normalized() {
        let provider = TlsProvider::client_builder()
            .tls_no_verify_hosts(["A.com."])
            .unwrap()
            .tls_no_verify_hosts(vec!["b.com".to_string()])
            .unwrap()
            .build()
            .unwrap();
        let TrustPolicy::InsecureHosts(hosts) = provider.trust_policy() else {
            panic!("unexpected policy {:?}", provider.trust_policy());
        };
        assert_eq!(
            hosts.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["a.com", "b.com"]
        );
    }

    #[test]
    fn no_verify_hosts_rejects_patterns() {
        assert!(matches!(
            TlsProvider::client_builder().tls_no_verify_hosts(["*.a.com"]),
            Err(TlsProviderError::InvalidHostname(_))
        ));
    }

    #[test]
    fn client_builder_keeps_base_methods() {
        let c = credential("a.com");
        let provider = TlsProvider::client_builder()
            .set_default(Arc::clone(&c))
            .meter_id_prefix("client.tls")
            .tls_no_verify()
            .unwrap()
            .build()
            .unwrap();
        assert!(is(provider.find("anything"), &c));
        assert_eq!(provider.meter_id_prefix(), Some("client.tls"));
    }

    #[test]
    #[allow(deprecated)]
    fn metadata_forwarded() {
        let provider = TlsProvider::builder()
            .meter_id_prefix("first")
            .meter_id_prefix("second")
            .allows_unsafe_ciphers(true)
            .build()
            .unwrap();
        assert_eq!(provider.meter_id_prefix(), Some("second"));
        assert!(provider.allows_unsafe_ciphers());
        let provider = TlsProvider::builder().build().unwrap();
        assert_eq!(provider.meter_id_prefix(), None);
        assert!(!provider.allows_unsafe_ciphers());
    }

    #[test]
    fn build_is_a_snapshot() {
        let c1 = credential("a.com");
        let c2 = credential("b.com");
        let builder = TlsProvider::builder().set("a.com", Arc::clone(&c1)).unwrap();
        let provider = builder.build().unwrap();
        let builder = builder
            .set("a.com", Arc::clone(&c2))
            .unwrap()
            .set_default(Arc::clone(&c2))
            .tls_customizer(|ctx| ctx.alpn_protocols_mut().push(b"x".to_vec()));
        assert!(is(provider.find("a.com"), &c1));
        assert!(provider.find("b.com").is_none());
        assert_eq!(provider.registry().len(), 1);
        assert!(provider.customizers().is_empty());
        let rebuilt = builder.build().unwrap();
        assert!(is(rebuilt.find("a.com"), &c2));
        assert_eq!(rebuilt.customizers().len(), 1);
    }

    #[test]
    fn bad_trusted_certificate_fails_build() {
        let r = TlsProvider::builder()
            .trusted_certificates([CertificateDer::from(vec![1u8, 2, 3])])
            .build();
        assert!(matches!(r, Err(TlsProviderError::TLSError(_))));
    }
}
