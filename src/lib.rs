//! Per-hostname TLS identities and peer trust policy for rustls
//!
//! A [`TlsProvider`] holds the certificates an endpoint can present and
//! decides, at handshake time, which one suits the peer hostname: an exact
//! match first, then a single-label wildcard such as `*.example.com`, then
//! the default identity registered as `"*"`. Servers use it through SNI and
//! clients through mutual TLS.
//!
//! The provider also carries the policy for verifying peers. Clients built
//! with [`ClientTlsProviderBuilder`] may skip server certificate
//! verification, either for every server or for a fixed list of hostnames
//! while all others are still verified.
//!
//! Providers are configured with chained calls on a builder and frozen by
//! `build()`, after which they are immutable and may be shared freely
//! between threads:
//!
//! ```no_run
//! use comprehensive_tls_provider::{ProviderBuilder, TlsProvider};
//! # use comprehensive_tls_provider::rustls::sign::CertifiedKey;
//! # use std::sync::Arc;
//! # fn load(_: &str) -> Arc<CertifiedKey> { unimplemented!() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let client = TlsProvider::client_builder()
//!     .set_default(load("client"))
//!     .tls_no_verify_hosts(["dev.internal"])?
//!     .meter_id_prefix("backend.tls")
//!     .build()?;
//! let config = client.client_config("api.example.com")?;
//! # Ok(())
//! # }
//! ```
//!
//! Identities and trust anchors may also be loaded from PEM files named on
//! the command line, see [`files`].

#![warn(missing_docs)]

pub mod builder;
pub mod crypto_provider;
pub mod customizer;
#[cfg(feature = "files")]
pub mod files;
pub mod hostname;
pub mod provider;
pub mod registry;
#[cfg(test)]
mod testdata;
pub mod trust;

pub use rustls;
pub use rustls_pki_types;

pub use builder::{ClientTlsProviderBuilder, ProviderBuilder, TlsProviderBuilder};
pub use customizer::{CustomizerChain, TlsContext};
#[cfg(feature = "files")]
pub use files::TlsProviderFilesError;
pub use provider::{
    ClientAuthDisabled, ClientAuthEnabled, ClientAuthMode, ClientAuthOptional, TlsProvider,
    TlsProviderError,
};
pub use trust::TrustPolicy;
