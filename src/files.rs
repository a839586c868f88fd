//! Populating providers from PEM files named on the command line.
//!
//! # Command line flags
//!
//! | Flag                   | Default | Meaning                 |
//! |------------------------|---------|-------------------------|
//! | `--tls-key-path`       | None    | Name of file containing the PEM-format private key of the default identity |
//! | `--tls-cert-path`      | None    | Name of file containing the PEM-format X.509 certificate chain of the default identity |
//! | `--tls-sni-identity`   | None    | `HOST=KEY_PATH,CERT_PATH`: identity for one hostname or wildcard. Repeatable. |
//! | `--tls-cacert`         | None    | Name of file containing PEM-format X.509 trust anchor certificate(s) |
//!
//! [`ClientArgs`] adds:
//!
//! | Flag                    | Default | Meaning                 |
//! |-------------------------|---------|-------------------------|
//! | `--tls-no-verify`       | false   | Do not verify any server certificate |
//! | `--tls-no-verify-hosts` | None    | Comma separated hostnames whose server certificates are not verified |
//!
//! ```no_run
//! use clap::Parser;
//!
//! #[derive(Parser)]
//! struct Cli {
//!     #[command(flatten)]
//!     tls: comprehensive_tls_provider::files::Args,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Cli::parse().tls.builder()?.build()?;
//! # Ok(())
//! # }
//! ```

use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::builder::{ClientTlsProviderBuilder, ProviderBuilder, TlsProviderBuilder};
use crate::hostname::HostnamePattern;
use crate::provider::{TlsProvider, TlsProviderError};

/// Error type returned when loading identities from files
#[derive(Debug, Error)]
pub enum TlsProviderFilesError {
    /// Wrapper for std::io::Error
    #[error("{0}")]
    IOError(#[from] std::io::Error),
    /// Wrapper for rustls::Error
    #[error("{0}")]
    TLSError(#[from] rustls::Error),
    /// The loaded material was rejected by the provider builder.
    #[error("{0}")]
    ProviderError(#[from] TlsProviderError),
    /// The key file contains no private key.
    #[error("No private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),
    /// The certificate file contains no certificate.
    #[error("No certificate found in {}", .0.display())]
    NoCertificates(PathBuf),
    /// Only one of the key and certificate of the default identity was given.
    #[error("--tls-key-path and --tls-cert-path must be given together")]
    IncompleteKeyPair,
}

/// A hostname and the files holding the identity to present for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SniIdentity {
    /// Hostname, wildcard pattern or `*`.
    pub hostname: String,
    /// PEM private key.
    pub key_path: PathBuf,
    /// PEM certificate chain, leaf first.
    pub cert_path: PathBuf,
}

impl FromStr for SniIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hostname, paths) = s
            .split_once('=')
            .ok_or_else(|| format!("expected HOST=KEY_PATH,CERT_PATH, got {:?}", s))?;
        let (key_path, cert_path) = paths
            .split_once(',')
            .ok_or_else(|| format!("expected KEY_PATH,CERT_PATH after =, got {:?}", paths))?;
        if key_path.is_empty() || cert_path.is_empty() {
            return Err(format!("empty path in {:?}", s));
        }
        HostnamePattern::parse(hostname).map_err(|e| e.to_string())?;
        Ok(Self {
            hostname: hostname.to_owned(),
            key_path: key_path.into(),
            cert_path: cert_path.into(),
        })
    }
}

/// Command line arguments naming identity and trust anchor files. These
/// are all pathnames to files on disk.
#[derive(clap::Args, Debug, Default)]
#[group(id = "comprehensive_tls_provider_args")]
pub struct Args {
    #[arg(
        long,
        help = "Path to the default TLS key in PEM format. Requires --tls-cert-path."
    )]
    tls_key_path: Option<PathBuf>,

    #[arg(
        long,
        help = "Path to the default TLS certificate chain in PEM format. Requires --tls-key-path."
    )]
    tls_cert_path: Option<PathBuf>,

    #[arg(
        long,
        value_name = "HOST=KEY_PATH,CERT_PATH",
        help = "TLS key and certificate to present for HOST, which may be a wildcard such as *.example.com. Repeatable."
    )]
    tls_sni_identity: Vec<SniIdentity>,

    #[arg(
        long,
        help = "Path to TLS root certificates for verifying peers, in PEM format. Defaults to the Mozilla root program."
    )]
    tls_cacert: Option<PathBuf>,
}

impl Args {
    /// Load every named file into `builder`.
    pub fn apply<B: ProviderBuilder>(&self, mut builder: B) -> Result<B, TlsProviderFilesError> {
        let crypto_provider = builder.settings_mut().crypto_provider();
        match (&self.tls_key_path, &self.tls_cert_path) {
            (Some(key_path), Some(cert_path)) => {
                builder =
                    builder.set_default(load_credential(key_path, cert_path, &crypto_provider)?);
            }
            (None, None) => (),
            _ => return Err(TlsProviderFilesError::IncompleteKeyPair),
        }
        for identity in &self.tls_sni_identity {
            let credential =
                load_credential(&identity.key_path, &identity.cert_path, &crypto_provider)?;
            builder = builder.set(&identity.hostname, credential)?;
        }
        if let Some(ref path) = self.tls_cacert {
            builder = builder.trusted_certificates(load_certificates(path)?);
        }
        Ok(builder)
    }

    /// A [`TlsProviderBuilder`] loaded from the named files.
    pub fn builder(&self) -> Result<TlsProviderBuilder, TlsProviderFilesError> {
        self.apply(TlsProvider::builder())
    }
}

/// [`Args`] plus flags for relaxing server certificate verification.
#[derive(clap::Args, Debug, Default)]
#[group(id = "comprehensive_tls_provider_client_args")]
pub struct ClientArgs {
    #[command(flatten)]
    common: Args,

    #[arg(long, help = "Do not verify server certificates. Insecure.")]
    tls_no_verify: bool,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Do not verify server certificates of these hosts. Insecure."
    )]
    tls_no_verify_hosts: Vec<String>,
}

impl ClientArgs {
    /// A [`ClientTlsProviderBuilder`] loaded from the named files with
    /// verification relaxed as requested.
    pub fn client_builder(&self) -> Result<ClientTlsProviderBuilder, TlsProviderFilesError> {
        let mut builder = self.common.apply(TlsProvider::client_builder())?;
        if self.tls_no_verify {
            builder = builder.tls_no_verify()?;
        }
        if !self.tls_no_verify_hosts.is_empty() {
            builder = builder.tls_no_verify_hosts(&self.tls_no_verify_hosts)?;
        }
        Ok(builder)
    }
}

/// Read every PEM certificate in `path`. An empty result is not an error.
pub fn load_certificates(
    path: &Path,
) -> Result<Vec<CertificateDer<'static>>, TlsProviderFilesError> {
    let pem = std::fs::read(path)?;
    let certs = rustls_pemfile::certs(&mut Cursor::new(&pem)).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        log::warn!("No certificates loaded from file {}", path.display());
    }
    Ok(certs)
}

/// Read a private key and its certificate chain and check that they
/// belong together.
pub fn load_credential(
    key_path: &Path,
    cert_path: &Path,
    crypto_provider: &CryptoProvider,
) -> Result<Arc<CertifiedKey>, TlsProviderFilesError> {
    let key_pem = std::fs::read(key_path)?;
    let key = rustls_pemfile::private_key(&mut Cursor::new(&key_pem))?
        .ok_or_else(|| TlsProviderFilesError::NoPrivateKey(key_path.to_owned()))?;
    let cert = load_certificates(cert_path)?;
    if cert.is_empty() {
        return Err(TlsProviderFilesError::NoCertificates(cert_path.to_owned()));
    }
    let signing_key = crypto_provider.key_provider.load_private_key(key)?;
    let certified_key = CertifiedKey::new(cert, signing_key);
    certified_key.keys_match()?;
    log::info!(
        "Loaded TLS identity from {} and {}",
        key_path.display(),
        cert_path.display()
    );
    Ok(Arc::new(certified_key))
}
