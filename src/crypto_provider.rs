//! Choice of the process-global default [`CryptoProvider`] if there is one,
//! otherwise `aws-lc-rs`.

use rustls::crypto::CryptoProvider;
use std::sync::Arc;

/// The [`CryptoProvider`] used by builders that were not given one
/// explicitly with [`crate::ProviderBuilder::crypto_provider`].
pub fn default_crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}
