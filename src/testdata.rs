use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::sync::Arc;

/// A self-signed key and certificate generated for a test.
pub(crate) struct TestIdentity {
    pub(crate) cert: CertificateDer<'static>,
    pub(crate) cert_pem: String,
    pub(crate) key_pem: String,
    pub(crate) certified_key: Arc<CertifiedKey>,
}

impl TestIdentity {
    pub(crate) fn new(crypto_provider: &CryptoProvider, names: &[&str]) -> Self {
        let generated = rcgen::generate_simple_self_signed(
            names.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
        )
        .expect("generate self-signed certificate");
        let cert_pem = generated.cert.pem();
        let key_pem = generated.signing_key.serialize_pem();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            generated.signing_key.serialize_der(),
        ));
        let cert = CertificateDer::from(generated.cert);
        let signing_key = crypto_provider
            .key_provider
            .load_private_key(key)
            .expect("load generated key");
        Self {
            certified_key: Arc::new(CertifiedKey::new(vec![cert.clone()], signing_key)),
            cert,
            cert_pem,
            key_pem,
        }
    }
}
