//! Ordered hooks for adjusting TLS engine configuration.
//!
//! Customizers are applied once each time a [`TlsProvider`] builds a
//! [`ClientConfig`] or [`ServerConfig`], after everything the provider
//! itself configures and in the order they were registered. A later
//! customizer sees, and may overwrite, the changes of an earlier one.
//!
//! ```
//! use comprehensive_tls_provider::{ProviderBuilder, TlsProvider};
//!
//! let builder = TlsProvider::builder()
//!     .tls_customizer(|ctx| *ctx.alpn_protocols_mut() = vec![b"h2".to_vec()])
//!     .tls_customizer(|ctx| ctx.alpn_protocols_mut().push(b"http/1.1".to_vec()));
//! ```
//!
//! [`TlsProvider`]: crate::TlsProvider

use rustls::{ClientConfig, ServerConfig};
use std::fmt;
use std::sync::Arc;

/// The engine configuration being customized.
#[derive(Debug)]
pub enum TlsContext<'a> {
    /// Configuration for outgoing connections.
    Client(&'a mut ClientConfig),
    /// Configuration for accepted connections.
    Server(&'a mut ServerConfig),
}

impl TlsContext<'_> {
    /// ALPN protocols offered (client) or accepted (server).
    pub fn alpn_protocols_mut(&mut self) -> &mut Vec<Vec<u8>> {
        match self {
            Self::Client(c) => &mut c.alpn_protocols,
            Self::Server(s) => &mut s.alpn_protocols,
        }
    }

    /// Maximum TLS fragment size, `None` meaning the protocol maximum.
    pub fn max_fragment_size_mut(&mut self) -> &mut Option<usize> {
        match self {
            Self::Client(c) => &mut c.max_fragment_size,
            Self::Server(s) => &mut s.max_fragment_size,
        }
    }

    /// The client configuration, if this is one.
    pub fn client_mut(&mut self) -> Option<&mut ClientConfig> {
        match self {
            Self::Client(c) => Some(&mut **c),
            Self::Server(_) => None,
        }
    }

    /// The server configuration, if this is one.
    pub fn server_mut(&mut self) -> Option<&mut ServerConfig> {
        match self {
            Self::Client(_) => None,
            Self::Server(s) => Some(&mut **s),
        }
    }
}

type Customizer = Arc<dyn Fn(&mut TlsContext<'_>) + Send + Sync>;

/// A sequence of [`TlsContext`] mutations applied in registration order.
///
/// The chain is append-only; an empty chain leaves the context untouched.
/// Customizers should be idempotent since the chain runs again for every
/// configuration built.
#[derive(Clone, Default)]
pub struct CustomizerChain {
    customizers: Vec<Customizer>,
}

impl CustomizerChain {
    /// Append a customizer. It will run after all those already present.
    pub fn push<F>(&mut self, customizer: F)
    where
        F: Fn(&mut TlsContext<'_>) + Send + Sync + 'static,
    {
        self.customizers.push(Arc::new(customizer));
    }

    /// Run every customizer on `context`, in order.
    pub fn apply(&self, context: &mut TlsContext<'_>) {
        for customizer in &self.customizers {
            customizer(context);
        }
    }

    /// Number of customizers in the chain.
    pub fn len(&self) -> usize {
        self.customizers.len()
    }

    /// Whether applying the chain is a no-op.
    pub fn is_empty(&self) -> bool {
        self.customizers.is_empty()
    }
}

impl fmt::Debug for CustomizerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomizerChain {{ {} customizers }}", self.customizers.len())
    }
}
