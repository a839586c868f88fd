//! The hostname → credential table consulted on every handshake.

use rustls::sign::CertifiedKey;
use std::collections::HashMap;
use std::sync::Arc;

use crate::hostname::{HostnamePattern, normalize};

/// Credentials indexed by [`HostnamePattern`].
///
/// Resolution order in [`Registry::find`] is exact hostname, then
/// wildcards in the order they were first registered, then the `"*"`
/// default. Registering a pattern that is already present replaces its
/// credential but keeps its original position.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    exact: HashMap<String, Arc<CertifiedKey>>,
    wildcards: Vec<(HostnamePattern, Arc<CertifiedKey>)>,
    default: Option<Arc<CertifiedKey>>,
}

impl Registry {
    /// Insert or replace the credential for `pattern`.
    pub fn insert(&mut self, pattern: HostnamePattern, credential: Arc<CertifiedKey>) {
        match pattern {
            HostnamePattern::Any => {
                self.default = Some(credential);
            }
            HostnamePattern::Exact(name) => {
                self.exact.insert(name, credential);
            }
            wildcard @ HostnamePattern::Wildcard(_) => {
                match self.wildcards.iter_mut().find(|(p, _)| *p == wildcard) {
                    Some(slot) => slot.1 = credential,
                    None => self.wildcards.push((wildcard, credential)),
                }
            }
        }
    }

    /// Select the credential to present for `hostname`.
    pub fn find(&self, hostname: &str) -> Option<Arc<CertifiedKey>> {
        let hostname = normalize(hostname);
        self.exact
            .get(&hostname)
            .or_else(|| {
                self.wildcards
                    .iter()
                    .find(|(p, _)| p.matches(&hostname))
                    .map(|(_, c)| c)
            })
            .or(self.default.as_ref())
            .cloned()
    }

    /// The `"*"` credential, if registered.
    pub fn default_credential(&self) -> Option<&Arc<CertifiedKey>> {
        self.default.as_ref()
    }

    /// Number of registered patterns, the default included.
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcards.len() + usize::from(self.default.is_some())
    }

    /// Whether no pattern at all is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered patterns. Exact hostnames come in no particular
    /// order, followed by wildcards in resolution order and the default.
    pub fn patterns(&self) -> impl Iterator<Item = HostnamePattern> + '_ {
        self.exact
            .keys()
            .map(|name| HostnamePattern::Exact(name.clone()))
            .chain(self.wildcards.iter().map(|(p, _)| p.clone()))
            .chain(self.default.iter().map(|_| HostnamePattern::Any))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_provider::default_crypto_provider;
    use crate::testdata::TestIdentity;

    fn credential(name: &str) -> Arc<CertifiedKey> {
        TestIdentity::new(&default_crypto_provider(), &[name]).certified_key
    }

    fn insert(r: &mut Registry, pattern: &str, c: &Arc<CertifiedKey>) {
        r.insert(HostnamePattern::parse(pattern).unwrap(), Arc::clone(c));
    }

    fn is(got: Option<Arc<CertifiedKey>>, want: &Arc<CertifiedKey>) -> bool {
        got.is_some_and(|got| Arc::ptr_eq(&got, want))
    }

    #[test]
    fn exact_beats_wildcard_in_either_order() {
        let exact = credential("foo.com");
        let wild = credential("x.foo.com");
        let mut r = Registry::default();
        insert(&mut r, "*.foo.com", &wild);
        insert(&mut r, "foo.com", &exact);
        assert!(is(r.find("foo.com"), &exact));
        assert!(is(r.find("sub.foo.com"), &wild));

        let mut r = Registry::default();
        insert(&mut r, "sub.foo.com", &exact);
        insert(&mut r, "*.foo.com", &wild);
        assert!(is(r.find("SUB.foo.com."), &exact));
        assert!(is(r.find("other.foo.com"), &wild));
    }

    #[test]
    fn wildcard_depth() {
        let wild = credential("x.a.com");
        let mut r = Registry::default();
        insert(&mut r, "*.a.com", &wild);
        assert!(is(r.find("x.a.com"), &wild));
        assert!(r.find("y.x.a.com").is_none());
        assert!(r.find("a.com").is_none());
    }

    #[test]
    fn default_fallback() {
        let d = credential("default");
        let mut r = Registry::default();
        assert!(r.find("anything.example").is_none());
        insert(&mut r, "*", &d);
        assert!(is(r.find("anything.example"), &d));
        assert!(is(r.find("*"), &d));
    }

    #[test]
    fn last_write_wins() {
        let c1 = credential("a.com");
        let c2 = credential("a.com");
        let w1 = credential("x.b.com");
        let w2 = credential("x.b.com");
        let mut r = Registry::default();
        insert(&mut r, "a.com", &c1);
        insert(&mut r, "A.com.", &c2);
        insert(&mut r, "*.b.com", &w1);
        insert(&mut r, "*.B.com", &w2);
        assert!(is(r.find("a.com"), &c2));
        assert!(is(r.find("x.b.com"), &w2));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn patterns_lists_everything() {
        let c = credential("a.com");
        let mut r = Registry::default();
        assert!(r.is_empty());
        insert(&mut r, "a.com", &c);
        insert(&mut r, "*.a.com", &c);
        insert(&mut r, "*", &c);
        assert_eq!(
            r.patterns().map(|p| p.to_string()).collect::<Vec<_>>(),
            vec!["a.com", "*.a.com", "*"]
        );
        assert!(r.default_credential().is_some());
    }
}
