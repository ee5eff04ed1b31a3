use burrow_config::{ProxyConfig, VisitorConfig};
use parking_lot::RwLock;

use crate::{ConfigSet, SourceError};

/// Snapshot of the entries defined by the config file
///
/// The snapshot is only ever replaced as a whole.
#[derive(Debug, Default)]
pub struct ConfigSource {
    snapshot: RwLock<ConfigSet>,
}

impl ConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new snapshot
    ///
    /// Fails without touching the current snapshot when a name is empty or
    /// repeated.
    pub fn replace_all(
        &self,
        proxies: Vec<ProxyConfig>,
        visitors: Vec<VisitorConfig>,
    ) -> Result<(), SourceError> {
        let set = ConfigSet::new(proxies, visitors);
        set.check_names()?;
        *self.snapshot.write() = set;
        Ok(())
    }

    pub fn load(&self) -> ConfigSet {
        self.snapshot.read().clone()
    }

    pub fn get_proxy(&self, name: &str) -> Option<ProxyConfig> {
        self.snapshot.read().proxy(name).cloned()
    }

    pub fn get_visitor(&self, name: &str) -> Option<VisitorConfig> {
        self.snapshot.read().visitor(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_config::{ProxySpec, StcpVisitorSpec, VisitorSpec};

    fn tcp(name: &str) -> ProxyConfig {
        ProxyConfig::new(name, ProxySpec::Tcp(Default::default()))
    }

    fn stcp_visitor(name: &str) -> VisitorConfig {
        VisitorConfig::new(name, VisitorSpec::Stcp(StcpVisitorSpec {}))
    }

    #[test]
    fn test_load_returns_clones() {
        let source = ConfigSource::new();
        source
            .replace_all(vec![tcp("proxy1")], vec![stcp_visitor("visitor1")])
            .unwrap();

        let mut first = source.load();
        first.proxies[0].complete();
        first.visitors[0].complete();

        let second = source.load();
        assert!(second.proxies[0].base.local_ip.is_empty());
        assert!(second.visitors[0].base.bind_addr.is_empty());

        let mut single = source.get_proxy("proxy1").unwrap();
        single.base.local_port = 9999;
        assert_eq!(source.get_proxy("proxy1").unwrap().base.local_port, 0);
    }

    #[test]
    fn test_replace_all_rejects_duplicates() {
        let source = ConfigSource::new();
        source.replace_all(vec![tcp("p1")], Vec::new()).unwrap();

        let err = source
            .replace_all(vec![tcp("p2"), tcp("p2")], Vec::new())
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidArgument(_)));

        let set = source.load();
        assert_eq!(set.proxies.len(), 1);
        assert_eq!(set.proxies[0].name(), "p1");
    }

    #[test]
    fn test_replace_all_rejects_empty_names() {
        let source = ConfigSource::new();
        let err = source
            .replace_all(Vec::new(), vec![stcp_visitor("")])
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidArgument(_)));
        assert!(source.load().is_empty());
    }

    #[test]
    fn test_same_name_in_both_collections() {
        let source = ConfigSource::new();
        source
            .replace_all(vec![tcp("ssh")], vec![stcp_visitor("ssh")])
            .unwrap();

        assert!(source.get_proxy("ssh").is_some());
        assert!(source.get_visitor("ssh").is_some());
        assert!(source.get_visitor("other").is_none());
    }
}
