//! Config sources for the Burrow tunnel client
//!
//! A [`ConfigSource`] holds the snapshot derived from the config file, a
//! [`StoreSource`] holds the entries edited at runtime and persisted to disk,
//! and the [`Aggregator`] merges both into the effective set.

mod aggregator;
mod config_source;
mod error;
mod persist;
mod store;

use std::collections::HashSet;

use burrow_config::{ProxyConfig, VisitorConfig};
use serde::{Deserialize, Serialize};

pub use aggregator::Aggregator;
pub use config_source::ConfigSource;
pub use error::{EntryKind, SourceError};
pub use persist::write_atomic;
pub use store::{StoreSource, StoreSourceConfig};

/// A snapshot of proxies and visitors, in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSet {
    pub proxies: Vec<ProxyConfig>,
    pub visitors: Vec<VisitorConfig>,
}

impl ConfigSet {
    pub fn new(proxies: Vec<ProxyConfig>, visitors: Vec<VisitorConfig>) -> Self {
        Self { proxies, visitors }
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty() && self.visitors.is_empty()
    }

    pub fn proxy(&self, name: &str) -> Option<&ProxyConfig> {
        self.proxies.iter().find(|p| p.name() == name)
    }

    pub fn visitor(&self, name: &str) -> Option<&VisitorConfig> {
        self.visitors.iter().find(|v| v.name() == name)
    }

    /// Reject empty and repeated names within each collection
    pub fn check_names(&self) -> Result<(), SourceError> {
        check_unique(EntryKind::Proxy, self.proxies.iter().map(|p| p.name()))?;
        check_unique(EntryKind::Visitor, self.visitors.iter().map(|v| v.name()))
    }
}

fn check_unique<'a>(
    kind: EntryKind,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), SourceError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(SourceError::InvalidArgument(format!("{} name is required", kind)));
        }
        if !seen.insert(name) {
            return Err(SourceError::InvalidArgument(format!(
                "duplicate {} name: {}",
                kind, name
            )));
        }
    }
    Ok(())
}
