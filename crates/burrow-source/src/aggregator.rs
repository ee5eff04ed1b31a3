use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{ConfigSet, ConfigSource, EntryKind, SourceError, StoreSource};

/// Merges the config file snapshot with the optional store
///
/// File entries come first in file order, store entries follow in the order
/// they were added. A name defined by both sources is an error rather than
/// one shadowing the other.
#[derive(Debug)]
pub struct Aggregator {
    config_source: RwLock<Arc<ConfigSource>>,
    store_source: RwLock<Option<Arc<StoreSource>>>,
}

impl Aggregator {
    pub fn new(config_source: Arc<ConfigSource>, store_source: Option<Arc<StoreSource>>) -> Self {
        Self {
            config_source: RwLock::new(config_source),
            store_source: RwLock::new(store_source),
        }
    }

    pub fn config_source(&self) -> Arc<ConfigSource> {
        self.config_source.read().clone()
    }

    pub fn store_source(&self) -> Option<Arc<StoreSource>> {
        self.store_source.read().clone()
    }

    pub fn set_store_source(&self, source: Option<Arc<StoreSource>>) {
        *self.store_source.write() = source;
    }

    /// The merged set of every source's entries
    pub fn effective_config(&self) -> Result<ConfigSet, SourceError> {
        let base = self.config_source().load();
        let store = self
            .store_source()
            .map(|store| store.load())
            .unwrap_or_default();
        Self::merge(base, store)
    }

    /// Append `store` to `base`, failing on any name both define or any
    /// empty or repeated name in the result
    pub fn merge(mut base: ConfigSet, store: ConfigSet) -> Result<ConfigSet, SourceError> {
        check_disjoint(
            EntryKind::Proxy,
            base.proxies.iter().map(|p| p.name()),
            store.proxies.iter().map(|p| p.name()),
        )?;
        check_disjoint(
            EntryKind::Visitor,
            base.visitors.iter().map(|v| v.name()),
            store.visitors.iter().map(|v| v.name()),
        )?;

        base.proxies.extend(store.proxies);
        base.visitors.extend(store.visitors);
        base.check_names()?;
        Ok(base)
    }
}

fn check_disjoint<'a>(
    kind: EntryKind,
    base: impl Iterator<Item = &'a str>,
    mut other: impl Iterator<Item = &'a str>,
) -> Result<(), SourceError> {
    let names: HashSet<&str> = base.collect();
    match other.find(|name| names.contains(name)) {
        Some(name) => Err(SourceError::conflict(kind, name)),
        None => Ok(()),
    }
}
