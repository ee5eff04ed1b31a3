//! Reload and store mutation orchestration
//!
//! Every path that changes what the engine runs (file reload and store
//! create/update/delete) holds one mutation lock for its whole
//! validate, mutate, persist and apply sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use burrow_config::validation::{validate_all, validate_proxy_with, validate_visitor_with};
use burrow_config::{
    complete_proxies, complete_visitors, filter_client_configs, load_client_config,
    ClientCommonConfig, ClientConfigResult, DecodeOptions, ProxyConfig, VisitorConfig,
};
use burrow_source::{
    write_atomic, Aggregator, ConfigSet, ConfigSource, StoreSource, StoreSourceConfig,
};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::engine::{TunnelEngine, WorkingStatus};
use crate::error::ManagerError;

/// Owns the config sources and keeps the engine in sync with them
pub struct ConfigManager {
    config_path: Option<PathBuf>,
    aggregator: Aggregator,
    /// Completed common config of the last successful load
    common: RwLock<ClientCommonConfig>,
    engine: Arc<dyn TunnelEngine>,
    /// Serializes reloads and store mutations
    mutation: Mutex<()>,
}

impl ConfigManager {
    /// Create a manager with an empty config file snapshot
    pub fn new(
        config_path: Option<PathBuf>,
        mut common: ClientCommonConfig,
        store: Option<Arc<StoreSource>>,
        engine: Arc<dyn TunnelEngine>,
    ) -> Self {
        common.complete();
        Self {
            config_path,
            aggregator: Aggregator::new(Arc::new(ConfigSource::new()), store),
            common: RwLock::new(common),
            engine,
            mutation: Mutex::new(()),
        }
    }

    /// Load the config file, open the store it names, and apply the result
    pub fn load(
        config_path: PathBuf,
        options: DecodeOptions,
        engine: Arc<dyn TunnelEngine>,
    ) -> Result<Self, ManagerError> {
        let result = load_client_config(&config_path, options).map_err(ManagerError::invalid)?;

        let store = match result.common.store_path() {
            Some(path) if !path.is_empty() => Some(Arc::new(StoreSource::new(
                StoreSourceConfig {
                    path: PathBuf::from(path),
                },
            )?)),
            _ => None,
        };

        let manager = Self::new(Some(config_path), result.common.clone(), store, engine);
        manager.install(result)?;
        Ok(manager)
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Completed common config currently in effect
    pub fn common(&self) -> ClientCommonConfig {
        self.common.read().clone()
    }

    /// Re-read the config file and apply it
    ///
    /// Nothing changes unless the file decodes, validates and does not
    /// collide with the store.
    pub fn reload_from_file(&self, strict: bool) -> Result<(), ManagerError> {
        let path = self.require_config_path()?;
        let result = load_client_config(path, DecodeOptions::with_strict(strict))
            .map_err(ManagerError::invalid)?;
        self.install(result)?;
        info!("Reloaded config from {}", path.display());
        Ok(())
    }

    fn install(&self, result: ClientConfigResult) -> Result<(), ManagerError> {
        let _guard = self.mutation.lock();

        let mut common = result.common.clone();
        common.complete();

        let (proxies, visitors) =
            filter_client_configs(&common, result.proxies.clone(), result.visitors.clone());
        let proxies = complete_proxies(&proxies);
        let visitors = complete_visitors(&visitors);
        validate_all(&common, &proxies, &visitors).map_err(ManagerError::invalid)?;

        // The store must not define any name the new file set defines
        if let Some(store) = self.aggregator.store_source() {
            let file_set = ConfigSet::new(result.proxies.clone(), result.visitors.clone());
            Aggregator::merge(file_set, store.load()).map_err(ManagerError::invalid)?;
        }

        self.aggregator
            .config_source()
            .replace_all(result.proxies, result.visitors)
            .map_err(ManagerError::invalid)?;
        *self.common.write() = common;

        self.apply_locked()
    }

    /// Push the effective set to the engine; the caller holds the mutation lock
    fn apply_locked(&self) -> Result<(), ManagerError> {
        let set = self
            .aggregator
            .effective_config()
            .map_err(|err| ManagerError::ApplyConfig(err.to_string()))?;
        let common = self.common();

        let (proxies, visitors) = filter_client_configs(&common, set.proxies, set.visitors);
        self.engine
            .update_config_source(
                &common,
                complete_proxies(&proxies),
                complete_visitors(&visitors),
            )
            .map_err(|err| {
                warn!("Failed to apply config: {}", err);
                ManagerError::ApplyConfig(err.to_string())
            })
    }

    pub fn read_config_file(&self) -> Result<String, ManagerError> {
        let path = self.require_config_path()?;
        std::fs::read_to_string(path).map_err(|err| {
            ManagerError::InvalidArgument(format!("failed to read {}: {}", path.display(), err))
        })
    }

    /// Replace the config file content; takes effect on the next reload
    pub fn write_config_file(&self, content: &[u8]) -> Result<(), ManagerError> {
        if content.is_empty() {
            return Err(ManagerError::invalid("body can't be empty"));
        }
        let path = self.require_config_path()?;
        write_atomic(path, content).map_err(|err| {
            ManagerError::Internal(format!("failed to write {}: {}", path.display(), err))
        })?;
        info!("Wrote new config file {}", path.display());
        Ok(())
    }

    /// Swap the store (or switch it off) and apply the new effective set
    pub fn set_store_source(&self, store: Option<Arc<StoreSource>>) -> Result<(), ManagerError> {
        let _guard = self.mutation.lock();

        if let Some(store) = &store {
            Aggregator::merge(self.aggregator.config_source().load(), store.load())
                .map_err(ManagerError::invalid)?;
        }
        self.aggregator.set_store_source(store);
        if self.store_enabled() {
            info!("Store attached");
        } else {
            info!("Store detached");
        }

        self.apply_locked()
    }

    pub fn get_proxy_status(&self) -> Vec<WorkingStatus> {
        self.engine.proxy_status()
    }

    pub fn store_enabled(&self) -> bool {
        self.aggregator.store_source().is_some()
    }

    /// Whether `name` is a store proxy that is not switched off
    pub fn is_store_proxy_enabled(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.aggregator
            .store_source()
            .and_then(|store| store.get_proxy(name))
            .is_some_and(|cfg| cfg.is_enabled())
    }

    pub fn list_store_proxies(&self) -> Result<Vec<ProxyConfig>, ManagerError> {
        Ok(self.require_store()?.get_all_proxies())
    }

    pub fn get_store_proxy(&self, name: &str) -> Result<ProxyConfig, ManagerError> {
        require_name("proxy", name)?;
        self.require_store()?
            .get_proxy(name)
            .ok_or_else(|| ManagerError::NotFound(format!("proxy {:?}", name)))
    }

    pub fn create_store_proxy(&self, cfg: ProxyConfig) -> Result<(), ManagerError> {
        self.validate_store_proxy(&cfg)?;
        let name = cfg.name().to_string();

        self.with_store_mutation(|store| {
            if self.aggregator.config_source().get_proxy(&name).is_some() {
                return Err(ManagerError::Conflict(format!(
                    "proxy {:?} is defined in the config file",
                    name
                )));
            }
            Ok(store.add_proxy(cfg)?)
        })?;

        info!("Store: created proxy {}", name);
        Ok(())
    }

    pub fn update_store_proxy(&self, name: &str, cfg: ProxyConfig) -> Result<(), ManagerError> {
        require_name("proxy", name)?;
        if cfg.name() != name {
            return Err(ManagerError::invalid(
                "proxy name in URL must match name in body",
            ));
        }
        self.validate_store_proxy(&cfg)?;

        self.with_store_mutation(|store| Ok(store.update_proxy(cfg)?))?;

        info!("Store: updated proxy {}", name);
        Ok(())
    }

    pub fn delete_store_proxy(&self, name: &str) -> Result<(), ManagerError> {
        require_name("proxy", name)?;

        self.with_store_mutation(|store| Ok(store.remove_proxy(name)?))?;

        info!("Store: deleted proxy {}", name);
        Ok(())
    }

    pub fn list_store_visitors(&self) -> Result<Vec<VisitorConfig>, ManagerError> {
        Ok(self.require_store()?.get_all_visitors())
    }

    pub fn get_store_visitor(&self, name: &str) -> Result<VisitorConfig, ManagerError> {
        require_name("visitor", name)?;
        self.require_store()?
            .get_visitor(name)
            .ok_or_else(|| ManagerError::NotFound(format!("visitor {:?}", name)))
    }

    pub fn create_store_visitor(&self, cfg: VisitorConfig) -> Result<(), ManagerError> {
        self.validate_store_visitor(&cfg)?;
        let name = cfg.name().to_string();

        self.with_store_mutation(|store| {
            if self.aggregator.config_source().get_visitor(&name).is_some() {
                return Err(ManagerError::Conflict(format!(
                    "visitor {:?} is defined in the config file",
                    name
                )));
            }
            Ok(store.add_visitor(cfg)?)
        })?;

        info!("Store: created visitor {}", name);
        Ok(())
    }

    pub fn update_store_visitor(&self, name: &str, cfg: VisitorConfig) -> Result<(), ManagerError> {
        require_name("visitor", name)?;
        if cfg.name() != name {
            return Err(ManagerError::invalid(
                "visitor name in URL must match name in body",
            ));
        }
        self.validate_store_visitor(&cfg)?;

        self.with_store_mutation(|store| Ok(store.update_visitor(cfg)?))?;

        info!("Store: updated visitor {}", name);
        Ok(())
    }

    pub fn delete_store_visitor(&self, name: &str) -> Result<(), ManagerError> {
        require_name("visitor", name)?;

        self.with_store_mutation(|store| Ok(store.remove_visitor(name)?))?;

        info!("Store: deleted visitor {}", name);
        Ok(())
    }

    /// Ask the engine to shut down on a background thread and return at once
    pub fn graceful_close(&self, grace: Duration) {
        let engine = Arc::clone(&self.engine);
        std::thread::spawn(move || engine.graceful_close(grace));
    }

    fn require_config_path(&self) -> Result<&Path, ManagerError> {
        self.config_path
            .as_deref()
            .ok_or_else(|| ManagerError::invalid("burrow has no config file path"))
    }

    fn require_store(&self) -> Result<Arc<StoreSource>, ManagerError> {
        self.aggregator
            .store_source()
            .ok_or(ManagerError::StoreDisabled)
    }

    /// Run a store mutation and apply the result, all under the mutation lock
    ///
    /// A failed apply is reported as `ApplyConfig` and the store change stays.
    fn with_store_mutation(
        &self,
        mutate: impl FnOnce(&StoreSource) -> Result<(), ManagerError>,
    ) -> Result<(), ManagerError> {
        let _guard = self.mutation.lock();

        let store = self.require_store()?;
        mutate(&store)?;
        self.apply_locked()
    }

    fn validate_store_proxy(&self, cfg: &ProxyConfig) -> Result<(), ManagerError> {
        let runtime = cfg.completed();
        validate_proxy_with(&self.common(), &runtime)
            .map_err(|err| ManagerError::InvalidArgument(format!("validation error: {}", err)))
    }

    fn validate_store_visitor(&self, cfg: &VisitorConfig) -> Result<(), ManagerError> {
        let runtime = cfg.completed();
        validate_visitor_with(&self.common(), &runtime)
            .map_err(|err| ManagerError::InvalidArgument(format!("validation error: {}", err)))
    }
}

fn require_name(kind: &str, name: &str) -> Result<(), ManagerError> {
    if name.is_empty() {
        Err(ManagerError::InvalidArgument(format!(
            "{} name is required",
            kind
        )))
    } else {
        Ok(())
    }
}
