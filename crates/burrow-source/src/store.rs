//! Runtime-editable entries persisted to a JSON file

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use burrow_config::{ProxyConfig, VisitorConfig};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::persist::write_atomic;
use crate::{ConfigSet, EntryKind, SourceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSourceConfig {
    /// JSON file holding the entries
    pub path: PathBuf,
}

/// Persisted collection of proxies and visitors, edited one entry at a time
///
/// Entries are stored exactly as given; completion happens on the caller's
/// clones. Every mutation is written to disk before it becomes visible.
#[derive(Debug)]
pub struct StoreSource {
    path: PathBuf,
    data: RwLock<ConfigSet>,
    /// Serializes writers so readers only wait for the final swap
    writer: Mutex<()>,
}

impl StoreSource {
    /// Open the store, starting empty when the file does not exist yet
    pub fn new(config: StoreSourceConfig) -> Result<Self, SourceError> {
        let path = config.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SourceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let data = load_file(&path)?;
        info!(
            "Loaded store with {} proxies and {} visitors from {}",
            data.proxies.len(),
            data.visitors.len(),
            path.display()
        );

        Ok(Self {
            path,
            data: RwLock::new(data),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ConfigSet {
        self.data.read().clone()
    }

    pub fn add_proxy(&self, cfg: ProxyConfig) -> Result<(), SourceError> {
        require_name(EntryKind::Proxy, cfg.name())?;
        self.mutate(|set| {
            if set.proxy(cfg.name()).is_some() {
                return Err(SourceError::already_exists(EntryKind::Proxy, cfg.name()));
            }
            set.proxies.push(cfg);
            Ok(())
        })
    }

    /// Replace the same-named proxy, keeping its position
    pub fn update_proxy(&self, cfg: ProxyConfig) -> Result<(), SourceError> {
        require_name(EntryKind::Proxy, cfg.name())?;
        self.mutate(|set| {
            let slot = set
                .proxies
                .iter_mut()
                .find(|p| p.name() == cfg.name())
                .ok_or_else(|| SourceError::not_found(EntryKind::Proxy, cfg.name()))?;
            *slot = cfg;
            Ok(())
        })
    }

    pub fn remove_proxy(&self, name: &str) -> Result<(), SourceError> {
        require_name(EntryKind::Proxy, name)?;
        self.mutate(|set| {
            let index = set
                .proxies
                .iter()
                .position(|p| p.name() == name)
                .ok_or_else(|| SourceError::not_found(EntryKind::Proxy, name))?;
            set.proxies.remove(index);
            Ok(())
        })
    }

    pub fn get_proxy(&self, name: &str) -> Option<ProxyConfig> {
        self.data.read().proxy(name).cloned()
    }

    pub fn get_all_proxies(&self) -> Vec<ProxyConfig> {
        self.data.read().proxies.clone()
    }

    pub fn add_visitor(&self, cfg: VisitorConfig) -> Result<(), SourceError> {
        require_name(EntryKind::Visitor, cfg.name())?;
        self.mutate(|set| {
            if set.visitor(cfg.name()).is_some() {
                return Err(SourceError::already_exists(EntryKind::Visitor, cfg.name()));
            }
            set.visitors.push(cfg);
            Ok(())
        })
    }

    pub fn update_visitor(&self, cfg: VisitorConfig) -> Result<(), SourceError> {
        require_name(EntryKind::Visitor, cfg.name())?;
        self.mutate(|set| {
            let slot = set
                .visitors
                .iter_mut()
                .find(|v| v.name() == cfg.name())
                .ok_or_else(|| SourceError::not_found(EntryKind::Visitor, cfg.name()))?;
            *slot = cfg;
            Ok(())
        })
    }

    pub fn remove_visitor(&self, name: &str) -> Result<(), SourceError> {
        require_name(EntryKind::Visitor, name)?;
        self.mutate(|set| {
            let index = set
                .visitors
                .iter()
                .position(|v| v.name() == name)
                .ok_or_else(|| SourceError::not_found(EntryKind::Visitor, name))?;
            set.visitors.remove(index);
            Ok(())
        })
    }

    pub fn get_visitor(&self, name: &str) -> Option<VisitorConfig> {
        self.data.read().visitor(name).cloned()
    }

    pub fn get_all_visitors(&self) -> Vec<VisitorConfig> {
        self.data.read().visitors.clone()
    }

    /// Apply `f` to a staged copy, persist it, then publish it
    fn mutate(
        &self,
        f: impl FnOnce(&mut ConfigSet) -> Result<(), SourceError>,
    ) -> Result<(), SourceError> {
        let _writer = self.writer.lock();

        let mut staged = self.data.read().clone();
        f(&mut staged)?;
        self.persist(&staged)?;

        *self.data.write() = staged;
        Ok(())
    }

    fn persist(&self, set: &ConfigSet) -> Result<(), SourceError> {
        let mut contents = serde_json::to_vec_pretty(set).map_err(SourceError::Encode)?;
        contents.push(b'\n');
        write_atomic(&self.path, &contents).map_err(|source| SourceError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            "Persisted {} proxies and {} visitors to {}",
            set.proxies.len(),
            set.visitors.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn require_name(kind: EntryKind, name: &str) -> Result<(), SourceError> {
    if name.is_empty() {
        Err(SourceError::InvalidArgument(format!("{} name is required", kind)))
    } else {
        Ok(())
    }
}

fn load_file(path: &Path) -> Result<ConfigSet, SourceError> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ConfigSet::default()),
        Err(source) => {
            return Err(SourceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(ConfigSet::default());
    }
    let data: ConfigSet =
        serde_json::from_slice(&content).map_err(|source| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    data.check_names().map_err(|err| SourceError::InvalidFile {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    Ok(data)
}
