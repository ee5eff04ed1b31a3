//! Client-wide settings read from the top level of the config file

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{fill_empty, is_default};

/// Feature gate that unlocks the `virtual_net` plugins
pub const FEATURE_VIRTUAL_NET: &str = "VirtualNet";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientCommonConfig {
    /// Prefix applied to proxy names on the server
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_addr: String,

    #[serde(skip_serializing_if = "is_default")]
    pub server_port: u16,

    /// Exit when the first login attempt fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_fail_exit: Option<bool>,

    /// When non-empty, only these proxies and visitors are started
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub start: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,

    /// Enables the runtime-editable store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    #[serde(skip_serializing_if = "is_default")]
    pub web_server: WebServerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// JSON file holding the store entries
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebServerConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub addr: String,

    #[serde(skip_serializing_if = "is_default")]
    pub port: u16,
}

impl ClientCommonConfig {
    pub fn complete(&mut self) {
        fill_empty(&mut self.server_addr, "0.0.0.0");
        if self.server_port == 0 {
            self.server_port = 7000;
        }
        self.login_fail_exit.get_or_insert(true);
        if self.web_server.port > 0 {
            fill_empty(&mut self.web_server.addr, "127.0.0.1");
        }
    }

    /// Whether the named feature gate is switched on
    pub fn feature_enabled(&self, gate: &str) -> bool {
        self.feature_gates.get(gate).copied().unwrap_or(false)
    }

    /// Store file path, when the store is configured
    pub fn store_path(&self) -> Option<&str> {
        self.store.as_ref().map(|store| store.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_defaults() {
        let mut common = ClientCommonConfig::default();
        common.complete();

        assert_eq!(common.server_addr, "0.0.0.0");
        assert_eq!(common.server_port, 7000);
        assert_eq!(common.login_fail_exit, Some(true));
        assert!(common.web_server.addr.is_empty());

        let once = common.clone();
        common.complete();
        assert_eq!(common, once);
    }

    #[test]
    fn test_complete_web_server_addr() {
        let mut common = ClientCommonConfig {
            web_server: WebServerConfig {
                addr: String::new(),
                port: 7400,
            },
            login_fail_exit: Some(false),
            ..Default::default()
        };
        common.complete();

        assert_eq!(common.web_server.addr, "127.0.0.1");
        assert_eq!(common.login_fail_exit, Some(false));
    }

    #[test]
    fn test_feature_enabled() {
        let mut common = ClientCommonConfig::default();
        assert!(!common.feature_enabled(FEATURE_VIRTUAL_NET));

        common.feature_gates.insert(FEATURE_VIRTUAL_NET.to_string(), true);
        assert!(common.feature_enabled(FEATURE_VIRTUAL_NET));
    }
}
