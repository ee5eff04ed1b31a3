//! Transport-agnostic handlers for the client admin API
//!
//! Each handler takes already-extracted path parameters and request bodies
//! and returns a serializable response or an [`ApiError`] carrying the HTTP
//! status the transport should answer with.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use burrow_config::{ConfigError, DecodeOptions, ProxyConfig, ProxyType, VisitorConfig};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::engine::WorkingStatus;
use crate::error::ManagerError;
use crate::manager::ConfigManager;

/// Grace period handed to the engine by [`Controller::stop`]
pub const STOP_GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Value of `source` for proxies that come from the store
pub const SOURCE_STORE: &str = "store";

/// An API failure with its HTTP status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            message: message.into(),
        }
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        Self {
            status: err.status_code(),
            message: err.to_string(),
        }
    }
}

/// Status of one proxy as reported by `status()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyStatusResp {
    pub name: String,
    #[serde(rename = "type")]
    pub proxy_type: String,
    pub status: String,
    pub err: String,
    pub local_addr: String,
    pub plugin: String,
    pub remote_addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
}

/// Proxy statuses grouped by proxy type
pub type StatusResp = BTreeMap<String, Vec<ProxyStatusResp>>;

/// One store entry as returned by the list and get handlers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryResp {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub config: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProxyListResp {
    pub proxies: Vec<EntryResp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisitorListResp {
    pub visitors: Vec<EntryResp>,
}

/// Admin API handlers backed by a [`ConfigManager`]
pub struct Controller {
    server_addr: String,
    manager: Arc<ConfigManager>,
}

impl Controller {
    pub fn new(server_addr: impl Into<String>, manager: Arc<ConfigManager>) -> Self {
        Self {
            server_addr: server_addr.into(),
            manager,
        }
    }

    /// Re-read the config file; `strict` is the raw `strictConfig` query value
    ///
    /// An absent or unparsable value means lenient decoding.
    pub fn reload(&self, strict: Option<&str>) -> Result<(), ApiError> {
        let strict = strict.and_then(parse_bool).unwrap_or(false);
        self.manager.reload_from_file(strict)?;
        Ok(())
    }

    /// Start a graceful shutdown without waiting for it
    pub fn stop(&self) -> Result<(), ApiError> {
        self.manager.graceful_close(STOP_GRACE_PERIOD);
        Ok(())
    }

    pub fn status(&self) -> Result<StatusResp, ApiError> {
        let mut resp = StatusResp::new();
        for status in self.manager.get_proxy_status() {
            resp.entry(status.proxy_type.as_str().to_string())
                .or_default()
                .push(self.build_proxy_status_resp(&status));
        }
        for statuses in resp.values_mut() {
            statuses.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(resp)
    }

    pub fn build_proxy_status_resp(&self, status: &WorkingStatus) -> ProxyStatusResp {
        let base = &status.cfg.base;

        let mut resp = ProxyStatusResp {
            name: status.name.clone(),
            proxy_type: status.proxy_type.as_str().to_string(),
            status: status.phase.as_str().to_string(),
            err: status.err.clone(),
            ..Default::default()
        };
        if base.local_port != 0 {
            resp.local_addr = join_host_port(&base.local_ip, base.local_port);
        }
        if let Some(plugin) = &base.plugin {
            resp.plugin = plugin.plugin_type().to_string();
        }

        if status.err.is_empty() {
            resp.remote_addr = match status.proxy_type {
                ProxyType::Tcp | ProxyType::Udp => {
                    format!("{}{}", self.server_addr, status.remote_addr)
                }
                _ => status.remote_addr.clone(),
            };
        }

        if self.manager.is_store_proxy_enabled(&status.name) {
            resp.source = SOURCE_STORE.to_string();
        }
        resp
    }

    pub fn get_config(&self) -> Result<String, ApiError> {
        Ok(self.manager.read_config_file()?)
    }

    pub fn put_config(&self, body: &[u8]) -> Result<(), ApiError> {
        if body.is_empty() {
            return Err(ApiError::bad_request("body can't be empty"));
        }
        self.manager.write_config_file(body)?;
        Ok(())
    }

    pub fn list_store_proxies(&self) -> Result<ProxyListResp, ApiError> {
        let proxies = self.manager.list_store_proxies()?;
        let proxies = render_entries("proxy", &proxies, ProxyConfig::name, proxy_entry);
        Ok(ProxyListResp { proxies })
    }

    pub fn get_store_proxy(&self, name: &str) -> Result<EntryResp, ApiError> {
        require_name("proxy", name)?;
        let cfg = self.manager.get_store_proxy(name)?;
        proxy_entry(&cfg)
    }

    pub fn create_store_proxy(&self, body: &[u8]) -> Result<(), ApiError> {
        let cfg = decode_body("proxy", body, ProxyConfig::decode)?;
        self.manager.create_store_proxy(cfg)?;
        Ok(())
    }

    pub fn update_store_proxy(&self, name: &str, body: &[u8]) -> Result<(), ApiError> {
        require_name("proxy", name)?;
        let cfg = decode_body("proxy", body, ProxyConfig::decode)?;
        self.manager.update_store_proxy(name, cfg)?;
        Ok(())
    }

    pub fn delete_store_proxy(&self, name: &str) -> Result<(), ApiError> {
        require_name("proxy", name)?;
        self.manager.delete_store_proxy(name)?;
        Ok(())
    }

    pub fn list_store_visitors(&self) -> Result<VisitorListResp, ApiError> {
        let visitors = self.manager.list_store_visitors()?;
        let visitors = render_entries("visitor", &visitors, VisitorConfig::name, visitor_entry);
        Ok(VisitorListResp { visitors })
    }

    pub fn get_store_visitor(&self, name: &str) -> Result<EntryResp, ApiError> {
        require_name("visitor", name)?;
        let cfg = self.manager.get_store_visitor(name)?;
        visitor_entry(&cfg)
    }

    pub fn create_store_visitor(&self, body: &[u8]) -> Result<(), ApiError> {
        let cfg = decode_body("visitor", body, VisitorConfig::decode)?;
        self.manager.create_store_visitor(cfg)?;
        Ok(())
    }

    pub fn update_store_visitor(&self, name: &str, body: &[u8]) -> Result<(), ApiError> {
        require_name("visitor", name)?;
        let cfg = decode_body("visitor", body, VisitorConfig::decode)?;
        self.manager.update_store_visitor(name, cfg)?;
        Ok(())
    }

    pub fn delete_store_visitor(&self, name: &str) -> Result<(), ApiError> {
        require_name("visitor", name)?;
        self.manager.delete_store_visitor(name)?;
        Ok(())
    }
}

/// Decode a request body leniently, whatever the process-wide default says
fn decode_body<T>(
    kind: &str,
    body: &[u8],
    decode: fn(&[u8], DecodeOptions) -> Result<T, ConfigError>,
) -> Result<T, ApiError> {
    decode(body, DecodeOptions::lenient()).map_err(|err| match err {
        ConfigError::EmptyType { .. } => {
            ApiError::bad_request(format!("invalid {} config: type is required", kind))
        }
        err => ApiError::bad_request(format!("parse JSON error: {}", err)),
    })
}

fn require_name(kind: &str, name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        Err(ApiError::bad_request(format!("{} name is required", kind)))
    } else {
        Ok(())
    }
}

/// Render every entry for a listing, skipping (and logging) those that fail
fn render_entries<T>(
    kind: &str,
    items: &[T],
    name: fn(&T) -> &str,
    render: fn(&T) -> Result<EntryResp, ApiError>,
) -> Vec<EntryResp> {
    items
        .iter()
        .filter_map(|item| match render(item) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping store {} {} in listing: {}", kind, name(item), err.message);
                None
            }
        })
        .collect()
}

fn proxy_entry(cfg: &ProxyConfig) -> Result<EntryResp, ApiError> {
    Ok(EntryResp {
        name: cfg.name().to_string(),
        entry_type: cfg.proxy_type().as_str().to_string(),
        config: serde_json::to_value(cfg).map_err(|err| ApiError::internal(err.to_string()))?,
    })
}

fn visitor_entry(cfg: &VisitorConfig) -> Result<EntryResp, ApiError> {
    Ok(EntryResp {
        name: cfg.name().to_string(),
        entry_type: cfg.visitor_type().as_str().to_string(),
        config: serde_json::to_value(cfg).map_err(|err| ApiError::internal(err.to_string()))?,
    })
}

/// `host:port`, with IPv6 hosts in brackets
fn join_host_port(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{}]:{}", host, port),
        _ => format!("{}:{}", host, port),
    }
}

/// Boolean spellings accepted in query strings
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
