//! Config file loading
//!
//! The file holds the common settings at the top level next to `proxies` and
//! `visitors` arrays. TOML is the default format; files ending in `.json` are
//! read as JSON.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::common::ClientCommonConfig;
use crate::decode::{as_object, DecodeOptions, FieldTracker};
use crate::error::ConfigError;
use crate::proxy::ProxyConfig;
use crate::visitor::VisitorConfig;

/// Everything decoded from one config file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfigResult {
    pub common: ClientCommonConfig,
    pub proxies: Vec<ProxyConfig>,
    pub visitors: Vec<VisitorConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Read and decode the config file at `path`
pub fn load_client_config(
    path: &Path,
    options: DecodeOptions,
) -> Result<ClientConfigResult, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let result = parse_client_config(&content, ConfigFormat::from_path(path), options)?;
    debug!(
        "Loaded {} proxies and {} visitors from {}",
        result.proxies.len(),
        result.visitors.len(),
        path.display()
    );
    Ok(result)
}

/// Decode config file content in the given format
pub fn parse_client_config(
    content: &str,
    format: ConfigFormat,
    options: DecodeOptions,
) -> Result<ClientConfigResult, ConfigError> {
    let value: Value = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };
    client_config_from_value(&value, options)
}

pub fn client_config_from_value(
    value: &Value,
    options: DecodeOptions,
) -> Result<ClientConfigResult, ConfigError> {
    let object = as_object(value, "client")?;

    let mut fields = FieldTracker::new("client", &["proxies", "visitors"]);
    let common: ClientCommonConfig = fields.decode(value)?;
    fields.finish(options)?;

    let proxies = entries(object.get("proxies"), "proxy", |entry| {
        ProxyConfig::from_value(entry, options)
    })?;
    let visitors = entries(object.get("visitors"), "visitor", |entry| {
        VisitorConfig::from_value(entry, options)
    })?;

    Ok(ClientConfigResult {
        common,
        proxies,
        visitors,
    })
}

fn entries<T>(
    value: Option<&Value>,
    kind: &'static str,
    decode: impl Fn(&Value) -> Result<T, ConfigError>,
) -> Result<Vec<T>, ConfigError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ConfigError::NotAList { kind }),
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode(item).map_err(|err| ConfigError::entry(kind, index, err)))
        .collect()
}

/// Drop disabled entries and, when `common.start` is set, entries it does not
/// name
pub fn filter_client_configs(
    common: &ClientCommonConfig,
    proxies: Vec<ProxyConfig>,
    visitors: Vec<VisitorConfig>,
) -> (Vec<ProxyConfig>, Vec<VisitorConfig>) {
    let started = |name: &str| common.start.is_empty() || common.start.iter().any(|s| s == name);

    let proxies = proxies
        .into_iter()
        .filter(|p| p.is_enabled() && started(p.name()))
        .collect();
    let visitors = visitors
        .into_iter()
        .filter(|v| v.is_enabled() && started(v.name()))
        .collect();
    (proxies, visitors)
}

/// Completed clones of `proxies`
pub fn complete_proxies(proxies: &[ProxyConfig]) -> Vec<ProxyConfig> {
    proxies.iter().map(ProxyConfig::completed).collect()
}

/// Completed clones of `visitors`
pub fn complete_visitors(visitors: &[VisitorConfig]) -> Vec<VisitorConfig> {
    visitors.iter().map(VisitorConfig::completed).collect()
}
