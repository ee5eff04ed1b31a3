//! Building blocks shared by proxy and visitor configs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const BANDWIDTH_LIMIT_MODE_CLIENT: &str = "client";
pub const BANDWIDTH_LIMIT_MODE_SERVER: &str = "server";

/// HTTP header rewrite rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderOperations {
    /// Headers to set, overriding existing values
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, String>,

    /// Header names to strip
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

impl HeaderOperations {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// A single header sent with HTTP health checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// Transport tuning for an exposed proxy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyTransport {
    #[serde(skip_serializing_if = "is_false")]
    pub use_encryption: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub use_compression: bool,

    /// Bandwidth limit such as `1MB` or `512KB`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bandwidth_limit: String,

    /// Where the bandwidth limit is enforced: `client` or `server`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bandwidth_limit_mode: String,

    /// PROXY protocol version sent to the backend: `v1`, `v2` or empty
    #[serde(skip_serializing_if = "String::is_empty")]
    pub proxy_protocol_version: String,
}

/// Transport tuning for a visitor connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitorTransport {
    #[serde(skip_serializing_if = "is_false")]
    pub use_encryption: bool,

    #[serde(skip_serializing_if = "is_false")]
    pub use_compression: bool,
}

/// Load balancing group membership
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancerConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub group_key: String,
}

/// Backend health checking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthCheckConfig {
    /// `tcp`, `http`, or empty to disable
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub check_type: String,

    #[serde(skip_serializing_if = "is_default")]
    pub timeout_seconds: u32,

    #[serde(skip_serializing_if = "is_default")]
    pub max_failed: u32,

    #[serde(skip_serializing_if = "is_default")]
    pub interval_seconds: u32,

    /// Request path for `http` checks
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,

    #[serde(rename = "httpHeaders", skip_serializing_if = "Vec::is_empty")]
    pub http_headers: Vec<HttpHeader>,
}

/// NAT traversal tuning for xtcp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NatTraversalConfig {
    /// Skip local network addresses when gathering candidates
    #[serde(skip_serializing_if = "is_false")]
    pub disable_assisted_addrs: bool,
}

/// Replace an empty string with `default`
pub(crate) fn fill_empty(field: &mut String, default: &str) {
    if field.is_empty() {
        *field = default.to_string();
    }
}

/// Replace a zero number with `default`
pub(crate) fn fill_zero(field: &mut u32, default: u32) {
    if *field == 0 {
        *field = default;
    }
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}
