//! Proxy definitions: one exposed tunnel endpoint each

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::decode::{as_object, parse_json, read_tag, DecodeOptions, FieldTracker, Tagged};
use crate::error::ConfigError;
use crate::plugin::{decode_optional, ClientPluginOptions};
use crate::types::{
    fill_empty, is_default, HeaderOperations, HealthCheckConfig, LoadBalancerConfig,
    NatTraversalConfig, ProxyTransport, BANDWIDTH_LIMIT_MODE_CLIENT,
};

/// Proxy kinds understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProxyType {
    Tcp,
    Udp,
    Http,
    Https,
    TcpMux,
    Stcp,
    Sudp,
    Xtcp,
}

impl ProxyType {
    pub const ALL: [ProxyType; 8] = [
        Self::Tcp,
        Self::Udp,
        Self::Http,
        Self::Https,
        Self::TcpMux,
        Self::Stcp,
        Self::Sudp,
        Self::Xtcp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Http => "http",
            Self::Https => "https",
            Self::TcpMux => "tcpmux",
            Self::Stcp => "stcp",
            Self::Sudp => "sudp",
            Self::Xtcp => "xtcp",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownType {
                kind: "proxy",
                tag: s.to_string(),
            })
    }
}

/// Fields shared by every proxy type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyBaseConfig {
    pub name: String,

    /// Unset means enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadatas: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "is_default")]
    pub transport: ProxyTransport,

    #[serde(skip_serializing_if = "is_default")]
    pub load_balancer: LoadBalancerConfig,

    #[serde(skip_serializing_if = "is_default")]
    pub health_check: HealthCheckConfig,

    #[serde(rename = "localIP", skip_serializing_if = "String::is_empty")]
    pub local_ip: String,

    #[serde(skip_serializing_if = "is_default")]
    pub local_port: u16,

    /// Replaces the local address as the backend when set
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<ClientPluginOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TcpProxySpec {
    #[serde(skip_serializing_if = "is_default")]
    pub remote_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UdpProxySpec {
    #[serde(skip_serializing_if = "is_default")]
    pub remote_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpProxySpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_domains: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub subdomain: String,

    /// URL path prefixes routed to this proxy
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_user: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_password: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub host_header_rewrite: String,

    #[serde(skip_serializing_if = "HeaderOperations::is_empty")]
    pub request_headers: HeaderOperations,

    #[serde(skip_serializing_if = "HeaderOperations::is_empty")]
    pub response_headers: HeaderOperations,

    #[serde(rename = "routeByHTTPUser", skip_serializing_if = "String::is_empty")]
    pub route_by_http_user: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpsProxySpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_domains: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub subdomain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TcpMuxProxySpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_domains: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub subdomain: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_user: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_password: String,

    #[serde(rename = "routeByHTTPUser", skip_serializing_if = "String::is_empty")]
    pub route_by_http_user: String,

    /// Only `httpconnect` is supported
    #[serde(skip_serializing_if = "String::is_empty")]
    pub multiplexer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StcpProxySpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_key: String,

    /// Users allowed to visit; `*` allows everyone
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SudpProxySpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_key: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XtcpProxySpec {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_key: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_users: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat_traversal: Option<NatTraversalConfig>,
}

/// Type-specific part of a proxy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProxySpec {
    Tcp(TcpProxySpec),
    Udp(UdpProxySpec),
    Http(HttpProxySpec),
    Https(HttpsProxySpec),
    TcpMux(TcpMuxProxySpec),
    Stcp(StcpProxySpec),
    Sudp(SudpProxySpec),
    Xtcp(XtcpProxySpec),
}

impl ProxySpec {
    pub fn proxy_type(&self) -> ProxyType {
        match self {
            Self::Tcp(_) => ProxyType::Tcp,
            Self::Udp(_) => ProxyType::Udp,
            Self::Http(_) => ProxyType::Http,
            Self::Https(_) => ProxyType::Https,
            Self::TcpMux(_) => ProxyType::TcpMux,
            Self::Stcp(_) => ProxyType::Stcp,
            Self::Sudp(_) => ProxyType::Sudp,
            Self::Xtcp(_) => ProxyType::Xtcp,
        }
    }

    /// Empty spec for the given type
    pub fn default_for(proxy_type: ProxyType) -> Self {
        match proxy_type {
            ProxyType::Tcp => Self::Tcp(Default::default()),
            ProxyType::Udp => Self::Udp(Default::default()),
            ProxyType::Http => Self::Http(Default::default()),
            ProxyType::Https => Self::Https(Default::default()),
            ProxyType::TcpMux => Self::TcpMux(Default::default()),
            ProxyType::Stcp => Self::Stcp(Default::default()),
            ProxyType::Sudp => Self::Sudp(Default::default()),
            ProxyType::Xtcp => Self::Xtcp(Default::default()),
        }
    }
}

/// A proxy definition: shared base fields plus the type-specific part
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    pub base: ProxyBaseConfig,
    pub spec: ProxySpec,
}

impl ProxyConfig {
    pub fn new(name: impl Into<String>, spec: ProxySpec) -> Self {
        Self {
            base: ProxyBaseConfig {
                name: name.into(),
                ..Default::default()
            },
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn proxy_type(&self) -> ProxyType {
        self.spec.proxy_type()
    }

    /// Whether the proxy should run; an unset flag counts as enabled
    pub fn is_enabled(&self) -> bool {
        self.base.enabled.unwrap_or(true)
    }

    /// Decode a tagged JSON proxy document
    pub fn decode(bytes: &[u8], options: DecodeOptions) -> Result<Self, ConfigError> {
        Self::from_value(&parse_json(bytes)?, options)
    }

    pub fn from_value(value: &Value, options: DecodeOptions) -> Result<Self, ConfigError> {
        let object = as_object(value, "proxy")?;
        let proxy_type: ProxyType = read_tag(object, "proxy")?.parse()?;

        let mut fields = FieldTracker::new("proxy", &["type", "plugin"]);
        let mut base: ProxyBaseConfig = fields.decode(value)?;
        let spec = match proxy_type {
            ProxyType::Tcp => ProxySpec::Tcp(fields.decode(value)?),
            ProxyType::Udp => ProxySpec::Udp(fields.decode(value)?),
            ProxyType::Http => ProxySpec::Http(fields.decode(value)?),
            ProxyType::Https => ProxySpec::Https(fields.decode(value)?),
            ProxyType::TcpMux => ProxySpec::TcpMux(fields.decode(value)?),
            ProxyType::Stcp => ProxySpec::Stcp(fields.decode(value)?),
            ProxyType::Sudp => ProxySpec::Sudp(fields.decode(value)?),
            ProxyType::Xtcp => ProxySpec::Xtcp(fields.decode(value)?),
        };
        fields.finish(options)?;

        base.plugin = decode_optional(object.get("plugin"), options, ClientPluginOptions::from_value)?;
        Ok(Self { base, spec })
    }

    /// Encode as a tagged JSON document
    pub fn to_json(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Fill runtime defaults in place
    pub fn complete(&mut self) {
        fill_empty(&mut self.base.local_ip, "127.0.0.1");
        fill_empty(
            &mut self.base.transport.bandwidth_limit_mode,
            BANDWIDTH_LIMIT_MODE_CLIENT,
        );
        if let Some(plugin) = &mut self.base.plugin {
            plugin.complete();
        }
    }

    /// A completed clone, leaving `self` untouched
    pub fn completed(&self) -> Self {
        let mut cfg = self.clone();
        cfg.complete();
        cfg
    }
}

impl Serialize for ProxyConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged {
            tag: self.proxy_type().as_str(),
            base: &self.base,
            spec: &self.spec,
        }
        .serialize(serializer)
    }
}

/// Decodes with the process-wide strictness default
impl<'de> Deserialize<'de> for ProxyConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value, DecodeOptions::from_global()).map_err(D::Error::custom)
    }
}
