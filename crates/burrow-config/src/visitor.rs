//! Visitor definitions: outbound connections to proxies exposed by a peer

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::decode::{as_object, parse_json, read_tag, DecodeOptions, FieldTracker, Tagged};
use crate::error::ConfigError;
use crate::plugin::{decode_optional, VisitorPluginOptions};
use crate::types::{fill_empty, fill_zero, is_default, is_false, NatTraversalConfig, VisitorTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VisitorType {
    Stcp,
    Sudp,
    Xtcp,
}

impl VisitorType {
    pub const ALL: [VisitorType; 3] = [Self::Stcp, Self::Sudp, Self::Xtcp];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stcp => "stcp",
            Self::Sudp => "sudp",
            Self::Xtcp => "xtcp",
        }
    }
}

impl fmt::Display for VisitorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitorType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownType {
                kind: "visitor",
                tag: s.to_string(),
            })
    }
}

/// Fields shared by every visitor type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitorBaseConfig {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "is_default")]
    pub transport: VisitorTransport,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub secret_key: String,

    /// Owner of the target proxy; empty means our own user
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_user: String,

    /// Name of the target proxy
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub bind_addr: String,

    /// Local listener port; -1 disables the listener
    #[serde(skip_serializing_if = "is_default")]
    pub bind_port: i32,

    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<VisitorPluginOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StcpVisitorSpec {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SudpVisitorSpec {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XtcpVisitorSpec {
    /// `quic` or `kcp`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    #[serde(skip_serializing_if = "is_false")]
    pub keep_tunnel_open: bool,

    #[serde(skip_serializing_if = "is_default")]
    pub max_retries_an_hour: u32,

    /// Seconds between hole punching attempts
    #[serde(skip_serializing_if = "is_default")]
    pub min_retry_interval: u32,

    /// Visitor to fall back to when hole punching fails
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fallback_to: String,

    #[serde(skip_serializing_if = "is_default")]
    pub fallback_timeout_ms: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat_traversal: Option<NatTraversalConfig>,
}

impl XtcpVisitorSpec {
    fn complete(&mut self) {
        fill_empty(&mut self.protocol, "quic");
        fill_zero(&mut self.max_retries_an_hour, 8);
        fill_zero(&mut self.min_retry_interval, 90);
        fill_zero(&mut self.fallback_timeout_ms, 1000);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VisitorSpec {
    Stcp(StcpVisitorSpec),
    Sudp(SudpVisitorSpec),
    Xtcp(XtcpVisitorSpec),
}

impl VisitorSpec {
    pub fn visitor_type(&self) -> VisitorType {
        match self {
            Self::Stcp(_) => VisitorType::Stcp,
            Self::Sudp(_) => VisitorType::Sudp,
            Self::Xtcp(_) => VisitorType::Xtcp,
        }
    }
}

/// A visitor definition
#[derive(Debug, Clone, PartialEq)]
pub struct VisitorConfig {
    pub base: VisitorBaseConfig,
    pub spec: VisitorSpec,
}

impl VisitorConfig {
    pub fn new(name: impl Into<String>, spec: VisitorSpec) -> Self {
        Self {
            base: VisitorBaseConfig {
                name: name.into(),
                ..Default::default()
            },
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn visitor_type(&self) -> VisitorType {
        self.spec.visitor_type()
    }

    pub fn is_enabled(&self) -> bool {
        self.base.enabled.unwrap_or(true)
    }

    pub fn decode(bytes: &[u8], options: DecodeOptions) -> Result<Self, ConfigError> {
        Self::from_value(&parse_json(bytes)?, options)
    }

    pub fn from_value(value: &Value, options: DecodeOptions) -> Result<Self, ConfigError> {
        let object = as_object(value, "visitor")?;
        let visitor_type: VisitorType = read_tag(object, "visitor")?.parse()?;

        let mut fields = FieldTracker::new("visitor", &["type", "plugin"]);
        let mut base: VisitorBaseConfig = fields.decode(value)?;
        let spec = match visitor_type {
            VisitorType::Stcp => VisitorSpec::Stcp(fields.decode(value)?),
            VisitorType::Sudp => VisitorSpec::Sudp(fields.decode(value)?),
            VisitorType::Xtcp => VisitorSpec::Xtcp(fields.decode(value)?),
        };
        fields.finish(options)?;

        base.plugin = decode_optional(object.get("plugin"), options, VisitorPluginOptions::from_value)?;
        Ok(Self { base, spec })
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Fill runtime defaults in place
    pub fn complete(&mut self) {
        fill_empty(&mut self.base.bind_addr, "127.0.0.1");
        if let Some(plugin) = &mut self.base.plugin {
            plugin.complete();
        }
        if let VisitorSpec::Xtcp(spec) = &mut self.spec {
            spec.complete();
        }
    }

    pub fn completed(&self) -> Self {
        let mut cfg = self.clone();
        cfg.complete();
        cfg
    }
}

impl Serialize for VisitorConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged {
            tag: self.visitor_type().as_str(),
            base: &self.base,
            spec: &self.spec,
        }
        .serialize(serializer)
    }
}

/// Decodes with the process-wide strictness default
impl<'de> Deserialize<'de> for VisitorConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value, DecodeOptions::from_global()).map_err(D::Error::custom)
    }
}
