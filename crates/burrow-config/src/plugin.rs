//! Backend plugins attached to proxies and visitors
//!
//! Each plugin kind is a concrete options struct; the enums select one by
//! the `type` tag.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::decode::{as_object, parse_json, read_tag, DecodeOptions, FieldTracker, NoFields, Tagged};
use crate::error::ConfigError;
use crate::types::HeaderOperations;

pub const PLUGIN_HTTP2HTTPS: &str = "http2https";
pub const PLUGIN_HTTP_PROXY: &str = "http_proxy";
pub const PLUGIN_HTTPS2HTTP: &str = "https2http";
pub const PLUGIN_HTTPS2HTTPS: &str = "https2https";
pub const PLUGIN_HTTP2HTTP: &str = "http2http";
pub const PLUGIN_SOCKS5: &str = "socks5";
pub const PLUGIN_STATIC_FILE: &str = "static_file";
pub const PLUGIN_UNIX_DOMAIN_SOCKET: &str = "unix_domain_socket";
pub const PLUGIN_TLS2RAW: &str = "tls2raw";
pub const PLUGIN_VIRTUAL_NET: &str = "virtual_net";

/// Plugin serving a proxy's traffic instead of a local address
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPluginOptions {
    Http2Https(Http2HttpsPluginOptions),
    HttpProxy(HttpProxyPluginOptions),
    Https2Http(Https2HttpPluginOptions),
    Https2Https(Https2HttpsPluginOptions),
    Http2Http(Http2HttpPluginOptions),
    Socks5(Socks5PluginOptions),
    StaticFile(StaticFilePluginOptions),
    UnixDomainSocket(UnixDomainSocketPluginOptions),
    Tls2Raw(Tls2RawPluginOptions),
    VirtualNet(VirtualNetPluginOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Http2HttpsPluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host_header_rewrite: String,
    #[serde(skip_serializing_if = "HeaderOperations::is_empty")]
    pub request_headers: HeaderOperations,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpProxyPluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Https2HttpPluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host_header_rewrite: String,
    #[serde(skip_serializing_if = "HeaderOperations::is_empty")]
    pub request_headers: HeaderOperations,
    #[serde(rename = "enableHTTP2", skip_serializing_if = "Option::is_none")]
    pub enable_http2: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub crt_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Https2HttpsPluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host_header_rewrite: String,
    #[serde(skip_serializing_if = "HeaderOperations::is_empty")]
    pub request_headers: HeaderOperations,
    #[serde(rename = "enableHTTP2", skip_serializing_if = "Option::is_none")]
    pub enable_http2: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub crt_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Http2HttpPluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host_header_rewrite: String,
    #[serde(skip_serializing_if = "HeaderOperations::is_empty")]
    pub request_headers: HeaderOperations,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Socks5PluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticFilePluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub strip_prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnixDomainSocketPluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unix_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tls2RawPluginOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_addr: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub crt_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualNetPluginOptions {}

impl ClientPluginOptions {
    /// The `type` tag of this plugin
    pub fn plugin_type(&self) -> &'static str {
        match self {
            Self::Http2Https(_) => PLUGIN_HTTP2HTTPS,
            Self::HttpProxy(_) => PLUGIN_HTTP_PROXY,
            Self::Https2Http(_) => PLUGIN_HTTPS2HTTP,
            Self::Https2Https(_) => PLUGIN_HTTPS2HTTPS,
            Self::Http2Http(_) => PLUGIN_HTTP2HTTP,
            Self::Socks5(_) => PLUGIN_SOCKS5,
            Self::StaticFile(_) => PLUGIN_STATIC_FILE,
            Self::UnixDomainSocket(_) => PLUGIN_UNIX_DOMAIN_SOCKET,
            Self::Tls2Raw(_) => PLUGIN_TLS2RAW,
            Self::VirtualNet(_) => PLUGIN_VIRTUAL_NET,
        }
    }

    /// Decode a tagged plugin document
    pub fn decode(bytes: &[u8], options: DecodeOptions) -> Result<Self, ConfigError> {
        Self::from_value(&parse_json(bytes)?, options)
    }

    pub fn from_value(value: &Value, options: DecodeOptions) -> Result<Self, ConfigError> {
        let object = as_object(value, "plugin")?;
        let tag = read_tag(object, "plugin")?;
        let mut fields = FieldTracker::new("plugin", &["type"]);
        let plugin = match tag {
            PLUGIN_HTTP2HTTPS => Self::Http2Https(fields.decode(value)?),
            PLUGIN_HTTP_PROXY => Self::HttpProxy(fields.decode(value)?),
            PLUGIN_HTTPS2HTTP => Self::Https2Http(fields.decode(value)?),
            PLUGIN_HTTPS2HTTPS => Self::Https2Https(fields.decode(value)?),
            PLUGIN_HTTP2HTTP => Self::Http2Http(fields.decode(value)?),
            PLUGIN_SOCKS5 => Self::Socks5(fields.decode(value)?),
            PLUGIN_STATIC_FILE => Self::StaticFile(fields.decode(value)?),
            PLUGIN_UNIX_DOMAIN_SOCKET => Self::UnixDomainSocket(fields.decode(value)?),
            PLUGIN_TLS2RAW => Self::Tls2Raw(fields.decode(value)?),
            PLUGIN_VIRTUAL_NET => Self::VirtualNet(fields.decode(value)?),
            other => {
                return Err(ConfigError::UnknownType {
                    kind: "plugin",
                    tag: other.to_string(),
                })
            }
        };
        fields.finish(options)?;
        Ok(plugin)
    }

    /// Fill runtime defaults
    pub fn complete(&mut self) {
        match self {
            Self::Https2Http(o) => {
                o.enable_http2.get_or_insert(true);
            }
            Self::Https2Https(o) => {
                o.enable_http2.get_or_insert(true);
            }
            _ => {}
        }
    }
}

impl Serialize for ClientPluginOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tag = self.plugin_type();
        match self {
            Self::Http2Https(o) => tagged(tag, o, serializer),
            Self::HttpProxy(o) => tagged(tag, o, serializer),
            Self::Https2Http(o) => tagged(tag, o, serializer),
            Self::Https2Https(o) => tagged(tag, o, serializer),
            Self::Http2Http(o) => tagged(tag, o, serializer),
            Self::Socks5(o) => tagged(tag, o, serializer),
            Self::StaticFile(o) => tagged(tag, o, serializer),
            Self::UnixDomainSocket(o) => tagged(tag, o, serializer),
            Self::Tls2Raw(o) => tagged(tag, o, serializer),
            Self::VirtualNet(o) => tagged(tag, o, serializer),
        }
    }
}

fn tagged<T: Serialize, S: Serializer>(tag: &str, body: &T, serializer: S) -> Result<S::Ok, S::Error> {
    Tagged {
        tag,
        base: body,
        spec: &NoFields {},
    }
    .serialize(serializer)
}

/// Plugin attached to a visitor
#[derive(Debug, Clone, PartialEq)]
pub enum VisitorPluginOptions {
    VirtualNet(VirtualNetVisitorPluginOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualNetVisitorPluginOptions {
    /// Address routed through the virtual network
    #[serde(rename = "destinationIP", skip_serializing_if = "String::is_empty")]
    pub destination_ip: String,
}

impl VisitorPluginOptions {
    pub fn plugin_type(&self) -> &'static str {
        match self {
            Self::VirtualNet(_) => PLUGIN_VIRTUAL_NET,
        }
    }

    pub fn decode(bytes: &[u8], options: DecodeOptions) -> Result<Self, ConfigError> {
        Self::from_value(&parse_json(bytes)?, options)
    }

    pub fn from_value(value: &Value, options: DecodeOptions) -> Result<Self, ConfigError> {
        let object = as_object(value, "visitor plugin")?;
        let tag = read_tag(object, "visitor plugin")?;
        let mut fields = FieldTracker::new("visitor plugin", &["type"]);
        let plugin = match tag {
            PLUGIN_VIRTUAL_NET => Self::VirtualNet(fields.decode(value)?),
            other => {
                return Err(ConfigError::UnknownType {
                    kind: "visitor plugin",
                    tag: other.to_string(),
                })
            }
        };
        fields.finish(options)?;
        Ok(plugin)
    }

    pub fn complete(&mut self) {}
}

impl Serialize for VisitorPluginOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::VirtualNet(o) => tagged(self.plugin_type(), o, serializer),
        }
    }
}

/// Decode the optional `plugin` member of a proxy or visitor document
pub(crate) fn decode_optional<T>(
    value: Option<&Value>,
    options: DecodeOptions,
    decode: impl FnOnce(&Value, DecodeOptions) -> Result<T, ConfigError>,
) -> Result<Option<T>, ConfigError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => decode(value, options).map(Some),
    }
}
