//! Typed configuration for the Burrow tunnel client
//!
//! Proxies, visitors and their plugins are closed sets of variants selected
//! by a `type` tag. Decoding takes explicit [`DecodeOptions`]; the
//! process-wide default only applies where callers ask for it.

mod common;
mod decode;
mod error;
mod load;
pub mod naming;
mod plugin;
mod proxy;
mod types;
pub mod validation;
mod visitor;

pub use common::{ClientCommonConfig, StoreConfig, WebServerConfig, FEATURE_VIRTUAL_NET};
pub use decode::{
    disallow_unknown_fields, set_disallow_unknown_fields, with_disallow_unknown_fields,
    DecodeOptions,
};
pub use error::ConfigError;
pub use load::{
    client_config_from_value, complete_proxies, complete_visitors, filter_client_configs,
    load_client_config, parse_client_config, ClientConfigResult, ConfigFormat,
};
pub use plugin::{
    ClientPluginOptions, Http2HttpPluginOptions, Http2HttpsPluginOptions, HttpProxyPluginOptions,
    Https2HttpPluginOptions, Https2HttpsPluginOptions, Socks5PluginOptions, StaticFilePluginOptions,
    Tls2RawPluginOptions, UnixDomainSocketPluginOptions, VirtualNetPluginOptions,
    VirtualNetVisitorPluginOptions, VisitorPluginOptions, PLUGIN_HTTP2HTTP, PLUGIN_HTTP2HTTPS,
    PLUGIN_HTTPS2HTTP, PLUGIN_HTTPS2HTTPS, PLUGIN_HTTP_PROXY, PLUGIN_SOCKS5, PLUGIN_STATIC_FILE,
    PLUGIN_TLS2RAW, PLUGIN_UNIX_DOMAIN_SOCKET, PLUGIN_VIRTUAL_NET,
};
pub use proxy::{
    HttpProxySpec, HttpsProxySpec, ProxyBaseConfig, ProxyConfig, ProxySpec, ProxyType,
    StcpProxySpec, SudpProxySpec, TcpMuxProxySpec, TcpProxySpec, UdpProxySpec, XtcpProxySpec,
};
pub use types::{
    HeaderOperations, HealthCheckConfig, HttpHeader, LoadBalancerConfig, NatTraversalConfig,
    ProxyTransport, VisitorTransport, BANDWIDTH_LIMIT_MODE_CLIENT, BANDWIDTH_LIMIT_MODE_SERVER,
};
pub use validation::ValidationError;
pub use visitor::{
    StcpVisitorSpec, SudpVisitorSpec, VisitorBaseConfig, VisitorConfig, VisitorSpec, VisitorType,
    XtcpVisitorSpec,
};
