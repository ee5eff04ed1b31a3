//! Validation of decoded configs
//!
//! Everything here is a pure function over completed configs.

use std::collections::HashSet;

use thiserror::Error;

use crate::common::{ClientCommonConfig, FEATURE_VIRTUAL_NET};
use crate::plugin::{ClientPluginOptions, VisitorPluginOptions, PLUGIN_VIRTUAL_NET};
use crate::proxy::{ProxyConfig, ProxySpec, ProxyType};
use crate::types::{BANDWIDTH_LIMIT_MODE_CLIENT, BANDWIDTH_LIMIT_MODE_SERVER};
use crate::visitor::{VisitorConfig, VisitorSpec};

/// Upper bound on the combined size of a proxy's annotation keys and values
pub const MAX_ANNOTATIONS_SIZE: usize = 256 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("serverPort must not be 0")]
    ServerPort,

    #[error("store.path is required when the store is enabled")]
    EmptyStorePath,

    #[error("webServer.addr is required when webServer.port is set")]
    WebServerAddr,

    #[error("name is required")]
    EmptyName,

    #[error("annotation keys must not be empty")]
    EmptyAnnotationKey,

    #[error("annotations are {size} bytes, the limit is {limit}")]
    AnnotationsTooLarge { size: usize, limit: usize },

    #[error("unsupported proxyProtocolVersion: {0}")]
    ProxyProtocolVersion(String),

    #[error("bandwidthLimitMode must be client or server, got {0:?}")]
    BandwidthLimitMode(String),

    #[error("localPort or plugin is required")]
    MissingBackend,

    #[error("unsupported healthCheck.type: {0}")]
    HealthCheckType(String),

    #[error("healthCheck.path is required for http health checks")]
    HealthCheckPath,

    #[error("{field} is required for the {plugin} plugin")]
    PluginField {
        plugin: &'static str,
        field: &'static str,
    },

    #[error("customDomains or subdomain is required for {0} proxies")]
    MissingDomain(ProxyType),

    #[error("unsupported tcpmux multiplexer: {0:?}")]
    Multiplexer(String),

    #[error("allowUsers entries must not be empty")]
    EmptyAllowUser,

    #[error("serverName is required")]
    EmptyServerName,

    #[error("bindPort {0} is out of range")]
    BindPort(i32),

    #[error("bindPort 0 requires a visitor plugin")]
    BindPortWithoutPlugin,

    #[error("unsupported xtcp protocol: {0}")]
    VisitorProtocol(String),

    #[error("{0} proxies cannot use plugins")]
    PluginNotAllowed(ProxyType),

    #[error("the {plugin} plugin requires the {gate} feature gate")]
    FeatureGateDisabled {
        plugin: &'static str,
        gate: &'static str,
    },

    #[error("duplicate proxy name: {0}")]
    DuplicateProxy(String),

    #[error("duplicate visitor name: {0}")]
    DuplicateVisitor(String),

    #[error("proxy [{name}]: {source}")]
    Proxy {
        name: String,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("visitor [{name}]: {source}")]
    Visitor {
        name: String,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    fn proxy(name: &str, source: ValidationError) -> Self {
        Self::Proxy {
            name: name.to_string(),
            source: Box::new(source),
        }
    }

    fn visitor(name: &str, source: ValidationError) -> Self {
        Self::Visitor {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}

pub fn validate_common(common: &ClientCommonConfig) -> Result<(), ValidationError> {
    if common.server_port == 0 {
        return Err(ValidationError::ServerPort);
    }
    if let Some(store) = &common.store {
        if store.path.is_empty() {
            return Err(ValidationError::EmptyStorePath);
        }
    }
    if common.web_server.port > 0 && common.web_server.addr.is_empty() {
        return Err(ValidationError::WebServerAddr);
    }
    Ok(())
}

/// Validate one completed proxy on its own
pub fn validate_proxy(cfg: &ProxyConfig) -> Result<(), ValidationError> {
    let base = &cfg.base;
    if base.name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let mut size = 0;
    for (key, value) in &base.annotations {
        if key.is_empty() {
            return Err(ValidationError::EmptyAnnotationKey);
        }
        size += key.len() + value.len();
    }
    if size > MAX_ANNOTATIONS_SIZE {
        return Err(ValidationError::AnnotationsTooLarge {
            size,
            limit: MAX_ANNOTATIONS_SIZE,
        });
    }

    let transport = &base.transport;
    if !matches!(transport.proxy_protocol_version.as_str(), "" | "v1" | "v2") {
        return Err(ValidationError::ProxyProtocolVersion(
            transport.proxy_protocol_version.clone(),
        ));
    }
    if transport.bandwidth_limit_mode != BANDWIDTH_LIMIT_MODE_CLIENT
        && transport.bandwidth_limit_mode != BANDWIDTH_LIMIT_MODE_SERVER
    {
        return Err(ValidationError::BandwidthLimitMode(
            transport.bandwidth_limit_mode.clone(),
        ));
    }

    match &base.plugin {
        Some(plugin) => validate_client_plugin(plugin)?,
        None if base.local_port == 0 => return Err(ValidationError::MissingBackend),
        None => {}
    }

    let health_check = &base.health_check;
    match health_check.check_type.as_str() {
        "" | "tcp" => {}
        "http" if health_check.path.is_empty() => return Err(ValidationError::HealthCheckPath),
        "http" => {}
        other => return Err(ValidationError::HealthCheckType(other.to_string())),
    }

    validate_proxy_spec(cfg.proxy_type(), &cfg.spec)
}

fn validate_proxy_spec(proxy_type: ProxyType, spec: &ProxySpec) -> Result<(), ValidationError> {
    match spec {
        ProxySpec::Tcp(_) | ProxySpec::Udp(_) => Ok(()),
        ProxySpec::Http(s) => require_domain(proxy_type, &s.custom_domains, &s.subdomain),
        ProxySpec::Https(s) => require_domain(proxy_type, &s.custom_domains, &s.subdomain),
        ProxySpec::TcpMux(s) => {
            require_domain(proxy_type, &s.custom_domains, &s.subdomain)?;
            if s.multiplexer != "httpconnect" {
                return Err(ValidationError::Multiplexer(s.multiplexer.clone()));
            }
            Ok(())
        }
        ProxySpec::Stcp(s) => check_allow_users(&s.allow_users),
        ProxySpec::Sudp(s) => check_allow_users(&s.allow_users),
        ProxySpec::Xtcp(s) => check_allow_users(&s.allow_users),
    }
}

fn require_domain(
    proxy_type: ProxyType,
    custom_domains: &[String],
    subdomain: &str,
) -> Result<(), ValidationError> {
    if custom_domains.is_empty() && subdomain.is_empty() {
        Err(ValidationError::MissingDomain(proxy_type))
    } else {
        Ok(())
    }
}

fn check_allow_users(allow_users: &[String]) -> Result<(), ValidationError> {
    if allow_users.iter().any(String::is_empty) {
        Err(ValidationError::EmptyAllowUser)
    } else {
        Ok(())
    }
}

fn validate_client_plugin(plugin: &ClientPluginOptions) -> Result<(), ValidationError> {
    let name = plugin.plugin_type();
    match plugin {
        ClientPluginOptions::Http2Https(o) => require_plugin_field(name, &o.local_addr, "localAddr"),
        ClientPluginOptions::Https2Http(o) => require_plugin_field(name, &o.local_addr, "localAddr"),
        ClientPluginOptions::Https2Https(o) => {
            require_plugin_field(name, &o.local_addr, "localAddr")
        }
        ClientPluginOptions::Http2Http(o) => require_plugin_field(name, &o.local_addr, "localAddr"),
        ClientPluginOptions::Tls2Raw(o) => require_plugin_field(name, &o.local_addr, "localAddr"),
        ClientPluginOptions::StaticFile(o) => require_plugin_field(name, &o.local_path, "localPath"),
        ClientPluginOptions::UnixDomainSocket(o) => {
            require_plugin_field(name, &o.unix_path, "unixPath")
        }
        ClientPluginOptions::HttpProxy(_)
        | ClientPluginOptions::Socks5(_)
        | ClientPluginOptions::VirtualNet(_) => Ok(()),
    }
}

fn require_plugin_field(
    plugin: &'static str,
    value: &str,
    field: &'static str,
) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(ValidationError::PluginField { plugin, field })
    } else {
        Ok(())
    }
}

/// Validate one completed visitor on its own
pub fn validate_visitor(cfg: &VisitorConfig) -> Result<(), ValidationError> {
    let base = &cfg.base;
    if base.name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if base.server_name.is_empty() {
        return Err(ValidationError::EmptyServerName);
    }

    match base.bind_port {
        -1 | 1..=65535 => {}
        0 if base.plugin.is_none() => return Err(ValidationError::BindPortWithoutPlugin),
        0 => {}
        other => return Err(ValidationError::BindPort(other)),
    }

    if let Some(VisitorPluginOptions::VirtualNet(o)) = &base.plugin {
        require_plugin_field(PLUGIN_VIRTUAL_NET, &o.destination_ip, "destinationIP")?;
    }

    if let VisitorSpec::Xtcp(spec) = &cfg.spec {
        if !matches!(spec.protocol.as_str(), "" | "quic" | "kcp") {
            return Err(ValidationError::VisitorProtocol(spec.protocol.clone()));
        }
    }
    Ok(())
}

/// Checks that depend on the proxy type and the client-wide settings
pub fn validate_plugin_legality(
    common: &ClientCommonConfig,
    cfg: &ProxyConfig,
) -> Result<(), ValidationError> {
    let Some(plugin) = &cfg.base.plugin else {
        return Ok(());
    };
    let proxy_type = cfg.proxy_type();
    if matches!(proxy_type, ProxyType::Udp | ProxyType::Sudp) {
        return Err(ValidationError::PluginNotAllowed(proxy_type));
    }
    if matches!(plugin, ClientPluginOptions::VirtualNet(_)) {
        require_gate(common, plugin.plugin_type(), FEATURE_VIRTUAL_NET)?;
    }
    Ok(())
}

pub fn validate_visitor_plugin_legality(
    common: &ClientCommonConfig,
    cfg: &VisitorConfig,
) -> Result<(), ValidationError> {
    match &cfg.base.plugin {
        Some(plugin @ VisitorPluginOptions::VirtualNet(_)) => {
            require_gate(common, plugin.plugin_type(), FEATURE_VIRTUAL_NET)
        }
        None => Ok(()),
    }
}

fn require_gate(
    common: &ClientCommonConfig,
    plugin: &'static str,
    gate: &'static str,
) -> Result<(), ValidationError> {
    if common.feature_enabled(gate) {
        Ok(())
    } else {
        Err(ValidationError::FeatureGateDisabled { plugin, gate })
    }
}

/// Full check of one proxy, wrapped with its name
pub fn validate_proxy_with(
    common: &ClientCommonConfig,
    cfg: &ProxyConfig,
) -> Result<(), ValidationError> {
    validate_proxy(cfg)
        .and_then(|()| validate_plugin_legality(common, cfg))
        .map_err(|err| ValidationError::proxy(cfg.name(), err))
}

/// Full check of one visitor, wrapped with its name
pub fn validate_visitor_with(
    common: &ClientCommonConfig,
    cfg: &VisitorConfig,
) -> Result<(), ValidationError> {
    validate_visitor(cfg)
        .and_then(|()| validate_visitor_plugin_legality(common, cfg))
        .map_err(|err| ValidationError::visitor(cfg.name(), err))
}

/// Validate a whole completed config set, including name uniqueness
pub fn validate_all(
    common: &ClientCommonConfig,
    proxies: &[ProxyConfig],
    visitors: &[VisitorConfig],
) -> Result<(), ValidationError> {
    validate_common(common)?;

    let mut names = HashSet::new();
    for cfg in proxies {
        validate_proxy_with(common, cfg)?;
        if !names.insert(cfg.name()) {
            return Err(ValidationError::DuplicateProxy(cfg.name().to_string()));
        }
    }

    let mut names = HashSet::new();
    for cfg in visitors {
        validate_visitor_with(common, cfg)?;
        if !names.insert(cfg.name()) {
            return Err(ValidationError::DuplicateVisitor(cfg.name().to_string()));
        }
    }
    Ok(())
}
