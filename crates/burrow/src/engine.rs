//! The seam between configuration and the tunnel data plane
//!
//! The manager hands every effective config set to a [`TunnelEngine`]. The
//! [`StatusRegistry`] is the engine side that tracks per-proxy working status
//! for the data plane to report into.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use burrow_config::naming::build_target_server_proxy_name;
use burrow_config::{ClientCommonConfig, ProxyConfig, ProxyType, VisitorConfig};
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from applying configuration to the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is closed")]
    Closed,

    #[error("engine rejected config: {0}")]
    Rejected(String),
}

/// Receives the effective configuration and runs it
pub trait TunnelEngine: Send + Sync {
    /// Replace the running proxies and visitors with the given completed set
    fn update_config_source(
        &self,
        common: &ClientCommonConfig,
        proxies: Vec<ProxyConfig>,
        visitors: Vec<VisitorConfig>,
    ) -> Result<(), EngineError>;

    /// Snapshot of every proxy's working status
    fn proxy_status(&self) -> Vec<WorkingStatus>;

    /// Stop all proxies, giving in-flight work `grace` to finish
    fn graceful_close(&self, grace: Duration);
}

/// Lifecycle phase of a running proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyPhase {
    New,
    WaitStart,
    StartErr,
    Running,
    CheckFailed,
    Closed,
}

impl ProxyPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::WaitStart => "wait start",
            Self::StartErr => "start error",
            Self::Running => "running",
            Self::CheckFailed => "check failed",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ProxyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working status of one proxy
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingStatus {
    pub name: String,
    pub proxy_type: ProxyType,
    pub phase: ProxyPhase,
    /// Last error reported by the data plane, empty when healthy
    pub err: String,
    /// Address the server exposes the proxy on
    pub remote_addr: String,
    /// Completed config the proxy runs with
    pub cfg: ProxyConfig,
}

impl WorkingStatus {
    fn waiting(cfg: ProxyConfig) -> Self {
        Self {
            name: cfg.name().to_string(),
            proxy_type: cfg.proxy_type(),
            phase: ProxyPhase::WaitStart,
            err: String::new(),
            remote_addr: String::new(),
            cfg,
        }
    }
}

/// Engine that keeps the working status table of every configured proxy
pub struct StatusRegistry {
    /// Proxy name -> working status
    statuses: DashMap<String, WorkingStatus>,
    /// Visitor name -> server-side name of the proxy it connects to
    visitors: DashMap<String, String>,
    closed: AtomicBool,
}

impl StatusRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a phase change pushed by the data plane
    ///
    /// Returns `false` when the proxy is not configured.
    pub fn report(
        &self,
        name: &str,
        phase: ProxyPhase,
        err: impl Into<String>,
        remote_addr: impl Into<String>,
    ) -> bool {
        match self.statuses.get_mut(name) {
            Some(mut status) => {
                status.phase = phase;
                status.err = err.into();
                status.remote_addr = remote_addr.into();
                debug!("Proxy {} is now {}", name, phase);
                true
            }
            None => false,
        }
    }

    pub fn status(&self, name: &str) -> Option<WorkingStatus> {
        self.statuses.get(name).map(|s| s.clone())
    }

    /// Server-side proxy name a visitor targets
    pub fn visitor_target(&self, name: &str) -> Option<String> {
        self.visitors.get(name).map(|t| t.clone())
    }

    pub fn visitor_count(&self) -> usize {
        self.visitors.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self {
            statuses: DashMap::new(),
            visitors: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }
}

impl TunnelEngine for StatusRegistry {
    fn update_config_source(
        &self,
        common: &ClientCommonConfig,
        proxies: Vec<ProxyConfig>,
        visitors: Vec<VisitorConfig>,
    ) -> Result<(), EngineError> {
        if self.is_closed() {
            return Err(EngineError::Closed);
        }

        let (proxy_count, visitor_count) = (proxies.len(), visitors.len());

        self.statuses
            .retain(|name, _| proxies.iter().any(|p| p.name() == name));
        for cfg in proxies {
            let unchanged = self
                .statuses
                .get(cfg.name())
                .is_some_and(|status| status.cfg == cfg);
            if !unchanged {
                self.statuses
                    .insert(cfg.name().to_string(), WorkingStatus::waiting(cfg));
            }
        }

        self.visitors.clear();
        for cfg in visitors {
            let target = build_target_server_proxy_name(
                &common.user,
                &cfg.base.server_user,
                &cfg.base.server_name,
            );
            self.visitors.insert(cfg.base.name, target);
        }

        info!(
            "Applied config with {} proxies and {} visitors",
            proxy_count, visitor_count
        );
        Ok(())
    }

    fn proxy_status(&self) -> Vec<WorkingStatus> {
        self.statuses.iter().map(|s| s.value().clone()).collect()
    }

    fn graceful_close(&self, grace: Duration) {
        self.closed.store(true, Ordering::SeqCst);
        for mut status in self.statuses.iter_mut() {
            status.phase = ProxyPhase::Closed;
        }
        info!("Closed all proxies (grace period {:?})", grace);
    }
}
