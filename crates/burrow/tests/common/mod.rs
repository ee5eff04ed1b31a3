//! Shared fixtures for manager and API tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use burrow::{ConfigManager, EngineError, StatusRegistry, TunnelEngine, WorkingStatus};
use burrow_config::{
    ClientCommonConfig, DecodeOptions, ProxyConfig, ProxySpec, StcpVisitorSpec, TcpProxySpec,
    VisitorConfig, VisitorSpec,
};
use tempfile::TempDir;

/// Initialize tracing for tests
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("burrow=debug,burrow_source=debug,burrow_config=debug")
        .with_test_writer()
        .try_init();
}

/// Engine that records statuses and can be told to reject updates
pub struct TestEngine {
    registry: Arc<StatusRegistry>,
    /// Whether to reject the next updates
    fail_update: AtomicBool,
    /// Number of accepted updates
    updates: AtomicUsize,
}

impl TestEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: StatusRegistry::new(),
            fail_update: AtomicBool::new(false),
            updates: AtomicUsize::new(0),
        })
    }

    pub fn registry(&self) -> &StatusRegistry {
        &self.registry
    }

    pub fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Sorted names of the proxies the engine currently runs
    pub fn proxy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .proxy_status()
            .into_iter()
            .map(|s| s.name)
            .collect();
        names.sort();
        names
    }
}

impl TunnelEngine for TestEngine {
    fn update_config_source(
        &self,
        common: &ClientCommonConfig,
        proxies: Vec<ProxyConfig>,
        visitors: Vec<VisitorConfig>,
    ) -> Result<(), EngineError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(EngineError::Rejected("simulated failure".to_string()));
        }
        self.registry.update_config_source(common, proxies, visitors)?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn proxy_status(&self) -> Vec<WorkingStatus> {
        self.registry.proxy_status()
    }

    fn graceful_close(&self, grace: Duration) {
        self.registry.graceful_close(grace)
    }
}

/// A config file in a temp dir, loaded into a manager
pub struct Fixture {
    pub dir: TempDir,
    pub config_path: PathBuf,
    pub store_path: Option<PathBuf>,
    pub engine: Arc<TestEngine>,
    pub manager: Arc<ConfigManager>,
}

impl Fixture {
    /// Load `body` (top-level keys and `[[proxies]]`/`[[visitors]]` tables)
    /// with the store enabled
    pub fn with_store(body: &str) -> Self {
        Self::start(body, true)
    }

    pub fn without_store(body: &str) -> Self {
        Self::start(body, false)
    }

    fn start(body: &str, store: bool) -> Self {
        init_test();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("burrow.toml");
        let store_path = store.then(|| dir.path().join("store").join("store.json"));

        std::fs::write(&config_path, render_config(body, store_path.as_ref())).unwrap();

        let engine = TestEngine::new();
        let manager =
            ConfigManager::load(config_path.clone(), DecodeOptions::lenient(), engine.clone())
                .unwrap();

        Self {
            dir,
            config_path,
            store_path,
            engine,
            manager: Arc::new(manager),
        }
    }

    /// Replace the config file, keeping the store section
    pub fn rewrite_config(&self, body: &str) {
        std::fs::write(
            &self.config_path,
            render_config(body, self.store_path.as_ref()),
        )
        .unwrap();
    }
}

fn render_config(body: &str, store_path: Option<&PathBuf>) -> String {
    let mut content = format!("serverAddr = \"tunnel.example.com\"\n{}\n", body);
    if let Some(path) = store_path {
        content.push_str(&format!("\n[store]\npath = \"{}\"\n", path.display()));
    }
    content
}

pub fn tcp_proxy(name: &str, local_port: u16) -> ProxyConfig {
    let mut cfg = ProxyConfig::new(name, ProxySpec::Tcp(TcpProxySpec::default()));
    cfg.base.local_port = local_port;
    cfg
}

pub fn stcp_visitor(name: &str, server_name: &str, bind_port: i32) -> VisitorConfig {
    let mut cfg = VisitorConfig::new(name, VisitorSpec::Stcp(StcpVisitorSpec {}));
    cfg.base.server_name = server_name.to_string();
    cfg.base.bind_port = bind_port;
    cfg
}

pub const SSH_PROXY: &str = r#"
[[proxies]]
name = "ssh"
type = "tcp"
localPort = 22
remotePort = 6000
"#;
