//! Config manager scenarios spanning the config file, the store and the engine

mod common;

use std::sync::Arc;
use std::time::Duration;

use burrow::{ConfigManager, ManagerError};
use burrow_config::{
    disallow_unknown_fields, with_disallow_unknown_fields, ClientCommonConfig,
    ClientPluginOptions, DecodeOptions, ProxySpec, VirtualNetPluginOptions,
};
use burrow_source::{StoreSource, StoreSourceConfig};
use common::{stcp_visitor, tcp_proxy, Fixture, TestEngine, SSH_PROXY};

#[test]
fn test_load_applies_file_proxies() {
    let fixture = Fixture::with_store(SSH_PROXY);

    assert_eq!(fixture.engine.proxy_names(), vec!["ssh"]);
    assert!(fixture.manager.store_enabled());

    let common = fixture.manager.common();
    assert_eq!(common.server_addr, "tunnel.example.com");
    assert_eq!(common.server_port, 7000);
}

#[test]
fn test_create_store_proxy_applies_it() {
    let fixture = Fixture::with_store(SSH_PROXY);

    fixture.manager.create_store_proxy(tcp_proxy("web", 8080)).unwrap();

    assert_eq!(fixture.engine.proxy_names(), vec!["ssh", "web"]);
    assert!(fixture.manager.is_store_proxy_enabled("web"));
    assert!(!fixture.manager.is_store_proxy_enabled("ssh"));
}

#[test]
fn test_double_create_is_conflict() {
    let fixture = Fixture::with_store("");

    fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)).unwrap();
    let err = fixture
        .manager
        .create_store_proxy(tcp_proxy("p1", 9090))
        .unwrap_err();

    assert!(matches!(err, ManagerError::Conflict(_)));
    let stored = fixture.manager.list_store_proxies().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].base.local_port, 8080);
}

#[test]
fn test_create_conflicts_with_config_file_name() {
    let fixture = Fixture::with_store(SSH_PROXY);

    let err = fixture
        .manager
        .create_store_proxy(tcp_proxy("ssh", 2222))
        .unwrap_err();

    assert!(matches!(err, ManagerError::Conflict(ref msg) if msg.contains("ssh")));
    assert!(fixture.manager.list_store_proxies().unwrap().is_empty());
}

#[test]
fn test_apply_failure_keeps_store_change() {
    let fixture = Fixture::with_store("");
    fixture.engine.set_fail_update(true);

    let err = fixture
        .manager
        .create_store_proxy(tcp_proxy("p1", 8080))
        .unwrap_err();

    assert!(matches!(err, ManagerError::ApplyConfig(_)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(fixture.manager.get_store_proxy("p1").unwrap().name(), "p1");

    // The next successful mutation applies the full set again
    fixture.engine.set_fail_update(false);
    fixture.manager.create_store_proxy(tcp_proxy("p2", 8081)).unwrap();
    assert_eq!(fixture.engine.proxy_names(), vec!["p1", "p2"]);
}

#[test]
fn test_store_disabled() {
    let fixture = Fixture::without_store(SSH_PROXY);

    assert!(!fixture.manager.store_enabled());
    assert!(matches!(
        fixture.manager.list_store_proxies(),
        Err(ManagerError::StoreDisabled)
    ));
    assert!(matches!(
        fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)),
        Err(ManagerError::StoreDisabled)
    ));
    assert!(matches!(
        fixture.manager.get_store_visitor("v1"),
        Err(ManagerError::StoreDisabled)
    ));
    assert!(!fixture.manager.is_store_proxy_enabled("ssh"));
}

#[test]
fn test_store_keeps_values_as_given() {
    let fixture = Fixture::with_store("");

    fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)).unwrap();

    let stored = fixture.manager.get_store_proxy("p1").unwrap();
    assert!(stored.base.local_ip.is_empty());
    assert!(stored.base.transport.bandwidth_limit_mode.is_empty());

    let running = fixture.engine.registry().status("p1").unwrap();
    assert_eq!(running.cfg.base.local_ip, "127.0.0.1");

    let raw = std::fs::read_to_string(fixture.store_path.as_ref().unwrap()).unwrap();
    assert!(!raw.contains("localIP"));
}

#[test]
fn test_invalid_proxy_persists_nothing() {
    let fixture = Fixture::with_store("");

    let err = fixture
        .manager
        .create_store_proxy(tcp_proxy("p1", 0))
        .unwrap_err();

    assert!(
        matches!(err, ManagerError::InvalidArgument(ref msg) if msg.contains("validation error"))
    );

    let reopened = StoreSource::new(StoreSourceConfig {
        path: fixture.store_path.clone().unwrap(),
    })
    .unwrap();
    assert!(reopened.get_all_proxies().is_empty());
    assert_eq!(fixture.engine.update_count(), 1);
}

#[test]
fn test_plugin_needs_feature_gate() {
    let fixture = Fixture::with_store("");
    let mut cfg = tcp_proxy("vnet", 0);
    cfg.base.plugin = Some(ClientPluginOptions::VirtualNet(VirtualNetPluginOptions {}));

    let err = fixture.manager.create_store_proxy(cfg).unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(ref msg) if msg.contains("VirtualNet")));
}

#[test]
fn test_update_store_proxy() {
    let fixture = Fixture::with_store("");
    fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)).unwrap();

    fixture
        .manager
        .update_store_proxy("p1", tcp_proxy("p1", 9090))
        .unwrap();

    assert_eq!(fixture.manager.get_store_proxy("p1").unwrap().base.local_port, 9090);
    let running = fixture.engine.registry().status("p1").unwrap();
    assert_eq!(running.cfg.base.local_port, 9090);
}

#[test]
fn test_update_name_mismatch() {
    let fixture = Fixture::with_store("");
    fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)).unwrap();

    let err = fixture
        .manager
        .update_store_proxy("p1", tcp_proxy("p2", 8080))
        .unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(_)));

    let err = fixture
        .manager
        .update_store_proxy("", tcp_proxy("p1", 8080))
        .unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(_)));
}

#[test]
fn test_update_missing_is_not_found() {
    let fixture = Fixture::with_store("");

    let err = fixture
        .manager
        .update_store_proxy("missing", tcp_proxy("missing", 8080))
        .unwrap_err();

    assert!(matches!(err, ManagerError::NotFound(_)));
    assert!(fixture.manager.list_store_proxies().unwrap().is_empty());
}

#[test]
fn test_delete_store_proxy() {
    let fixture = Fixture::with_store(SSH_PROXY);
    fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)).unwrap();

    fixture.manager.delete_store_proxy("p1").unwrap();

    assert_eq!(fixture.engine.proxy_names(), vec!["ssh"]);
    assert!(matches!(
        fixture.manager.delete_store_proxy("p1"),
        Err(ManagerError::NotFound(_))
    ));
    assert!(matches!(
        fixture.manager.delete_store_proxy(""),
        Err(ManagerError::InvalidArgument(_))
    ));
}

#[test]
fn test_disabled_store_proxy_is_not_applied() {
    let fixture = Fixture::with_store("");
    let mut cfg = tcp_proxy("p1", 8080);
    cfg.base.enabled = Some(false);

    fixture.manager.create_store_proxy(cfg).unwrap();

    assert!(!fixture.manager.is_store_proxy_enabled("p1"));
    assert!(fixture.engine.proxy_names().is_empty());
    assert_eq!(fixture.manager.list_store_proxies().unwrap().len(), 1);
}

#[test]
fn test_store_visitor_lifecycle() {
    let fixture = Fixture::with_store("user = \"alice\"");

    fixture
        .manager
        .create_store_visitor(stcp_visitor("ssh-visitor", "ssh", 9000))
        .unwrap();
    assert_eq!(
        fixture.engine.registry().visitor_target("ssh-visitor").as_deref(),
        Some("alice.ssh")
    );

    fixture
        .manager
        .update_store_visitor("ssh-visitor", stcp_visitor("ssh-visitor", "db", 9000))
        .unwrap();
    assert_eq!(
        fixture.engine.registry().visitor_target("ssh-visitor").as_deref(),
        Some("alice.db")
    );

    let stored = fixture.manager.get_store_visitor("ssh-visitor").unwrap();
    assert!(stored.base.bind_addr.is_empty());

    fixture.manager.delete_store_visitor("ssh-visitor").unwrap();
    assert_eq!(fixture.engine.registry().visitor_count(), 0);
    assert!(matches!(
        fixture.manager.get_store_visitor("ssh-visitor"),
        Err(ManagerError::NotFound(_))
    ));
}

#[test]
fn test_invalid_visitor_is_rejected() {
    let fixture = Fixture::with_store("");

    let err = fixture
        .manager
        .create_store_visitor(stcp_visitor("v1", "", 9000))
        .unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(_)));

    let err = fixture
        .manager
        .create_store_visitor(stcp_visitor("v1", "ssh", 0))
        .unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(_)));
    assert!(fixture.manager.list_store_visitors().unwrap().is_empty());
}

#[test]
fn test_reload_replaces_file_entries() {
    let fixture = Fixture::with_store(SSH_PROXY);
    fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)).unwrap();

    fixture.rewrite_config(
        r#"
serverPort = 7100

[[proxies]]
name = "db"
type = "tcp"
localPort = 5432
"#,
    );
    fixture.manager.reload_from_file(false).unwrap();

    assert_eq!(fixture.engine.proxy_names(), vec!["db", "p1"]);
    assert_eq!(fixture.manager.common().server_port, 7100);
}

#[test]
fn test_reload_honors_start_list() {
    let fixture = Fixture::with_store(SSH_PROXY);
    fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)).unwrap();

    fixture.rewrite_config(&format!("start = [\"p1\"]\n{}", SSH_PROXY));
    fixture.manager.reload_from_file(false).unwrap();

    assert_eq!(fixture.engine.proxy_names(), vec!["p1"]);
}

#[test]
fn test_failed_reload_keeps_previous_state() {
    let fixture = Fixture::with_store(SSH_PROXY);

    fixture.rewrite_config(
        r#"
serverPort = 7100

[[proxies]]
name = "dup"
type = "tcp"
localPort = 1

[[proxies]]
name = "dup"
type = "tcp"
localPort = 2
"#,
    );
    let err = fixture.manager.reload_from_file(false).unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(_)));

    fixture.rewrite_config("[[proxies]]\nname = \"broken\"\n");
    let err = fixture.manager.reload_from_file(false).unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(_)));

    assert_eq!(fixture.engine.proxy_names(), vec!["ssh"]);
    assert_eq!(fixture.manager.common().server_port, 7000);
}

#[test]
fn test_reload_collision_with_store() {
    let fixture = Fixture::with_store(SSH_PROXY);
    fixture.manager.create_store_proxy(tcp_proxy("web", 8080)).unwrap();

    fixture.rewrite_config(
        r#"
[[proxies]]
name = "web"
type = "tcp"
localPort = 80
"#,
    );
    let err = fixture.manager.reload_from_file(false).unwrap_err();

    assert!(matches!(err, ManagerError::InvalidArgument(ref msg) if msg.contains("web")));
    assert_eq!(fixture.engine.proxy_names(), vec!["ssh", "web"]);
    assert_eq!(
        fixture.engine.registry().status("web").unwrap().cfg.base.local_port,
        8080
    );
}

#[test]
fn test_reload_strictness_is_per_call() {
    let fixture = Fixture::with_store(SSH_PROXY);
    fixture.rewrite_config(&format!("unexpected = \"value\"\n{}", SSH_PROXY));

    with_disallow_unknown_fields(true, || {
        fixture.manager.reload_from_file(false).unwrap();
        assert!(disallow_unknown_fields());
    });

    let err = fixture.manager.reload_from_file(true).unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(ref msg) if msg.contains("unexpected")));
}

#[test]
fn test_reload_without_config_path() {
    let engine = TestEngine::new();
    let manager = ConfigManager::new(None, ClientCommonConfig::default(), None, engine);

    assert!(matches!(
        manager.reload_from_file(false),
        Err(ManagerError::InvalidArgument(_))
    ));
    assert!(matches!(
        manager.read_config_file(),
        Err(ManagerError::InvalidArgument(_))
    ));
}

#[test]
fn test_read_write_config_file() {
    let fixture = Fixture::with_store(SSH_PROXY);

    let content = fixture.manager.read_config_file().unwrap();
    assert!(content.contains("name = \"ssh\""));

    assert!(matches!(
        fixture.manager.write_config_file(b""),
        Err(ManagerError::InvalidArgument(_))
    ));

    let new_content = format!(
        "{}\n[store]\npath = \"{}\"\n",
        SSH_PROXY,
        fixture.store_path.as_ref().unwrap().display()
    );
    fixture.manager.write_config_file(new_content.as_bytes()).unwrap();
    assert_eq!(fixture.manager.read_config_file().unwrap(), new_content);

    // Written content only takes effect on reload
    assert_eq!(fixture.manager.common().server_addr, "tunnel.example.com");
    fixture.manager.reload_from_file(false).unwrap();
    assert_eq!(fixture.manager.common().server_addr, "0.0.0.0");
}

#[test]
fn test_concurrent_store_mutations() {
    let fixture = Fixture::with_store("");

    let handles: Vec<_> = (0..8u16)
        .map(|i| {
            let manager = Arc::clone(&fixture.manager);
            std::thread::spawn(move || {
                manager
                    .create_store_proxy(tcp_proxy(&format!("p{}", i), 8000 + i))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(fixture.manager.list_store_proxies().unwrap().len(), 8);
    assert_eq!(fixture.engine.proxy_names().len(), 8);

    let reopened = StoreSource::new(StoreSourceConfig {
        path: fixture.store_path.clone().unwrap(),
    })
    .unwrap();
    assert_eq!(reopened.get_all_proxies().len(), 8);
}

#[test]
fn test_graceful_close() {
    let fixture = Fixture::with_store(SSH_PROXY);

    fixture.manager.graceful_close(Duration::from_millis(10));

    for _ in 0..100 {
        if fixture.engine.registry().is_closed() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(fixture.engine.registry().is_closed());
    let err = fixture
        .manager
        .create_store_proxy(tcp_proxy("p1", 8080))
        .unwrap_err();
    assert!(matches!(err, ManagerError::ApplyConfig(_)));
}

#[test]
fn test_store_survives_restart() {
    let fixture = Fixture::with_store(SSH_PROXY);
    fixture.manager.create_store_proxy(tcp_proxy("p1", 8080)).unwrap();

    let engine = TestEngine::new();
    let restarted = ConfigManager::load(
        fixture.config_path.clone(),
        DecodeOptions::lenient(),
        engine.clone(),
    )
    .unwrap();

    assert_eq!(engine.proxy_names(), vec!["p1", "ssh"]);
    assert!(restarted.is_store_proxy_enabled("p1"));
    assert!(matches!(
        restarted.get_store_proxy("p1").map(|cfg| cfg.spec),
        Ok(ProxySpec::Tcp(_))
    ));
}

#[test]
fn test_store_file_with_repeated_names_is_refused() {
    let fixture = Fixture::with_store(SSH_PROXY);
    let store_path = fixture.store_path.clone().unwrap();
    std::fs::write(
        &store_path,
        r#"{"proxies":[{"name":"p1","type":"tcp","localPort":80},{"name":"p1","type":"tcp","localPort":81}]}"#,
    )
    .unwrap();

    let engine = TestEngine::new();
    let err = ConfigManager::load(
        fixture.config_path.clone(),
        DecodeOptions::lenient(),
        engine.clone(),
    )
    .err()
    .unwrap();
    assert!(err.to_string().contains("duplicate proxy name: p1"));
    assert_eq!(engine.update_count(), 0);

    assert!(StoreSource::new(StoreSourceConfig { path: store_path }).is_err());
}

#[test]
fn test_swap_store_source() {
    let fixture = Fixture::without_store(SSH_PROXY);

    let store = Arc::new(
        StoreSource::new(StoreSourceConfig {
            path: fixture.dir.path().join("other.json"),
        })
        .unwrap(),
    );
    store.add_proxy(tcp_proxy("p1", 8080)).unwrap();
    fixture.manager.set_store_source(Some(store)).unwrap();

    assert!(fixture.manager.store_enabled());
    assert_eq!(fixture.engine.proxy_names(), vec!["p1", "ssh"]);

    let clashing = Arc::new(
        StoreSource::new(StoreSourceConfig {
            path: fixture.dir.path().join("clash.json"),
        })
        .unwrap(),
    );
    clashing.add_proxy(tcp_proxy("ssh", 2222)).unwrap();
    let err = fixture.manager.set_store_source(Some(clashing)).unwrap_err();
    assert!(matches!(err, ManagerError::InvalidArgument(_)));
    assert!(fixture.manager.is_store_proxy_enabled("p1"));

    fixture.manager.set_store_source(None).unwrap();
    assert_eq!(fixture.engine.proxy_names(), vec!["ssh"]);
}
