//! End-to-end scenarios: YAML fragments on disk → loaded registries →
//! authorization decisions.

use std::fs;
use std::path::Path;

use mikro_auth::{IdentityContext, PermissionResolver};
use mikro_config::ConfigSet;
use mikro_core::{AccessLevel, DenialKind, LookupError};

fn write(root: &Path, dir: &str, file: &str, body: &str) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), body).unwrap();
}

fn router(root: &Path, file: &str, name: &str) {
    write(
        root,
        "routers.d",
        file,
        &format!("router:\n  name: {name}\n  host: 192.0.2.10\n  username: api\n  password: pw\n"),
    );
}

/// Installation used by the scenarios below.
fn installation(root: &Path) {
    router(root, "00-main.yaml", "main-router");
    router(root, "10-remote.yaml", "remote-site");

    write(
        root,
        "modules.d",
        "00-dns.yaml",
        r#"
module:
  name: dns
  operations:
    list: read
    search: read
    add: write
    update: write
    delete: write
    enable: write
    disable: write
"#,
    );
    write(
        root,
        "modules.d",
        "10-interfaces.yaml",
        "module:\n  name: interfaces\n  operations:\n    list: read\n",
    );

    write(
        root,
        "groups.d",
        "00-dns-admin.yaml",
        "group:\n  name: dns-admin\n  modules:\n    dns: [list, add, update, delete, enable, disable]\n",
    );
    write(
        root,
        "groups.d",
        "10-monitor.yaml",
        "group:\n  name: monitor\n  modules: [interfaces]\n",
    );
    write(
        root,
        "groups.d",
        "20-dhcp-admin.yaml",
        "group:\n  name: dhcp-admin\n  modules: [dhcp]\n",
    );

    write(
        root,
        "users.d",
        "00-jane.yaml",
        "user:\n  username: jane\n  permissions:\n    - groups: [dns-admin]\n      routers: \"*\"\n",
    );
    write(
        root,
        "users.d",
        "10-monitor.yaml",
        "user:\n  username: monitor\n  permissions:\n    - groups: [monitor, \"dns-admin:read-only\"]\n      routers: \"*\"\n",
    );
    write(
        root,
        "users.d",
        "20-bob.yaml",
        "user:\n  username: bob\n  permissions:\n    - groups: [dns-admin, dhcp-admin]\n      routers: [router1, router2]\n",
    );
}

#[test]
fn router_selection_follows_file_order() {
    let root = tempfile::tempdir().unwrap();
    installation(root.path());
    let (config, _) = ConfigSet::load(root.path());
    let selector = PermissionResolver::new(&config).selector();

    assert_eq!(selector.resolve(Some("")).unwrap().name.as_str(), "main-router");
    assert_eq!(
        selector.resolve(Some("remote-site")).unwrap().name.as_str(),
        "remote-site"
    );
    assert!(matches!(
        selector.resolve(Some("nope")),
        Err(LookupError::NotFound { .. })
    ));
}

#[test]
fn jane_has_full_dns_access() {
    let root = tempfile::tempdir().unwrap();
    installation(root.path());
    let (config, _) = ConfigSet::load(root.path());
    let resolver = PermissionResolver::new(&config);
    let jane = IdentityContext::new("jane");

    let list = resolver.authorize(&jane, "dns", "list", Some("main-router"));
    assert!(list.is_allowed());
    assert_eq!(list.access(), Some(AccessLevel::Full));

    let add = resolver.authorize(&jane, "dns", "add", Some("main-router"));
    assert!(add.is_allowed());
    assert_eq!(add.access(), Some(AccessLevel::Full));
    assert_eq!(add.matched_groups(), ["dns-admin".to_string()]);
}

#[test]
fn monitor_is_narrowed_to_reads() {
    let root = tempfile::tempdir().unwrap();
    installation(root.path());
    let (config, _) = ConfigSet::load(root.path());
    let resolver = PermissionResolver::new(&config);
    let monitor = IdentityContext::new("monitor");

    let add = resolver.authorize(&monitor, "dns", "add", Some("main-router"));
    assert!(!add.is_allowed());
    assert_eq!(add.reason(), Some(DenialKind::NoMatchingGrant));

    let list = resolver.authorize(&monitor, "dns", "list", Some("main-router"));
    assert!(list.is_allowed());
    assert_eq!(list.access(), Some(AccessLevel::ReadOnly));
}

#[test]
fn bob_outside_scope_with_router3_unconfigured() {
    let root = tempfile::tempdir().unwrap();
    installation(root.path());
    let (config, _) = ConfigSet::load(root.path());

    let decision = PermissionResolver::new(&config).authorize(
        &IdentityContext::new("bob"),
        "dns",
        "list",
        Some("router3"),
    );
    assert_eq!(decision.reason(), Some(DenialKind::RouterNotFound));
}

#[test]
fn bob_outside_scope_with_router3_configured() {
    let root = tempfile::tempdir().unwrap();
    installation(root.path());
    router(root.path(), "30-router3.yaml", "router3");
    let (config, _) = ConfigSet::load(root.path());

    let decision = PermissionResolver::new(&config).authorize(
        &IdentityContext::new("bob"),
        "dns",
        "list",
        Some("router3"),
    );
    assert_eq!(decision.reason(), Some(DenialKind::NoMatchingGrant));
    assert_eq!(decision.router().map(|r| r.as_str()), Some("router3"));
}

#[test]
fn bob_inside_scope_once_router_exists() {
    let root = tempfile::tempdir().unwrap();
    installation(root.path());
    router(root.path(), "30-router1.yaml", "router1");
    let (config, _) = ConfigSet::load(root.path());

    let decision = PermissionResolver::new(&config).authorize(
        &IdentityContext::new("bob"),
        "dns",
        "delete",
        Some("router1"),
    );
    assert!(decision.is_allowed());
    assert_eq!(decision.access(), Some(AccessLevel::Full));
}

#[test]
fn superuser_ignores_an_empty_installation() {
    let root = tempfile::tempdir().unwrap();
    let (config, report) = ConfigSet::load(root.path());
    assert!(report.is_clean());

    let decision = PermissionResolver::new(&config).authorize(
        &IdentityContext::superuser("root").with_groups(["wheel"]),
        "dns",
        "delete",
        None,
    );
    assert!(decision.is_allowed());
    assert_eq!(decision.access(), Some(AccessLevel::Full));
}

#[test]
fn one_malformed_user_file_does_not_hide_the_others() {
    let root = tempfile::tempdir().unwrap();
    installation(root.path());
    write(root.path(), "users.d", "15-broken.yaml", "user: [this is not a record");
    let (config, report) = ConfigSet::load(root.path());

    assert_eq!(config.users.len(), 3);
    let load_errors = report
        .issues
        .iter()
        .filter(|i| matches!(i, mikro_core::ConfigIssue::Load { .. }))
        .count();
    assert_eq!(load_errors, 1);
    assert!(
        PermissionResolver::new(&config)
            .authorize(&IdentityContext::new("jane"), "dns", "add", None)
            .is_allowed()
    );
}

#[test]
fn empty_router_registry_denies_with_its_own_reason() {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "users.d",
        "00-jane.yaml",
        "user:\n  username: jane\n  permissions:\n    - groups: [dns-admin]\n",
    );
    let (config, _) = ConfigSet::load(root.path());

    let decision = PermissionResolver::new(&config).authorize(
        &IdentityContext::new("jane"),
        "dns",
        "list",
        None,
    );
    assert_eq!(decision.reason(), Some(DenialKind::NoRoutersConfigured));
    assert_eq!(decision.exit_status().code(), 3);
}
