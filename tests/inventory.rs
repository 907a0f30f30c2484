//! Regression inventories run end to end against the in-process agent.

#![cfg(feature = "cli")]

mod common;

use std::io::Write;

use common::{AUTH_PASS, PRIV_PASS, TestAgent, V3User, validator};
use snmp_credcheck::cli::inventory::Inventory;
use snmp_credcheck::cli::{exit_code, run_checks};
use snmp_credcheck::{AuthProtocol, PrivProtocol, ValidationResult};

async fn agent() -> TestAgent {
    TestAgent::builder()
        .usm_user(V3User::auth_priv(
            "admin",
            AuthProtocol::Sha1,
            AUTH_PASS,
            PrivProtocol::Aes128,
            PRIV_PASS,
        ))
        .build()
        .await
}

fn inventory_yaml(port: u16) -> String {
    format!(
        r#"
defaults:
  port: {port}
  timeout: 0.5
  retries: 1
checks:
  - name: v2c public
    host: 127.0.0.1
    version: 2c
    community: public
    expect: accepted
  - name: v2c wrong community
    host: 127.0.0.1
    version: 2c
    community: wrong-community
    expect: wrong_community
  - name: v3 admin
    host: 127.0.0.1
    version: 3
    username: admin
    auth_protocol: SHA
    auth_key: {AUTH_PASS}
    priv_protocol: AES
    priv_key: {PRIV_PASS}
    expect: accepted
  - name: v3 wrong priv key
    host: 127.0.0.1
    version: 3
    username: admin
    auth_protocol: usmHMACSHAAuthProtocol
    auth_key: {AUTH_PASS}
    priv_protocol: usmAesCfb128Protocol
    priv_key: wrong-priv-key
    expect: wrong_priv_key
  - name: level inferred from keys
    host: 127.0.0.1
    version: 3
    username: admin
    auth_protocol: SHA
    auth_key: {AUTH_PASS}
    priv_protocol: AES
    priv_key: {PRIV_PASS}
  - name: contradictory level
    host: 127.0.0.1
    version: 3
    username: admin
    security_level: noAuthNoPriv
    auth_protocol: SHA
    auth_key: {AUTH_PASS}
    expect: configuration_error
"#
    )
}

#[tokio::test]
async fn inventory_expectations_hold() {
    let agent = agent().await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(inventory_yaml(agent.port()).as_bytes()).unwrap();
    let inventory = Inventory::load(file.path()).unwrap();

    let results = run_checks(&validator(), inventory.specs()).await;
    assert_eq!(results.len(), inventory.checks.len());

    for (check, result) in inventory.checks.iter().zip(&results) {
        let pass = check.passes(result).unwrap_or_else(|| result.is_accepted());
        assert!(pass, "{}: {result}", check.name);
    }
    assert!(matches!(results[5], ValidationResult::ConfigurationError { .. }));
    // mixed outcomes: the worst category decides
    assert_eq!(exit_code(&results), 4);
}

#[tokio::test]
async fn expectation_mismatch_is_visible() {
    let agent = agent().await;
    let yaml = format!(
        "checks:\n  - name: optimistic\n    host: 127.0.0.1\n    port: {}\n    timeout: 0.5\n    version: 2c\n    community: nope\n    expect: accepted\n",
        agent.port()
    );
    let inventory = Inventory::from_yaml(&yaml).unwrap();
    let results = run_checks(&validator(), inventory.specs()).await;
    assert_eq!(inventory.checks[0].passes(&results[0]), Some(false));
}
