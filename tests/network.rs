//! Network failures, time budgets and the no-traffic guarantee for bad specs.

mod common;

use std::time::{Duration, Instant};

use common::{AUTH_PASS, COMMUNITY, TestAgent, closed_port, silent_socket, validator};
use snmp_credcheck::{
    AuthProtocol, CredentialProbe, CredentialSpec, EngineSignal, PrivProtocol, SecurityLevel,
    UdpEngine, UsmCredentials, ValidationResult,
};

const SLACK: Duration = Duration::from_millis(750);

fn credential_sets(host: &str, port: u16) -> Vec<CredentialSpec> {
    vec![
        CredentialSpec::v2c(host, COMMUNITY).port(port),
        CredentialSpec::v3(host, UsmCredentials::new("noauth")).port(port),
        CredentialSpec::v3(
            host,
            UsmCredentials::new("admin")
                .auth(AuthProtocol::Sha256, AUTH_PASS)
                .privacy(PrivProtocol::Aes256, AUTH_PASS),
        )
        .port(port),
    ]
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let addr = closed_port().await;
    let validator = validator();
    for spec in credential_sets("127.0.0.1", addr.port()) {
        let spec = spec.timeout(Duration::from_millis(500)).retries(1);
        let result = validator.validate(&spec).await;
        assert!(
            matches!(result, ValidationResult::Unreachable { .. } | ValidationResult::Timeout),
            "{result}"
        );
    }
}

#[tokio::test]
async fn unresolvable_host_is_unreachable() {
    let spec = CredentialSpec::v2c("no-such-host.invalid", COMMUNITY).timeout(Duration::from_millis(500));
    let result = validator().validate(&spec).await;
    assert!(matches!(result, ValidationResult::Unreachable { .. }), "{result}");
}

#[tokio::test]
async fn silent_host_times_out_within_budget() {
    let socket = silent_socket().await;
    let port = socket.local_addr().unwrap().port();
    let validator = validator();

    for spec in credential_sets("127.0.0.1", port) {
        let spec = spec.timeout(Duration::from_millis(400)).retries(1);
        let budget = spec.budget();
        let start = Instant::now();
        let result = validator.validate(&spec).await;
        let elapsed = start.elapsed();

        assert_eq!(result, ValidationResult::Timeout);
        assert!(elapsed + Duration::from_millis(50) >= budget, "returned early: {elapsed:?}");
        assert!(elapsed <= budget + SLACK, "overran budget: {elapsed:?}");
    }
}

/// Non-routable documentation address: either an ICMP error or silence,
/// bounded by timeout x (retries + 1).
#[tokio::test]
async fn non_routable_address_is_bounded() {
    let spec = CredentialSpec::v2c("192.0.2.1", COMMUNITY)
        .timeout(Duration::from_millis(300))
        .retries(2);
    let start = Instant::now();
    let result = validator().validate(&spec).await;
    assert!(
        matches!(result, ValidationResult::Unreachable { .. } | ValidationResult::Timeout),
        "{result}"
    );
    assert!(start.elapsed() <= spec.budget() + SLACK);
}

#[tokio::test]
async fn invalid_spec_sends_nothing() {
    let agent = TestAgent::new().await;
    let mut usm = UsmCredentials::new("admin");
    usm.auth_key = AUTH_PASS.to_string();
    assert_eq!(usm.security_level, SecurityLevel::NoAuthNoPriv);

    let spec = CredentialSpec::v3("127.0.0.1", usm).port(agent.port());
    let result = validator().validate(&spec).await;

    assert!(matches!(result, ValidationResult::ConfigurationError { .. }), "{result}");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(agent.received(), 0);
}

#[tokio::test]
async fn probe_reports_spec_errors_before_the_engine() {
    let probe = CredentialProbe::new(UdpEngine::default());
    let spec = CredentialSpec::v2c("127.0.0.1", COMMUNITY).port(0);
    assert!(probe.probe(&spec).await.is_err());
}

#[tokio::test]
async fn probe_returns_raw_signals() {
    let agent = TestAgent::new().await;
    let probe = CredentialProbe::new(UdpEngine::default());

    let ok = CredentialSpec::v2c("127.0.0.1", COMMUNITY)
        .port(agent.port())
        .timeout(Duration::from_millis(500));
    assert_eq!(
        probe.probe(&ok).await.unwrap(),
        EngineSignal::Success {
            value: common::SYS_DESCR.to_string()
        }
    );

    let wrong = CredentialSpec::v2c("127.0.0.1", "nope")
        .port(agent.port())
        .timeout(Duration::from_millis(300));
    assert!(matches!(
        probe.probe(&wrong).await.unwrap(),
        EngineSignal::Security { .. }
    ));
}
