#![allow(clippy::unwrap_used)]
// End-to-end apply runs against a wiremock firewall.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use panply_core::{
    Applier, ApplyConfig, CommitStatus, ConfigObject, CoreError, DeviceSession, ManagementProfile,
    NatRule, NextHop, ObjectKind, RetryPolicy, RotationStatus, Rule, RuleAction, Rulebase,
    SecurityRule, SessionConfig, SessionState, StaticRoute, StaticState, VirtualRouter, keys,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_config() -> ApplyConfig {
    ApplyConfig {
        retry: RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_retries: 2,
        },
        commit_poll_interval: Duration::from_millis(10),
        commit_timeout: Duration::from_secs(2),
        strict: true,
        ..ApplyConfig::default()
    }
}

fn state_for(server: &MockServer) -> StaticState {
    StaticState::from_pairs(
        "test state",
        [
            (keys::MGMT_PUBLIC_IP, server.uri()),
            (keys::UNTRUST_SUBNET_CIDR, "10.0.1.0/24".into()),
            (keys::UNTRUST_PRIVATE_IP, "10.0.1.10".into()),
            (keys::TESTER_PRIVATE_IP, "10.0.2.20".into()),
            (keys::ADMIN_PASSWORD, "s3cret".into()),
        ],
    )
}

fn session_config(server: &MockServer) -> SessionConfig {
    let config = fast_config();
    config
        .session_config(&server.uri(), SecretString::from("s3cret".to_string()))
        .unwrap()
}

fn success() -> Value {
    json!({ "@status": "success", "@code": "20", "msg": "command succeeded" })
}

fn query(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn xml(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.to_owned(), "application/xml")
}

async fn mount_keygen(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/"))
        .and(body_string_contains("type=keygen"))
        .respond_with(xml(
            200,
            r#"<response status="success"><result><key>LUFRPT1abc==</key></result></response>"#,
        ))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_network_ok(server: &MockServer) {
    Mock::given(path_regex("^/restapi/v10\\.2/Network/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success()))
        .mount(server)
        .await;
}

async fn mount_commit(server: &MockServer, expected: u64, job: &str) {
    Mock::given(method("GET"))
        .and(path("/api/"))
        .and(query_param("type", "commit"))
        .respond_with(xml(
            200,
            r#"<response status="success" code="19"><result><msg><line>Commit job enqueued with jobid 7</line></msg><job>7</job></result></response>"#,
        ))
        .expect(expected)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/"))
        .and(query_param("type", "op"))
        .and(query_param("cmd", "<show><jobs><id>7</id></jobs></show>"))
        .respond_with(xml(
            200,
            &format!(r#"<response status="success"><result>{job}</result></response>"#),
        ))
        .mount(server)
        .await;
}

/// `<job>` element for job 7 as `show jobs id 7` renders it.
fn job(status: &str, result: &str, progress: u8, details: &[&str]) -> String {
    let lines: String = details.iter().map(|l| format!("<line>{l}</line>")).collect();
    format!(
        "<job><id>7</id><type>Commit</type><status>{status}</status><result>{result}</result>\
         <progress>{progress}</progress><details>{lines}</details></job>"
    )
}

fn finished_ok() -> String {
    job("FIN", "OK", 100, &["Configuration committed successfully"])
}

/// A rulebase that honours create, replace, move and list like the device.
#[derive(Clone, Default)]
struct FakeRulebase {
    rules: Arc<Mutex<Vec<String>>>,
}

impl FakeRulebase {
    fn with_rules(names: &[&str]) -> Self {
        Self {
            rules: Arc::new(Mutex::new(names.iter().map(ToString::to_string).collect())),
        }
    }

    fn names(&self) -> Vec<String> {
        self.rules.lock().unwrap().clone()
    }
}

impl Respond for FakeRulebase {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut rules = self.rules.lock().unwrap();
        let name = query(request, "name").unwrap_or_default();

        if request.url.path().ends_with(":move") {
            let Some(from) = rules.iter().position(|r| *r == name) else {
                return ResponseTemplate::new(404).set_body_json(json!({ "code": 7, "message": "Object Not Present" }));
            };
            let rule = rules.remove(from);
            match query(request, "where").as_deref() {
                Some("top") => rules.insert(0, rule),
                Some("after") => {
                    let dst = query(request, "dst").unwrap();
                    let at = rules.iter().position(|r| *r == dst).unwrap();
                    rules.insert(at + 1, rule);
                }
                other => panic!("unexpected move position {other:?}"),
            }
            return ResponseTemplate::new(200).set_body_json(success());
        }

        match request.method.as_str() {
            "POST" if rules.contains(&name) => ResponseTemplate::new(409).set_body_json(json!({
                "code": 5, "message": "Object Already Exists", "details": []
            })),
            "POST" => {
                rules.push(name);
                ResponseTemplate::new(200).set_body_json(success())
            }
            "PUT" => ResponseTemplate::new(200).set_body_json(success()),
            "GET" => {
                let entries: Vec<Value> = rules.iter().map(|r| json!({ "@name": r })).collect();
                ResponseTemplate::new(200).set_body_json(json!({
                    "@status": "success", "@code": "19", "result": { "entry": entries }
                }))
            }
            other => panic!("unexpected method {other}"),
        }
    }
}

async fn mount_rulebases(server: &MockServer, nat: &FakeRulebase, security: &FakeRulebase) {
    Mock::given(path_regex("^/restapi/v10\\.2/Policies/NATRules"))
        .respond_with(nat.clone())
        .mount(server)
        .await;
    Mock::given(path_regex("^/restapi/v10\\.2/Policies/SecurityRules"))
        .respond_with(security.clone())
        .mount(server)
        .await;
}

// ── Full runs ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_creates_in_dependency_order_then_commits() {
    let server = MockServer::start().await;
    let nat = FakeRulebase::default();
    let security = FakeRulebase::default();
    mount_keygen(&server, 1).await;
    mount_network_ok(&server).await;
    mount_rulebases(&server, &nat, &security).await;
    mount_commit(&server, 1, &finished_ok()).await;

    let report = Applier::new(fast_config())
        .run(&state_for(&server))
        .await
        .unwrap();

    assert_eq!(report.commit.status, CommitStatus::Succeeded);
    assert_eq!(report.commit.job_id, Some(7));
    assert_eq!(report.rotation, RotationStatus::Skipped);
    assert_eq!(
        report.status_line(),
        "Commit successful! The new configuration is now active."
    );

    let requests = server.received_requests().await.unwrap();
    let creates: Vec<(String, String)> = requests
        .iter()
        .filter(|r| r.method.as_str() == "POST" && !r.url.path().ends_with(":move"))
        .map(|r| {
            let resource = r.url.path().trim_start_matches("/restapi/v10.2/").to_owned();
            (resource, query(r, "name").unwrap())
        })
        .collect();
    let expected: Vec<(String, String)> = [
        ("Network/InterfaceManagementNetworkProfiles", "allow-ping"),
        ("Network/EthernetInterfaces", "ethernet1/1"),
        ("Network/EthernetInterfaces", "ethernet1/2"),
        ("Network/Zones", "untrust"),
        ("Network/Zones", "trust"),
        ("Network/VirtualRouters", "default"),
        ("Policies/NATRules", "NAT2Ubuntu"),
        ("Policies/NATRules", "NAT2External"),
        ("Policies/SecurityRules", "AllowManagement"),
        ("Policies/SecurityRules", "AllowExternal"),
    ]
    .iter()
    .map(|(a, b)| ((*a).to_owned(), (*b).to_owned()))
    .collect();
    assert_eq!(creates, expected);

    let last_create = requests
        .iter()
        .rposition(|r| r.url.path().starts_with("/restapi/"))
        .unwrap();
    let commit = requests
        .iter()
        .position(|r| query(r, "type").as_deref() == Some("commit"))
        .unwrap();
    assert!(commit > last_create, "commit sent before the last create");

    assert_eq!(nat.names(), vec!["NAT2Ubuntu", "NAT2External"]);
    assert_eq!(security.names(), vec!["AllowManagement", "AllowExternal"]);
}

#[tokio::test]
async fn test_zone_body_carries_interface_reference() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;
    mount_network_ok(&server).await;
    mount_rulebases(&server, &FakeRulebase::default(), &FakeRulebase::default()).await;
    mount_commit(&server, 1, &finished_ok()).await;

    Applier::new(fast_config())
        .run(&state_for(&server))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let zone = requests
        .iter()
        .find(|r| r.url.path().ends_with("/Network/Zones") && query(r, "name").as_deref() == Some("untrust"))
        .unwrap();
    assert_eq!(query(zone, "location").as_deref(), Some("vsys"));
    assert_eq!(query(zone, "vsys").as_deref(), Some("vsys1"));
    let body: Value = serde_json::from_slice(&zone.body).unwrap();
    assert_eq!(
        body["entry"]["network"]["layer3"]["member"],
        json!(["ethernet1/1"])
    );
    assert!(zone.headers.get("X-PAN-KEY").is_some());
}

#[tokio::test]
async fn test_rejected_create_aborts_without_commit() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/restapi/v10.2/Network/Zones"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 3,
            "message": "Invalid Object",
            "details": [{ "@type": "CauseInfo", "causes": [{ "description": "untrust -> network is invalid" }] }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_network_ok(&server).await;

    Mock::given(path_regex("^/restapi/v10\\.2/Policies/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success()))
        .expect(0)
        .mount(&server)
        .await;
    mount_commit(&server, 0, &finished_ok()).await;

    let err = Applier::new(fast_config())
        .run(&state_for(&server))
        .await
        .unwrap_err();

    match err {
        CoreError::DeviceRejected {
            kind,
            ref name,
            ref reason,
            ref details,
            ..
        } => {
            assert_eq!(kind, ObjectKind::Zone);
            assert_eq!(name, "untrust");
            assert_eq!(reason, "Invalid Object");
            assert_eq!(details.len(), 1);
        }
        other => panic!("expected DeviceRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transient_exhaustion_on_create_names_object() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/restapi/v10.2/Network/EthernetInterfaces"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    mount_network_ok(&server).await;
    mount_commit(&server, 0, &finished_ok()).await;

    let err = Applier::new(fast_config())
        .run(&state_for(&server))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CoreError::DeviceRejected { kind: ObjectKind::Interface, ref name, .. } if name == "ethernet1/1"),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_missing_password_never_contacts_device() {
    let server = MockServer::start().await;
    mount_keygen(&server, 0).await;
    mount_commit(&server, 0, &finished_ok()).await;

    let mut state = StaticState::new("partial state");
    state.insert(keys::MGMT_PUBLIC_IP, server.uri());
    state.insert(keys::UNTRUST_SUBNET_CIDR, "10.0.1.0/24");
    state.insert(keys::UNTRUST_PRIVATE_IP, "10.0.1.10");
    state.insert(keys::TESTER_PRIVATE_IP, "10.0.2.20");

    let err = Applier::new(fast_config()).run(&state).await.unwrap_err();
    assert!(
        matches!(err, CoreError::InputMissing { ref key, .. } if key == "admin_password"),
        "{err:?}"
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rotation_failure_still_connects() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;
    mount_network_ok(&server).await;
    mount_rulebases(&server, &FakeRulebase::default(), &FakeRulebase::default()).await;
    mount_commit(&server, 1, &finished_ok()).await;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("admin_pass.sh");
    std::fs::write(&script, "echo 'cannot reach firewall' >&2\nexit 1\n").unwrap();

    let config = ApplyConfig {
        rotation_script: Some(script),
        ..fast_config()
    };
    let report = Applier::new(config)
        .run(&state_for(&server))
        .await
        .unwrap();

    match report.rotation {
        RotationStatus::Failed(ref reason) => assert!(reason.contains("exited with code 1"), "{reason}"),
        ref other => panic!("expected failed rotation, got {other:?}"),
    }
    assert_eq!(report.commit.status, CommitStatus::Succeeded);
}

#[tokio::test]
async fn test_commit_failure_reports_job_and_details() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;
    mount_network_ok(&server).await;
    mount_rulebases(&server, &FakeRulebase::default(), &FakeRulebase::default()).await;
    mount_commit(
        &server,
        1,
        &job(
            "FIN",
            "FAIL",
            100,
            &["Validation Error:", "rulebase -&gt; nat -&gt; rules is invalid"],
        ),
    )
    .await;

    let err = Applier::new(fast_config())
        .run(&state_for(&server))
        .await
        .unwrap_err();
    match err {
        CoreError::Commit {
            job_id,
            ref details,
            ..
        } => {
            assert_eq!(job_id, Some(7));
            assert_eq!(
                details,
                &vec![
                    "Validation Error:".to_string(),
                    "rulebase -> nat -> rules is invalid".to_string()
                ]
            );
        }
        other => panic!("expected Commit error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_commit_times_out_while_job_active() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;
    mount_network_ok(&server).await;
    mount_rulebases(&server, &FakeRulebase::default(), &FakeRulebase::default()).await;
    mount_commit(&server, 1, &job("ACT", "PEND", 40, &[])).await;

    let config = ApplyConfig {
        commit_timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let err = Applier::new(config)
        .run(&state_for(&server))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CoreError::Commit { job_id: Some(7), ref reason, .. } if reason.contains("did not finish")),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_deadline_aborts_before_commit() {
    let server = MockServer::start().await;
    mount_keygen(&server, 0).await;
    mount_commit(&server, 0, &finished_ok()).await;

    let config = ApplyConfig {
        deadline: Some(Duration::ZERO),
        ..fast_config()
    };
    let err = Applier::new(config)
        .run(&state_for(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DeadlineExceeded { .. }), "{err:?}");
}

#[tokio::test]
async fn test_strict_mode_rejects_dangling_reference_before_connect() {
    let server = MockServer::start().await;
    mount_keygen(&server, 0).await;

    let objects: Vec<ConfigObject> = vec![
        panply_core::Zone::new("untrust", panply_core::NetworkMode::Layer3, ["ethernet1/9"])
            .unwrap()
            .into(),
    ];
    let err = Applier::new(fast_config())
        .apply(&session_config(&server), objects)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }), "{err:?}");
}

#[tokio::test]
async fn test_next_vr_target_is_created_before_its_referrer() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;
    mount_network_ok(&server).await;
    mount_commit(&server, 1, &finished_ok()).await;

    let mut edge = VirtualRouter::new("edge", ["ethernet1/1"]).unwrap();
    edge.add_route(
        StaticRoute::new("to-core", "10.20.0.0/16", NextHop::NextVr("core".into()), "ethernet1/1")
            .unwrap(),
    )
    .unwrap();
    let core = VirtualRouter::new("core", ["ethernet1/2"]).unwrap();

    let config = ApplyConfig {
        strict: false,
        ..fast_config()
    };
    let report = Applier::new(config)
        .apply(&session_config(&server), vec![edge.into(), core.into()])
        .await
        .unwrap();

    let created: Vec<_> = report.created.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(created, vec!["core", "edge"]);

    let requests = server.received_requests().await.unwrap();
    let routers: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path().ends_with("/Network/VirtualRouters"))
        .filter_map(|r| query(r, "name"))
        .collect();
    assert_eq!(routers, vec!["core", "edge"]);
}

// ── Session lifecycle ───────────────────────────────────────────────

fn two_by_two_rulebase() -> Rulebase {
    let mut rb = Rulebase::new("rulebase").unwrap();
    rb.add(Rule::Nat(NatRule::new("NAT2Ubuntu", ["untrust"], ["untrust"]).unwrap()))
        .unwrap();
    rb.add(Rule::Security(
        SecurityRule::new("AllowManagement", ["untrust"], ["trust"], RuleAction::Allow).unwrap(),
    ))
    .unwrap();
    rb.add(Rule::Nat(NatRule::new("NAT2External", ["trust"], ["untrust"]).unwrap()))
        .unwrap();
    rb.add(Rule::Security(
        SecurityRule::new("AllowExternal", ["trust"], ["untrust"], RuleAction::Allow).unwrap(),
    ))
    .unwrap();
    rb
}

#[tokio::test]
async fn test_rule_order_round_trip_over_existing_rules() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;
    // A previous run left the rules in the wrong order, below an operator rule.
    let nat = FakeRulebase::with_rules(&["Operator", "NAT2External", "NAT2Ubuntu"]);
    let security = FakeRulebase::with_rules(&["AllowExternal"]);
    mount_rulebases(&server, &nat, &security).await;
    mount_commit(&server, 1, &finished_ok()).await;

    let mut session = DeviceSession::open(&session_config(&server)).await.unwrap();
    let target = session.stage(two_by_two_rulebase().into()).unwrap();
    session.create(&target).await.unwrap();
    session.commit(true).await.unwrap();
    assert_eq!(session.state(), SessionState::Active);

    assert_eq!(
        session.rule_order(ObjectKind::NatRule).await.unwrap(),
        vec!["NAT2Ubuntu", "NAT2External", "Operator"]
    );
    assert_eq!(
        session.rule_order(ObjectKind::SecurityRule).await.unwrap(),
        vec!["AllowManagement", "AllowExternal"]
    );
}

#[tokio::test]
async fn test_no_changes_is_success_and_second_commit_is_invalid() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/"))
        .and(query_param("type", "commit"))
        .respond_with(xml(
            200,
            r#"<response status="success" code="19"><msg>There are no changes to commit.</msg></response>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = DeviceSession::open(&session_config(&server)).await.unwrap();
    let result = session.commit(true).await.unwrap();
    assert_eq!(result.status, CommitStatus::NoChanges);
    assert_eq!(result.job_id, None);
    assert_eq!(session.state(), SessionState::Active);

    let err = session.commit(true).await.unwrap_err();
    assert!(
        matches!(err, CoreError::InvalidState { operation: "commit", state: SessionState::Active }),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_create_after_failure_is_invalid_state() {
    let server = MockServer::start().await;
    mount_keygen(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/restapi/v10.2/Network/InterfaceManagementNetworkProfiles"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 3, "message": "Invalid Object", "details": []
        })))
        .mount(&server)
        .await;

    let mut session = DeviceSession::open(&session_config(&server)).await.unwrap();
    let first = session
        .stage(ManagementProfile::new("allow-ping").unwrap().into())
        .unwrap();
    let second = session
        .stage(ManagementProfile::new("allow-ssh").unwrap().ssh(true).into())
        .unwrap();

    assert!(session.create(&first).await.is_err());
    assert_eq!(session.state(), SessionState::Failed);

    let err = session.create(&second).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }), "{err:?}");
    let err = session.commit(true).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { .. }), "{err:?}");
}

#[tokio::test]
async fn test_bad_credentials_fail_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/"))
        .and(body_string_contains("type=keygen"))
        .respond_with(xml(
            403,
            r#"<response status="error" code="403"><result><msg>Invalid Credential</msg></result></response>"#,
        ))
        .mount(&server)
        .await;

    let err = DeviceSession::open(&session_config(&server)).await.err().unwrap();
    assert!(matches!(err, CoreError::AuthenticationFailed { .. }), "{err:?}");
}

#[tokio::test]
async fn test_unparsable_keygen_answer_is_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/"))
        .respond_with(xml(
            200,
            r#"<response status="success"><result><key>LUFRPT1leaked"#,
        ))
        .mount(&server)
        .await;

    let err = DeviceSession::open(&session_config(&server)).await.err().unwrap();
    assert!(matches!(err, CoreError::ConnectionFailed { .. }), "{err:?}");
    let rendered = format!("{err} {err:?}");
    assert!(!rendered.contains("LUFRPT1leaked"), "{rendered}");
    assert!(!rendered.contains("s3cret"), "{rendered}");
}

#[tokio::test]
async fn test_unreachable_device_is_connection_failure() {
    // Nothing listens on the port once the server is dropped.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let config = ApplyConfig {
        timeout: Duration::from_secs(2),
        ..fast_config()
    }
    .session_config(&uri, SecretString::from("pw".to_string()))
    .unwrap();

    let err = DeviceSession::open(&config).await.err().unwrap();
    assert!(matches!(err, CoreError::ConnectionFailed { .. }), "{err:?}");
    assert!(!format!("{err} {err:?}").contains("password="), "{err:?}");
}
