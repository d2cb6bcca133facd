// Unit tests for the handshake state machine.
// `transition` is pure, so most cases drive it directly; `ProtocolEngine`
// covers line-level behavior (parse failures, empty lines, remote log).

use crate::envelope::{Envelope, decode, digest_hex};
use crate::protocol::{Event, Policy, ProtocolEngine, Session, Stage, transition};

use common::RedactedToken;

use serde_json::{Value, json};

const TOKEN: &str = "hello";
const NOW: f64 = 1000.0;

fn policy() -> Policy {
    Policy {
        token: RedactedToken::new(TOKEN),
        ..Policy::default()
    }
}

fn at(stage: Stage) -> Session {
    Session {
        stage,
        failed_auth_attempts: 0,
    }
}

fn request(line: &str) -> Envelope {
    decode(line).unwrap()
}

fn reply_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

fn auth_line(hash: &str) -> String {
    format!(r#"{{"id":"1","method":"authorization","params":["{hash}"]}}"#)
}

// ============================================
// STAGE 0: AUTHORIZATION
// ============================================

#[test]
fn given_correct_hash_when_authorization_then_authorized_and_stage_one() {
    let line = auth_line(&digest_hex(TOKEN));

    let next = transition(at(Stage::Unauthenticated), &request(&line), &policy(), NOW).unwrap();

    assert_eq!(next.session.stage, Stage::DuplexPending);
    assert_eq!(next.reply.unwrap().text, r#"{"id":"1","result":"authorized"}"#);
    assert_eq!(next.event, Some(Event::Authorized));
    assert!(!next.terminate);
}

#[test]
fn given_wrong_hash_when_authorization_then_102_and_stage_unchanged() {
    let line = auth_line("deadbeef");

    let next = transition(at(Stage::Unauthenticated), &request(&line), &policy(), NOW).unwrap();

    assert_eq!(next.session.stage, Stage::Unauthenticated);
    assert_eq!(next.session.failed_auth_attempts, 1);
    assert_eq!(
        next.reply.unwrap().text,
        r#"{"id":"1","error":{"code":102,"message":"forbidden: wrong hash"}}"#
    );
    assert!(!next.terminate);
}

/// **VALUE**: The hash is compared against the live token.
///
/// **BUG THIS CATCHES**: Caching the digest at startup would keep accepting
/// the old secret after the operator changed it.
#[test]
fn given_changed_token_when_old_hash_sent_then_rejected() {
    let line = auth_line(&digest_hex(TOKEN));
    let changed = Policy {
        token: RedactedToken::new("other"),
        ..Policy::default()
    };

    let next = transition(at(Stage::Unauthenticated), &request(&line), &changed, NOW).unwrap();

    assert_eq!(next.session.stage, Stage::Unauthenticated);
    assert_eq!(next.event, Some(Event::AuthRejected { attempts: 1 }));
}

#[test]
fn given_empty_token_when_any_authorization_then_accepted() {
    let open = Policy {
        token: RedactedToken::default(),
        ..Policy::default()
    };

    let next = transition(
        at(Stage::Unauthenticated),
        &request(&auth_line("anything")),
        &open,
        NOW,
    )
    .unwrap();

    assert_eq!(next.session.stage, Stage::DuplexPending);
}

#[test]
fn given_attempt_limit_when_reached_then_terminate() {
    let limited = Policy {
        auth_attempt_limit: 2,
        ..policy()
    };
    let line = auth_line("bad");

    let first = transition(at(Stage::Unauthenticated), &request(&line), &limited, NOW).unwrap();
    let second = transition(first.session, &request(&line), &limited, NOW).unwrap();

    assert!(!first.terminate);
    assert!(second.terminate);
    assert!(second.reply.is_some());
}

#[test]
fn given_failed_attempts_when_authorized_then_counter_resets() {
    let session = Session {
        stage: Stage::Unauthenticated,
        failed_auth_attempts: 4,
    };

    let next = transition(
        session,
        &request(&auth_line(&digest_hex(TOKEN))),
        &policy(),
        NOW,
    )
    .unwrap();

    assert_eq!(next.session.failed_auth_attempts, 0);
}

/// **VALUE**: Only `authorization` is accepted before authentication.
///
/// **BUG THIS CATCHES**: Skipping the handshake by sending `upgrade duplex`
/// or `ping` first.
#[test]
fn given_other_method_in_stage_zero_when_sent_then_invalid_request() {
    let line = r#"{"id":"9","method":"upgrade duplex"}"#;

    let next = transition(at(Stage::Unauthenticated), &request(line), &policy(), NOW).unwrap();

    assert_eq!(next.session.stage, Stage::Unauthenticated);
    let reply = reply_json(&next.reply.unwrap().text);
    assert_eq!(reply["id"], json!("9"));
    assert_eq!(reply["error"]["code"], json!(-32600));
    assert_eq!(
        reply["error"]["message"],
        json!(r#"Wrong method "upgrade duplex", i wait "authorization" in stage 0"#)
    );
}

#[test]
fn given_result_before_active_when_received_then_authorization_required() {
    let line = r#"{"id":"2","result":"hi"}"#;

    let next = transition(at(Stage::DuplexPending), &request(line), &policy(), NOW).unwrap();

    let reply = reply_json(&next.reply.unwrap().text);
    assert_eq!(reply["error"]["code"], json!(100));
    assert_eq!(
        reply["error"]["message"],
        json!("forbidden: authorization is necessary")
    );
    assert_eq!(next.session.stage, Stage::DuplexPending);
}

// ============================================
// STAGE 1: UPGRADE
// ============================================

#[test]
fn given_upgrade_in_stage_one_when_sent_then_upgraded_and_active() {
    let line = r#"{"id":"2","method":"upgrade duplex"}"#;

    let next = transition(at(Stage::DuplexPending), &request(line), &policy(), NOW).unwrap();

    assert_eq!(next.session.stage, Stage::Active);
    assert_eq!(next.reply.unwrap().text, r#"{"id":"2","result":"upgraded"}"#);
    assert_eq!(next.event, Some(Event::Upgraded));
}

#[test]
fn given_authorization_again_in_stage_one_when_sent_then_invalid_request() {
    let line = auth_line(&digest_hex(TOKEN));

    let next = transition(at(Stage::DuplexPending), &request(&line), &policy(), NOW).unwrap();

    assert_eq!(next.session.stage, Stage::DuplexPending);
    let reply = reply_json(&next.reply.unwrap().text);
    assert_eq!(
        reply["error"]["message"],
        json!(r#"Wrong method "authorization", i wait "upgrade duplex" in stage 1"#)
    );
}

// ============================================
// STAGE 2: ACTIVE
// ============================================

#[test]
fn given_ping_when_active_then_param_is_echoed() {
    let line = r#"{"id":"p1","method":"ping","params":["123.5"]}"#;

    let next = transition(at(Stage::Active), &request(line), &policy(), NOW).unwrap();

    assert_eq!(next.reply.unwrap().text, r#"{"id":"p1","result":"123.5"}"#);
    assert_eq!(next.session.stage, Stage::Active);
}

#[test]
fn given_pong_reply_when_active_then_latency_event() {
    let line = r#"{"id":"pong","result":"999.9"}"#;

    let next = transition(at(Stage::Active), &request(line), &policy(), NOW).unwrap();

    assert!(next.reply.is_none());
    match next.event {
        Some(Event::Latency(latency)) => assert!((latency.millis() - 100.0).abs() < 1e-3),
        other => panic!("Expected latency, got {other:?}"),
    }
}

#[test]
fn given_unknown_method_when_active_then_no_reply() {
    let line = r#"{"id":"3","method":"status"}"#;

    let next = transition(at(Stage::Active), &request(line), &policy(), NOW).unwrap();

    assert!(next.reply.is_none());
    assert_eq!(
        next.event,
        Some(Event::Unhandled {
            method: "status".to_string()
        })
    );
}

#[test]
fn given_error_envelope_when_received_then_reported_not_answered() {
    let line = r#"{"id":"4","error":{"code":7,"message":"boom"}}"#;

    let next = transition(at(Stage::Unauthenticated), &request(line), &policy(), NOW).unwrap();

    assert!(next.reply.is_none());
    assert_eq!(
        next.event,
        Some(Event::InboundError {
            code: 7,
            message: "boom".to_string(),
            id: Some(json!("4")),
        })
    );
}

#[test]
fn given_envelope_without_method_result_or_error_when_received_then_broken() {
    let next = transition(at(Stage::Active), &request(r#"{"id":"5"}"#), &policy(), NOW).unwrap();

    assert!(next.reply.is_none());
    assert!(matches!(next.event, Some(Event::Broken(_))));
}

// ============================================
// ANONYMOUS REQUESTS
// ============================================

#[test]
fn given_request_without_id_when_default_policy_then_reply_sent_without_id() {
    let line = r#"{"method":"upgrade duplex"}"#;

    let next = transition(at(Stage::DuplexPending), &request(line), &policy(), NOW).unwrap();

    assert_eq!(next.reply.unwrap().text, r#"{"result":"upgraded"}"#);
}

/// **VALUE**: Notifications can be made silent by config.
///
/// **BUG THIS CATCHES**: Suppression leaking into the state change, which
/// must still happen even though nothing is sent back.
#[test]
fn given_request_without_id_when_anonymous_replies_disabled_then_no_reply_but_transition() {
    let quiet = Policy {
        reply_to_anonymous: false,
        ..policy()
    };
    let line = r#"{"method":"upgrade duplex"}"#;

    let next = transition(at(Stage::DuplexPending), &request(line), &quiet, NOW).unwrap();

    assert!(next.reply.is_none());
    assert_eq!(next.session.stage, Stage::Active);
}

// ============================================
// ENGINE (LINE LEVEL)
// ============================================

#[test]
fn given_full_handshake_when_driven_line_by_line_then_active() {
    let mut engine = ProtocolEngine::new();
    let policy = policy();

    engine
        .handle_line(&auth_line(&digest_hex(TOKEN)), &policy)
        .unwrap();
    engine
        .handle_line(r#"{"id":"2","method":"upgrade duplex"}"#, &policy)
        .unwrap();

    assert_eq!(engine.stage(), Stage::Active);

    engine.reset();
    assert_eq!(engine.stage(), Stage::Unauthenticated);
}

#[test]
fn given_invalid_json_when_handle_line_then_parse_error_with_null_id() {
    let mut engine = ProtocolEngine::new();
    let quiet = Policy {
        reply_to_anonymous: false,
        ..policy()
    };

    let next = engine.handle_line("hello there", &quiet).unwrap();

    let reply = reply_json(&next.reply.unwrap().text);
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], json!(-32700));
    assert!(
        reply["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Wrong JSON: ")
    );
    assert!(matches!(next.event, Some(Event::ParseFailed { .. })));
    assert_eq!(engine.stage(), Stage::Unauthenticated);
}

/// **VALUE**: A parse failure never moves the session, whatever its stage.
///
/// **BUG THIS CATCHES**: Resetting to stage 0 (or dropping to a reply-less
/// path) once the peer is past authorization.
#[test]
fn given_invalid_json_after_authorization_when_handle_line_then_parse_error_and_stage_kept() {
    let policy = policy();

    for stage in [Stage::DuplexPending, Stage::Active] {
        let mut engine = ProtocolEngine::new();
        engine.force_stage(stage);

        let next = engine.handle_line("{not json", &policy).unwrap();

        let reply = reply_json(&next.reply.unwrap().text);
        assert_eq!(reply["id"], Value::Null, "stage {stage}");
        assert_eq!(reply["error"]["code"], json!(-32700), "stage {stage}");
        assert!(!next.terminate);
        assert_eq!(next.session.stage, stage);
        assert_eq!(engine.stage(), stage);
    }
}

/// **VALUE**: Lines decoded lossily from invalid UTF-8 get the same
/// `-32700` as any other malformed input.
#[test]
fn given_lossy_decoded_line_when_handle_line_then_parse_error_and_stage_kept() {
    let line = String::from_utf8_lossy(b"\xff\xfe not json").into_owned();
    let mut engine = ProtocolEngine::new();
    engine.force_stage(Stage::Active);

    let next = engine.handle_line(&line, &policy()).unwrap();

    let reply = reply_json(&next.reply.unwrap().text);
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["error"]["code"], json!(-32700));
    assert!(matches!(next.event, Some(Event::ParseFailed { .. })));
    assert_eq!(engine.stage(), Stage::Active);
}

#[test]
fn given_error_object_without_code_when_handle_line_then_inbound_error_and_no_reply() {
    let mut engine = ProtocolEngine::new();
    engine.force_stage(Stage::Active);

    let next = engine
        .handle_line(r#"{"error":{"message":"boom"}}"#, &policy())
        .unwrap();

    assert!(next.reply.is_none());
    assert_eq!(
        next.event,
        Some(Event::InboundError {
            code: 0,
            message: "boom".to_string(),
            id: None,
        })
    );
    assert_eq!(engine.stage(), Stage::Active);
}

#[test]
fn given_empty_line_when_handle_line_then_terminate() {
    let mut engine = ProtocolEngine::new();

    let next = engine.handle_line("", &policy()).unwrap();

    assert!(next.terminate);
    assert!(next.reply.is_none());
}

#[test]
fn given_remote_log_stage_when_line_received_then_reported_never_dispatched() {
    let mut engine = ProtocolEngine::new();
    engine.force_stage(Stage::RemoteLog);
    let line = r#"{"id":"1","method":"ping","params":["1"]}"#;

    let next = engine.handle_line(line, &policy()).unwrap();

    assert!(next.reply.is_none());
    assert_eq!(next.event, Some(Event::RemoteLog(line.to_string())));
    assert_eq!(engine.stage(), Stage::RemoteLog);
}
