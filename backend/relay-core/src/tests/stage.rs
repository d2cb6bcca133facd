use crate::protocol::{AUTHORIZATION_METHOD, Stage, UPGRADE_METHOD};

#[test]
fn given_new_connection_when_default_then_unauthenticated() {
    assert_eq!(Stage::default(), Stage::Unauthenticated);
}

#[test]
fn given_stages_when_displayed_then_ordinal() {
    assert_eq!(Stage::Unauthenticated.to_string(), "0");
    assert_eq!(Stage::DuplexPending.to_string(), "1");
    assert_eq!(Stage::Active.to_string(), "2");
    assert_eq!(Stage::RemoteLog.to_string(), "3");
}

#[test]
fn given_handshake_stages_when_expected_method_then_one_method_each() {
    assert_eq!(
        Stage::Unauthenticated.expected_method(),
        Some(AUTHORIZATION_METHOD)
    );
    assert_eq!(Stage::DuplexPending.expected_method(), Some(UPGRADE_METHOD));
    assert_eq!(Stage::Active.expected_method(), None);
}

#[test]
fn given_remote_log_when_is_terminal_then_true() {
    assert!(Stage::RemoteLog.is_terminal());
    assert!(!Stage::Active.is_terminal());
    assert!(!Stage::Unauthenticated.is_terminal());
}
