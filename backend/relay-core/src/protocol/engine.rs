use crate::envelope::{
    self, AUTHORIZATION_REQUIRED, Encoded, Envelope, INVALID_REQUEST, PARSE_ERROR, WRONG_HASH,
};
use crate::error::envelope::EnvelopeError;
use crate::probe::{self, Latency};
use crate::protocol::{AUTHORIZED_RESULT, Stage, UPGRADED_RESULT};

use common::RedactedToken;

use serde_json::Value;

/// Connection-independent rules the engine applies.
///
/// Built from the live server config for every inbound line, so a token
/// changed by the operator applies to the next `authorization` attempt.
#[derive(Debug, Clone)]
pub struct Policy {
    pub token: RedactedToken,
    /// Consecutive wrong hashes tolerated per connection; 0 = unlimited.
    pub auth_attempt_limit: u32,
    /// Send replies whose request carried no id.
    pub reply_to_anonymous: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            token: RedactedToken::default(),
            auth_attempt_limit: 0,
            reply_to_anonymous: true,
        }
    }
}

/// Per-connection state threaded through [`transition`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub stage: Stage,
    pub failed_auth_attempts: u32,
}

/// Something the supervisor should report; never sent to the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Authorized,
    AuthRejected { attempts: u32 },
    Upgraded,
    /// The peer sent an error envelope.
    InboundError {
        code: i64,
        message: String,
        id: Option<Value>,
    },
    /// The line was not valid JSON.
    ParseFailed { reason: String },
    /// Valid JSON without method, result or error.
    Broken(Envelope),
    /// A method outside the handshake that the engine does not dispatch.
    Unhandled { method: String },
    Latency(Latency),
    /// A line received while the connection is in [`Stage::RemoteLog`].
    RemoteLog(String),
}

/// Outcome of one inbound line.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: Session,
    /// Ready-to-send reply; `None` means nothing goes back to the peer.
    pub reply: Option<Encoded>,
    pub event: Option<Event>,
    /// The connection should be torn down after `reply` is sent.
    pub terminate: bool,
}

impl Transition {
    fn stay(session: Session) -> Self {
        Self {
            session,
            reply: None,
            event: None,
            terminate: false,
        }
    }

    fn with_reply(mut self, reply: Option<Encoded>) -> Self {
        self.reply = reply;
        self
    }

    fn with_event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }
}

/// Pure step function of the handshake state machine.
///
/// `now` is the wall clock in seconds, used only for latency probes.
///
/// # Errors
///
/// Returns [`EnvelopeError::Encode`] if a reply cannot be serialized.
pub fn transition(
    session: Session,
    request: &Envelope,
    policy: &Policy,
    now: f64,
) -> Result<Transition, EnvelopeError> {
    let id = request.id.as_ref();

    if let Some(error) = &request.error {
        return Ok(Transition::stay(session).with_event(Event::InboundError {
            code: error.code,
            message: error.message.clone(),
            id: request.id.clone(),
        }));
    }

    if let Some(result) = request.result() {
        if session.stage != Stage::Active {
            let reply = envelope::encode_error(
                AUTHORIZATION_REQUIRED,
                "forbidden: authorization is necessary",
                id,
            )?;
            return Ok(Transition::stay(session).with_reply(deliverable(reply, policy)));
        }
        let mut next = Transition::stay(session);
        if let Some(latency) = probe::on_pong_reply(result, id, now) {
            next = next.with_event(Event::Latency(latency));
        }
        return Ok(next);
    }

    if let Some(method) = request.method() {
        return handle_method(session, method, request.param(), id, policy);
    }

    Ok(Transition::stay(session).with_event(Event::Broken(request.clone())))
}

fn handle_method(
    session: Session,
    method: &str,
    param: &str,
    id: Option<&Value>,
    policy: &Policy,
) -> Result<Transition, EnvelopeError> {
    let stage = session.stage;

    if let Some(expected) = stage.expected_method() {
        if method != expected {
            let message =
                format!("Wrong method \"{method}\", i wait \"{expected}\" in stage {stage}");
            let reply = envelope::encode_error(INVALID_REQUEST, message, id)?;
            return Ok(Transition::stay(session).with_reply(deliverable(reply, policy)));
        }
    }

    match stage {
        Stage::Unauthenticated => {
            let token = policy.token.as_str();
            if token.is_empty() || envelope::hash_match(token, param) {
                let next = Session {
                    stage: Stage::DuplexPending,
                    failed_auth_attempts: 0,
                };
                let reply = envelope::encode_reply(AUTHORIZED_RESULT, id)?;
                return Ok(Transition::stay(next)
                    .with_reply(deliverable(reply, policy))
                    .with_event(Event::Authorized));
            }

            let attempts = session.failed_auth_attempts.saturating_add(1);
            let next = Session {
                stage,
                failed_auth_attempts: attempts,
            };
            let reply = envelope::encode_error(WRONG_HASH, "forbidden: wrong hash", id)?;
            let mut rejected = Transition::stay(next)
                .with_reply(deliverable(reply, policy))
                .with_event(Event::AuthRejected { attempts });
            rejected.terminate =
                policy.auth_attempt_limit > 0 && attempts >= policy.auth_attempt_limit;
            Ok(rejected)
        }
        Stage::DuplexPending => {
            let next = Session {
                stage: Stage::Active,
                ..session
            };
            let reply = envelope::encode_reply(UPGRADED_RESULT, id)?;
            Ok(Transition::stay(next)
                .with_reply(deliverable(reply, policy))
                .with_event(Event::Upgraded))
        }
        Stage::Active if method == probe::PING_METHOD => {
            let reply = envelope::encode_reply(param, id)?;
            Ok(Transition::stay(session).with_reply(deliverable(reply, policy)))
        }
        Stage::Active | Stage::RemoteLog => {
            Ok(Transition::stay(session).with_event(Event::Unhandled {
                method: method.to_string(),
            }))
        }
    }
}

fn deliverable(reply: Encoded, policy: &Policy) -> Option<Encoded> {
    (reply.has_correlation_id || policy.reply_to_anonymous).then_some(reply)
}

/// Stateful wrapper around [`transition`] for one connection at a time.
#[derive(Debug, Default)]
pub struct ProtocolEngine {
    session: Session,
}

impl ProtocolEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.session.stage
    }

    /// Back to `Unauthenticated`; called for every accepted connection.
    pub fn reset(&mut self) {
        self.session = Session::default();
    }

    /// Operator override, used to enter [`Stage::RemoteLog`].
    pub fn force_stage(&mut self, stage: Stage) {
        self.session.stage = stage;
    }

    /// Process one inbound line.
    ///
    /// An empty line asks for the connection to be terminated. Lines that
    /// are not JSON produce a `-32700` error with a `null` id, which is
    /// always delivered.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] if a reply cannot be serialized.
    pub fn handle_line(
        &mut self,
        line: &str,
        policy: &Policy,
    ) -> Result<Transition, EnvelopeError> {
        if line.is_empty() {
            let mut done = Transition::stay(self.session);
            done.terminate = true;
            return Ok(done);
        }

        if self.session.stage.is_terminal() {
            return Ok(
                Transition::stay(self.session).with_event(Event::RemoteLog(line.to_string()))
            );
        }

        let request = match envelope::decode(line) {
            Ok(request) => request,
            Err(e) => {
                let reason = e.reason().to_string();
                let reply =
                    envelope::encode_error(PARSE_ERROR, format!("Wrong JSON: {reason}"), None)?;
                return Ok(Transition::stay(self.session)
                    .with_reply(Some(reply))
                    .with_event(Event::ParseFailed { reason }));
            }
        };

        let next = transition(self.session, &request, policy, probe::now_seconds())?;
        self.session = next.session;
        Ok(next)
    }
}
