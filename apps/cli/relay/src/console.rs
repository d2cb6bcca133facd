//! Operator console.
//!
//! Reads one command per line and drives the supervisor handle. The first
//! word is the command and the rest of the line its value; a value of a
//! single space means "empty" (e.g. `token  ` clears the token). Anything
//! that is not a command is sent to the client verbatim.

use crate::error::RelayError;

use relay_core::supervisor::{Delivery, SupervisorHandle};

use common::ErrorLocation;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

const USAGE: &str = "\
commands:
    help              show this list
    close             close the active connection
    exit              stop the server and quit
    ping              measure round-trip latency to the client
    token [value]     show or set the shared token
    ip [value]        show or set the listen ip (rebinds)
    port [value]      show or set the listen port (rebinds)
    remote_log        switch the client to remote logging
    <anything else>   send the line to the client as is";

/// Shown when a command needs a client and none is connected.
pub const NO_CLIENTS_MESSAGE: &str = "no clients";

/// One parsed operator line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Close,
    Exit,
    Ping,
    RemoteLog,
    /// `None` shows the current value.
    Token(Option<String>),
    Ip(Option<String>),
    Port(Option<String>),
    Send(String),
}

impl ConsoleCommand {
    /// Parse an operator line; `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_start_matches(' ');
        if line.is_empty() {
            return None;
        }

        let (command, value) = match line.split_once(' ') {
            Some((command, "")) => (command, None),
            Some((command, " ")) => (command, Some(String::new())),
            Some((command, value)) => (command, Some(value.to_string())),
            None => (line, None),
        };

        let parsed = match command {
            "help" => ConsoleCommand::Help,
            "close" => ConsoleCommand::Close,
            "exit" => ConsoleCommand::Exit,
            "ping" => ConsoleCommand::Ping,
            "remote_log" => ConsoleCommand::RemoteLog,
            "token" => ConsoleCommand::Token(value),
            "ip" => ConsoleCommand::Ip(value),
            "port" => ConsoleCommand::Port(value),
            _ => ConsoleCommand::Send(line.to_string()),
        };
        Some(parsed)
    }
}

/// Parse a console port value.
///
/// # Errors
///
/// Returns [`RelayError::Console`] unless `value` is a decimal `u16`.
#[track_caller]
pub fn parse_port(value: &str) -> Result<u16, RelayError> {
    value.parse::<u16>().map_err(|e| RelayError::Console {
        message: format!("Wrong port \"{value}\": {e}"),
        location: ErrorLocation::caller(),
    })
}

/// Whether the console keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Line-driven console over any async reader/writer (stdin/stdout in the binary).
pub struct Console<R, W> {
    handle: SupervisorHandle,
    input: Lines<R>,
    output: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(handle: SupervisorHandle, input: R, output: W) -> Self {
        Self {
            handle,
            input: input.lines(),
            output,
        }
    }

    /// Read and execute commands until `exit` or end of input.
    ///
    /// Does not stop the supervisor; the caller does that.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Console`] if reading input or writing output fails.
    pub async fn run(mut self) -> Result<(), RelayError> {
        loop {
            let line = self.input.next_line().await.map_err(|e| RelayError::Console {
                message: format!("Failed to read console input: {e}"),
                location: ErrorLocation::caller(),
            })?;

            let Some(line) = line else {
                info!("Console input closed");
                return Ok(());
            };

            let Some(command) = ConsoleCommand::parse(&line) else {
                continue;
            };

            if self.execute(command).await? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Execute one command against the supervisor.
    ///
    /// Supervisor failures are reported to the operator, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Console`] only if writing output fails.
    pub async fn execute(&mut self, command: ConsoleCommand) -> Result<Flow, RelayError> {
        debug!("console: {command:?}");

        match command {
            ConsoleCommand::Help => self.say(USAGE).await?,
            ConsoleCommand::Close => {
                let peer = self.handle.peer().await;
                match peer {
                    Some(peer) if self.handle.close().await => {
                        self.say(&format!("Connection {peer} closed")).await?;
                    }
                    _ => self.say("No active connection").await?,
                }
            }
            ConsoleCommand::Exit => return Ok(Flow::Exit),
            ConsoleCommand::Ping => {
                let sent = self.handle.ping().await;
                self.report_delivery(sent).await?;
            }
            ConsoleCommand::RemoteLog => {
                let sent = self.handle.remote_log().await;
                self.report_delivery(sent).await?;
            }
            ConsoleCommand::Token(None) => {
                let token = self.handle.token().await;
                self.say(&format!("Current token: \"{}\"", token.as_str()))
                    .await?;
            }
            ConsoleCommand::Token(Some(value)) => match self.handle.set_token(value).await {
                Ok(()) => {
                    let token = self.handle.token().await;
                    self.say(&format!("New token: \"{}\"", token.as_str()))
                        .await?;
                }
                Err(e) => self.say(&format!("Failed to set token: {e}")).await?,
            },
            ConsoleCommand::Ip(None) => {
                let ip = self.handle.ip().await;
                self.say(&format!("Current ip: \"{ip}\"")).await?;
            }
            ConsoleCommand::Ip(Some(value)) => match self.handle.set_ip(value.as_str()).await {
                Ok(()) => self.say(&format!("New ip: \"{value}\"")).await?,
                Err(e) => self.say(&format!("Wrong ip \"{value}\": {e}")).await?,
            },
            ConsoleCommand::Port(None) => {
                let port = self.handle.port().await;
                self.say(&format!("Current port: \"{port}\"")).await?;
            }
            ConsoleCommand::Port(Some(value)) => match parse_port(&value) {
                Ok(port) => match self.handle.set_port(port).await {
                    Ok(()) => self.say(&format!("New port: \"{port}\"")).await?,
                    Err(e) => self.say(&format!("Failed to set port: {e}")).await?,
                },
                Err(e) => self.say(&e.to_string()).await?,
            },
            ConsoleCommand::Send(line) => {
                let sent = self.handle.send(&line).await;
                self.report_delivery(sent).await?;
            }
        }

        Ok(Flow::Continue)
    }

    async fn report_delivery<E: std::fmt::Display>(
        &mut self,
        sent: Result<Delivery, E>,
    ) -> Result<(), RelayError> {
        match sent {
            Ok(Delivery::Sent) => Ok(()),
            Ok(Delivery::NoClients) => self.say(NO_CLIENTS_MESSAGE).await,
            Err(e) => {
                warn!("Console send failed: {e}");
                self.say(&format!("Send failed: {e}")).await
            }
        }
    }

    async fn say(&mut self, text: &str) -> Result<(), RelayError> {
        let written = async {
            self.output.write_all(text.as_bytes()).await?;
            self.output.write_all(b"\n").await?;
            self.output.flush().await
        };
        written.await.map_err(|e| RelayError::Console {
            message: format!("Failed to write console output: {e}"),
            location: ErrorLocation::caller(),
        })
    }
}
