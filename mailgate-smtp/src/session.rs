use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf},
    time::timeout,
};
use tracing::{info, trace, warn};
use uuid::Uuid;

use mailgate_common::{address, config::ServerConfig};

use crate::{
    command::{Command, HeloVariant},
    gateway::{Gateway, Recipient},
    state::State,
    status::{Reply, Status},
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("client timed out")]
    TimedOut,

    #[error("client disconnected mid-message")]
    Disconnected,
}

/// The per-session knobs, lifted out of the server configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub domain: String,
    pub max_message_bytes: usize,
    pub max_recipients: usize,
    /// AUTH on a plaintext listener is refused unless this is set.
    pub allow_insecure_auth: bool,
    pub timeout_read: Duration,
    pub timeout_write: Duration,
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            max_message_bytes: config.max_message_bytes,
            max_recipients: config.max_recipients,
            allow_insecure_auth: config.allow_insecure_auth,
            timeout_read: config.timeout_read(),
            timeout_write: config.timeout_write(),
        }
    }
}

/// One client connection, from greeting to QUIT.
///
/// Generic over the stream so tests can drive it over an in-memory pipe.
pub struct Session<Stream> {
    id: Uuid,
    peer: SocketAddr,
    reader: BufReader<ReadHalf<Stream>>,
    writer: WriteHalf<Stream>,
    config: Arc<SessionConfig>,
    gateway: Arc<Gateway>,
    state: State,
    sender: String,
    recipients: Vec<Recipient>,
}

impl<Stream> Session<Stream>
where
    Stream: AsyncRead + AsyncWrite + Send + Unpin,
{
    pub fn create(
        stream: Stream,
        peer: SocketAddr,
        config: Arc<SessionConfig>,
        gateway: Arc<Gateway>,
    ) -> Self {
        let (read, write) = tokio::io::split(stream);

        Self {
            id: Uuid::new_v4(),
            peer,
            reader: BufReader::new(read),
            writer: write,
            config,
            gateway,
            state: State::Connected,
            sender: String::new(),
            recipients: Vec::new(),
        }
    }

    pub async fn run(mut self) -> Result<(), SessionError> {
        info!("Session {} opened from {}", self.id, self.peer);

        self.reply(&Reply::new(
            Status::ServiceReady,
            format!("{} ESMTP service ready", self.config.domain),
        ))
        .await?;

        loop {
            let Some(line) = self.read_line().await? else {
                // Client went away without QUIT.
                break;
            };

            let command = Command::try_from(line.as_str()).unwrap_or_else(|invalid| invalid);
            trace!("Session {} <<< {command}", self.id);

            match command {
                Command::Invalid(raw) => {
                    warn!("Session {} sent unrecognized command: {raw}", self.id);
                    self.reply(&Reply::new(
                        Status::SyntaxError,
                        "Syntax error, command unrecognized",
                    ))
                    .await?;
                }
                Command::Quit => {
                    self.reply(&Reply::new(
                        Status::GoodBye,
                        format!("{} closing connection", self.config.domain),
                    ))
                    .await?;
                    break;
                }
                Command::Noop => {
                    self.reply(&Reply::new(Status::Ok, "OK")).await?;
                }
                command => match self.state.transition(&command) {
                    Ok(next) => self.handle(&command, next).await?,
                    Err(status) => {
                        self.reply(&Reply::new(status, "Bad sequence of commands"))
                            .await?;
                    }
                },
            }
        }

        info!("Session {} closed", self.id);
        Ok(())
    }

    /// Act on a command the state machine already admitted. `next` is only
    /// committed when the command's own checks pass.
    async fn handle(&mut self, command: &Command, next: State) -> Result<(), SessionError> {
        match command {
            Command::Helo(variant) => self.handle_helo(variant, next).await,
            Command::Auth { mechanism, initial } => {
                self.handle_auth(mechanism, initial.as_deref(), next).await
            }
            Command::MailFrom(from) => self.handle_mail(from, next).await,
            Command::RcptTo(to) => self.handle_rcpt(to, next).await,
            Command::Data => self.handle_data(next).await,
            Command::Rset => {
                self.reset();
                self.state = next;
                self.reply(&Reply::new(Status::Ok, "OK")).await
            }
            // Handled before dispatch.
            Command::Noop | Command::Quit | Command::Invalid(_) => Ok(()),
        }
    }

    async fn handle_helo(&mut self, variant: &HeloVariant, next: State) -> Result<(), SessionError> {
        self.reset();
        self.state = next;

        match variant {
            HeloVariant::Helo(client) => {
                self.reply(&Reply::new(
                    Status::Ok,
                    format!("{} greets {client}", self.config.domain),
                ))
                .await
            }
            HeloVariant::Ehlo(client) => {
                self.reply_lines(
                    Status::Ok,
                    &[
                        format!("{} greets {client}", self.config.domain),
                        format!("SIZE {}", self.config.max_message_bytes),
                        "AUTH PLAIN".to_string(),
                    ],
                )
                .await
            }
        }
    }

    async fn handle_auth(
        &mut self,
        mechanism: &str,
        initial: Option<&str>,
        next: State,
    ) -> Result<(), SessionError> {
        if !self.config.allow_insecure_auth {
            return self
                .reply(&Reply::new(
                    Status::EncryptionRequired,
                    "Encryption required for requested authentication mechanism",
                ))
                .await;
        }

        if mechanism != "PLAIN" {
            return self
                .reply(&Reply::new(
                    Status::UnsupportedMechanism,
                    format!("Unsupported authentication mechanism {mechanism}"),
                ))
                .await;
        }

        if initial.is_none() {
            self.reply(&Reply::new(Status::ProvideCredentials, ""))
                .await?;

            let Some(line) = self.read_line().await? else {
                return Err(SessionError::Disconnected);
            };
            if line.trim() == "*" {
                return self
                    .reply(&Reply::new(
                        Status::InvalidParameters,
                        "Authentication cancelled",
                    ))
                    .await;
            }
        }

        // Credentials are accepted as presented; per-inbox policy is the
        // backend's job once a message arrives.
        self.state = next;
        self.reply(&Reply::new(
            Status::AuthenticationSucceeded,
            "Authentication succeeded",
        ))
        .await
    }

    async fn handle_mail(&mut self, from: &str, next: State) -> Result<(), SessionError> {
        if !address::is_valid(from) {
            return self
                .reply(&Reply::new(
                    Status::BadMailbox,
                    format!(r#"mailbox name error "{from}""#),
                ))
                .await;
        }

        self.sender = from.to_string();
        self.recipients.clear();
        self.state = next;
        self.reply(&Reply::new(Status::Ok, "OK")).await
    }

    async fn handle_rcpt(&mut self, to: &str, next: State) -> Result<(), SessionError> {
        if self.recipients.len() >= self.config.max_recipients {
            return self
                .reply(&Reply::new(Status::TooManyRecipients, "Too many recipients"))
                .await;
        }

        match self.gateway.resolve_recipient(to).await {
            Err(reply) => self.reply(&reply).await,
            Ok(queued) => {
                if let Some(recipient) = queued {
                    self.recipients.push(recipient);
                }
                self.state = next;
                self.reply(&Reply::new(Status::Ok, "OK")).await
            }
        }
    }

    async fn handle_data(&mut self, next: State) -> Result<(), SessionError> {
        self.reply(&Reply::new(
            Status::StartMailInput,
            "Start mail input; end with <CRLF>.<CRLF>",
        ))
        .await?;

        let body = self.read_body().await?;

        // The envelope is spent whether the message is accepted or not.
        let recipients = std::mem::take(&mut self.recipients);
        self.sender.clear();
        self.state = next;

        let Some(data) = body else {
            return self
                .reply(&Reply::new(
                    Status::ExceededStorage,
                    format!(
                        "message exceeds maximum size of {} bytes",
                        self.config.max_message_bytes
                    ),
                ))
                .await;
        };

        match self.gateway.process(&recipients, &data).await {
            Ok(()) => self.reply(&Reply::new(Status::Ok, "OK")).await,
            Err(reply) => self.reply(&reply).await,
        }
    }

    fn reset(&mut self) {
        self.sender.clear();
        self.recipients.clear();
    }

    /// Read the DATA payload up to the lone-dot terminator, undoing dot
    /// stuffing as it goes.
    ///
    /// An oversized payload is drained to the terminator but dropped;
    /// `None` tells the caller to reject it.
    async fn read_body(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        let mut body = Vec::new();
        let mut oversized = false;

        loop {
            let mut line = Vec::new();
            if self.next_line(&mut line).await? == 0 {
                return Err(SessionError::Disconnected);
            }

            let mut end = line.len();
            while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
                end -= 1;
            }
            if &line[..end] == b"." {
                break;
            }

            let payload: &[u8] = if line.first() == Some(&b'.') {
                &line[1..]
            } else {
                &line
            };

            if !oversized {
                body.extend_from_slice(payload);
                if body.len() > self.config.max_message_bytes {
                    oversized = true;
                    body.clear();
                }
            }
        }

        Ok(if oversized { None } else { Some(body) })
    }

    async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        let mut line = Vec::new();
        if self.next_line(&mut line).await? == 0 {
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&line);
        Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()))
    }

    async fn next_line(&mut self, line: &mut Vec<u8>) -> Result<usize, SessionError> {
        match timeout(
            self.config.timeout_read,
            self.reader.read_until(b'\n', line),
        )
        .await
        {
            Ok(read) => Ok(read?),
            Err(_) => {
                let _ = self
                    .reply(&Reply::new(
                        Status::ServiceClosing,
                        "Timeout waiting for client",
                    ))
                    .await;
                Err(SessionError::TimedOut)
            }
        }
    }

    async fn reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        trace!("Session {} >>> {reply}", self.id);

        let line = format!("{reply}\r\n");
        timeout(self.config.timeout_write, async {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.flush().await
        })
        .await
        .map_err(|_| SessionError::TimedOut)??;

        Ok(())
    }

    /// A multi-line reply: every line but the last carries the
    /// continuation marker.
    async fn reply_lines(&mut self, status: Status, lines: &[String]) -> Result<(), SessionError> {
        let mut wire = String::new();
        for (index, text) in lines.iter().enumerate() {
            let separator = if index + 1 == lines.len() { ' ' } else { '-' };
            wire.push_str(&format!("{status}{separator}{text}\r\n"));
        }
        trace!("Session {} >>> {}", self.id, wire.trim_end());

        timeout(self.config.timeout_write, async {
            self.writer.write_all(wire.as_bytes()).await?;
            self.writer.flush().await
        })
        .await
        .map_err(|_| SessionError::TimedOut)??;

        Ok(())
    }
}
