use std::time::Duration;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};
use tracing::{debug, trace};

/// The SMTP envelope for one transaction, independent of the payload's own
/// headers.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub from: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("transaction timed out")]
    Timeout,

    #[error("server closed the connection")]
    Closed,

    #[error("server rejected transaction: {code} {message}")]
    Rejected { code: u16, message: String },

    #[error("malformed server response: {0}")]
    Malformed(String),
}

/// Message submission seam; production speaks SMTP over TCP, tests record
/// what would have been sent.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Submit `data` to the server at `target` (a `host:port` address) for
    /// the given envelope.
    async fn send(
        &self,
        target: &str,
        envelope: &Envelope,
        data: &[u8],
    ) -> Result<(), TransportError>;
}

/// Plain SMTP client transport.
///
/// One connection per transaction: greet, EHLO (falling back to HELO for
/// old servers), envelope, DATA, payload, QUIT. The whole transaction runs
/// under a single timeout.
pub struct SmtpTransport {
    helo_domain: String,
    timeout: Duration,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[derive(Debug)]
struct Response {
    code: u16,
    message: String,
}

impl Response {
    const fn is_positive(&self) -> bool {
        self.code < 400
    }

    fn reject(self) -> TransportError {
        TransportError::Rejected {
            code: self.code,
            message: self.message,
        }
    }
}

impl SmtpTransport {
    #[must_use]
    pub fn new(helo_domain: impl Into<String>, timeout: Duration) -> Self {
        Self {
            helo_domain: helo_domain.into(),
            timeout,
        }
    }

    async fn transact(
        &self,
        target: &str,
        envelope: &Envelope,
        data: &[u8],
    ) -> Result<(), TransportError> {
        debug!("Connecting to {target}");

        let stream = TcpStream::connect(target).await?;
        let (read, write) = stream.into_split();
        let mut connection = Connection {
            reader: BufReader::new(read),
            writer: write,
        };

        let greeting = connection.read_response().await?;
        if !greeting.is_positive() {
            return Err(greeting.reject());
        }

        let ehlo = connection
            .command(&format!("EHLO {}", self.helo_domain))
            .await?;
        if !ehlo.is_positive() {
            let helo = connection
                .command(&format!("HELO {}", self.helo_domain))
                .await?;
            if !helo.is_positive() {
                return Err(helo.reject());
            }
        }

        let mail = connection
            .command(&format!("MAIL FROM:<{}>", envelope.from))
            .await?;
        if !mail.is_positive() {
            return Err(mail.reject());
        }

        for recipient in &envelope.recipients {
            let rcpt = connection
                .command(&format!("RCPT TO:<{recipient}>"))
                .await?;
            if !rcpt.is_positive() {
                return Err(rcpt.reject());
            }
        }

        let ready = connection.command("DATA").await?;
        if ready.code != 354 {
            return Err(ready.reject());
        }

        connection.writer.write_all(&dot_stuff(data)).await?;
        connection.writer.write_all(b".\r\n").await?;
        connection.writer.flush().await?;

        let accepted = connection.read_response().await?;
        if !accepted.is_positive() {
            return Err(accepted.reject());
        }

        // The message is accepted; a failed QUIT is not worth reporting.
        let _ = connection.command("QUIT").await;

        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for SmtpTransport {
    async fn send(
        &self,
        target: &str,
        envelope: &Envelope,
        data: &[u8],
    ) -> Result<(), TransportError> {
        tokio::time::timeout(self.timeout, self.transact(target, envelope, data))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

impl Connection {
    async fn command(&mut self, command: &str) -> Result<Response, TransportError> {
        trace!(">>> {command}");
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        self.read_response().await
    }

    /// Read one full reply, following continuation lines (`250-...`) until
    /// the final line (`250 ...`).
    async fn read_response(&mut self) -> Result<Response, TransportError> {
        let mut message = String::new();

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(TransportError::Closed);
            }
            trace!("<<< {}", line.trim_end());

            let line = line.trim_end_matches(['\r', '\n']);
            let (code, text, more) = parse_reply_line(line)?;

            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(text);

            if !more {
                return Ok(Response { code, message });
            }
        }
    }
}

/// Split one reply line into its code, text, and whether a continuation
/// line follows. `get` keeps a multibyte character across the code
/// boundary from panicking the slice.
fn parse_reply_line(line: &str) -> Result<(u16, &str, bool), TransportError> {
    let code: u16 = line
        .get(..3)
        .and_then(|head| head.parse().ok())
        .ok_or_else(|| TransportError::Malformed(line.to_string()))?;

    let text = line[3..].trim_start_matches([' ', '-']);
    let more = line.as_bytes().get(3) == Some(&b'-');

    Ok((code, text, more))
}

/// Prepare a payload for the DATA phase: normalise the final line ending
/// and escape any line starting with a dot.
#[must_use]
pub(crate) fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    let mut at_line_start = true;

    for &byte in data {
        if at_line_start && byte == b'.' {
            out.push(b'.');
        }
        out.push(byte);
        at_line_start = byte == b'\n';
    }

    if !out.ends_with(b"\r\n") {
        if out.ends_with(b"\n") {
            out.pop();
            out.extend_from_slice(b"\r\n");
        } else {
            out.extend_from_slice(b"\r\n");
        }
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn leading_dots_are_doubled() {
        let stuffed = dot_stuff(b"line one\r\n.hidden\r\n..already\r\n");
        assert_eq!(stuffed, b"line one\r\n..hidden\r\n...already\r\n");
    }

    #[test]
    fn payloads_end_with_crlf() {
        assert_eq!(dot_stuff(b"no newline"), b"no newline\r\n");
        assert_eq!(dot_stuff(b"bare newline\n"), b"bare newline\r\n");
        assert_eq!(dot_stuff(b"proper\r\n"), b"proper\r\n");
    }

    #[test]
    fn reply_lines_split_into_code_text_and_continuation() {
        assert!(matches!(
            parse_reply_line("250 Ok"),
            Ok((250, "Ok", false))
        ));
        assert!(matches!(
            parse_reply_line("250-SIZE 10240000"),
            Ok((250, "SIZE 10240000", true))
        ));

        // Garbage stays an error, including multibyte bytes sitting where
        // the code should be.
        for line in ["", "25", "abc hello", "2é0 Ok", "état 250"] {
            assert!(matches!(
                parse_reply_line(line),
                Err(TransportError::Malformed(_))
            ));
        }
    }

    #[test]
    fn responses_classify_by_code() {
        let ok = Response {
            code: 250,
            message: "Ok".into(),
        };
        let rejected = Response {
            code: 550,
            message: "No".into(),
        };

        assert!(ok.is_positive());
        assert!(!rejected.is_positive());
        assert!(matches!(
            rejected.reject(),
            TransportError::Rejected { code: 550, .. }
        ));
    }
}
