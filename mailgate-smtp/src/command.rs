use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeloVariant {
    Ehlo(String),
    Helo(String),
}

impl Display for HeloVariant {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Self::Ehlo(_) => "EHLO",
            Self::Helo(_) => "HELO",
        })
    }
}

/// A parsed client command.
///
/// Addresses are carried verbatim with any angle brackets stripped; whether
/// an address is deliverable is the session's problem, not the parser's.
/// ESMTP parameters after a MAIL FROM address are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Helo(HeloVariant),
    Auth {
        mechanism: String,
        initial: Option<String>,
    },
    MailFrom(String),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
    Invalid(String),
}

/// Strip one pair of enclosing angle brackets, if present.
fn unbracket(address: &str) -> &str {
    address
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(address)
}

/// The remainder of `line` after a case-insensitive `verb` prefix.
///
/// Goes through `get` rather than indexing: a multibyte character
/// straddling the verb length is a non-match, not a panic.
fn strip_verb<'a>(line: &'a str, verb: &str) -> Option<&'a str> {
    line.get(..verb.len())
        .filter(|head| head.eq_ignore_ascii_case(verb))
        .map(|_| &line[verb.len()..])
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(variant @ (HeloVariant::Ehlo(id) | HeloVariant::Helo(id))) => {
                write!(fmt, "{variant} {id}")
            }
            Self::Auth { mechanism, .. } => write!(fmt, "AUTH {mechanism}"),
            Self::MailFrom(from) => write!(fmt, "MAIL FROM:<{from}>"),
            Self::RcptTo(to) => write!(fmt, "RCPT TO:<{to}>"),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(raw) => fmt.write_str(raw),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(command: &str) -> Result<Self, Self::Error> {
        let trimmed = command.trim();

        if let Some(rest) = strip_verb(trimmed, "MAIL FROM:") {
            // Everything after the address token is an ESMTP parameter
            // (SIZE, BODY, ...); none of them change what this server does.
            let address = rest.split_whitespace().next().unwrap_or_default();

            Ok(Self::MailFrom(unbracket(address).to_string()))
        } else if let Some(rest) = strip_verb(trimmed, "RCPT TO:") {
            let address = rest.split_whitespace().next().unwrap_or_default();

            Ok(Self::RcptTo(unbracket(address).to_string()))
        } else if strip_verb(trimmed, "EHLO").is_some() || strip_verb(trimmed, "HELO").is_some() {
            match trimmed.split_once(' ') {
                None => Err(Self::Invalid(format!("Expected hostname in {trimmed}"))),
                Some((cmd, host)) if cmd.eq_ignore_ascii_case("HELO") => {
                    Ok(Self::Helo(HeloVariant::Helo(host.trim().to_string())))
                }
                Some((_, host)) => Ok(Self::Helo(HeloVariant::Ehlo(host.trim().to_string()))),
            }
        } else if strip_verb(trimmed, "AUTH")
            .is_some_and(|rest| rest.chars().next().is_none_or(char::is_whitespace))
        {
            let mut words = trimmed.split_whitespace().skip(1);
            let Some(mechanism) = words.next() else {
                return Err(Self::Invalid(format!("Expected a mechanism in {trimmed}")));
            };

            Ok(Self::Auth {
                mechanism: mechanism.to_ascii_uppercase(),
                initial: words.next().map(ToString::to_string),
            })
        } else if trimmed.eq_ignore_ascii_case("DATA") {
            Ok(Self::Data)
        } else if trimmed.eq_ignore_ascii_case("RSET") {
            Ok(Self::Rset)
        } else if trimmed.eq_ignore_ascii_case("NOOP") {
            Ok(Self::Noop)
        } else if trimmed.eq_ignore_ascii_case("QUIT") {
            Ok(Self::Quit)
        } else {
            Err(Self::Invalid(command.to_owned()))
        }
    }
}
