use crate::{command::Command, status::Status};

/// Where a session is in the protocol.
///
/// The machine only sequences commands; validating addresses, credentials,
/// and payloads happens in the session around it. A rejected transition
/// leaves the session in its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Connected, nothing said yet.
    Connected,
    /// Greeted with HELO or EHLO, no open envelope.
    Idle { authenticated: bool },
    /// MAIL FROM accepted, waiting for recipients.
    Envelope { authenticated: bool },
    /// At least one RCPT TO accepted.
    Accumulating { authenticated: bool },
}

impl State {
    const fn authenticated(self) -> bool {
        match self {
            Self::Connected => false,
            Self::Idle { authenticated }
            | Self::Envelope { authenticated }
            | Self::Accumulating { authenticated } => authenticated,
        }
    }

    /// The state this command would move the session to, or the status to
    /// reject it with.
    ///
    /// For DATA the returned state is the one reached after the payload
    /// phase completes.
    pub fn transition(self, command: &Command) -> Result<Self, Status> {
        let authenticated = self.authenticated();

        match command {
            // A fresh greeting wipes any open envelope.
            Command::Helo(_) => Ok(Self::Idle { authenticated }),

            Command::Auth { .. } => match self {
                Self::Idle {
                    authenticated: false,
                } => Ok(Self::Idle {
                    authenticated: true,
                }),
                _ => Err(Status::BadSequence),
            },

            Command::MailFrom(_) => match self {
                Self::Idle { .. } => Ok(Self::Envelope { authenticated }),
                _ => Err(Status::BadSequence),
            },

            Command::RcptTo(_) => match self {
                Self::Envelope { .. } | Self::Accumulating { .. } => {
                    Ok(Self::Accumulating { authenticated })
                }
                _ => Err(Status::BadSequence),
            },

            Command::Data => match self {
                Self::Accumulating { .. } => Ok(Self::Idle { authenticated }),
                _ => Err(Status::BadSequence),
            },

            Command::Rset => match self {
                Self::Connected => Ok(Self::Connected),
                _ => Ok(Self::Idle { authenticated }),
            },

            Command::Noop | Command::Quit | Command::Invalid(_) => Ok(self),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::command::HeloVariant;

    use super::*;

    fn ehlo() -> Command {
        Command::Helo(HeloVariant::Ehlo("client.test".into()))
    }

    fn auth() -> Command {
        Command::Auth {
            mechanism: "PLAIN".into(),
            initial: None,
        }
    }

    #[test]
    fn the_happy_path_walks_every_state() {
        let state = State::Connected;
        let state = state.transition(&ehlo()).unwrap();
        assert_eq!(
            state,
            State::Idle {
                authenticated: false
            }
        );

        let state = state
            .transition(&Command::MailFrom("a@example.com".into()))
            .unwrap();
        assert_eq!(
            state,
            State::Envelope {
                authenticated: false
            }
        );

        let state = state
            .transition(&Command::RcptTo("b@example.com".into()))
            .unwrap();
        assert_eq!(
            state,
            State::Accumulating {
                authenticated: false
            }
        );

        // DATA lands back in Idle once the payload is done.
        let state = state.transition(&Command::Data).unwrap();
        assert_eq!(
            state,
            State::Idle {
                authenticated: false
            }
        );
    }

    #[test]
    fn commands_out_of_order_are_rejected() {
        assert_eq!(
            State::Connected.transition(&Command::MailFrom("a@example.com".into())),
            Err(Status::BadSequence)
        );
        assert_eq!(
            State::Idle {
                authenticated: false
            }
            .transition(&Command::RcptTo("a@example.com".into())),
            Err(Status::BadSequence)
        );
        assert_eq!(
            State::Envelope {
                authenticated: false
            }
            .transition(&Command::Data),
            Err(Status::BadSequence)
        );
        // Nested MAIL FROM is not a thing.
        assert_eq!(
            State::Envelope {
                authenticated: false
            }
            .transition(&Command::MailFrom("a@example.com".into())),
            Err(Status::BadSequence)
        );
    }

    #[test]
    fn authentication_survives_the_rest_of_the_session() {
        let state = State::Idle {
            authenticated: false,
        }
        .transition(&auth())
        .unwrap();
        assert!(state.authenticated());

        let state = state
            .transition(&Command::MailFrom("a@example.com".into()))
            .unwrap();
        let state = state.transition(&Command::Rset).unwrap();
        assert_eq!(
            state,
            State::Idle {
                authenticated: true
            }
        );
    }

    #[test]
    fn authenticating_twice_or_mid_envelope_is_rejected() {
        assert_eq!(
            State::Idle {
                authenticated: true
            }
            .transition(&auth()),
            Err(Status::BadSequence)
        );
        assert_eq!(
            State::Envelope {
                authenticated: false
            }
            .transition(&auth()),
            Err(Status::BadSequence)
        );
        assert_eq!(State::Connected.transition(&auth()), Err(Status::BadSequence));
    }

    #[test]
    fn rset_before_greeting_stays_put() {
        assert_eq!(
            State::Connected.transition(&Command::Rset),
            Ok(State::Connected)
        );
    }
}
