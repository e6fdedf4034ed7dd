//! Getting messages out: MX resolution, the SMTP client, and the engine
//! that walks candidate servers in order until one accepts.

mod engine;
mod resolver;
mod transport;

pub use engine::DeliveryEngine;
pub use resolver::{DnsResolver, MailExchange, MxResolver, ResolveError};
pub use transport::{Envelope, SmtpTransport, Transport, TransportError};
