use std::{collections::HashSet, sync::Arc};

use tracing::{debug, error, warn};

use mailgate_common::{
    address,
    model::{MailMessage, MessageError, Upstream},
};

use crate::{
    resolver::MxResolver,
    transport::{Envelope, Transport, TransportError},
};

/// Walks candidate servers for a destination, in order, until one accepts.
///
/// Used by two callers with different candidate sources: the relay path
/// hands over the upstreams configured on a routing record, the outbound
/// path resolves candidates from MX records.
pub struct DeliveryEngine {
    resolver: Arc<dyn MxResolver>,
    transport: Arc<dyn Transport>,
    port: u16,
}

impl DeliveryEngine {
    pub fn new(resolver: Arc<dyn MxResolver>, transport: Arc<dyn Transport>, port: u16) -> Self {
        Self {
            resolver,
            transport,
            port,
        }
    }

    /// A connectable address for a candidate host: the configured port is
    /// appended unless the target already names one.
    fn target_address(&self, target: &str) -> String {
        if target.contains(':') {
            target.to_string()
        } else {
            format!("{target}:{}", self.port)
        }
    }

    /// Try `upstreams` in ascending priority until one accepts the message.
    ///
    /// Returns the last failure when every candidate fails. An empty
    /// candidate list is vacuous success.
    pub async fn send_to_upstreams(
        &self,
        upstreams: &[Upstream],
        envelope: &Envelope,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let mut sorted: Vec<&Upstream> = upstreams.iter().collect();
        sorted.sort_by_key(|upstream| upstream.priority);

        if sorted.is_empty() {
            warn!("No upstreams to deliver to");
        }

        let mut last_error = None;
        for upstream in sorted {
            let target = self.target_address(&upstream.target);
            debug!("Attempting delivery to {target}");

            match self.transport.send(&target, envelope, data).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    error!("Failed to send message to {target}: {err}");
                    last_error = Some(err);
                }
            }
        }

        last_error.map_or(Ok(()), Err)
    }

    /// Deliver an outbound message to every recipient domain, resolving
    /// candidates through MX records.
    ///
    /// Failures never abort the pass; each failed recipient contributes a
    /// [`MessageError`] and the rest still get their attempt. Each domain
    /// is attempted once per message regardless of how many recipients
    /// share it.
    pub async fn deliver(&self, message: &MailMessage, data: &[u8]) -> Vec<MessageError> {
        let envelope = Envelope {
            from: message.from.address.clone(),
            recipients: message
                .recipients()
                .iter()
                .map(|relation| relation.address.clone())
                .collect(),
        };

        let mut errors = Vec::new();
        let mut attempted_domains = HashSet::new();

        for relation in message.recipients() {
            let recipient = relation.address.as_str();

            let Some(domain) = address::domain(recipient) else {
                error!(
                    "Failed to deliver message {}, bad recipient address",
                    message.message_id
                );
                errors.push(MessageError::new(
                    message.id,
                    format!(r#"email address format error: email address "{recipient}" is not valid"#),
                ));
                continue;
            };

            if !attempted_domains.insert(domain.to_string()) {
                continue;
            }

            let exchanges = match self.resolver.resolve(domain).await {
                Ok(exchanges) => exchanges,
                Err(err) => {
                    error!(
                        "Failed to resolve mail exchanges for message {}: {err}",
                        message.message_id
                    );
                    errors.push(MessageError::new(
                        message.id,
                        format!(
                            r#"email address host error: email address "{recipient}" host's MX lookup failed due to {err}"#
                        ),
                    ));
                    continue;
                }
            };

            let upstreams: Vec<Upstream> = exchanges
                .into_iter()
                .map(|exchange| Upstream {
                    target: exchange.host,
                    priority: i32::from(exchange.preference),
                })
                .collect();

            if let Err(err) = self.send_to_upstreams(&upstreams, &envelope, data).await {
                error!(
                    "Failed to deliver message {} to {domain}: {err}",
                    message.message_id
                );
                errors.push(MessageError::new(
                    message.id,
                    format!(
                        r#"email address delivery error: email address "{recipient}" delivery failed due to {err}"#
                    ),
                ));
            }
        }

        errors
    }
}
