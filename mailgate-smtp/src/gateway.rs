use std::sync::Arc;

use tracing::{debug, error, info};

use mailgate_backend::Backend;
use mailgate_blob::ObjectStore;
use mailgate_cache::RoutingCache;
use mailgate_common::{address, model::Upstream};
use mailgate_delivery::{DeliveryEngine, Envelope};
use mailgate_mime::ParsedMessage;

use crate::status::{Reply, Status};

/// One accepted recipient of the open envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    /// Zero for recipients on relayed domains.
    pub inbox_id: u64,
}

/// Everything a session needs beyond protocol plumbing: routing decisions
/// at RCPT time and message handling at the end of DATA.
pub struct Gateway {
    cache: Arc<RoutingCache>,
    backend: Arc<dyn Backend>,
    store: Arc<dyn ObjectStore>,
    engine: Arc<DeliveryEngine>,
}

impl Gateway {
    pub fn new(
        cache: Arc<RoutingCache>,
        backend: Arc<dyn Backend>,
        store: Arc<dyn ObjectStore>,
        engine: Arc<DeliveryEngine>,
    ) -> Self {
        Self {
            cache,
            backend,
            store,
            engine,
        }
    }

    /// Decide what to do with one RCPT TO address.
    ///
    /// - A domain this gateway knows nothing about is accepted but yields
    ///   no recipient; the message is swallowed rather than leaking which
    ///   domains are configured.
    /// - A hosted domain requires a matching inbox.
    /// - A relayed domain always accepts.
    pub async fn resolve_recipient(&self, address: &str) -> Result<Option<Recipient>, Reply> {
        if !address::is_valid(address) {
            return Err(Reply::new(
                Status::BadMailbox,
                format!(r#"mailbox name not allowed "{address}""#),
            ));
        }

        // is_valid guarantees the domain is there
        let Some(host) = address::domain(address) else {
            return Err(Reply::new(
                Status::BadMailbox,
                format!(r#"mailbox name not allowed "{address}""#),
            ));
        };

        let Some(mail) = self.cache.lookup(host).await else {
            debug!(r#"Accepting recipient "{address}" for unknown domain {host}"#);
            return Ok(None);
        };

        if mail.relay {
            return Ok(Some(Recipient {
                address: address.to_string(),
                inbox_id: 0,
            }));
        }

        match mail.inbox_for(address) {
            Some(inbox) => Ok(Some(Recipient {
                address: address.to_string(),
                inbox_id: inbox.id,
            })),
            None => Err(Reply::new(
                Status::MailboxUnavailable,
                format!(r#"mailbox unknown "{address}""#),
            )),
        }
    }

    /// Handle a completed message for every queued recipient.
    ///
    /// Recipients are processed independently, from a fresh parse each, so
    /// a hosted copy and a relayed copy of the same payload never share
    /// state. The first failure aborts the transaction with its reply; the
    /// client is expected to retry the whole message.
    pub async fn process(&self, recipients: &[Recipient], raw: &[u8]) -> Result<(), Reply> {
        for recipient in recipients {
            let Some(host) = address::domain(&recipient.address) else {
                return Err(Reply::new(
                    Status::ActionAborted,
                    format!(r#"address format error "{}""#, recipient.address),
                ));
            };

            // The record can expire or change between RCPT and DATA.
            let Some(mail) = self.cache.lookup(host).await else {
                return Err(Reply::new(
                    Status::MailboxUnavailable,
                    format!(r#"mail unknown "{host}""#),
                ));
            };

            let parsed = match mailgate_mime::parse(raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    error!("Failed to parse message: {err}");
                    return Err(Reply::new(Status::ActionAborted, "email parsing failed"));
                }
            };

            if mail.relay {
                self.relay(&parsed, &mail.upstreams).await?;
            } else {
                self.receive(&parsed, recipient).await?;
            }
        }

        Ok(())
    }

    /// Forward a message to the upstreams configured for its domain.
    async fn relay(
        &self,
        parsed: &ParsedMessage,
        upstreams: &[Upstream],
    ) -> Result<(), Reply> {
        info!("Relaying message {}", parsed.message_id);

        let wire = mailgate_mime::encode(parsed).map_err(|err| {
            error!("Failed to rebuild message for relay: {err}");
            Reply::new(
                Status::MailboxUnavailable,
                format!("email relaying failed: {err}"),
            )
        })?;

        let envelope = Envelope {
            from: parsed
                .from
                .as_ref()
                .map(|from| from.address.clone())
                .unwrap_or_default(),
            recipients: parsed
                .to
                .iter()
                .chain(&parsed.cc)
                .chain(&parsed.bcc)
                .map(|relation| relation.address.clone())
                .collect(),
        };

        self.engine
            .send_to_upstreams(upstreams, &envelope, &wire)
            .await
            .map_err(|err| {
                error!("Failed to relay message {}: {err}", parsed.message_id);
                Reply::new(
                    Status::MailboxUnavailable,
                    format!("email relaying failed: {err}"),
                )
            })
    }

    /// Persist a message for a hosted inbox and hand it to the backend.
    async fn receive(&self, parsed: &ParsedMessage, recipient: &Recipient) -> Result<(), Reply> {
        info!(
            "Receiving message {} for inbox {}",
            parsed.message_id, recipient.inbox_id
        );

        let message = mailgate_mime::persist(self.store.as_ref(), parsed, recipient.inbox_id)
            .await
            .map_err(|err| {
                error!("Failed to persist message {}: {err}", parsed.message_id);
                Reply::new(
                    Status::ActionAborted,
                    "email receive failed due to internal error",
                )
            })?;

        self.backend.push_inbound(&message).await.map_err(|err| {
            error!(
                "Failed to push message {} to the backend: {err}",
                parsed.message_id
            );
            Reply::new(
                Status::ActionAborted,
                "email receive failed due to internal error",
            )
        })
    }
}
