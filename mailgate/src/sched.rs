use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, broadcast},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use mailgate_backend::Backend;
use mailgate_blob::ObjectStore;
use mailgate_cache::RoutingCache;
use mailgate_common::{
    Signal,
    model::{MailMessage, MessageError},
};
use mailgate_delivery::DeliveryEngine;

/// Periodically reconciles cached routing records with the backend.
pub struct Refresher {
    cache: Arc<RoutingCache>,
    every: Duration,
}

impl Refresher {
    pub fn new(cache: Arc<RoutingCache>, every: Duration) -> Self {
        Self { cache, every }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<Signal>) {
        let mut ticker = tokio::time::interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Stopping mail record refresh");
                    break;
                }
                _ = ticker.tick() => self.cache.refresh_sweep().await,
            }
        }
    }
}

/// Periodically drains the backend's outbound queue and delivers what it
/// finds.
///
/// The backend may hand the same message out on consecutive pulls, so ids
/// delivered in this process are remembered and skipped. A message that
/// fails stays unmarked and gets another attempt next sweep. Once the
/// backend stops handing an id out it is forgotten, which keeps the set
/// bounded by the queue length; if the backend later re-queues the same id,
/// that is a fresh delivery.
pub struct OutboundSweeper {
    backend: Arc<dyn Backend>,
    store: Arc<dyn ObjectStore>,
    engine: Arc<DeliveryEngine>,
    every: Duration,
    delivered: Mutex<HashSet<u64>>,
}

impl OutboundSweeper {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn ObjectStore>,
        engine: Arc<DeliveryEngine>,
        every: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            engine,
            every,
            delivered: Mutex::default(),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<Signal>) {
        let mut ticker = tokio::time::interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Stopping outbound sweeps");
                    break;
                }
                _ = ticker.tick() => self.sweep().await,
            }
        }
    }

    /// One pass over the outbound queue.
    pub async fn sweep(&self) {
        let messages = match self.backend.pull_outbound().await {
            Ok(messages) => messages,
            Err(err) => {
                error!("Failed to pull outbound messages: {err}");
                return;
            }
        };

        let pending: HashSet<u64> = messages.iter().map(|message| message.id).collect();
        self.delivered.lock().await.retain(|id| pending.contains(id));

        if messages.is_empty() {
            debug!("No outbound messages to deliver");
            return;
        }

        info!("Delivering {} outbound message(s)", messages.len());

        for message in messages {
            if self.delivered.lock().await.contains(&message.id) {
                debug!("Skipping already delivered message {}", message.message_id);
                continue;
            }

            let errors = self.deliver(&message).await;
            if errors.is_empty() {
                self.delivered.lock().await.insert(message.id);
            } else {
                for error in &errors {
                    warn!(
                        "Message {} delivery error: {}",
                        message.message_id, error.error
                    );
                }
            }
        }
    }

    async fn deliver(&self, message: &MailMessage) -> Vec<MessageError> {
        let data = match mailgate_mime::build_outbound(self.store.as_ref(), message).await {
            Ok(data) => data,
            Err(err) => {
                error!("Failed to assemble message {}: {err}", message.message_id);
                return vec![MessageError::new(
                    message.id,
                    format!("email format error: {err}"),
                )];
            }
        };

        self.engine.deliver(message, &data).await
    }
}
