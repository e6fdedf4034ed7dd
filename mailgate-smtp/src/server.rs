use std::sync::Arc;

use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

use mailgate_common::Signal;

use crate::{gateway::Gateway, session::Session, session::SessionConfig};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
}

/// The TCP listener. Each accepted connection gets its own task and its
/// own [`Session`]; a shutdown signal stops accepting and lets sessions
/// run to completion.
pub struct SmtpServer {
    address: String,
    config: Arc<SessionConfig>,
    gateway: Arc<Gateway>,
}

impl SmtpServer {
    pub fn new(address: String, config: SessionConfig, gateway: Arc<Gateway>) -> Self {
        Self {
            address,
            config: Arc::new(config),
            gateway,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<Signal>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.address)
            .await
            .map_err(|source| ServerError::Bind {
                address: self.address.clone(),
                source,
            })?;

        info!("Listening on {}", self.address);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down listener on {}", self.address);
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let session = Session::create(
                                stream,
                                peer,
                                self.config.clone(),
                                self.gateway.clone(),
                            );

                            tokio::spawn(async move {
                                if let Err(err) = session.run().await {
                                    warn!("Session from {peer} ended with error: {err}");
                                }
                            });
                        }
                        Err(err) => warn!("Failed to accept connection: {err}"),
                    }
                }
            }
        }

        Ok(())
    }
}
