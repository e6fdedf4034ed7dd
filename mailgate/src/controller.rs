use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use tokio::sync::broadcast;
use tracing::info;

use mailgate_backend::HttpBackend;
use mailgate_blob::{DisabledStore, ObjectStore, S3Store};
use mailgate_cache::{RedisStore, RoutingCache};
use mailgate_common::{Signal, config::Config};
use mailgate_delivery::{DeliveryEngine, DnsResolver, SmtpTransport};
use mailgate_smtp::{Gateway, SmtpServer, session::SessionConfig};

use crate::sched::{OutboundSweeper, Refresher};

/// How long one MX lookup may take.
const MX_TIMEOUT: Duration = Duration::from_secs(10);

/// How long one outgoing SMTP transaction may take, connection included.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            info!("Terminate signal received, shutting down");
        }
    }

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    Ok(())
}

/// Wire everything together and run until a shutdown signal.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // No cache store means no gateway; refuse to start rather than limp.
    let store = RedisStore::connect(&config.redis.url()).await?;

    let backend = Arc::new(HttpBackend::new(
        &config.api.base_url,
        &config.api.secret,
        config.api.timeout(),
    )?);

    let cache = Arc::new(RoutingCache::new(
        Arc::new(store),
        backend.clone(),
        config.mails.ttl(),
    ));

    let blobs: Arc<dyn ObjectStore> = if config.server.relay_only {
        Arc::new(DisabledStore)
    } else {
        Arc::new(S3Store::new(
            config.s3.region.clone(),
            &config.s3.access_key_id,
            &config.s3.secret_access_key,
            config.s3_emails.bucket.clone(),
            &config.s3_emails.acl,
        ))
    };

    let engine = Arc::new(DeliveryEngine::new(
        Arc::new(DnsResolver::new(MX_TIMEOUT)?),
        Arc::new(SmtpTransport::new(
            config.server.domain.clone(),
            DELIVERY_TIMEOUT,
        )),
        config.server.port,
    ));

    let gateway = Arc::new(Gateway::new(
        cache.clone(),
        backend.clone(),
        blobs.clone(),
        engine.clone(),
    ));

    let server = SmtpServer::new(
        config.server.address(),
        SessionConfig::from(&config.server),
        gateway,
    );

    let refresher = Refresher::new(cache, config.mails.refresh_every());
    let sweeper = OutboundSweeper::new(backend, blobs, engine, config.messages.outbound_every());

    info!("Gateway running");

    let ret = tokio::select! {
        r = server.run(SHUTDOWN_BROADCAST.subscribe()) => r.map_err(Into::into),
        () = refresher.run(SHUTDOWN_BROADCAST.subscribe()) => Ok(()),
        () = sweeper.run(SHUTDOWN_BROADCAST.subscribe()) => Ok(()),
        r = shutdown() => r,
    };

    info!("Shutting down...");

    ret
}
