use std::{collections::HashMap, sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};

use mailgate_backend::Backend;
use mailgate_common::{address::normalize_host, model::Mail};

use crate::{
    keys,
    store::{KeyValueStore, StoreError},
};

/// The routing record cache in front of the backend.
///
/// Lookups never surface store or backend failures to the caller; a failure
/// is logged and reported as "not found", without writing a negative marker,
/// so the next lookup retries from scratch.
pub struct RoutingCache {
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn Backend>,
    ttl: Duration,
}

impl RoutingCache {
    pub fn new(store: Arc<dyn KeyValueStore>, backend: Arc<dyn Backend>, ttl: Duration) -> Self {
        Self {
            store,
            backend,
            ttl,
        }
    }

    /// The routing record for `host`, consulting the cache first and falling
    /// back to the backend on a miss.
    pub async fn lookup(&self, host: &str) -> Option<Mail> {
        let host = normalize_host(host);
        if host.is_empty() {
            error!("Failed to look up mail record, host is empty");
            return None;
        }

        match self.store.get(&keys::known(&host)).await {
            // A live negative marker means the backend was asked recently
            // and did not know the domain. Do not ask again until the
            // marker expires.
            Ok(Some(known)) if known == "false" => return None,
            Ok(_) => {}
            Err(err) => {
                error!("Failed to get known marker for {host}: {err}");
                return None;
            }
        }

        match self.store.get(&keys::mail(&host)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(mail) => Some(mail),
                Err(err) => {
                    error!("Failed to decode cached mail record for {host}: {err}");
                    None
                }
            },
            Ok(None) => self.lookup_backend(&host).await,
            Err(err) => {
                error!("Failed to get mail record for {host}: {err}");
                None
            }
        }
    }

    async fn lookup_backend(&self, host: &str) -> Option<Mail> {
        let mail = match self.backend.mail_by_host(host).await {
            Ok(mail) => mail,
            Err(err) => {
                // The backend's answer is unknown, so nothing is cached:
                // the domain stays in the "uncached not found" state and
                // the next lookup retries.
                error!("Failed to request mail record for {host}: {err}");
                return None;
            }
        };

        if let Err(err) = self.insert(host, mail.as_ref()).await {
            error!("Failed to cache mail record for {host}: {err}");
        }

        mail
    }

    /// Write the record, or a negative marker when `mail` is `None`. Both
    /// keys get the same TTL so they expire together.
    pub async fn insert(&self, host: &str, mail: Option<&Mail>) -> Result<(), StoreError> {
        info!("Caching mail record for {host}");

        let known = if mail.is_some() { "true" } else { "false" };
        self.store
            .set_with_ttl(&keys::known(host), known, self.ttl)
            .await?;

        if let Some(mail) = mail {
            let raw = serde_json::to_string(mail)?;
            self.store
                .set_with_ttl(&keys::mail(host), &raw, self.ttl)
                .await?;
        }

        Ok(())
    }

    /// Drop the cached record for `host`, leaving the known marker to
    /// expire on its own.
    pub async fn forget(&self, host: &str) {
        info!("Dropping cached mail record for {host}");

        if let Err(err) = self.store.delete(&keys::mail(host)).await {
            error!("Failed to drop cached mail record for {host}: {err}");
        }
    }

    /// One refresh pass: collect the versions of every cached record, ask
    /// the backend which of them changed, and rewrite those.
    ///
    /// Any failure abandons the whole pass; the cached records stay valid
    /// until their TTL and the next pass retries. A record whose reported
    /// version is not newer than the cached one is never rewritten.
    pub async fn refresh_sweep(&self) {
        info!("Refreshing cached mail records");

        let record_keys = match self.store.keys(keys::all_mails()).await {
            Ok(keys) => keys,
            Err(err) => {
                error!("Failed to list cached mail records: {err}");
                return;
            }
        };

        if record_keys.is_empty() {
            debug!("No cached mail records to refresh");
            return;
        }

        let raws = match self.store.get_many(&record_keys).await {
            Ok(raws) => raws,
            Err(err) => {
                error!("Failed to read cached mail records: {err}");
                return;
            }
        };

        let mut versions = HashMap::new();
        for raw in raws.into_iter().flatten() {
            match serde_json::from_str::<Mail>(&raw) {
                Ok(mail) => {
                    versions.insert(mail.id, mail.version);
                }
                Err(err) => warn!("Skipping undecodable cached mail record: {err}"),
            }
        }

        if versions.is_empty() {
            return;
        }

        let changed = match self.backend.refresh_mails(&versions).await {
            Ok(changed) => changed,
            Err(err) => {
                error!("Abandoning refresh pass, backend request failed: {err}");
                return;
            }
        };

        for mail in changed {
            match versions.get(&mail.id) {
                Some(&cached) if mail.version <= cached => {
                    debug!(
                        "Skipping refresh for {}, version {} is not newer than {cached}",
                        mail.host, mail.version
                    );
                }
                _ => {
                    debug!("Refreshing mail record for {}", mail.host);
                    if let Err(err) = self.insert(&mail.host, Some(&mail)).await {
                        error!("Failed to refresh mail record for {}: {err}", mail.host);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use mailgate_backend::testing::StaticBackend;

    use super::*;

    fn mail(id: u64, host: &str, version: i64) -> Mail {
        Mail {
            id,
            host: host.into(),
            relay: true,
            version,
            ..Mail::default()
        }
    }

    fn cache(backend: Arc<StaticBackend>) -> RoutingCache {
        RoutingCache::new(
            Arc::new(crate::MemoryStore::new()),
            backend,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn found_records_are_cached() {
        let backend = Arc::new(StaticBackend::default());
        backend.add_mail(mail(1, "example.com", 1)).await;
        let cache = cache(backend.clone());

        assert_eq!(
            cache.lookup("example.com").await.map(|m| m.id),
            Some(1)
        );
        assert_eq!(cache.lookup("Example.COM").await.map(|m| m.id), Some(1));
        assert_eq!(backend.lookups(), 1);
    }

    #[tokio::test]
    async fn unknown_domains_are_negatively_cached() {
        let backend = Arc::new(StaticBackend::default());
        let cache = cache(backend.clone());

        assert!(cache.lookup("nowhere.test").await.is_none());
        assert!(cache.lookup("nowhere.test").await.is_none());
        assert_eq!(backend.lookups(), 1);
    }

    #[tokio::test]
    async fn backend_failures_are_not_cached() {
        let backend = Arc::new(StaticBackend::default());
        backend.add_mail(mail(1, "example.com", 1)).await;
        backend.fail(true);
        let cache = cache(backend.clone());

        assert!(cache.lookup("example.com").await.is_none());
        assert_eq!(backend.lookups(), 1);

        backend.fail(false);
        assert_eq!(cache.lookup("example.com").await.map(|m| m.id), Some(1));
        assert_eq!(backend.lookups(), 2);
    }

    #[tokio::test]
    async fn empty_host_is_never_looked_up() {
        let backend = Arc::new(StaticBackend::default());
        let cache = cache(backend.clone());

        assert!(cache.lookup("").await.is_none());
        assert!(cache.lookup("   ").await.is_none());
        assert_eq!(backend.lookups(), 0);
    }

    #[tokio::test]
    async fn refresh_rewrites_only_newer_versions() {
        let backend = Arc::new(StaticBackend::default());
        backend.add_mail(mail(1, "fresh.test", 1)).await;
        backend.add_mail(mail(2, "stale.test", 1)).await;
        let cache = cache(backend.clone());

        cache.lookup("fresh.test").await;
        cache.lookup("stale.test").await;

        backend
            .set_changed(vec![mail(1, "fresh.test", 5), mail(2, "stale.test", 1)])
            .await;
        cache.refresh_sweep().await;

        assert_eq!(cache.lookup("fresh.test").await.map(|m| m.version), Some(5));
        assert_eq!(cache.lookup("stale.test").await.map(|m| m.version), Some(1));
        // Lookups after the sweep are served from the cache.
        assert_eq!(backend.lookups(), 2);
    }

    #[tokio::test]
    async fn refresh_with_empty_cache_skips_the_backend() {
        let backend = Arc::new(StaticBackend::default());
        let cache = cache(backend.clone());

        cache.refresh_sweep().await;
        assert_eq!(backend.lookups(), 0);
    }

    #[tokio::test]
    async fn forgotten_records_fall_back_to_the_backend() {
        let backend = Arc::new(StaticBackend::default());
        backend.add_mail(mail(1, "example.com", 1)).await;
        let cache = cache(backend.clone());

        cache.lookup("example.com").await;
        cache.forget("example.com").await;

        assert_eq!(cache.lookup("example.com").await.map(|m| m.id), Some(1));
        assert_eq!(backend.lookups(), 2);
    }
}
