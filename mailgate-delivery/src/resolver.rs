use std::time::Duration;

use hickory_resolver::{
    TokioResolver, config::ResolverOpts, name_server::TokioConnectionProvider,
};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no mail servers found for domain: {0}")]
    NoRecords(String),

    #[error("MX lookup failed: {0}")]
    Lookup(#[from] hickory_resolver::ResolveError),
}

/// One candidate mail server for a domain. Lower preference is tried first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailExchange {
    pub host: String,
    pub preference: u16,
}

/// MX resolution seam; production uses [`DnsResolver`], tests substitute a
/// fixed table.
#[async_trait::async_trait]
pub trait MxResolver: Send + Sync {
    /// The mail exchanges for `domain`, sorted by ascending preference.
    async fn resolve(&self, domain: &str) -> Result<Vec<MailExchange>, ResolveError>;
}

/// [`MxResolver`] backed by the system DNS configuration.
#[derive(Debug)]
pub struct DnsResolver {
    resolver: TokioResolver,
}

impl DnsResolver {
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())?
            .with_options(opts)
            .build();

        Ok(Self { resolver })
    }
}

#[async_trait::async_trait]
impl MxResolver for DnsResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<MailExchange>, ResolveError> {
        debug!("Resolving mail exchanges for {domain}");

        let lookup = match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => lookup,
            Err(err) if err.is_no_records_found() => {
                return Err(ResolveError::NoRecords(domain.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let mut exchanges: Vec<MailExchange> = lookup
            .iter()
            .map(|mx| MailExchange {
                host: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                preference: mx.preference(),
            })
            .collect();

        if exchanges.is_empty() {
            return Err(ResolveError::NoRecords(domain.to_string()));
        }

        exchanges.sort_by_key(|exchange| exchange.preference);

        debug!("Resolved {} mail exchange(s) for {domain}", exchanges.len());
        Ok(exchanges)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exchanges_sort_by_preference() {
        let mut exchanges = [
            MailExchange {
                host: "mx3.example.com".into(),
                preference: 30,
            },
            MailExchange {
                host: "mx1.example.com".into(),
                preference: 10,
            },
            MailExchange {
                host: "mx2.example.com".into(),
                preference: 20,
            },
        ];

        exchanges.sort_by_key(|exchange| exchange.preference);

        assert_eq!(exchanges[0].host, "mx1.example.com");
        assert_eq!(exchanges[2].host, "mx3.example.com");
    }

    #[tokio::test]
    #[ignore = "Requires network access"]
    async fn public_domains_resolve() {
        let resolver = DnsResolver::new(Duration::from_secs(5)).unwrap();
        let exchanges = resolver.resolve("gmail.com").await.unwrap();

        assert!(!exchanges.is_empty());
        assert!(
            exchanges
                .windows(2)
                .all(|pair| pair[0].preference <= pair[1].preference)
        );
    }
}
