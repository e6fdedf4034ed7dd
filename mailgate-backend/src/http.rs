use std::{collections::HashMap, time::Duration};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use mailgate_common::model::{Mail, MailMessage};

use crate::{
    Backend, BackendError,
    types::{InboundRequest, MailResponse, OutboundResponse, RefreshRequest, RefreshResponse, StatusResponse},
};

/// [`Backend`] implementation over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: secret.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn mail_by_host(&self, host: &str) -> Result<Option<Mail>, BackendError> {
        debug!("Requesting mail record for {host}");

        let url = self.url(&format!("/mails/{}", urlencoding::encode(host)));
        let response: MailResponse = self
            .http
            .get(url)
            .header(AUTHORIZATION, &self.secret)
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(BackendError::Api(response.error));
        }

        if !response.found {
            return Ok(None);
        }

        Ok(response.mail)
    }

    async fn refresh_mails(&self, versions: &HashMap<u64, i64>) -> Result<Vec<Mail>, BackendError> {
        debug!("Requesting refresh for {} mail records", versions.len());

        let response: RefreshResponse = self
            .http
            .post(self.url("/mails/refresh"))
            .header(AUTHORIZATION, &self.secret)
            .header(CONTENT_TYPE, "application/json")
            .json(&RefreshRequest {
                mail_versions: versions,
            })
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(BackendError::Api(response.error));
        }

        Ok(response.mails)
    }

    async fn push_inbound(&self, message: &MailMessage) -> Result<(), BackendError> {
        debug!("Pushing inbound message {}", message.message_id);

        let response: StatusResponse = self
            .http
            .post(self.url("/smtp/inbound"))
            .header(AUTHORIZATION, &self.secret)
            .header(CONTENT_TYPE, "application/json")
            .json(&InboundRequest {
                mail_message: message,
            })
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(BackendError::Api(response.error));
        }

        Ok(())
    }

    async fn pull_outbound(&self) -> Result<Vec<MailMessage>, BackendError> {
        debug!("Pulling outbound messages");

        let response: OutboundResponse = self
            .http
            .post(self.url("/smtp/outbound"))
            .header(AUTHORIZATION, &self.secret)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(BackendError::Api(response.error));
        }

        Ok(response.mail_messages)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let backend =
            HttpBackend::new("http://localhost:4000/", "secret", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.url("/mails/refresh"), "http://localhost:4000/mails/refresh");
    }

    #[test]
    fn host_is_escaped_in_the_lookup_path() {
        assert_eq!(urlencoding::encode("exa mple.com"), "exa%20mple.com");
    }
}
