//! In-process [`Backend`] double for tests: fixed routing records, a
//! scripted outbound queue, and recording of everything pushed inbound.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use tokio::sync::Mutex;

use mailgate_common::model::{Mail, MailMessage};

use crate::{Backend, BackendError};

#[derive(Default)]
pub struct StaticBackend {
    mails: Mutex<HashMap<String, Mail>>,
    changed: Mutex<Vec<Mail>>,
    outbound: Mutex<Vec<MailMessage>>,
    inbound: Mutex<Vec<MailMessage>>,
    lookups: AtomicUsize,
    failing: AtomicBool,
}

impl StaticBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a routing record under its host.
    pub async fn add_mail(&self, mail: Mail) {
        self.mails.lock().await.insert(mail.host.clone(), mail);
    }

    /// Script the records the next refresh call reports as changed.
    pub async fn set_changed(&self, mails: Vec<Mail>) {
        *self.changed.lock().await = mails;
    }

    /// Script the outbound queue. Each pull drains what was set.
    pub async fn set_outbound(&self, messages: Vec<MailMessage>) {
        *self.outbound.lock().await = messages;
    }

    /// Everything pushed inbound so far.
    pub async fn inbound(&self) -> Vec<MailMessage> {
        self.inbound.lock().await.clone()
    }

    /// How many host lookups reached this backend.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Make every call fail until cleared.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Api("backend down".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Backend for StaticBackend {
    async fn mail_by_host(&self, host: &str) -> Result<Option<Mail>, BackendError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.mails.lock().await.get(host).cloned())
    }

    async fn refresh_mails(
        &self,
        _versions: &HashMap<u64, i64>,
    ) -> Result<Vec<Mail>, BackendError> {
        self.check()?;
        Ok(self.changed.lock().await.clone())
    }

    async fn push_inbound(&self, message: &MailMessage) -> Result<(), BackendError> {
        self.check()?;
        self.inbound.lock().await.push(message.clone());
        Ok(())
    }

    async fn pull_outbound(&self) -> Result<Vec<MailMessage>, BackendError> {
        self.check()?;
        Ok(std::mem::take(&mut *self.outbound.lock().await))
    }
}
