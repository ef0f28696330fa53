use crate::configuration::MailboxSettings;
use crate::poll::{PollError, poll};
use crate::telemetry::error_chain_fmt;
use async_trait::async_trait;
use reqwest::Client;
use serde_aux::field_attributes::deserialize_default_from_null;
use std::collections::HashMap;
use std::time::Duration;

/// Header carrying the code that verifies a new account.
pub const VERIFY_CODE_HEADER: &str = "x-verify-code";

#[derive(thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to reach the mailbox service")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected response from the mailbox service ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },
    #[error("No matching email arrived within {waited:?}")]
    Timeout { waited: Duration },
}

impl std::fmt::Debug for MailboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<PollError<MailboxError>> for MailboxError {
    fn from(e: PollError<MailboxError>) -> Self {
        match e {
            PollError::Timeout { waited } => MailboxError::Timeout { waited },
            PollError::Probe(e) => e,
        }
    }
}

#[derive(serde::Deserialize, Clone, Debug, Default)]
pub struct Message {
    #[serde(default, deserialize_with = "deserialize_default_from_null")]
    pub headers: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    /// Value of a string header. Header names are matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_str())
    }

    pub fn has_verify_code(&self) -> bool {
        self.header(VERIFY_CODE_HEADER).is_some()
    }
}

pub type Matcher<'a> = &'a (dyn Fn(&Message) -> bool + Send + Sync);

/// A disposable inbox bound to one email address.
#[async_trait]
pub trait Mailbox: Send + Sync {
    fn email(&self) -> &str;

    /// Load the messages currently in the inbox.
    async fn fetch(&mut self) -> Result<&[Message], MailboxError>;

    /// Block until a message satisfying `matcher` is in the inbox.
    async fn wait_for_email(&mut self, matcher: Matcher<'_>) -> Result<Message, MailboxError>;

    async fn clear(&mut self) -> Result<(), MailboxError>;
}

/// Inbox on a restmail server: `GET /mail/{user}` lists, `DELETE /mail/{user}` empties.
#[derive(Debug)]
pub struct RestmailInbox {
    email: String,
    url: String,
    http_client: Client,
    timeout: Duration,
    poll_interval: Duration,
    wait_timeout: Duration,
    messages: Vec<Message>,
}

impl RestmailInbox {
    pub fn new(email: impl Into<String>, settings: &MailboxSettings) -> Self {
        let email = email.into();
        let user = email.split('@').next().unwrap_or_default();
        let url = format!(
            "{}/mail/{}",
            settings.base_url.trim_end_matches('/'),
            user
        );
        Self {
            email,
            url,
            http_client: Client::new(),
            timeout: settings.timeout(),
            poll_interval: settings.poll_interval(),
            wait_timeout: settings.wait_timeout(),
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MailboxError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MailboxError::UnexpectedResponse {
            status: status.as_u16(),
            body,
        })
    }

    async fn load(&self) -> Result<Vec<Message>, MailboxError> {
        let response = self
            .http_client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(Self::check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl Mailbox for RestmailInbox {
    fn email(&self) -> &str {
        &self.email
    }

    #[tracing::instrument(name = "Fetching mailbox", skip(self), fields(email = %self.email))]
    async fn fetch(&mut self) -> Result<&[Message], MailboxError> {
        self.messages = self.load().await?;
        Ok(&self.messages)
    }

    #[tracing::instrument(name = "Waiting for email", skip(self, matcher), fields(email = %self.email))]
    async fn wait_for_email(&mut self, matcher: Matcher<'_>) -> Result<Message, MailboxError> {
        let this = &*self;
        let message = poll(
            || async move {
                let messages = this.load().await?;
                Ok::<_, MailboxError>(messages.into_iter().find(|m| matcher(m)))
            },
            this.poll_interval,
            this.wait_timeout,
        )
        .await?;
        Ok(message)
    }

    #[tracing::instrument(name = "Clearing mailbox", skip(self), fields(email = %self.email))]
    async fn clear(&mut self) -> Result<(), MailboxError> {
        let response = self
            .http_client
            .delete(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check_status(response).await?;
        self.messages.clear();
        Ok(())
    }
}
