use crate::configuration::IdentitySettings;
use crate::environments::EndpointSet;
use crate::telemetry::error_chain_fmt;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

/// `errno` of the identity service for an account that does not exist.
pub const ERRNO_UNKNOWN_ACCOUNT: u32 = 102;
/// `errno` of the identity service for a wrong password.
pub const ERRNO_INCORRECT_PASSWORD: u32 = 103;

#[derive(thiserror::Error)]
pub enum ClientError {
    #[error("{message} (errno {errno}, status {status})")]
    Api {
        status: u16,
        errno: u32,
        error: String,
        message: String,
    },
    #[error("Unexpected response from the identity service ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },
    #[error("Failed to reach the identity service")]
    Transport(#[from] reqwest::Error),
}

impl std::fmt::Debug for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ClientError {
    pub fn errno(&self) -> Option<u32> {
        match self {
            ClientError::Api { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// The account is unknown to the service, e.g. because it was deleted already.
    pub fn is_unknown_account(&self) -> bool {
        self.errno() == Some(ERRNO_UNKNOWN_ACCOUNT)
    }
}

/// The account operations the fixtures rely on.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<Box<dyn IdentitySession>, ClientError>;

    /// `Ok(false)` when the service rejects the credentials.
    async fn login(&self, email: &str, password: &Secret<String>) -> Result<bool, ClientError>;

    async fn destroy_account(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<(), ClientError>;
}

/// Session of a freshly created, not yet verified account.
#[async_trait]
pub trait IdentitySession: Send + Sync {
    async fn verify_email_code(&self, code: &str) -> Result<(), ClientError>;
}

/// Bind a client to the authentication URL of `endpoints`. No I/O happens here.
pub fn identity_client(endpoints: &EndpointSet, settings: &IdentitySettings) -> HttpIdentityClient {
    HttpIdentityClient::new(endpoints.authentication(), settings.timeout())
}

/// JSON-over-HTTP client of the identity service's account API.
#[derive(Clone, Debug)]
pub struct HttpIdentityClient {
    base_url: String,
    http_client: Client,
    timeout: Duration,
}

#[derive(serde::Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    uid: String,
    session_token: String,
}

#[derive(serde::Serialize)]
struct VerifyCodeRequest<'a> {
    uid: &'a str,
    code: &'a str,
}

#[derive(serde::Deserialize)]
struct ErrorResponse {
    errno: u32,
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

impl HttpIdentityClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: Client::new(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http_client
            .post(format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
    }

    async fn post_credentials(
        &self,
        path: &str,
        email: &str,
        password: &Secret<String>,
    ) -> Result<Response, ClientError> {
        let response = self
            .post(path)
            .json(&CredentialsRequest {
                email,
                password: password.expose_secret(),
            })
            .send()
            .await?;
        error_for_status(response).await
    }
}

/// Turn a non-2xx response into a [`ClientError`], preferring the
/// service's `{code, errno, error, message}` error body.
async fn error_for_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let error = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(e) => ClientError::Api {
            status: status.as_u16(),
            errno: e.errno,
            error: e.error,
            message: e.message,
        },
        Err(_) => ClientError::UnexpectedResponse {
            status: status.as_u16(),
            body,
        },
    };
    tracing::debug!(error.message = %error, "Identity service rejected the request");
    Err(error)
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    #[tracing::instrument(name = "Creating account", skip(self, password))]
    async fn create_account(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<Box<dyn IdentitySession>, ClientError> {
        let session: SessionResponse = self
            .post_credentials("/account/create", email, password)
            .await?
            .json()
            .await?;
        Ok(Box::new(HttpSession {
            client: self.clone(),
            uid: session.uid,
            session_token: Secret::new(session.session_token),
        }))
    }

    #[tracing::instrument(name = "Logging in", skip(self, password))]
    async fn login(&self, email: &str, password: &Secret<String>) -> Result<bool, ClientError> {
        match self
            .post_credentials("/account/login", email, password)
            .await
        {
            Ok(_) => Ok(true),
            Err(e)
                if matches!(
                    e.errno(),
                    Some(ERRNO_UNKNOWN_ACCOUNT | ERRNO_INCORRECT_PASSWORD)
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(name = "Destroying account", skip(self, password))]
    async fn destroy_account(
        &self,
        email: &str,
        password: &Secret<String>,
    ) -> Result<(), ClientError> {
        self.post_credentials("/account/destroy", email, password)
            .await?;
        Ok(())
    }
}

struct HttpSession {
    client: HttpIdentityClient,
    uid: String,
    session_token: Secret<String>,
}

#[async_trait]
impl IdentitySession for HttpSession {
    #[tracing::instrument(name = "Verifying email code", skip(self, code), fields(uid = %self.uid))]
    async fn verify_email_code(&self, code: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post("/recovery_email/verify_code")
            .bearer_auth(self.session_token.expose_secret())
            .json(&VerifyCodeRequest {
                uid: &self.uid,
                code,
            })
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }
}
