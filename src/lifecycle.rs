//! Creation, verification and removal of throwaway accounts.
//!
//! [`acquire`] registers an account and verifies it through its mailbox,
//! [`AccountGuard::release`] removes it again. [`with_account`] wraps both
//! around a test body so removal happens on every exit path.

use crate::domain::{AccountPassword, FxAccount};
use crate::environments::EnvironmentError;
use crate::identity_client::{ClientError, IdentityClient, IdentitySession};
use crate::mailbox::{Mailbox, MailboxError, Message, VERIFY_CODE_HEADER};
use crate::telemetry::error_chain_fmt;
use std::future::Future;
use std::sync::Arc;

#[derive(thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error("Failed to create account {email}")]
    CreateAccount {
        email: String,
        #[source]
        source: ClientError,
    },
    #[error("The verification email for {email} did not arrive")]
    AwaitVerificationEmail {
        email: String,
        #[source]
        source: MailboxError,
    },
    #[error("The verification email for {email} carries no x-verify-code header")]
    MissingVerificationCode { email: String },
    #[error("Failed to verify account {email}")]
    Verification {
        email: String,
        #[source]
        source: ClientError,
    },
}

impl std::fmt::Debug for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[derive(thiserror::Error)]
pub enum TeardownError {
    #[error("Failed to clear the mailbox of {email}")]
    ClearMailbox {
        email: String,
        #[source]
        source: MailboxError,
    },
    #[error("Failed to destroy account {email}")]
    DestroyAccount {
        email: String,
        #[source]
        source: ClientError,
    },
}

impl std::fmt::Debug for TeardownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Result of a test body run inside [`with_account`]. The test's own
/// result and the teardown result are kept apart.
#[must_use]
#[derive(Debug)]
pub struct Outcome<T> {
    pub body: Result<T, anyhow::Error>,
    pub teardown: Result<(), TeardownError>,
}

impl<T> Outcome<T> {
    pub fn into_result(self) -> Result<T, FixtureFailure> {
        match (self.body, self.teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (body, teardown) => Err(FixtureFailure {
                test: body.err(),
                teardown: teardown.err(),
            }),
        }
    }
}

/// A failed test body, a failed teardown, or both. Each is reported on its own.
pub struct FixtureFailure {
    pub test: Option<anyhow::Error>,
    pub teardown: Option<TeardownError>,
}

impl std::fmt::Display for FixtureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(e) = &self.test {
            writeln!(f, "FAILED: {:?}", e)?;
        }
        if let Some(e) = &self.teardown {
            writeln!(f, "ERROR at teardown of fxa_account: {:?}", e)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FixtureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for FixtureFailure {}

struct Resources {
    client: Arc<dyn IdentityClient>,
    mailbox: Box<dyn Mailbox>,
}

/// A verified account that still has to be removed.
///
/// Call [`AccountGuard::release`]. A guard dropped without release, e.g.
/// because the surrounding future was cancelled, removes the account on
/// a background task of the current runtime.
pub struct AccountGuard {
    account: FxAccount,
    resources: Option<Resources>,
}

impl std::fmt::Debug for AccountGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountGuard")
            .field("account", &self.account)
            .field("released", &self.resources.is_none())
            .finish()
    }
}

impl AccountGuard {
    pub fn account(&self) -> &FxAccount {
        &self.account
    }

    #[tracing::instrument(name = "Releasing test account", skip(self), fields(email = %self.account.email()))]
    pub async fn release(mut self) -> Result<(), TeardownError> {
        match self.resources.take() {
            Some(mut resources) => {
                remove_account(
                    resources.client.as_ref(),
                    resources.mailbox.as_mut(),
                    &self.account,
                )
                .await
            }
            None => Ok(()),
        }
    }
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        let Some(mut resources) = self.resources.take() else {
            return;
        };
        let account = self.account.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Releasing {} in the background", account);
                handle.spawn(async move {
                    if let Err(e) = remove_account(
                        resources.client.as_ref(),
                        resources.mailbox.as_mut(),
                        &account,
                    )
                    .await
                    {
                        tracing::error!(
                            error.cause_chain = ?e,
                            error.message = %e,
                            "Failed to release {} in the background",
                            account
                        );
                    }
                });
            }
            Err(_) => {
                tracing::error!("No runtime left to release {}. It is abandoned.", account);
            }
        }
    }
}

/// Register an account for the mailbox's address and verify it.
///
/// Nothing is cleaned up if registration fails, since nothing exists yet.
/// Any later failure removes the half-created account before the error
/// is returned; a failure of that removal is logged and the original
/// error is kept.
#[tracing::instrument(name = "Acquiring test account", skip_all, fields(email = %mailbox.email()))]
pub async fn acquire(
    client: Arc<dyn IdentityClient>,
    mut mailbox: Box<dyn Mailbox>,
) -> Result<AccountGuard, SetupError> {
    let account = FxAccount::new(mailbox.email().to_string(), AccountPassword::generate());

    let session = client
        .create_account(account.email(), account.password())
        .await
        .map_err(|source| SetupError::CreateAccount {
            email: account.email().to_string(),
            source,
        })?;
    tracing::info!("Created: {}", account);

    if let Err(e) = verify(session.as_ref(), mailbox.as_mut(), &account).await {
        if let Err(cleanup) = remove_account(client.as_ref(), mailbox.as_mut(), &account).await {
            tracing::error!(
                error.cause_chain = ?cleanup,
                error.message = %cleanup,
                "Failed to clean up {} after a failed verification",
                account
            );
        }
        return Err(e);
    }
    tracing::info!("Verified: {}", account);

    Ok(AccountGuard {
        account,
        resources: Some(Resources { client, mailbox }),
    })
}

async fn verify(
    session: &dyn IdentitySession,
    mailbox: &mut dyn Mailbox,
    account: &FxAccount,
) -> Result<(), SetupError> {
    let awaiting = |source| SetupError::AwaitVerificationEmail {
        email: account.email().to_string(),
        source,
    };
    mailbox.fetch().await.map_err(awaiting)?;
    let message = mailbox
        .wait_for_email(&|m: &Message| m.has_verify_code())
        .await
        .map_err(awaiting)?;
    let code = message
        .header(VERIFY_CODE_HEADER)
        .ok_or_else(|| SetupError::MissingVerificationCode {
            email: account.email().to_string(),
        })?;

    session
        .verify_email_code(code)
        .await
        .map_err(|source| SetupError::Verification {
            email: account.email().to_string(),
            source,
        })
}

/// Clear the mailbox, then destroy the account. Both are attempted; an
/// account that is already gone is fine.
async fn remove_account(
    client: &dyn IdentityClient,
    mailbox: &mut dyn Mailbox,
    account: &FxAccount,
) -> Result<(), TeardownError> {
    let cleared = mailbox.clear().await;

    match client
        .destroy_account(account.email(), account.password())
        .await
    {
        Ok(()) => tracing::info!("Removed: {}", account),
        // The test may have destroyed the account itself.
        Err(e) if e.is_unknown_account() => {
            tracing::info!("Already removed: {}", account)
        }
        Err(source) => {
            if let Err(e) = &cleared {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to clear the mailbox of {}",
                    account
                );
            }
            return Err(TeardownError::DestroyAccount {
                email: account.email().to_string(),
                source,
            });
        }
    }

    cleared.map_err(|source| TeardownError::ClearMailbox {
        email: account.email().to_string(),
        source,
    })
}

/// Aborts the test body when the surrounding future is dropped.
struct BodyTask<T>(tokio::task::JoinHandle<T>);

impl<T> Drop for BodyTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `body` with a verified account and remove the account afterwards.
///
/// The body runs on its own task. If it panics, the account is still
/// removed and the panic is resumed afterwards. A teardown failure never
/// replaces the body's result; both are returned in the [`Outcome`].
pub async fn with_account<F, Fut, T>(
    client: Arc<dyn IdentityClient>,
    mailbox: Box<dyn Mailbox>,
    body: F,
) -> Result<Outcome<T>, SetupError>
where
    F: FnOnce(FxAccount) -> Fut,
    Fut: Future<Output = Result<T, anyhow::Error>> + Send + 'static,
    T: Send + 'static,
{
    let guard = acquire(client, mailbox).await?;
    // Dropped before `guard`, so a cancelled caller stops the body before
    // the account is removed underneath it.
    let mut task = BodyTask(tokio::spawn(body(guard.account().clone())));
    let joined = (&mut task.0).await;

    let teardown = guard.release().await;
    if let Err(e) = &teardown {
        tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "Fixture teardown failed"
        );
    }

    let body = match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(anyhow::Error::new(e).context("The test body was cancelled")),
    };
    Ok(Outcome { body, teardown })
}
