//! The fixture graph: `fxa_urls` -> `fxa_client`, `fxa_email` -> `fxa_account`.

use crate::configuration::{Settings, email_override_from_args, get_configuration};
use crate::domain::{EnvironmentName, FxAccount, allocate_email};
use crate::environments::{EndpointSet, EnvironmentError, EnvironmentTable, resolve_endpoints};
use crate::identity_client::{HttpIdentityClient, IdentityClient, identity_client};
use crate::lifecycle::{Outcome, SetupError, with_account};
use crate::mailbox::RestmailInbox;
use crate::parametrize::{Invocation, TestItem, generate_invocations};
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;

/// Everything a test body gets from `fxa_account`.
#[derive(Clone)]
pub struct FxaContext {
    pub urls: EndpointSet,
    pub client: Arc<HttpIdentityClient>,
    pub account: FxAccount,
}

/// Process-wide fixture state. Read-only once built.
#[derive(Clone, Debug)]
pub struct Fixtures {
    settings: Arc<Settings>,
    environments: Arc<EnvironmentTable>,
}

impl Fixtures {
    pub fn new(settings: Settings) -> Result<Self, EnvironmentError> {
        let environments = EnvironmentTable::from_settings(&settings)?;
        Ok(Self {
            settings: Arc::new(settings),
            environments: Arc::new(environments),
        })
    }

    /// Snapshot the configuration files, `FXA_*` variables and the
    /// `--fxa-email` flag of the running process.
    ///
    /// The default libtest harness rejects options it does not know, so
    /// the flag only reaches a test target declared with `harness = false`.
    /// Under the default harness use `FXA_EMAIL` instead.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_args(std::env::args())
    }

    /// Like [`Fixtures::from_env`], taking the command line from `args`.
    pub fn from_args<I, S>(args: I) -> Result<Self, anyhow::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let settings = get_configuration()
            .context("Failed to read configuration.")?
            .with_cli_email(email_override_from_args(args));
        Ok(Self::new(settings)?)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn environments(&self) -> &EnvironmentTable {
        &self.environments
    }

    pub fn request(&self, invocation: &Invocation) -> FixtureRequest {
        FixtureRequest {
            fixtures: self.clone(),
            param: invocation.environment.clone(),
        }
    }

    /// Request for an unparametrized test.
    pub fn default_request(&self) -> FixtureRequest {
        FixtureRequest {
            fixtures: self.clone(),
            param: None,
        }
    }
}

/// Fixture resolution for a single test invocation.
#[derive(Clone, Debug)]
pub struct FixtureRequest {
    fixtures: Fixtures,
    param: Option<EnvironmentName>,
}

impl FixtureRequest {
    pub fn param(&self) -> Option<&EnvironmentName> {
        self.param.as_ref()
    }

    pub fn fxa_urls(&self) -> Result<EndpointSet, EnvironmentError> {
        resolve_endpoints(
            &self.fixtures.environments,
            self.param.as_ref(),
            &self.fixtures.settings,
        )
    }

    pub fn fxa_client(&self) -> Result<HttpIdentityClient, EnvironmentError> {
        Ok(identity_client(
            &self.fxa_urls()?,
            &self.fixtures.settings.identity,
        ))
    }

    pub fn fxa_email(&self) -> String {
        let settings = &self.fixtures.settings;
        allocate_email(
            settings.cli_email.as_deref(),
            settings.email.as_deref(),
            &mut rand::thread_rng(),
        )
    }

    pub fn fxa_mailbox(&self, email: &str) -> RestmailInbox {
        RestmailInbox::new(email, &self.fixtures.settings.mailbox)
    }

    /// Run `body` with a fresh verified account; the account is removed
    /// afterwards whatever the body does.
    #[tracing::instrument(name = "fxa_account", skip_all, fields(environment = ?self.param))]
    pub async fn fxa_account<F, Fut, T>(&self, body: F) -> Result<Outcome<T>, SetupError>
    where
        F: FnOnce(FxaContext) -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>> + Send + 'static,
        T: Send + 'static,
    {
        let urls = self.fxa_urls()?;
        let client = Arc::new(identity_client(&urls, &self.fixtures.settings.identity));
        let email = self.fxa_email();
        let mailbox = Box::new(self.fxa_mailbox(&email));

        let shared: Arc<dyn IdentityClient> = client.clone();
        with_account(shared, mailbox, move |account| {
            body(FxaContext {
                urls,
                client,
                account,
            })
        })
        .await
    }
}

/// Run `test` once per invocation of `item`, in order.
pub async fn run_parametrized<F, Fut, T>(
    fixtures: &Fixtures,
    item: &TestItem,
    mut test: F,
) -> Vec<(Invocation, T)>
where
    F: FnMut(FixtureRequest) -> Fut,
    Fut: Future<Output = T>,
{
    let mut results = Vec::new();
    for invocation in generate_invocations(item) {
        tracing::info!(test = %invocation.id, "Running test invocation");
        let output = test(fixtures.request(&invocation)).await;
        results.push((invocation, output));
    }
    results
}
