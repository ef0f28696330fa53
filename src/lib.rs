//! Throwaway Firefox Accounts for integration tests.
//!
//! A test asks a [`fixtures::FixtureRequest`] for an account; the account is
//! registered on a disposable restmail inbox, verified with the code mailed
//! to it, handed to the test and destroyed afterwards.
//!
//! ```no_run
//! use fxa_fixtures::fixtures::Fixtures;
//! use fxa_fixtures::identity_client::IdentityClient;
//!
//! # async fn run() -> Result<(), anyhow::Error> {
//! let fixtures = Fixtures::from_env()?;
//! let outcome = fixtures
//!     .default_request()
//!     .fxa_account(|fxa| async move {
//!         let logged_in = fxa
//!             .client
//!             .login(fxa.account.email(), fxa.account.password())
//!             .await?;
//!         anyhow::ensure!(logged_in, "Login failed");
//!         Ok(())
//!     })
//!     .await?;
//! outcome.into_result()?;
//! # Ok(())
//! # }
//! ```

pub mod configuration;
pub mod domain;
pub mod environments;
pub mod fixtures;
pub mod identity_client;
pub mod lifecycle;
pub mod mailbox;
pub mod parametrize;
pub mod poll;
pub mod telemetry;
