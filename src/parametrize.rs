//! Expansion of one test into one invocation per marked environment.

use crate::domain::EnvironmentName;
use crate::environments::EnvironmentTable;
use std::collections::BTreeSet;

/// Marker naming the environments a test should run against.
pub const ENV_MARKER: &str = "fxa_env";

pub const URLS_FIXTURE: &str = "fxa_urls";
pub const CLIENT_FIXTURE: &str = "fxa_client";
pub const EMAIL_FIXTURE: &str = "fxa_email";
pub const ACCOUNT_FIXTURE: &str = "fxa_account";

/// Fixtures each fixture requests in turn.
const FIXTURE_DEPENDENCIES: &[(&str, &[&str])] = &[
    (ACCOUNT_FIXTURE, &[CLIENT_FIXTURE, EMAIL_FIXTURE]),
    (CLIENT_FIXTURE, &[URLS_FIXTURE]),
    (EMAIL_FIXTURE, &[]),
    (URLS_FIXTURE, &[]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub name: String,
    pub args: Vec<String>,
}

impl Marker {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// `fxa_env(names...)`
pub fn fxa_env<I, S>(names: I) -> Marker
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Marker::new(ENV_MARKER, names)
}

/// What the test driver knows about a test before running it.
#[derive(Debug, Clone, Default)]
pub struct TestItem {
    pub name: String,
    pub fixtures: Vec<String>,
    pub markers: Vec<Marker>,
}

impl TestItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn uses(mut self, fixture: impl Into<String>) -> Self {
        self.fixtures.push(fixture.into());
        self
    }

    pub fn marked(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Requested fixtures plus everything they depend on.
    pub fn fixture_closure(&self) -> BTreeSet<&str> {
        let mut closure = BTreeSet::new();
        let mut pending: Vec<&str> = self.fixtures.iter().map(String::as_str).collect();
        while let Some(fixture) = pending.pop() {
            if !closure.insert(fixture) {
                continue;
            }
            if let Some((_, dependencies)) = FIXTURE_DEPENDENCIES
                .iter()
                .find(|(name, _)| *name == fixture)
            {
                pending.extend(dependencies.iter().copied());
            }
        }
        closure
    }

    fn marked_environments(&self) -> BTreeSet<&str> {
        self.markers
            .iter()
            .filter(|marker| marker.name == ENV_MARKER)
            .flat_map(|marker| marker.args.iter().map(String::as_str))
            .collect()
    }
}

/// One run of a test. `environment` is `None` when the default
/// resolution applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub id: String,
    pub environment: Option<EnvironmentName>,
}

/// Expand `item` into its invocations.
///
/// Only tests that (transitively) use `fxa_urls` are expanded. Environments
/// named by several markers run once; markers without arguments are ignored.
pub fn generate_invocations(item: &TestItem) -> Vec<Invocation> {
    let environments = if item.fixture_closure().contains(URLS_FIXTURE) {
        item.marked_environments()
    } else {
        BTreeSet::new()
    };

    if environments.is_empty() {
        return vec![Invocation {
            id: item.name.clone(),
            environment: None,
        }];
    }

    environments
        .into_iter()
        .map(|name| Invocation {
            id: format!("{}[{}]", item.name, name),
            environment: Some(EnvironmentName::from(name)),
        })
        .collect()
}

/// Description of the `fxa_env` marker for `--markers` style listings.
pub fn marker_help(table: &EnvironmentTable) -> String {
    format!(
        "{}(name,): mark tests to run against named Firefox Accounts environment(s): {}",
        ENV_MARKER,
        table.names().collect::<Vec<_>>().join(", ")
    )
}
