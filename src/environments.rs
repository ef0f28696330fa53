//! Endpoint sets of the known identity service deployments.

use crate::configuration::Settings;
use crate::domain::EnvironmentName;
use crate::telemetry::error_chain_fmt;
use std::collections::BTreeMap;

/// Purpose key of the URL the identity client is bound to.
pub const AUTHENTICATION: &str = "authentication";

#[derive(thiserror::Error)]
pub enum EnvironmentError {
    #[error("Unknown identity service environment '{name}'. Known environments: {known}")]
    UnknownEnvironment { name: String, known: String },
    #[error("Environment '{name}' does not define an authentication URL")]
    MissingAuthenticationUrl { name: String },
}

impl std::fmt::Debug for EnvironmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// URLs of one deployment, keyed by purpose. Always has an
/// `authentication` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    urls: BTreeMap<String, String>,
}

impl EndpointSet {
    fn parse(name: &str, urls: BTreeMap<String, String>) -> Result<Self, EnvironmentError> {
        if !urls.contains_key(AUTHENTICATION) {
            return Err(EnvironmentError::MissingAuthenticationUrl {
                name: name.to_string(),
            });
        }
        Ok(Self { urls })
    }

    pub fn authentication(&self) -> &str {
        self.urls
            .get(AUTHENTICATION)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, purpose: &str) -> Option<&str> {
        self.urls.get(purpose).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.urls.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentTable {
    environments: BTreeMap<EnvironmentName, EndpointSet>,
}

const BUILTIN_ENVIRONMENTS: &[(&str, &[(&str, &str)])] = &[
    (
        "production",
        &[
            (AUTHENTICATION, "https://api.accounts.firefox.com/v1"),
            ("oauth", "https://oauth.accounts.firefox.com/v1"),
            ("content", "https://accounts.firefox.com/"),
            ("token", "https://token.services.mozilla.com/1.0/sync/1.5"),
            ("profile", "https://profile.accounts.firefox.com/v1"),
        ],
    ),
    (
        "stage",
        &[
            (AUTHENTICATION, "https://api-accounts.stage.mozaws.net/v1"),
            ("oauth", "https://oauth.stage.mozaws.net/v1"),
            ("content", "https://accounts.stage.mozaws.net/"),
            ("token", "https://token.stage.mozaws.net/1.0/sync/1.5"),
            ("profile", "https://profile.stage.mozaws.net/v1"),
        ],
    ),
    (
        "stable",
        &[
            (AUTHENTICATION, "https://stable.dev.lcip.org/auth/v1"),
            ("oauth", "https://oauth-stable.dev.lcip.org/v1"),
            ("content", "https://stable.dev.lcip.org/"),
            (
                "token",
                "https://stable.dev.lcip.org/syncserver/token/1.0/sync/1.5",
            ),
            ("profile", "https://stable.dev.lcip.org/profile/v1"),
        ],
    ),
    (
        "dev",
        &[
            (AUTHENTICATION, "https://latest.dev.lcip.org/auth/v1"),
            ("oauth", "https://oauth-latest.dev.lcip.org/v1"),
            ("content", "https://latest.dev.lcip.org/"),
            (
                "token",
                "https://latest.dev.lcip.org/syncserver/token/1.0/sync/1.5",
            ),
            ("profile", "https://latest.dev.lcip.org/profile/v1"),
        ],
    ),
];

impl EnvironmentTable {
    pub fn builtin() -> Self {
        let environments = BUILTIN_ENVIRONMENTS
            .iter()
            .map(|(name, urls)| {
                let urls = urls
                    .iter()
                    .map(|(purpose, url)| (purpose.to_string(), url.to_string()))
                    .collect();
                (EnvironmentName::from(*name), EndpointSet { urls })
            })
            .collect();
        Self { environments }
    }

    /// Built-in table with the environments configured in `settings` merged in.
    pub fn from_settings(settings: &Settings) -> Result<Self, EnvironmentError> {
        Self::builtin().with_overrides(&settings.environments)
    }

    /// Merge purpose-by-purpose: a known environment keeps the URLs that
    /// are not overridden, a new one must bring its authentication URL.
    pub fn with_overrides(
        mut self,
        overrides: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<Self, EnvironmentError> {
        for (name, urls) in overrides {
            let key = EnvironmentName::new(name.as_str());
            let mut merged = self
                .environments
                .remove(&key)
                .map(|existing| existing.urls)
                .unwrap_or_default();
            merged.extend(urls.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.environments
                .insert(key, EndpointSet::parse(name, merged)?);
        }
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Result<&EndpointSet, EnvironmentError> {
        self.environments
            .get(&EnvironmentName::new(name))
            .ok_or_else(|| EnvironmentError::UnknownEnvironment {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(AsRef::as_ref)
    }
}

/// Resolve the endpoint set for one test invocation.
///
/// A parametrized environment wins over `FXA_ENV`, which wins over
/// [`EnvironmentName::DEFAULT`]. Unknown names are an error, never a
/// fallback.
#[tracing::instrument(name = "Resolving identity service endpoints", skip(table, settings))]
pub fn resolve_endpoints(
    table: &EnvironmentTable,
    param: Option<&EnvironmentName>,
    settings: &Settings,
) -> Result<EndpointSet, EnvironmentError> {
    let name = param
        .map(AsRef::as_ref)
        .or(settings.env.as_deref().filter(|env| !env.is_empty()))
        .unwrap_or(EnvironmentName::DEFAULT);
    let endpoints = table.lookup(name)?;
    tracing::debug!(
        environment = %name,
        authentication = %endpoints.authentication(),
        "Resolved identity service endpoints"
    );
    Ok(endpoints.clone())
}
