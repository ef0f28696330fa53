use serde_aux::field_attributes::deserialize_number_from_string;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Name of the command line flag carrying an email override.
pub const EMAIL_FLAG: &str = "--fxa-email";

pub const DEFAULT_MAILBOX_URL: &str = "https://restmail.net";
const DEFAULT_HTTP_TIMEOUT_MILLISECONDS: u64 = 10_000;
const DEFAULT_POLL_INTERVAL_MILLISECONDS: u64 = 1_000;
const DEFAULT_WAIT_TIMEOUT_SECONDS: u64 = 60;

/// Read-only snapshot of everything the fixtures take from their
/// surroundings. Built once, then passed explicitly.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    /// `FXA_ENV`
    #[serde(default)]
    pub env: Option<String>,
    /// `FXA_EMAIL`
    #[serde(default)]
    pub email: Option<String>,
    /// Value of the `--fxa-email` flag, supplied by the caller.
    #[serde(skip)]
    pub cli_email: Option<String>,
    pub mailbox: MailboxSettings,
    pub identity: IdentitySettings,
    /// Extra environments, merged over the built-in table.
    #[serde(default)]
    pub environments: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct MailboxSettings {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub poll_interval_milliseconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub wait_timeout_seconds: u64,
}

impl MailboxSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_milliseconds)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_seconds)
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct IdentitySettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl IdentitySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: None,
            email: None,
            cli_email: None,
            mailbox: MailboxSettings {
                base_url: DEFAULT_MAILBOX_URL.to_string(),
                timeout_milliseconds: DEFAULT_HTTP_TIMEOUT_MILLISECONDS,
                poll_interval_milliseconds: DEFAULT_POLL_INTERVAL_MILLISECONDS,
                wait_timeout_seconds: DEFAULT_WAIT_TIMEOUT_SECONDS,
            },
            identity: IdentitySettings {
                timeout_milliseconds: DEFAULT_HTTP_TIMEOUT_MILLISECONDS,
            },
            environments: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn with_cli_email(mut self, email: Option<String>) -> Self {
        self.cli_email = email;
        self
    }
}

/// Read the configuration from `configuration/base.yaml` (optional) and
/// `FXA_`-prefixed variables of the process environment.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    build_configuration(environment_source())
}

/// Like [`get_configuration`], with an explicit set of environment
/// variables instead of the process environment.
pub fn get_configuration_from(
    variables: HashMap<String, String>,
) -> Result<Settings, config::ConfigError> {
    build_configuration(environment_source().source(Some(variables)))
}

fn environment_source() -> config::Environment {
    // E.g. `FXA_ENV=stable` sets `Settings.env`,
    // `FXA_MAILBOX__WAIT_TIMEOUT_SECONDS=5` sets `Settings.mailbox.wait_timeout_seconds`
    config::Environment::with_prefix("FXA")
        .prefix_separator("_")
        .separator("__")
}

fn build_configuration(environment: config::Environment) -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .set_default("mailbox.base_url", DEFAULT_MAILBOX_URL)?
        .set_default(
            "mailbox.timeout_milliseconds",
            DEFAULT_HTTP_TIMEOUT_MILLISECONDS as i64,
        )?
        .set_default(
            "mailbox.poll_interval_milliseconds",
            DEFAULT_POLL_INTERVAL_MILLISECONDS as i64,
        )?
        .set_default(
            "mailbox.wait_timeout_seconds",
            DEFAULT_WAIT_TIMEOUT_SECONDS as i64,
        )?
        .set_default(
            "identity.timeout_milliseconds",
            DEFAULT_HTTP_TIMEOUT_MILLISECONDS as i64,
        )?
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(false))
        .add_source(environment)
        .build()?;

    settings.try_deserialize::<Settings>()
}

/// Extract the value of `--fxa-email` from a command line.
/// Both `--fxa-email value` and `--fxa-email=value` are understood.
pub fn email_override_from_args<I, S>(args: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        if arg == EMAIL_FLAG {
            return args.next().map(|value| value.as_ref().to_string());
        }
        if let Some(value) = arg
            .strip_prefix(EMAIL_FLAG)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(value.to_string());
        }
    }
    None
}
