/// Name of a deployment of the identity service, e.g. `stage`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnvironmentName(String);

impl EnvironmentName {
    /// Environment used when neither a marker nor `FXA_ENV` picks one.
    pub const DEFAULT: &'static str = "stage";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Default for EnvironmentName {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl AsRef<str> for EnvironmentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EnvironmentName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
