use crate::domain::AccountPassword;
use secrecy::Secret;

/// A live, verified account on the identity service.
///
/// Only ever constructed once verification succeeded. Tests receive it
/// read-only; the password stays behind [`Secret`].
#[derive(Clone, Debug)]
pub struct FxAccount {
    email: String,
    password: AccountPassword,
}

impl FxAccount {
    pub(crate) fn new(email: String, password: AccountPassword) -> Self {
        Self { email, password }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &Secret<String> {
        self.password.as_secret()
    }
}

impl std::fmt::Display for FxAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FxAccount(email={})", self.email)
    }
}
