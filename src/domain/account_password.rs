use rand::Rng;
use secrecy::{ExposeSecret, Secret};

pub const PASSWORD_LENGTH: usize = 8;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Throwaway password of a test account. Letters only, never digits.
#[derive(Clone, Debug)]
pub struct AccountPassword(Secret<String>);

impl AccountPassword {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let password: String = (0..PASSWORD_LENGTH)
            .map(|_| char::from(LETTERS[rng.gen_range(0..LETTERS.len())]))
            .collect();
        Self(Secret::new(password))
    }

    pub fn as_secret(&self) -> &Secret<String> {
        &self.0
    }
}

impl ExposeSecret<String> for AccountPassword {
    fn expose_secret(&self) -> &String {
        self.0.expose_secret()
    }
}
