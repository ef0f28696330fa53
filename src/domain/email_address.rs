use rand::Rng;

/// Marks an address as generated by these fixtures.
pub const EMAIL_PREFIX: &str = "fxa-test-";
/// Domain of the disposable mail service.
pub const EMAIL_DOMAIN: &str = "restmail.net";

const RANDOM_BITS: u32 = 40;

/// A fresh disposable address: prefix, 40 random bits as lowercase hex, domain.
pub fn generate_email<R: Rng + ?Sized>(rng: &mut R) -> String {
    let value: u64 = rng.gen_range(0..(1u64 << RANDOM_BITS));
    format!("{}{:x}@{}", EMAIL_PREFIX, value, EMAIL_DOMAIN)
}

/// Pick the address for one test invocation.
///
/// The command line override wins over the environment override, which
/// wins over a generated address. Overrides are taken verbatim; empty
/// values count as absent.
pub fn allocate_email<R: Rng + ?Sized>(
    cli_override: Option<&str>,
    env_override: Option<&str>,
    rng: &mut R,
) -> String {
    cli_override
        .filter(|email| !email.is_empty())
        .or(env_override.filter(|email| !email.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| generate_email(rng))
}

pub fn is_generated_email(email: &str) -> bool {
    email
        .strip_prefix(EMAIL_PREFIX)
        .and_then(|rest| rest.strip_suffix(EMAIL_DOMAIN))
        .and_then(|rest| rest.strip_suffix('@'))
        .is_some_and(|hex| {
            !hex.is_empty()
                && hex.len() <= (RANDOM_BITS / 4) as usize
                && hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        })
}
