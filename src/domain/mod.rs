mod account;
mod account_password;
mod email_address;
mod environment_name;

pub use account::FxAccount;
pub use account_password::{AccountPassword, PASSWORD_LENGTH};
pub use email_address::{
    EMAIL_DOMAIN, EMAIL_PREFIX, allocate_email, generate_email, is_generated_email,
};
pub use environment_name::EnvironmentName;
