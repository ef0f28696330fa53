mod account_lifecycle;
mod parametrized_environments;
