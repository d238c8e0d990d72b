//! Credentials and identity tokens.

pub mod password;
pub mod token;
