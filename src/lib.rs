pub mod auth;
pub mod checkout;
pub mod core;
pub mod models;
pub mod routes;
pub mod schema;
pub mod stores;

#[cfg(test)]
pub mod test_utils;
