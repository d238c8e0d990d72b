use std::sync::Arc;

use crate::{
    auth::token::TokenService,
    stores::{
        CartStore, OrderStore, ProductStore, UserStore, carts::PgCartStore,
        orders::PgOrderStore, products::PgProductStore, users::PgUserStore,
    },
};

use super::aliases::DbPool;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub carts: Arc<dyn CartStore>,
    pub orders: Arc<dyn OrderStore>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// Wire the `PostgreSQL`-backed stores onto one pool.
    pub fn from_pool(db_pool: DbPool, tokens: TokenService) -> Self {
        Self {
            users: Arc::new(PgUserStore::new(db_pool.clone())),
            products: Arc::new(PgProductStore::new(db_pool.clone())),
            carts: Arc::new(PgCartStore::new(db_pool.clone())),
            orders: Arc::new(PgOrderStore::new(db_pool)),
            tokens: Arc::new(tokens),
        }
    }
}
