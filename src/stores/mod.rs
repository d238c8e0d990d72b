//! Storage capabilities used by the routes and the checkout flow.
//!
//! Each trait has one `PostgreSQL` implementation in the sibling modules;
//! tests substitute the in-memory store from `test_utils`.

use async_trait::async_trait;
use diesel::result::DatabaseErrorKind;
use thiserror::Error;

use crate::{
    core::aliases::DieselError,
    models::{
        CartView, CreateOrderEntity, CreateProductEntity, CreateUserEntity, OrderLine,
        OrderWithItems, ProductEntity, UserEntity,
    },
};

pub mod carts;
pub mod orders;
pub mod products;
pub mod users;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    Conflict,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => Self::Conflict,
            other => Self::Other(other.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> StoreResult<UserEntity>;

    async fn get_by_email(&self, email: &str) -> StoreResult<UserEntity>;

    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn create(&self, user: CreateUserEntity) -> StoreResult<UserEntity>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> StoreResult<ProductEntity>;

    /// Ids with no product are simply absent from the result.
    async fn get_many_by_ids(&self, ids: &[i32]) -> StoreResult<Vec<ProductEntity>>;

    async fn list(&self) -> StoreResult<Vec<ProductEntity>>;

    async fn create(&self, product: CreateProductEntity) -> StoreResult<ProductEntity>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Read-only: a user without a cart row gets an empty cart and no row is created.
    async fn get_cart(&self, user_id: i32) -> StoreResult<CartView>;

    /// Merge `quantity` into the user's cart as one atomic unit.
    ///
    /// Creates the cart row on first use. A new line snapshots the product's
    /// current price; an existing line only has its quantity increased.
    /// Fails with [`StoreError::NotFound`] for an unknown product.
    async fn add_to_cart(&self, user_id: i32, product_id: i32, quantity: i32) -> StoreResult<()>;

    /// Fails with [`StoreError::NotFound`] when the user has no cart row.
    /// Removing a product that is not in the cart is a no-op.
    async fn remove_from_cart(&self, user_id: i32, product_id: i32) -> StoreResult<()>;

    /// Fails with [`StoreError::NotFound`] when the user has no cart row.
    async fn clear_cart(&self, user_id: i32) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert the order and one item per line; either everything is written or nothing.
    async fn create_order(&self, order: CreateOrderEntity, lines: Vec<OrderLine>)
    -> StoreResult<i32>;

    /// Fails with [`StoreError::NotFound`] unless `order_id` belongs to `user_id`.
    async fn get_order(&self, user_id: i32, order_id: i32) -> StoreResult<OrderWithItems>;

    /// Newest first.
    async fn list_orders(&self, user_id: i32) -> StoreResult<Vec<OrderWithItems>>;
}
