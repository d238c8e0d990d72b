use anyhow::Context;
use async_trait::async_trait;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;

use crate::{
    core::aliases::DbPool,
    models::{CreateProductEntity, ProductEntity},
    schema::products,
};

use super::{ProductStore, StoreResult};

pub struct PgProductStore {
    db_pool: DbPool,
}

impl PgProductStore {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn get_by_id(&self, id: i32) -> StoreResult<ProductEntity> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let product = products::table
            .find(id)
            .select(ProductEntity::as_select())
            .get_result(conn)
            .await?;

        Ok(product)
    }

    async fn get_many_by_ids(&self, ids: &[i32]) -> StoreResult<Vec<ProductEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let products = products::table
            .filter(products::id.eq_any(ids))
            .select(ProductEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get products")?;

        Ok(products)
    }

    async fn list(&self) -> StoreResult<Vec<ProductEntity>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let products = products::table
            .order_by(products::id.asc())
            .select(ProductEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get products")?;

        Ok(products)
    }

    async fn create(&self, product: CreateProductEntity) -> StoreResult<ProductEntity> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let product = diesel::insert_into(products::table)
            .values(product)
            .returning(ProductEntity::as_returning())
            .get_result(conn)
            .await
            .context("Failed to create product")?;

        Ok(product)
    }
}
