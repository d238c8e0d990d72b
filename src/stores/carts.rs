use anyhow::Context;
use async_trait::async_trait;
use diesel::{
    ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, upsert::excluded,
};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rust_decimal::Decimal;

use crate::{
    core::aliases::DbPool,
    models::{
        CartEntity, CartItemEntity, CartItemView, CartView, CreateCartEntity,
        CreateCartItemEntity, ProductEntity,
    },
    schema::{cart_items, carts, products},
};

use super::{CartStore, StoreError, StoreResult};

pub struct PgCartStore {
    db_pool: DbPool,
}

impl PgCartStore {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

/// Id of the user's cart row, [`StoreError::NotFound`] if there is none yet.
async fn cart_id_for_user(conn: &mut AsyncPgConnection, user_id: i32) -> StoreResult<i32> {
    let cart_id = carts::table
        .filter(carts::user_id.eq(user_id))
        .select(carts::id)
        .get_result(conn)
        .await?;

    Ok(cart_id)
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn get_cart(&self, user_id: i32) -> StoreResult<CartView> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let cart: Option<CartEntity> = carts::table
            .filter(carts::user_id.eq(user_id))
            .select(CartEntity::as_select())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to get cart")?;

        let Some(cart) = cart else {
            return Ok(CartView::empty(user_id));
        };

        let rows: Vec<(CartItemEntity, ProductEntity)> = cart_items::table
            .inner_join(products::table)
            .filter(cart_items::cart_id.eq(cart.id))
            .order_by(cart_items::id.asc())
            .select((CartItemEntity::as_select(), ProductEntity::as_select()))
            .get_results(conn)
            .await
            .context("Failed to get cart items")?;

        Ok(CartView {
            id: Some(cart.id),
            user_id,
            items: rows
                .into_iter()
                .map(|(item, product)| CartItemView::new(item, &product))
                .collect(),
        })
    }

    async fn add_to_cart(&self, user_id: i32, product_id: i32, quantity: i32) -> StoreResult<()> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        conn.transaction(move |conn| {
            Box::pin(async move {
                diesel::insert_into(carts::table)
                    .values(CreateCartEntity { user_id })
                    .on_conflict(carts::user_id)
                    .do_nothing()
                    .execute(conn)
                    .await
                    .context("Failed to create cart")?;

                // Serializes concurrent adds for the same user
                let cart_id: i32 = carts::table
                    .filter(carts::user_id.eq(user_id))
                    .select(carts::id)
                    .for_update()
                    .get_result(conn)
                    .await
                    .context("Failed to lock cart")?;

                let price: Decimal = products::table
                    .find(product_id)
                    .select(products::price)
                    .get_result(conn)
                    .await?;

                // The snapshot price stays as it was on the first add
                diesel::insert_into(cart_items::table)
                    .values(CreateCartItemEntity {
                        cart_id,
                        product_id,
                        price,
                        quantity,
                    })
                    .on_conflict((cart_items::cart_id, cart_items::product_id))
                    .do_update()
                    .set((
                        cart_items::quantity.eq(cart_items::quantity + excluded(cart_items::quantity)),
                        cart_items::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await
                    .context("Failed to upsert cart item")?;

                Ok::<(), StoreError>(())
            })
        })
        .await
    }

    async fn remove_from_cart(&self, user_id: i32, product_id: i32) -> StoreResult<()> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let cart_id = cart_id_for_user(conn, user_id).await?;

        diesel::delete(
            cart_items::table
                .filter(cart_items::cart_id.eq(cart_id))
                .filter(cart_items::product_id.eq(product_id)),
        )
        .execute(conn)
        .await
        .context("Failed to delete cart item")?;

        Ok(())
    }

    async fn clear_cart(&self, user_id: i32) -> StoreResult<()> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let cart_id = cart_id_for_user(conn, user_id).await?;

        diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart_id)))
            .execute(conn)
            .await
            .context("Failed to clear cart")?;

        Ok(())
    }
}
