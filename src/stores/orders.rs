use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::{
    core::aliases::DbPool,
    models::{
        CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderItemEntity, OrderLine,
        OrderWithItems,
    },
    schema::{order_items, orders},
};

use super::{OrderStore, StoreError, StoreResult};

pub struct PgOrderStore {
    db_pool: DbPool,
}

impl PgOrderStore {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(
        &self,
        order: CreateOrderEntity,
        lines: Vec<OrderLine>,
    ) -> StoreResult<i32> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        conn.transaction(move |conn| {
            Box::pin(async move {
                let order_id: i32 = diesel::insert_into(orders::table)
                    .values(order)
                    .returning(orders::id)
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let items: Vec<CreateOrderItemEntity> = lines
                    .into_iter()
                    .map(|line| line.into_entity(order_id))
                    .collect();

                diesel::insert_into(order_items::table)
                    .values(items)
                    .execute(conn)
                    .await
                    .context("Failed to create order items")?;

                Ok::<i32, StoreError>(order_id)
            })
        })
        .await
    }

    async fn get_order(&self, user_id: i32, order_id: i32) -> StoreResult<OrderWithItems> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let order: OrderEntity = orders::table
            .find(order_id)
            .filter(orders::user_id.eq(user_id))
            .select(OrderEntity::as_select())
            .get_result(conn)
            .await?;

        let order_items: Vec<OrderItemEntity> = order_items::table
            .filter(order_items::order_id.eq(order.id))
            .order_by(order_items::id.asc())
            .select(OrderItemEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get order items")?;

        Ok(OrderWithItems { order, order_items })
    }

    async fn list_orders(&self, user_id: i32) -> StoreResult<Vec<OrderWithItems>> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let orders: Vec<OrderEntity> = orders::table
            .filter(orders::user_id.eq(user_id))
            .order_by((orders::created_at.desc(), orders::id.desc()))
            .select(OrderEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get orders")?;

        let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
        let items: Vec<OrderItemEntity> = order_items::table
            .filter(order_items::order_id.eq_any(&order_ids))
            .order_by(order_items::id.asc())
            .select(OrderItemEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get order items")?;

        let mut group: HashMap<i32, Vec<OrderItemEntity>> = HashMap::new();
        for item in items {
            group.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                order_items: group.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}
