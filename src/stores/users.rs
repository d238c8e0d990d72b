use anyhow::Context;
use async_trait::async_trait;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;

use crate::{
    core::aliases::DbPool,
    models::{CreateUserEntity, UserEntity},
    schema::users,
};

use super::{StoreResult, UserStore};

pub struct PgUserStore {
    db_pool: DbPool,
}

impl PgUserStore {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_id(&self, id: i32) -> StoreResult<UserEntity> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let user = users::table
            .find(id)
            .select(UserEntity::as_select())
            .get_result(conn)
            .await?;

        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<UserEntity> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let user = users::table
            .filter(users::email.eq(email))
            .select(UserEntity::as_select())
            .get_result(conn)
            .await?;

        Ok(user)
    }

    async fn create(&self, user: CreateUserEntity) -> StoreResult<UserEntity> {
        let conn = &mut self
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        let user = diesel::insert_into(users::table)
            .values(user)
            .returning(UserEntity::as_returning())
            .get_result(conn)
            .await?;

        Ok(user)
    }
}
