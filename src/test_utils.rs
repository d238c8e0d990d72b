//! Shared test utilities.
//!
//! [`MemoryStore`] implements every store trait over plain vectors behind a
//! mutex, so handlers and the checkout flow can be exercised without a
//! database. Failure switches simulate a broken catalog lookup and a failing
//! order-item insert.
//!
//! [`postgres`] starts a disposable `PostgreSQL` container with every
//! migration applied, for the tests of the diesel-backed stores. Those tests
//! need Docker and are `#[ignore]`d; run them with `cargo test -- --ignored`.

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

use crate::{
    auth::token::TokenService,
    core::{aliases::DbPool, app_state::AppState, config::DatabaseConfig, db},
    models::{
        CartEntity, CartItemEntity, CartItemView, CartView, CreateOrderEntity,
        CreateProductEntity, CreateUserEntity, OrderEntity, OrderItemEntity, OrderLine,
        OrderWithItems, ProductEntity, UserEntity,
    },
    stores::{CartStore, OrderStore, ProductStore, StoreError, StoreResult, UserStore},
};

pub const TEST_JWT_SECRET: &[u8] = b"test-secret-for-unit-tests";

/// Money from a number of cents.
pub fn dec(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// A migrated database that lives as long as this value.
pub struct TestDb {
    pub pool: DbPool,
    _container: ContainerAsync<GenericImage>,
}

pub async fn postgres() -> TestDb {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_HOST_AUTH_METHOD", "trust")
        .with_startup_timeout(std::time::Duration::from_secs(120))
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let port = container
        .get_host_port_ipv4(5432.tcp())
        .await
        .expect("PostgreSQL port is not mapped");
    let url = format!("postgres://postgres@127.0.0.1:{port}/postgres");

    // The server restarts once after initdb, so the first connections may be refused
    let mut attempts = 0;
    loop {
        match db::run_migrations_blocking(db::MIGRATIONS, &url).await {
            Ok(_) => break,
            Err(_) if attempts < 10 => {
                attempts += 1;
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(err) => panic!("Failed to migrate test database: {err:?}"),
        }
    }

    let pool = db::connect(&DatabaseConfig {
        url: SecretString::from(url),
        max_connections: 20,
    })
    .await
    .expect("Failed to build test pool");

    TestDb {
        pool,
        _container: container,
    }
}

#[derive(Default)]
struct MemoryDb {
    last_id: i32,
    users: Vec<UserEntity>,
    products: Vec<ProductEntity>,
    carts: Vec<CartEntity>,
    cart_items: Vec<CartItemEntity>,
    orders: Vec<OrderEntity>,
    order_items: Vec<OrderItemEntity>,
}

impl MemoryDb {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    db: Arc<Mutex<MemoryDb>>,
    fail_catalog: Arc<AtomicBool>,
    fail_order_items: Arc<AtomicBool>,
}

impl MemoryStore {
    fn db(&self) -> MutexGuard<'_, MemoryDb> {
        self.db.lock().expect("memory store poisoned")
    }

    /// Build request state whose four stores all point at this instance.
    pub fn app_state(&self, tokens: TokenService) -> AppState {
        AppState {
            users: Arc::new(self.clone()),
            products: Arc::new(self.clone()),
            carts: Arc::new(self.clone()),
            orders: Arc::new(self.clone()),
            tokens: Arc::new(tokens),
        }
    }

    pub fn test_state(&self) -> AppState {
        self.app_state(TokenService::new(TEST_JWT_SECRET, Duration::hours(1)))
    }

    /// Insert a user whose digest matches no password.
    pub fn seed_user(&self, email: &str) -> UserEntity {
        self.seed_user_with_digest(email, "$argon2id$not-a-real-digest")
    }

    pub fn seed_user_with_digest(&self, email: &str, digest: &str) -> UserEntity {
        let mut db = self.db();
        let user = UserEntity {
            id: db.next_id(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: email.into(),
            password: digest.into(),
            created_at: Utc::now(),
        };
        db.users.push(user.clone());
        user
    }

    pub fn delete_user(&self, user_id: i32) {
        self.db().users.retain(|user| user.id != user_id);
    }

    pub fn seed_product(&self, name: &str, price: Decimal, quantity: i32) -> ProductEntity {
        let mut db = self.db();
        let product = ProductEntity {
            id: db.next_id(),
            name: name.into(),
            description: format!("{name} description"),
            image_url: format!("{}.jpg", name.to_lowercase()),
            price,
            quantity,
            category_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.products.push(product.clone());
        product
    }

    pub fn set_price(&self, product_id: i32, price: Decimal) {
        let mut db = self.db();
        if let Some(product) = db.products.iter_mut().find(|p| p.id == product_id) {
            product.price = price;
            product.updated_at = Utc::now();
        }
    }

    pub fn cart_row_exists(&self, user_id: i32) -> bool {
        self.db().carts.iter().any(|cart| cart.user_id == user_id)
    }

    pub fn cart_items_snapshot(&self) -> Vec<CartItemEntity> {
        self.db().cart_items.clone()
    }

    /// Every stored order with its items, oldest first.
    pub fn orders_snapshot(&self) -> Vec<OrderWithItems> {
        let db = self.db();
        db.orders
            .iter()
            .map(|order| OrderWithItems {
                order: order.clone(),
                order_items: db
                    .order_items
                    .iter()
                    .filter(|item| item.order_id == order.id)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    pub fn fail_catalog_lookups(&self, fail: bool) {
        self.fail_catalog.store(fail, Ordering::SeqCst);
    }

    pub fn fail_order_item_inserts(&self, fail: bool) {
        self.fail_order_items.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: i32) -> StoreResult<UserEntity> {
        self.db()
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<UserEntity> {
        self.db()
            .users
            .iter()
            .find(|user| user.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, user: CreateUserEntity) -> StoreResult<UserEntity> {
        let mut db = self.db();
        if db.users.iter().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict);
        }
        let user = UserEntity {
            id: db.next_id(),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password: user.password,
            created_at: Utc::now(),
        };
        db.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get_by_id(&self, id: i32) -> StoreResult<ProductEntity> {
        self.db()
            .products
            .iter()
            .find(|product| product.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_many_by_ids(&self, ids: &[i32]) -> StoreResult<Vec<ProductEntity>> {
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(StoreError::Other(anyhow::anyhow!("catalog unavailable")));
        }
        Ok(self
            .db()
            .products
            .iter()
            .filter(|product| ids.contains(&product.id))
            .cloned()
            .collect())
    }

    async fn list(&self) -> StoreResult<Vec<ProductEntity>> {
        Ok(self.db().products.clone())
    }

    async fn create(&self, product: CreateProductEntity) -> StoreResult<ProductEntity> {
        let mut db = self.db();
        let product = ProductEntity {
            id: db.next_id(),
            name: product.name,
            description: product.description,
            image_url: product.image_url,
            price: product.price,
            quantity: product.quantity,
            category_id: product.category_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.products.push(product.clone());
        Ok(product)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_cart(&self, user_id: i32) -> StoreResult<CartView> {
        let db = self.db();
        let Some(cart) = db.carts.iter().find(|cart| cart.user_id == user_id) else {
            return Ok(CartView::empty(user_id));
        };

        let items = db
            .cart_items
            .iter()
            .filter(|item| item.cart_id == cart.id)
            .filter_map(|item| {
                let product = db.products.iter().find(|p| p.id == item.product_id)?;
                Some(CartItemView::new(item.clone(), product))
            })
            .collect();

        Ok(CartView {
            id: Some(cart.id),
            user_id,
            items,
        })
    }

    async fn add_to_cart(&self, user_id: i32, product_id: i32, quantity: i32) -> StoreResult<()> {
        let mut db = self.db();

        // Resolve the price first so a missing product leaves nothing behind
        let price = db
            .products
            .iter()
            .find(|product| product.id == product_id)
            .map(|product| product.price)
            .ok_or(StoreError::NotFound)?;

        let existing = db
            .carts
            .iter()
            .find(|cart| cart.user_id == user_id)
            .map(|cart| cart.id);
        let cart_id = match existing {
            Some(cart_id) => cart_id,
            None => {
                let cart = CartEntity {
                    id: db.next_id(),
                    user_id,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };
                let id = cart.id;
                db.carts.push(cart);
                id
            }
        };

        if let Some(item) = db
            .cart_items
            .iter_mut()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
        {
            item.quantity += quantity;
            item.updated_at = Utc::now();
            return Ok(());
        }

        let item = CartItemEntity {
            id: db.next_id(),
            cart_id,
            product_id,
            price,
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.cart_items.push(item);
        Ok(())
    }

    async fn remove_from_cart(&self, user_id: i32, product_id: i32) -> StoreResult<()> {
        let mut db = self.db();
        let cart_id = db
            .carts
            .iter()
            .find(|cart| cart.user_id == user_id)
            .map(|cart| cart.id)
            .ok_or(StoreError::NotFound)?;

        db.cart_items
            .retain(|item| !(item.cart_id == cart_id && item.product_id == product_id));
        Ok(())
    }

    async fn clear_cart(&self, user_id: i32) -> StoreResult<()> {
        let mut db = self.db();
        let cart_id = db
            .carts
            .iter()
            .find(|cart| cart.user_id == user_id)
            .map(|cart| cart.id)
            .ok_or(StoreError::NotFound)?;

        db.cart_items.retain(|item| item.cart_id != cart_id);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(
        &self,
        order: CreateOrderEntity,
        lines: Vec<OrderLine>,
    ) -> StoreResult<i32> {
        let mut db = self.db();

        // Stage everything, commit only if every insert would succeed
        let order = OrderEntity {
            id: db.next_id(),
            user_id: order.user_id,
            total: order.total,
            status: order.status,
            address: order.address,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        if self.fail_order_items.load(Ordering::SeqCst) {
            return Err(StoreError::Other(anyhow::anyhow!(
                "Failed to create order items"
            )));
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let entity = line.into_entity(order.id);
            items.push(OrderItemEntity {
                id: db.next_id(),
                order_id: entity.order_id,
                product_id: entity.product_id,
                quantity: entity.quantity,
                price: entity.price,
            });
        }

        let order_id = order.id;
        db.orders.push(order);
        db.order_items.extend(items);
        Ok(order_id)
    }

    async fn get_order(&self, user_id: i32, order_id: i32) -> StoreResult<OrderWithItems> {
        self.orders_snapshot()
            .into_iter()
            .find(|o| o.order.id == order_id && o.order.user_id == user_id)
            .ok_or(StoreError::NotFound)
    }

    async fn list_orders(&self, user_id: i32) -> StoreResult<Vec<OrderWithItems>> {
        let mut orders: Vec<OrderWithItems> = self
            .orders_snapshot()
            .into_iter()
            .filter(|o| o.order.user_id == user_id)
            .collect();
        orders.reverse();
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_add_merges_quantity_and_keeps_first_price() {
        let store = MemoryStore::default();
        let user = store.seed_user("merge@example.com");
        let product = store.seed_product("Lamp", dec(1000), 10);

        store.add_to_cart(user.id, product.id, 2).await.unwrap();
        store.set_price(product.id, dec(1500));
        store.add_to_cart(user.id, product.id, 3).await.unwrap();

        let items = store.cart_items_snapshot();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
        assert_eq!(items[0].price, dec(1000));
    }

    #[tokio::test]
    async fn get_cart_without_row_is_empty_and_read_only() {
        let store = MemoryStore::default();
        let user = store.seed_user("reader@example.com");

        let cart = store.get_cart(user.id).await.unwrap();

        assert!(cart.items.is_empty());
        assert_eq!(cart.id, None);
        assert!(!store.cart_row_exists(user.id));
    }

    #[tokio::test]
    async fn adding_unknown_product_creates_no_cart_row() {
        let store = MemoryStore::default();
        let user = store.seed_user("ghost@example.com");

        let err = store.add_to_cart(user.id, 404, 1).await.unwrap_err();

        assert!(matches!(err, StoreError::NotFound));
        assert!(!store.cart_row_exists(user.id));
    }

    #[tokio::test]
    async fn remove_and_clear_need_a_cart_row() {
        let store = MemoryStore::default();
        let user = store.seed_user("nocart@example.com");

        assert!(matches!(
            store.remove_from_cart(user.id, 1).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.clear_cart(user.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn remove_missing_product_is_a_no_op() {
        let store = MemoryStore::default();
        let user = store.seed_user("noop@example.com");
        let product = store.seed_product("Lamp", dec(1000), 10);
        store.add_to_cart(user.id, product.id, 1).await.unwrap();

        store.remove_from_cart(user.id, product.id + 100).await.unwrap();
        assert_eq!(store.get_cart(user.id).await.unwrap().items.len(), 1);

        store.remove_from_cart(user.id, product.id).await.unwrap();
        assert!(store.get_cart(user.id).await.unwrap().items.is_empty());
        assert!(store.cart_row_exists(user.id));
    }

    #[tokio::test]
    async fn carts_are_isolated_per_user() {
        let store = MemoryStore::default();
        let alice = store.seed_user("alice@example.com");
        let bob = store.seed_user("bob@example.com");
        let product = store.seed_product("Lamp", dec(1000), 10);

        store.add_to_cart(alice.id, product.id, 1).await.unwrap();
        store.add_to_cart(bob.id, product.id, 4).await.unwrap();
        store.clear_cart(alice.id).await.unwrap();

        assert!(store.get_cart(alice.id).await.unwrap().items.is_empty());
        assert_eq!(store.get_cart(bob.id).await.unwrap().items[0].quantity, 4);
    }
}
