use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Users

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Password digest. Never leaves the service.
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

// Products

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub price: Decimal,
    /// Units currently recorded as available.
    pub quantity: i32,
    pub category_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::products)]
pub struct CreateProductEntity {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub price: Decimal,
    pub quantity: i32,
    pub category_id: Option<i32>,
}

// Carts

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartEntity {
    pub id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItemEntity {
    pub id: i32,
    pub cart_id: i32,
    pub product_id: i32,
    /// Unit price captured when the product was first added.
    pub price: Decimal,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::carts)]
pub struct CreateCartEntity {
    pub user_id: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::cart_items)]
pub struct CreateCartItemEntity {
    pub cart_id: i32,
    pub product_id: i32,
    pub price: Decimal,
    pub quantity: i32,
}

/// A cart line joined with the product's display data.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct CartItemView {
    pub id: i32,
    pub product_id: i32,
    pub title: String,
    pub image: String,
    /// Snapshot price from the first add.
    pub price: Decimal,
    /// Live catalog price.
    pub current_price: Decimal,
    pub quantity: i32,
}

impl CartItemView {
    pub fn new(item: CartItemEntity, product: &ProductEntity) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            title: product.name.clone(),
            image: product.image_url.clone(),
            price: item.price,
            current_price: product.price,
            quantity: item.quantity,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct CartView {
    /// `None` until the user adds their first item.
    pub id: Option<i32>,
    pub user_id: i32,
    pub items: Vec<CartItemView>,
}

impl CartView {
    pub fn empty(user_id: i32) -> Self {
        Self {
            id: None,
            user_id,
            items: Vec::new(),
        }
    }
}

// Orders

pub const ORDER_STATUS_PENDING: &str = "pending";

#[derive(Queryable, Serialize, Selectable, Identifiable, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub user_id: i32,
    pub total: Decimal,
    pub status: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity {
    pub user_id: i32,
    pub total: Decimal,
    pub status: String,
    pub address: String,
}

#[derive(Queryable, Serialize, Selectable, Debug, Clone, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: Decimal,
}

/// A priced checkout line waiting for its order id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i32,
    pub quantity: i32,
    pub price: Decimal,
}

impl OrderLine {
    /// `None` when the product does not fit in a `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }

    pub fn into_entity(self, order_id: i32) -> CreateOrderItemEntity {
        CreateOrderItemEntity {
            order_id,
            product_id: self.product_id,
            quantity: self.quantity,
            price: self.price,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct OrderWithItems {
    pub order: OrderEntity,
    pub order_items: Vec<OrderItemEntity>,
}
