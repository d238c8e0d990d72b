//! Turns a submitted list of (product, quantity) lines into a priced order.
//!
//! Prices always come from the live catalog; whatever the cart snapshotted
//! is ignored. The stock check is advisory: nothing is reserved, so two
//! concurrent checkouts of the last unit can both succeed. The order row and
//! its items are written in a single store call that either commits all of
//! them or none. The cart is left untouched.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    core::app_error::AppError,
    models::{CreateOrderEntity, ORDER_STATUS_PENDING, OrderLine, ProductEntity},
    stores::{OrderStore, ProductStore, StoreError},
};

pub const DEFAULT_SHIPPING_ADDRESS: &str = "unspecified";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutItem {
    #[serde(rename = "productID", alias = "product_id")]
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    pub order_id: i32,
    pub total_price: Decimal,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("product {0} is not available in the store")]
    UnknownProduct(i32),

    #[error("product {product_id} is not available in the quantity requested ({requested} > {available})")]
    InsufficientStock {
        product_id: i32,
        requested: i64,
        available: i32,
    },

    #[error("failed to look up products")]
    CatalogLookupFailed(#[source] StoreError),

    #[error("failed to store order")]
    Storage(#[source] StoreError),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::InvalidPayload(_)
            | CheckoutError::UnknownProduct(_)
            | CheckoutError::InsufficientStock { .. } => AppError::BadRequest(err.to_string()),
            CheckoutError::CatalogLookupFailed(_) | CheckoutError::Storage(_) => {
                AppError::Other(err.into())
            }
        }
    }
}

pub async fn checkout(
    products: &dyn ProductStore,
    orders: &dyn OrderStore,
    user_id: i32,
    request: CheckoutRequest,
) -> Result<CheckoutReceipt, CheckoutError> {
    validate_items(&request.items)?;

    let product_ids: Vec<i32> = request
        .items
        .iter()
        .map(|item| item.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let catalog = products
        .get_many_by_ids(&product_ids)
        .await
        .map_err(CheckoutError::CatalogLookupFailed)?;

    let lines = price_lines(&request.items, &catalog)?;
    let total_price = order_total(&lines)?;

    let address = request
        .address
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
        .unwrap_or_else(|| DEFAULT_SHIPPING_ADDRESS.to_string());

    let line_count = lines.len();
    let order_id = orders
        .create_order(
            CreateOrderEntity {
                user_id,
                total: total_price,
                status: ORDER_STATUS_PENDING.to_string(),
                address,
            },
            lines,
        )
        .await
        .map_err(CheckoutError::Storage)?;

    info!(user_id, order_id, %total_price, line_count, "Order created");

    Ok(CheckoutReceipt {
        order_id,
        total_price,
    })
}

fn validate_items(items: &[CheckoutItem]) -> Result<(), CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::InvalidPayload("no items to checkout".into()));
    }

    if let Some(item) = items.iter().find(|item| item.quantity <= 0) {
        return Err(CheckoutError::InvalidPayload(format!(
            "invalid quantity {} for product {}",
            item.quantity, item.product_id
        )));
    }

    Ok(())
}

fn order_total(lines: &[OrderLine]) -> Result<Decimal, CheckoutError> {
    lines
        .iter()
        .try_fold(Decimal::ZERO, |total, line| {
            line.subtotal().and_then(|subtotal| total.checked_add(subtotal))
        })
        .ok_or_else(|| CheckoutError::InvalidPayload("order total is out of range".into()))
}

/// Price every requested line at the live catalog price.
///
/// Duplicate product ids stay separate lines, but stock is checked against
/// the combined quantity requested for each product.
fn price_lines(
    items: &[CheckoutItem],
    catalog: &[ProductEntity],
) -> Result<Vec<OrderLine>, CheckoutError> {
    let by_id: HashMap<i32, &ProductEntity> =
        catalog.iter().map(|product| (product.id, product)).collect();

    let mut requested: HashMap<i32, i64> = HashMap::new();
    for item in items {
        if !by_id.contains_key(&item.product_id) {
            return Err(CheckoutError::UnknownProduct(item.product_id));
        }
        *requested.entry(item.product_id).or_default() += i64::from(item.quantity);
    }

    for item in items {
        let product = by_id[&item.product_id];
        let total_requested = requested[&item.product_id];
        if total_requested > i64::from(product.quantity) {
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id,
                requested: total_requested,
                available: product.quantity,
            });
        }
    }

    Ok(items
        .iter()
        .map(|item| OrderLine {
            product_id: item.product_id,
            quantity: item.quantity,
            price: by_id[&item.product_id].price,
        })
        .collect())
}
