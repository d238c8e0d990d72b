use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    checkout::{self, CheckoutReceipt, CheckoutRequest},
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CurrentUser},
    },
    models::CartView,
    stores::StoreError,
};

/// Cart routes for the authenticated user, checkout included.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(add_to_cart))
            .routes(utoipa_axum::routes!(clear_cart))
            .routes(utoipa_axum::routes!(remove_from_cart))
            .routes(utoipa_axum::routes!(checkout_cart))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::users_authorization,
            )),
    )
}

/// Fetch the caller's cart with product display data.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get cart successfully", body = StdResponse<CartView, String>),
        (status = 401, description = "Missing or invalid token")
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let cart = state
        .carts
        .get_cart(user_id)
        .await
        .map_err(|err| AppError::Other(err.into()))?;

    Ok(StdResponse {
        data: Some(cart),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddToCartReq {
    #[serde(rename = "id", alias = "productID", alias = "product_id")]
    product_id: i32,
    #[serde(default)]
    quantity: i32,
}

/// Add a product to the caller's cart, merging with an existing line.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    request_body = AddToCartReq,
    responses(
        (status = 200, description = "Added to cart", body = StdResponse<String, String>),
        (status = 404, description = "Product does not exist")
    )
)]
async fn add_to_cart(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    payload: Result<Json<AddToCartReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    let quantity = if body.quantity <= 0 { 1 } else { body.quantity };

    state
        .carts
        .add_to_cart(user_id, body.product_id, quantity)
        .await
        .map_err(|err| match err {
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Other(other.into()),
        })?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("Added to cart"),
    })
}

/// Remove one product from the caller's cart.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to remove")
    ),
    responses(
        (status = 200, description = "Removed from cart", body = StdResponse<String, String>)
    )
)]
async fn remove_from_cart(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    tolerate_missing_cart(state.carts.remove_from_cart(user_id, product_id).await)?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("Removed from cart"),
    })
}

/// Remove every item from the caller's cart.
#[utoipa::path(
    delete,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Cart cleared", body = StdResponse<String, String>)
    )
)]
async fn clear_cart(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    tolerate_missing_cart(state.carts.clear_cart(user_id).await)?;

    Ok(StdResponse::<(), _> {
        data: None,
        message: Some("Cart cleared"),
    })
}

/// Buy exactly the submitted lines at live catalog prices.
#[utoipa::path(
    post,
    path = "/checkout",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order created", body = CheckoutReceipt),
        (status = 400, description = "Invalid payload, unknown product or insufficient stock"),
        (status = 401, description = "Missing or invalid token")
    )
)]
async fn checkout_cart(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;

    let receipt = checkout::checkout(
        state.products.as_ref(),
        state.orders.as_ref(),
        user_id,
        body,
    )
    .await?;

    // Bare object, as clients read `order_id` and `total_price` at the top level
    Ok(Json(receipt))
}

/// A user without a cart row has nothing to remove.
fn tolerate_missing_cart(result: Result<(), StoreError>) -> Result<(), AppError> {
    match result {
        Ok(()) => Ok(()),
        Err(StoreError::NotFound) => {
            debug!("No cart row, nothing to remove");
            Ok(())
        }
        Err(err) => Err(AppError::Other(err.into())),
    }
}
