use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CurrentUser},
    },
    models::OrderWithItems,
    stores::StoreError,
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(get_my_order))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::users_authorization,
            )),
    )
}

/// Fetch the caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get orders successfully", body = StdResponse<Vec<OrderWithItems>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state
        .orders
        .list_orders(user_id)
        .await
        .map_err(|err| AppError::Other(err.into()))?;

    Ok(StdResponse {
        data: Some(orders),
        message: Some("Get orders successfully"),
    })
}

/// Fetch one of the caller's orders.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderWithItems, String>),
        (status = 404, description = "No such order for this user")
    )
)]
async fn get_my_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .orders
        .get_order(user_id, id)
        .await
        .map_err(|err| match err {
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Other(other.into()),
        })?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}
