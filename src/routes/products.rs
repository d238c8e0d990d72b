use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware,
    },
    models::{CreateProductEntity, ProductEntity},
    stores::StoreError,
};

const DEFAULT_PAGE_LIMIT: usize = 100;
const PRICE_SCALE: u32 = 2;

/// Largest price the `NUMERIC(10, 2)` column holds.
fn max_price() -> Decimal {
    Decimal::new(9_999_999_999, PRICE_SCALE)
}

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    let protected = OpenApiRouter::new()
        .routes(utoipa_axum::routes!(create_product))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::users_authorization,
        ));

    OpenApiRouter::new().nest(
        "/products",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_products))
            .routes(utoipa_axum::routes!(get_product))
            .merge(protected),
    )
}

/// Unparsable numbers fall back to the defaults.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct GetProductsQuery {
    /// Case-insensitive match on name or description
    q: Option<String>,
    skip: Option<String>,
    limit: Option<String>,
}

impl GetProductsQuery {
    fn skip(&self) -> usize {
        parse_count(self.skip.as_deref()).unwrap_or(0)
    }

    fn limit(&self) -> usize {
        parse_count(self.limit.as_deref()).unwrap_or(DEFAULT_PAGE_LIMIT)
    }
}

fn parse_count(raw: Option<&str>) -> Option<usize> {
    let value: i64 = raw?.trim().parse().ok()?;
    Some(usize::try_from(value).unwrap_or(0))
}

fn matches_search(product: &ProductEntity, needle: &str) -> bool {
    product.name.to_lowercase().contains(needle)
        || product.description.to_lowercase().contains(needle)
}

/// List products, optionally filtered and paginated.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Products"],
    params(GetProductsQuery),
    responses(
        (status = 200, description = "Get products successfully", body = StdResponse<Vec<ProductEntity>, String>)
    )
)]
async fn get_products(
    Query(query): Query<GetProductsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mut products = state
        .products
        .list()
        .await
        .map_err(|err| AppError::Other(err.into()))?;

    if let Some(needle) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let needle = needle.to_lowercase();
        products.retain(|product| matches_search(product, &needle));
    }

    let page: Vec<ProductEntity> = products
        .into_iter()
        .skip(query.skip())
        .take(query.limit())
        .collect();

    Ok(StdResponse {
        data: Some(page),
        message: Some("Get products successfully"),
    })
}

/// Fetch a single product.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Products"],
    params(
        ("id" = i32, Path, description = "Product ID to fetch")
    ),
    responses(
        (status = 200, description = "Get product successfully", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "Product does not exist")
    )
)]
async fn get_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.get_by_id(id).await.map_err(|err| match err {
        StoreError::NotFound => AppError::NotFound,
        other => AppError::Other(other.into()),
    })?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Get product successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateProductReq {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    image: String,
    price: Decimal,
    quantity: i32,
    category_id: Option<i32>,
}

impl CreateProductReq {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name is required".into()));
        }
        if self.price <= Decimal::ZERO {
            return Err(AppError::BadRequest("price must be positive".into()));
        }
        if self.price > max_price() {
            return Err(AppError::BadRequest(format!(
                "price must not exceed {}",
                max_price()
            )));
        }
        if self.price.normalize().scale() > PRICE_SCALE {
            return Err(AppError::BadRequest(
                "price must have at most two decimal places".into(),
            ));
        }
        if self.quantity < 0 {
            return Err(AppError::BadRequest("quantity must not be negative".into()));
        }
        Ok(())
    }
}

/// Add a product to the catalog.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Products"],
    security(("bearerAuth" = [])),
    request_body = CreateProductReq,
    responses(
        (status = 201, description = "Product created", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Missing or invalid token")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    body.validate()?;

    let product = state
        .products
        .create(CreateProductEntity {
            name: body.name,
            description: body.description,
            image_url: body.image,
            price: body.price,
            quantity: body.quantity,
            category_id: body.category_id,
        })
        .await
        .map_err(|err| AppError::Other(err.into()))?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(product),
            message: Some("Product created"),
        },
    ))
}
