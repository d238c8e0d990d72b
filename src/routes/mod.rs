use axum::{
    Router,
    http::{Method, header},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa_axum::router::OpenApiRouter;

use crate::core::{app_state::AppState, swagger};

pub mod auth;
pub mod customers;
pub mod products;

/// Every API route under `/api/v1`, with its OpenAPI description.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/api/v1",
        auth::routes_with_openapi()
            .merge(products::routes_with_openapi(state.clone()))
            .merge(customers::carts::routes_with_openapi(state.clone()))
            .merge(customers::orders::routes_with_openapi(state)),
    )
}

/// The complete application: API routes, Swagger UI, tracing and CORS.
pub fn app(state: AppState) -> Router {
    let (router, mut openapi) = routes_with_openapi(state.clone()).split_for_parts();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Shop OrderService API")
        .version("1.0.0")
        .build();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    router
        .merge(swagger::create_swagger_ui(openapi))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
