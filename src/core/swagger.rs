use utoipa::openapi::{
    OpenApi,
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

/// Serve the generated OpenAPI document with Swagger UI, registering the `bearerAuth` scheme
/// referenced by protected routes.
pub fn create_swagger_ui(mut openapi: OpenApi) -> SwaggerUi {
    let components = openapi.components.get_or_insert_with(Default::default);
    components.add_security_scheme(
        "bearerAuth",
        SecurityScheme::Http(
            HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .build(),
        ),
    );

    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi)
}
