use anyhow::Context;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    auth::password::{hash_password, verify_password},
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::CreateUserEntity,
    stores::StoreError,
};

const INVALID_CREDENTIALS: &str = "invalid email or password";

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(register))
        .routes(utoipa_axum::routes!(login))
}

#[derive(Deserialize, ToSchema)]
struct RegisterReq {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
}

impl RegisterReq {
    fn validate(&self) -> Result<(), AppError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppError::BadRequest("first and last name are required".into()));
        }
        if !looks_like_email(&self.email) {
            return Err(AppError::BadRequest("invalid email".into()));
        }
        if !(6..=20).contains(&self.password.chars().count()) {
            return Err(AppError::BadRequest(
                "password must be between 6 and 20 characters".into(),
            ));
        }
        Ok(())
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}

/// Create a new account.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Auth"],
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User created successfully", body = StdResponse<String, String>),
        (status = 400, description = "Invalid payload or email already registered")
    )
)]
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    body.validate()?;

    let email = body.email.trim().to_string();
    match state.users.get_by_email(&email).await {
        Ok(_) => {
            return Err(AppError::BadRequest(format!(
                "user with email {email} already exists"
            )));
        }
        Err(StoreError::NotFound) => {}
        Err(err) => return Err(AppError::Other(err.into())),
    }

    let digest = hash_password(&body.password).context("Failed to hash password")?;

    let user = state
        .users
        .create(CreateUserEntity {
            first_name: body.first_name,
            last_name: body.last_name,
            email: email.clone(),
            password: digest,
        })
        .await
        .map_err(|err| match err {
            // Lost a race with a concurrent registration
            StoreError::Conflict => {
                AppError::BadRequest(format!("user with email {email} already exists"))
            }
            other => AppError::Other(other.into()),
        })?;

    info!(user_id = user.id, "Registered user");

    Ok((
        StatusCode::CREATED,
        StdResponse::<(), _> {
            data: None,
            message: Some("User created successfully"),
        },
    ))
}

#[derive(Deserialize, ToSchema)]
struct LoginReq {
    email: String,
    password: String,
}

#[derive(Serialize, ToSchema)]
struct LoginRes {
    token: String,
}

/// Exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Auth"],
    request_body = LoginReq,
    responses(
        (status = 200, description = "Logged in", body = LoginRes),
        (status = 400, description = "Invalid email or password")
    )
)]
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;

    let user = match state.users.get_by_email(body.email.trim()).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            debug!("Login attempt for unknown email");
            return Err(AppError::BadRequest(INVALID_CREDENTIALS.into()));
        }
        Err(err) => return Err(AppError::Other(err.into())),
    };

    if !verify_password(&user.password, &body.password) {
        debug!(user_id = user.id, "Login attempt with wrong password");
        return Err(AppError::BadRequest(INVALID_CREDENTIALS.into()));
    }

    let token = state
        .tokens
        .issue(user.id)
        .context("Failed to issue token")?;

    Ok(Json(LoginRes { token }))
}
