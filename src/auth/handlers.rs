use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::{
    dto::{AuthResponse, LoginRequest, ProfileResponse, RegisterRequest},
    extractors::CurrentUser,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::User,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(profile))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&payload.email);

    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation("Please provide all fields".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::Validation("Please provide a valid email".into()));
    }
    if payload.password.len() < 6 {
        warn!("password too short");
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    // Pre-check for a friendlier error; the unique index still guards the race.
    if User::find_by_email(&state.users(), &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.users(), &email, &hash).await?;

    let user_id = user.id.ok_or_else(|| anyhow::anyhow!("inserted user has no id"))?;
    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user_id)?;

    info!(user_id = %user.id_hex(), email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            id: user.id_hex(),
            email: user.email,
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = normalize_email(&payload.email);

    // A blank form cannot match any account; answer without a store round trip.
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Auth("Invalid credentials".into()));
    }

    // Unknown email and wrong password are deliberately indistinguishable.
    let user = User::find_by_email(&state.users(), &email)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            ApiError::Auth("Invalid credentials".into())
        })?;

    if !verify_password(&payload.password, &user.password)? {
        warn!(email = %email, "login invalid password");
        return Err(ApiError::Auth("Invalid credentials".into()));
    }

    let user_id = user.id.ok_or_else(|| anyhow::anyhow!("stored user has no id"))?;
    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user_id)?;

    info!(user_id = %user.id_hex(), email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        id: user.id_hex(),
        email: user.email,
        token,
    }))
}

#[instrument(skip(user))]
pub async fn profile(CurrentUser(user): CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        id: user.id_hex(),
        email: user.email,
        created_at: user.created_at,
    })
}
