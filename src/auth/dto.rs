use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// Missing keys deserialize as empty strings so the handlers can answer
/// with their own status codes instead of a body-rejection 422.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    #[serde(
        rename = "createdAt",
        with = "mongodb::bson::serde_helpers::bson_datetime_as_rfc3339_string"
    )]
    pub created_at: DateTime,
}
