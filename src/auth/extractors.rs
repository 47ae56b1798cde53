use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use mongodb::bson::oid::ObjectId;
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::User;
use crate::error::ApiError;
use crate::state::AppState;

/// Bearer-token guard. Verifies the token and loads the calling user
/// (password projected out) so handlers get the full record.
pub struct CurrentUser(pub User);

fn strip_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Auth("No token provided".into()))?;

        let token = strip_bearer(auth_header)
            .ok_or_else(|| ApiError::Auth("Invalid Authorization header".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Auth("Invalid or expired token".into())
        })?;

        let user_id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| ApiError::Auth("Invalid token subject".into()))?;

        let user = User::find_by_id_public(&state.users(), user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %user_id, "token subject no longer exists");
                ApiError::Auth("User not found".into())
            })?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_bearer_accepts_both_scheme_casings() {
        assert_eq!(strip_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(strip_bearer("bearer abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn strip_bearer_rejects_other_schemes_and_bare_tokens() {
        assert_eq!(strip_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(strip_bearer("abc.def.ghi"), None);
        assert_eq!(strip_bearer("BEARER abc"), None);
    }
}
