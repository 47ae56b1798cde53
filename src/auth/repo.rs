use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::FindOneOptions;
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Editor,
    Admin,
}

/// User document. The password field holds an argon2 hash and is never
/// serialized back out, neither to JSON responses nor to projected reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime,
}

impl User {
    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub async fn find_by_email(
        users: &Collection<User>,
        email: &str,
    ) -> Result<Option<User>, ApiError> {
        let user = users.find_one(doc! {"email": email}, None).await?;
        Ok(user)
    }

    /// Load a user by id with the password hash projected out.
    pub async fn find_by_id_public(
        users: &Collection<User>,
        id: ObjectId,
    ) -> Result<Option<User>, ApiError> {
        let opts = FindOneOptions::builder()
            .projection(doc! {"password": 0})
            .build();
        let user = users.find_one(doc! {"_id": id}, opts).await?;
        Ok(user)
    }

    /// Insert a new user. The email must already be normalized and the
    /// password already hashed; a duplicate email maps to Conflict.
    pub async fn create(
        users: &Collection<User>,
        email: &str,
        password_hash: &str,
    ) -> Result<User, ApiError> {
        let mut user = User {
            id: None,
            email: email.to_string(),
            password: password_hash.to_string(),
            role: Role::default(),
            created_at: DateTime::now(),
        };
        let result = users.insert_one(&user, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                ApiError::Conflict("User already exists".into())
            } else {
                ApiError::Store(e)
            }
        })?;
        user.id = result.inserted_id.as_object_id();
        Ok(user)
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_editor() {
        assert_eq!(Role::default(), Role::Editor);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"editor\"");
    }

    #[test]
    fn password_is_never_serialized() {
        let user = User {
            id: Some(ObjectId::new()),
            email: "a@x.com".into(),
            password: "$argon2id$secret".into(),
            role: Role::Editor,
            created_at: DateTime::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn user_deserializes_without_password_projection() {
        // Shape produced by a read with {"password": 0}.
        let doc = mongodb::bson::doc! {
            "_id": ObjectId::new(),
            "email": "a@x.com",
            "role": "admin",
            "createdAt": DateTime::now(),
        };
        let user: User = mongodb::bson::from_document(doc).unwrap();
        assert!(user.password.is_empty());
        assert_eq!(user.role, Role::Admin);
    }
}
