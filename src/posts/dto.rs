use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::posts::repo::{Comment, Post, PostStatus};

const ESTAT_MESSAGE: &str = "estat must be \"esborrany\" or \"publicat\"";

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub estat: String,
    pub categoria: Option<String>,
    #[serde(default)]
    pub etiquetes: Vec<String>,
}

impl CreatePostRequest {
    pub fn into_post(self, author_email: &str) -> Result<Post, ApiError> {
        if self.title.is_empty() {
            return Err(ApiError::Validation("title is required".into()));
        }
        if self.text.is_empty() {
            return Err(ApiError::Validation("text is required".into()));
        }
        let estat = PostStatus::parse(&self.estat)
            .ok_or_else(|| ApiError::Validation(ESTAT_MESSAGE.into()))?;
        Ok(Post::new(
            self.title,
            self.text,
            estat,
            self.categoria,
            self.etiquetes,
            author_email,
        ))
    }
}

/// Partial update. A field counts as supplied iff present in the body;
/// a supplied empty title/text is rejected rather than silently skipped,
/// and a supplied empty tag list clears the tags.
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    pub estat: Option<String>,
    pub categoria: Option<String>,
    pub etiquetes: Option<Vec<String>>,
}

impl UpdatePostRequest {
    pub fn apply_to(self, post: &mut Post, editor_email: &str) -> Result<(), ApiError> {
        if let Some(title) = self.title {
            if title.is_empty() {
                return Err(ApiError::Validation("title must not be empty".into()));
            }
            post.title = title;
        }
        if let Some(text) = self.text {
            if text.is_empty() {
                return Err(ApiError::Validation("text must not be empty".into()));
            }
            post.text = text;
        }
        if let Some(estat) = self.estat {
            post.estat = PostStatus::parse(&estat)
                .ok_or_else(|| ApiError::Validation(ESTAT_MESSAGE.into()))?;
        }
        if let Some(categoria) = self.categoria {
            post.categoria = Some(categoria);
        }
        if let Some(etiquetes) = self.etiquetes {
            post.etiquetes = etiquetes;
        }
        // The editor is stamped even when no field changed.
        post.usuari = editor_email.to_string();
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub text: String,
    pub estat: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    pub etiquetes: Vec<String>,
    pub usuari: String,
    pub likes: i64,
    pub comments: Vec<CommentResponse>,
    #[serde(
        rename = "createdAt",
        with = "mongodb::bson::serde_helpers::bson_datetime_as_rfc3339_string"
    )]
    pub created_at: DateTime,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: post.title,
            text: post.text,
            estat: post.estat,
            categoria: post.categoria,
            etiquetes: post.etiquetes,
            usuari: post.usuari,
            likes: post.likes,
            comments: post.comments.into_iter().map(Into::into).collect(),
            created_at: post.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub user: String,
    pub content: String,
    #[serde(
        rename = "createdAt",
        with = "mongodb::bson::serde_helpers::bson_datetime_as_rfc3339_string"
    )]
    pub created_at: DateTime,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id.to_hex(),
            user: comment.user.to_hex(),
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub message: String,
    pub likes: i64,
}
