use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use mongodb::bson::oid::ObjectId;
use tracing::{info, instrument};

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::posts::dto::{
    CommentRequest, CommentResponse, CreatePostRequest, LikeResponse, MessageResponse,
    PostResponse, UpdatePostRequest,
};
use crate::posts::repo::Post;
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/:id", get(get_post))
        .route("/posts/:id/like", put(like_post))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/:id", put(update_post).delete(delete_post))
        .route("/posts/:id/comments", post(add_comment))
        .route(
            "/posts/:id/comments/:comment_id",
            put(edit_comment).delete(delete_comment),
        )
}

fn parse_post_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("Post not found".into()))
}

fn parse_comment_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("Comment not found".into()))
}

async fn load_post(state: &AppState, id: &str) -> Result<Post, ApiError> {
    let id = parse_post_id(id)?;
    Post::get(&state.posts(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let posts = Post::list(&state.posts()).await?;
    Ok(Json(posts.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = load_post(&state, &id).await?;
    Ok(Json(post.into()))
}

#[instrument(skip(state, user, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let mut post = payload.into_post(&user.email)?;
    post.insert(&state.posts()).await?;
    info!(post_id = %post.id.map(|id| id.to_hex()).unwrap_or_default(), usuari = %user.email, "post created");
    Ok((StatusCode::CREATED, Json(post.into())))
}

#[instrument(skip(state, user, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let mut post = load_post(&state, &id).await?;
    payload.apply_to(&mut post, &user.email)?;
    post.save(&state.posts()).await?;
    info!(post_id = %id, usuari = %user.email, "post updated");
    Ok(Json(post.into()))
}

#[instrument(skip(state, user))]
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_post_id(&id)?;
    if !Post::delete(&state.posts(), id).await? {
        return Err(ApiError::NotFound("Post not found".into()));
    }
    info!(post_id = %id, usuari = %user.email, "post deleted");
    Ok(Json(MessageResponse {
        message: "Post deleted".into(),
    }))
}

/// Public, unauthenticated, and not idempotent: every call adds one like.
#[instrument(skip(state))]
pub async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>, ApiError> {
    let id = parse_post_id(&id)?;
    let likes = Post::like(&state.posts(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".into()))?;
    Ok(Json(LikeResponse {
        message: "Post liked".into(),
        likes,
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    if payload.content.is_empty() {
        return Err(ApiError::Validation("content must not be empty".into()));
    }
    let user_id = user
        .id
        .ok_or_else(|| anyhow::anyhow!("authenticated user has no id"))?;

    let mut post = load_post(&state, &id).await?;
    let comment = post.push_comment(user_id, payload.content);
    post.save(&state.posts()).await?;
    info!(post_id = %id, comment_id = %comment.id, "comment added");
    Ok((StatusCode::CREATED, Json(comment.into())))
}

#[instrument(skip(state, user, payload))]
pub async fn edit_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, comment_id)): Path<(String, String)>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment_id = parse_comment_id(&comment_id)?;
    let mut post = load_post(&state, &id).await?;

    let comment = post
        .find_comment_mut(comment_id)
        .ok_or_else(|| ApiError::NotFound("Comment not found".into()))?;
    if !comment.can_modify(&user) {
        return Err(ApiError::Forbidden("Not allowed to edit this comment".into()));
    }
    // Empty content leaves the existing text in place.
    if !payload.content.is_empty() {
        comment.content = payload.content;
    }
    let comment = comment.clone();

    post.save(&state.posts()).await?;
    info!(post_id = %id, comment_id = %comment_id, "comment edited");
    Ok(Json(comment.into()))
}

#[instrument(skip(state, user))]
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, comment_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let comment_id = parse_comment_id(&comment_id)?;
    let mut post = load_post(&state, &id).await?;

    let comment = post
        .find_comment(comment_id)
        .ok_or_else(|| ApiError::NotFound("Comment not found".into()))?;
    if !comment.can_modify(&user) {
        return Err(ApiError::Forbidden(
            "Not allowed to delete this comment".into(),
        ));
    }

    post.remove_comment(comment_id);
    post.save(&state.posts()).await?;
    info!(post_id = %id, comment_id = %comment_id, "comment deleted");
    Ok(Json(MessageResponse {
        message: "Comment deleted".into(),
    }))
}
