use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use crate::auth::repo::{Role, User};
use crate::error::ApiError;

/// Publication status. Any other wire value is a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Esborrany,
    Publicat,
}

impl PostStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "esborrany" => Some(PostStatus::Esborrany),
            "publicat" => Some(PostStatus::Publicat),
            _ => None,
        }
    }
}

/// Comment embedded in a post. Never stored on its own; every mutation
/// rewrites the parent post document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: ObjectId,
    pub content: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime,
}

impl Comment {
    /// Owner-or-admin rule shared by edit and delete.
    pub fn can_modify(&self, user: &User) -> bool {
        user.role == Role::Admin || user.id == Some(self.user)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub text: String,
    pub estat: PostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    #[serde(default)]
    pub etiquetes: Vec<String>,
    /// Email of the user who created or last modified the post.
    pub usuari: String,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime,
}

impl Post {
    pub fn new(
        title: String,
        text: String,
        estat: PostStatus,
        categoria: Option<String>,
        etiquetes: Vec<String>,
        author_email: &str,
    ) -> Self {
        Self {
            id: None,
            title,
            text,
            estat,
            categoria,
            etiquetes,
            usuari: author_email.to_string(),
            likes: 0,
            comments: Vec::new(),
            created_at: DateTime::now(),
        }
    }

    /// Append a comment, generating its id at embedding time.
    pub fn push_comment(&mut self, user: ObjectId, content: String) -> Comment {
        let comment = Comment {
            id: ObjectId::new(),
            user,
            content,
            created_at: DateTime::now(),
        };
        self.comments.push(comment.clone());
        comment
    }

    /// Linear scan; comment arrays are small.
    pub fn find_comment_mut(&mut self, comment_id: ObjectId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }

    pub fn find_comment(&self, comment_id: ObjectId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    /// Remove a comment, closing the gap in the array. Returns false when
    /// no comment with that id exists.
    pub fn remove_comment(&mut self, comment_id: ObjectId) -> bool {
        match self.comments.iter().position(|c| c.id == comment_id) {
            Some(idx) => {
                self.comments.remove(idx);
                true
            }
            None => false,
        }
    }

    pub async fn list(posts: &Collection<Post>) -> Result<Vec<Post>, ApiError> {
        let opts = FindOptions::builder().sort(doc! {"createdAt": -1}).build();
        let cursor = posts.find(None, opts).await?;
        let all = cursor.try_collect().await?;
        Ok(all)
    }

    pub async fn get(posts: &Collection<Post>, id: ObjectId) -> Result<Option<Post>, ApiError> {
        let post = posts.find_one(doc! {"_id": id}, None).await?;
        Ok(post)
    }

    pub async fn insert(&mut self, posts: &Collection<Post>) -> Result<(), ApiError> {
        let result = posts.insert_one(&*self, None).await?;
        self.id = result.inserted_id.as_object_id();
        Ok(())
    }

    /// Persist the whole document. Used by update and all comment
    /// mutations; last write wins at the store layer.
    pub async fn save(&self, posts: &Collection<Post>) -> Result<(), ApiError> {
        let id = self
            .id
            .ok_or_else(|| anyhow::anyhow!("cannot save a post without an id"))?;
        posts.replace_one(doc! {"_id": id}, self, None).await?;
        Ok(())
    }

    pub async fn delete(posts: &Collection<Post>, id: ObjectId) -> Result<bool, ApiError> {
        let result = posts.delete_one(doc! {"_id": id}, None).await?;
        Ok(result.deleted_count == 1)
    }

    /// Atomic increment; concurrent likes never lose updates.
    pub async fn like(posts: &Collection<Post>, id: ObjectId) -> Result<Option<i64>, ApiError> {
        let opts = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let post = posts
            .find_one_and_update(doc! {"_id": id}, doc! {"$inc": {"likes": 1}}, opts)
            .await?;
        Ok(post.map(|p| p.likes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(id: ObjectId, role: Role) -> User {
        User {
            id: Some(id),
            email: "a@x.com".into(),
            password: String::new(),
            role,
            created_at: DateTime::now(),
        }
    }

    fn test_post() -> Post {
        Post::new(
            "T".into(),
            "B".into(),
            PostStatus::Esborrany,
            None,
            vec![],
            "a@x.com",
        )
    }

    #[test]
    fn status_parses_only_the_two_values() {
        assert_eq!(PostStatus::parse("esborrany"), Some(PostStatus::Esborrany));
        assert_eq!(PostStatus::parse("publicat"), Some(PostStatus::Publicat));
        assert_eq!(PostStatus::parse("published"), None);
        assert_eq!(PostStatus::parse(""), None);
        assert_eq!(PostStatus::parse("Publicat"), None);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PostStatus::Esborrany).unwrap(),
            "\"esborrany\""
        );
        let back: PostStatus = serde_json::from_str("\"publicat\"").unwrap();
        assert_eq!(back, PostStatus::Publicat);
    }

    #[test]
    fn new_post_starts_with_no_likes_or_comments() {
        let post = test_post();
        assert_eq!(post.likes, 0);
        assert!(post.comments.is_empty());
        assert_eq!(post.usuari, "a@x.com");
    }

    #[test]
    fn comments_keep_insertion_order_and_unique_ids() {
        let mut post = test_post();
        let user = ObjectId::new();
        let c1 = post.push_comment(user, "first".into());
        let c2 = post.push_comment(user, "second".into());
        let c3 = post.push_comment(user, "third".into());
        assert_ne!(c1.id, c2.id);
        assert_ne!(c2.id, c3.id);
        let contents: Vec<_> = post.comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[test]
    fn remove_comment_closes_the_gap() {
        let mut post = test_post();
        let user = ObjectId::new();
        post.push_comment(user, "first".into());
        let middle = post.push_comment(user, "second".into());
        post.push_comment(user, "third".into());

        assert!(post.remove_comment(middle.id));
        let contents: Vec<_> = post.comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["first", "third"]);

        // Second removal of the same id finds nothing.
        assert!(!post.remove_comment(middle.id));
    }

    #[test]
    fn owner_and_admin_may_modify_a_comment() {
        let owner_id = ObjectId::new();
        let mut post = test_post();
        let comment = post.push_comment(owner_id, "hi".into());

        let owner = test_user(owner_id, Role::Editor);
        let admin = test_user(ObjectId::new(), Role::Admin);
        let other = test_user(ObjectId::new(), Role::Editor);

        assert!(comment.can_modify(&owner));
        assert!(comment.can_modify(&admin));
        assert!(!comment.can_modify(&other));
    }

    #[test]
    fn post_bson_roundtrip_keeps_field_names() {
        let mut post = test_post();
        post.id = Some(ObjectId::new());
        post.push_comment(ObjectId::new(), "hi".into());

        let doc = mongodb::bson::to_document(&post).unwrap();
        assert!(doc.contains_key("_id"));
        assert!(doc.contains_key("createdAt"));
        assert_eq!(doc.get_str("estat").unwrap(), "esborrany");
        let comments = doc.get_array("comments").unwrap();
        assert_eq!(comments.len(), 1);

        let back: Post = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(back.comments[0].content, "hi");
    }
}
