use std::sync::Arc;

use anyhow::Context;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use crate::auth::repo::User;
use crate::config::AppConfig;
use crate::posts::repo::Post;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let client = Client::with_uri_str(&config.mongo_uri)
            .await
            .context("connect to mongodb")?;
        let db = client.database(&config.mongo_db);

        // Fail fast if the server is unreachable instead of erroring on first request.
        db.run_command(doc! {"ping": 1}, None)
            .await
            .context("ping mongodb")?;
        ensure_indexes(&db).await?;
        tracing::info!(db = %config.mongo_db, "connected to mongodb");

        Ok(Self { db, config })
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn posts(&self) -> Collection<Post> {
        self.db.collection("posts")
    }
}

async fn ensure_indexes(db: &Database) -> anyhow::Result<()> {
    let email_unique = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(IndexOptions::builder().unique(true).build())
        .build();
    db.collection::<User>("users")
        .create_index(email_unique, None)
        .await
        .context("create unique email index")?;
    Ok(())
}
