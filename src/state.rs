use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::analysis::{HttpAnalyzer, ImageAnalyzer};
use crate::config::AppConfig;
use crate::mailer::{HttpMailer, Mailer};
use crate::storage::{S3Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub analyzer: Arc<dyn ImageAnalyzer>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage =
            Arc::new(S3Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let analyzer = Arc::new(HttpAnalyzer::new(&config.analysis)?) as Arc<dyn ImageAnalyzer>;
        let mailer = Arc::new(HttpMailer::new(&config.mailer)?) as Arc<dyn Mailer>;

        Ok(Self {
            db,
            config,
            storage,
            analyzer,
            mailer,
        })
    }
}
