use std::sync::Arc;

use sea_orm_migration::MigratorTrait;
use shadowing_db::sea_orm::DatabaseConnection;

use crate::{
    config::Config,
    progress_service::ProgressService,
    video_service::VideoService,
    youtube::{VideoSource, YtDlpSource},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub videos: VideoService,
    pub progress: ProgressService,
    pub allowed_origins: Arc<[String]>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        source: Arc<dyn VideoSource>,
        allowed_origins: Vec<String>,
    ) -> Self {
        let db = Arc::new(db);
        Self {
            videos: VideoService::new(db.clone(), source),
            progress: ProgressService::new(db.clone()),
            db,
            allowed_origins: allowed_origins.into(),
        }
    }

    /// Connect the configured store, migrate it, and wire the yt-dlp source.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let db = init_db_and_migrate(&config.database_url).await?;
        let source = YtDlpSource::new(config.ytdlp_bin.clone(), config.fetch_timeout)?;
        Ok(Self::new(db, Arc::new(source), config.allowed_origins.clone()))
    }
}

pub async fn init_db_and_migrate(database_url: &str) -> anyhow::Result<DatabaseConnection> {
    let db = shadowing_db::connect(database_url).await?;

    // Apply migrations on boot (idempotent).
    shadowing_migration::Migrator::up(&db, None).await?;
    Ok(db)
}
