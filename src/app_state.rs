use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{queue::JobQueue, storage::StorageClient};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: Arc<StorageClient>,
    pub queue: Arc<JobQueue>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: PgPool, storage: StorageClient, queue: JobQueue, config: AppConfig) -> Self {
        Self {
            db,
            storage: Arc::new(storage),
            queue: Arc::new(queue),
            config: Arc::new(config),
        }
    }
}
