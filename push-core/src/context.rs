use std::sync::Arc;
use crate::config::Config;
use crate::db::{DbPool, create_pool as create_db_pool, run_migrations};
use crate::redis::{RedisPool, create_pool as create_redis_pool};
use crate::store::PgNotificationStore;

#[derive(Clone)]
pub struct PushContext {
    pub config: Arc<Config>,
    pub db_pool: Arc<DbPool>,
    pub redis_pool: Option<RedisPool>,
}

impl PushContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        run_migrations(&config.database).await?;
        let db_pool = create_db_pool(&config.database).await?;

        let redis_pool = match &config.redis.url {
            Some(url) => Some(create_redis_pool(url).await?),
            None => {
                tracing::info!("REDIS_URL not set, access token will be cached in-process");
                None
            }
        };

        Ok(PushContext {
            config: Arc::new(config),
            db_pool,
            redis_pool,
        })
    }

    pub fn notification_store(&self) -> PgNotificationStore {
        PgNotificationStore::new(self.db_pool.clone())
    }
}
