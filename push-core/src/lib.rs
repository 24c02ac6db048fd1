pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod redis;
pub mod schema;
pub mod store;
pub mod types;

pub use config::{Config, FirebaseConfig};
pub use context::PushContext;
pub use db::DbPool;
pub use error::{PushError, PushResult};
pub use redis::RedisPool;
pub use store::{MemoryNotificationStore, NotificationStore, PgNotificationStore};
pub use types::{NewNotification, NotificationRecord, RecipientLink};
