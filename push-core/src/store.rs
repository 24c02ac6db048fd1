use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::DbPool;
use crate::error::{PushError, PushResult};
use crate::schema::{notifications, user_fcm_tokens, user_notifications};
use crate::types::{NewNotification, NewRecipientLink, NotificationRecord, RecipientLink, UserFcmToken};

/// Relational collaborator of the push pipeline: audit rows for delivered
/// notifications and the user -> device token directory.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Inserts one notification row and one link row per user id, returning
    /// the id of the notification row.
    async fn record_notification(
        &self,
        notification: &NewNotification,
        user_ids: &[i64],
    ) -> PushResult<i64>;

    /// `(user_id, fcm_token)` pairs for the given users, in registration order.
    async fn device_tokens_for_users(&self, user_ids: &[i64]) -> PushResult<Vec<(i64, String)>>;
}

pub struct PgNotificationStore {
    pool: Arc<DbPool>,
}

impl PgNotificationStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn record_notification(
        &self,
        notification: &NewNotification,
        user_ids: &[i64],
    ) -> PushResult<i64> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| PushError::Persistence(e.to_string()))?;

        let notification_id = conn
            .transaction::<i64, diesel::result::Error, _>(|conn| {
                async move {
                    let notification_id: i64 = diesel::insert_into(notifications::table)
                        .values(notification)
                        .returning(notifications::id)
                        .get_result(conn)
                        .await?;

                    if !user_ids.is_empty() {
                        let links: Vec<NewRecipientLink> = user_ids
                            .iter()
                            .map(|&user_id| NewRecipientLink { notification_id, user_id })
                            .collect();

                        diesel::insert_into(user_notifications::table)
                            .values(&links)
                            .execute(conn)
                            .await?;
                    }

                    Ok(notification_id)
                }
                .scope_boxed()
            })
            .await?;

        tracing::debug!(
            "Stored notification {} with {} recipient link(s)",
            notification_id,
            user_ids.len()
        );

        Ok(notification_id)
    }

    async fn device_tokens_for_users(&self, user_ids: &[i64]) -> PushResult<Vec<(i64, String)>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| PushError::Persistence(e.to_string()))?;

        let tokens = user_fcm_tokens::table
            .filter(user_fcm_tokens::user_id.eq_any(user_ids.to_vec()))
            .order(user_fcm_tokens::id.asc())
            .select((user_fcm_tokens::user_id, user_fcm_tokens::fcm_token))
            .load::<(i64, String)>(&mut conn)
            .await?;

        Ok(tokens)
    }
}

#[derive(Debug, Default)]
struct MemoryTables {
    notifications: Vec<NotificationRecord>,
    links: Vec<RecipientLink>,
    tokens: Vec<UserFcmToken>,
}

/// Process-local store, for embedding without a database and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryNotificationStore {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PushResult<MutexGuard<'_, MemoryTables>> {
        self.tables
            .lock()
            .map_err(|_| PushError::Persistence("memory store lock poisoned".to_string()))
    }

    pub fn register_device_token(&self, user_id: i64, fcm_token: impl Into<String>) -> PushResult<()> {
        let mut tables = self.lock()?;
        let id = tables.tokens.len() as i64 + 1;
        tables.tokens.push(UserFcmToken {
            id,
            user_id,
            fcm_token: fcm_token.into(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    pub fn notifications(&self) -> PushResult<Vec<NotificationRecord>> {
        Ok(self.lock()?.notifications.clone())
    }

    pub fn recipient_links(&self) -> PushResult<Vec<RecipientLink>> {
        Ok(self.lock()?.links.clone())
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn record_notification(
        &self,
        notification: &NewNotification,
        user_ids: &[i64],
    ) -> PushResult<i64> {
        let mut tables = self.lock()?;
        let now = Utc::now();

        let notification_id = tables.notifications.len() as i64 + 1;
        tables.notifications.push(NotificationRecord {
            id: notification_id,
            title: notification.title.clone(),
            title_secondary: notification.title_secondary.clone(),
            description: notification.description.clone(),
            description_secondary: notification.description_secondary.clone(),
            is_general: notification.is_general,
            created_at: now,
        });

        for &user_id in user_ids {
            let id = tables.links.len() as i64 + 1;
            tables.links.push(RecipientLink {
                id,
                notification_id,
                user_id,
                created_at: now,
            });
        }

        Ok(notification_id)
    }

    async fn device_tokens_for_users(&self, user_ids: &[i64]) -> PushResult<Vec<(i64, String)>> {
        let tables = self.lock()?;
        Ok(tables
            .tokens
            .iter()
            .filter(|token| user_ids.contains(&token.user_id))
            .map(|token| (token.user_id, token.fcm_token.clone()))
            .collect())
    }
}
