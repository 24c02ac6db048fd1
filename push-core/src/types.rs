use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{notifications, user_fcm_tokens, user_notifications};

/// A delivered notification. Written once per successful push, never updated.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationRecord {
    pub id: i64,
    pub title: String,
    pub title_secondary: Option<String>,
    pub description: String,
    pub description_secondary: Option<String>,
    pub is_general: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub title: String,
    pub title_secondary: Option<String>,
    pub description: String,
    pub description_secondary: Option<String>,
    pub is_general: bool,
}

/// "This user was a recipient of that notification."
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = user_notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecipientLink {
    pub id: i64,
    pub notification_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = user_notifications)]
pub struct NewRecipientLink {
    pub notification_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = user_fcm_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserFcmToken {
    pub id: i64,
    pub user_id: i64,
    pub fcm_token: String,
    pub created_at: DateTime<Utc>,
}
