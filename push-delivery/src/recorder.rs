use push_core::types::NewNotification;
use push_core::{NotificationStore, PushResult};
use std::sync::Arc;

use crate::payload::{NotificationRequest, Recipient};

/// Writes the audit rows for a delivered notification.
pub struct PersistenceRecorder {
    store: Arc<dyn NotificationStore>,
}

impl PersistenceRecorder {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// One notification row, plus one recipient link per user for targeted
    /// pushes. Topic broadcasts are flagged general and get no links.
    pub async fn save(&self, request: &NotificationRequest) -> PushResult<i64> {
        let is_general = request.is_topic();

        let notification = NewNotification {
            title: request.title.primary.clone(),
            title_secondary: request.title.secondary.clone(),
            description: request.body.primary.clone(),
            description_secondary: request.body.secondary.clone(),
            is_general,
        };

        let user_ids = if is_general {
            Vec::new()
        } else {
            request.recipient_user_ids()
        };

        self.store.record_notification(&notification, &user_ids).await
    }
}

/// Looks up the registered device tokens of `user_ids`. Users without tokens
/// are kept so that they are still linked to the notification.
pub async fn resolve_recipients(
    store: &dyn NotificationStore,
    user_ids: &[i64],
) -> PushResult<Vec<Recipient>> {
    let tokens = store.device_tokens_for_users(user_ids).await?;

    let mut recipients: Vec<Recipient> = Vec::with_capacity(user_ids.len());
    for &user_id in user_ids {
        if recipients.iter().any(|r| r.user_id == user_id) {
            continue;
        }
        let device_tokens = tokens
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, token)| token.clone())
            .collect();
        recipients.push(Recipient::with_tokens(user_id, device_tokens));
    }

    Ok(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::NotificationBuilder;
    use push_core::MemoryNotificationStore;

    #[tokio::test]
    async fn topic_push_is_general_without_links() {
        let store = MemoryNotificationStore::new();
        let recorder = PersistenceRecorder::new(Arc::new(store.clone()));

        let request = NotificationBuilder::new()
            .localized_title("Breaking News!", "أخبار عاجلة!")
            .localized_body("Stay tuned.", "ترقبوا التحديثات.")
            .topic("news")
            .build();
        recorder.save(&request).await.unwrap();

        let rows = store.notifications().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_general);
        assert_eq!(rows[0].title_secondary.as_deref(), Some("أخبار عاجلة!"));
        assert_eq!(rows[0].description, "Stay tuned.");
        assert!(store.recipient_links().unwrap().is_empty());
    }

    #[tokio::test]
    async fn targeted_push_links_each_recipient() {
        let store = MemoryNotificationStore::new();
        let recorder = PersistenceRecorder::new(Arc::new(store.clone()));

        let request = NotificationBuilder::new()
            .title("Reminder")
            .body("Complete your profile.")
            .users(vec![Recipient::new(10, "a"), Recipient::with_tokens(11, vec![])])
            .build();
        let id = recorder.save(&request).await.unwrap();

        let rows = store.notifications().unwrap();
        assert!(!rows[0].is_general);
        assert_eq!(rows[0].title_secondary, None);

        let links = store.recipient_links().unwrap();
        assert_eq!(links.iter().map(|l| l.user_id).collect::<Vec<_>>(), vec![10, 11]);
        assert!(links.iter().all(|l| l.notification_id == id));
    }

    #[tokio::test]
    async fn resolves_tokens_and_keeps_users_without_devices() {
        let store = MemoryNotificationStore::new();
        store.register_device_token(1, "phone").unwrap();
        store.register_device_token(1, "tablet").unwrap();
        store.register_device_token(3, "laptop").unwrap();

        let recipients = resolve_recipients(&store, &[3, 2, 1, 3]).await.unwrap();

        assert_eq!(
            recipients,
            vec![
                Recipient::new(3, "laptop"),
                Recipient::with_tokens(2, vec![]),
                Recipient::with_tokens(1, vec!["phone".to_string(), "tablet".to_string()]),
            ]
        );
    }
}
