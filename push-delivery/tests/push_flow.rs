use async_trait::async_trait;
use push_core::{FirebaseConfig, MemoryNotificationStore, PushError, PushResult};
use push_delivery::{
    resolve_recipients, AccessToken, Credentials, FirebaseNotifier, MemoryTokenStore,
    NotificationBuilder, Recipient, RecordingTransport, TokenExchange,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct FakeExchange {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenExchange for FakeExchange {
    async fn fetch_token(&self, _credentials: &Credentials) -> PushResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some("ya29.fake".to_string()))
    }
}

struct BrokenExchange;

#[async_trait]
impl TokenExchange for BrokenExchange {
    async fn fetch_token(&self, _credentials: &Credentials) -> PushResult<Option<String>> {
        Err(PushError::TokenFetch("invalid_grant".to_string()))
    }
}

struct Harness {
    notifier: FirebaseNotifier,
    transport: Arc<RecordingTransport>,
    store: MemoryNotificationStore,
    exchange: Arc<FakeExchange>,
}

fn harness(transport: RecordingTransport) -> Harness {
    let transport = Arc::new(transport);
    let store = MemoryNotificationStore::new();
    let exchange = Arc::new(FakeExchange::default());
    let access_token = Arc::new(AccessToken::new(
        Arc::new(MemoryTokenStore::new()),
        exchange.clone(),
    ));
    let notifier = FirebaseNotifier::new(
        FirebaseConfig::new("/secrets/firebase.json", "push-test"),
        access_token,
        transport.clone(),
        Arc::new(store.clone()),
    );

    Harness {
        notifier,
        transport,
        store,
        exchange,
    }
}

#[tokio::test]
async fn topic_notification_is_sent_and_recorded_as_general() {
    let h = harness(RecordingTransport::new());

    let request = NotificationBuilder::new()
        .localized_title("Breaking News!", "أخبار عاجلة!")
        .localized_body(
            "A major event has just happened. Stay tuned for updates.",
            "حدث كبير للتو. ترقبوا التحديثات.",
        )
        .topic("news")
        .build();

    assert!(h.notifier.push(&request).await.unwrap());

    let rows = h.store.notifications().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Breaking News!");
    assert_eq!(rows[0].title_secondary.as_deref(), Some("أخبار عاجلة!"));
    assert_eq!(
        rows[0].description,
        "A major event has just happened. Stay tuned for updates."
    );
    assert!(rows[0].is_general);
    assert!(h.store.recipient_links().unwrap().is_empty());
    assert_eq!(h.transport.sent().len(), 1);
}

#[tokio::test]
async fn notification_to_specific_users_links_each_user() {
    let h = harness(RecordingTransport::new());

    let request = NotificationBuilder::new()
        .localized_title("Reminder", "تذكير")
        .localized_body(
            "Don’t forget to complete your profile.",
            "لا تنسى إكمال ملفك الشخصي.",
        )
        .users(vec![Recipient::new(42, "test_token")])
        .build();

    assert!(h.notifier.push(&request).await.unwrap());

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload["message"]["token"], "test_token");

    let rows = h.store.notifications().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].is_general);

    let links = h.store.recipient_links().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].user_id, 42);
    assert_eq!(links[0].notification_id, rows[0].id);
}

#[tokio::test]
async fn failed_topic_send_records_nothing() {
    let h = harness(RecordingTransport::with_statuses([500]));

    let request = NotificationBuilder::new()
        .localized_title("System Alert", "تنبيه النظام")
        .localized_body(
            "There was an issue processing your request.",
            "حدثت مشكلة في معالجة طلبك.",
        )
        .topic("alerts")
        .build();

    assert!(!h.notifier.push(&request).await.unwrap());
    assert!(h.store.notifications().unwrap().is_empty());
}

// Earlier recipients have already been notified when a later send fails, yet
// nothing is recorded for them. The push is not resumable.
#[tokio::test]
async fn failure_midway_aborts_remaining_sends_and_skips_persistence() {
    let h = harness(RecordingTransport::with_statuses([200, 503, 200]));

    let request = NotificationBuilder::new()
        .title("Weekly digest")
        .body("Your summary is ready")
        .users(vec![
            Recipient::new(1, "first"),
            Recipient::new(2, "second"),
            Recipient::new(3, "third"),
        ])
        .build();

    assert!(!h.notifier.push(&request).await.unwrap());

    let attempted: Vec<_> = h
        .transport
        .sent()
        .into_iter()
        .map(|s| s.payload["message"]["token"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(attempted, vec!["first", "second"]);
    assert!(h.store.notifications().unwrap().is_empty());
    assert!(h.store.recipient_links().unwrap().is_empty());
}

#[tokio::test]
async fn every_recipient_send_succeeding_records_one_link_each() {
    let h = harness(RecordingTransport::new());

    let request = NotificationBuilder::new()
        .title("Update")
        .body("New version available")
        .icon("https://cdn.example.com/update.png")
        .users(vec![
            Recipient::with_tokens(5, vec!["a".to_string(), "b".to_string()]),
            Recipient::new(6, "c"),
        ])
        .build();

    assert!(h.notifier.push(&request).await.unwrap());

    assert_eq!(h.transport.sent().len(), 3);
    assert_eq!(h.store.notifications().unwrap().len(), 1);
    let users: Vec<i64> = h
        .store
        .recipient_links()
        .unwrap()
        .iter()
        .map(|l| l.user_id)
        .collect();
    assert_eq!(users, vec![5, 6]);
}

#[tokio::test]
async fn token_is_fetched_once_across_pushes() {
    let h = harness(RecordingTransport::new());

    for topic in ["news", "sports", "weather"] {
        let request = NotificationBuilder::new().title("t").body("b").topic(topic).build();
        assert!(h.notifier.push(&request).await.unwrap());
    }

    assert_eq!(h.exchange.calls.load(Ordering::SeqCst), 1);
    assert!(h
        .transport
        .sent()
        .iter()
        .all(|s| s.bearer_token == "ya29.fake"));
}

#[tokio::test]
async fn token_fetch_failure_is_an_error_not_a_false() {
    let transport = Arc::new(RecordingTransport::new());
    let store = MemoryNotificationStore::new();
    let notifier = FirebaseNotifier::new(
        FirebaseConfig::new("/secrets/firebase.json", "push-test"),
        Arc::new(AccessToken::new(
            Arc::new(MemoryTokenStore::new()),
            Arc::new(BrokenExchange),
        )),
        transport.clone(),
        Arc::new(store.clone()),
    );

    let request = NotificationBuilder::new().title("t").topic("news").build();
    let result = notifier.push(&request).await;

    assert!(matches!(result, Err(PushError::TokenFetch(_))));
    assert!(transport.sent().is_empty());
    assert!(store.notifications().unwrap().is_empty());
}

#[tokio::test]
async fn recipients_resolved_from_the_token_directory() {
    let h = harness(RecordingTransport::new());
    h.store.register_device_token(100, "android-1").unwrap();
    h.store.register_device_token(100, "ios-1").unwrap();

    let recipients = resolve_recipients(&h.store, &[100, 200]).await.unwrap();
    let request = NotificationBuilder::new()
        .title("Hello")
        .body("From the directory")
        .data_entry("screen", "inbox")
        .users(recipients)
        .build();

    assert!(h.notifier.push(&request).await.unwrap());

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[0].payload["message"]["data"]["additional_data"],
        r#"{"screen":"inbox"}"#
    );

    let users: Vec<i64> = h
        .store
        .recipient_links()
        .unwrap()
        .iter()
        .map(|l| l.user_id)
        .collect();
    assert_eq!(users, vec![100, 200]);
}
