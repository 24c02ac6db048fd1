use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Text in a primary language with an optional second locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedText {
    pub primary: String,
    pub secondary: Option<String>,
}

impl LocalizedText {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: None,
        }
    }

    pub fn localized(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Some(secondary.into()),
        }
    }
}

/// A user addressed by a push, with the device tokens registered for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: i64,
    pub device_tokens: Vec<String>,
}

impl Recipient {
    pub fn new(user_id: i64, device_token: impl Into<String>) -> Self {
        Self {
            user_id,
            device_tokens: vec![device_token.into()],
        }
    }

    pub fn with_tokens(user_id: i64, device_tokens: Vec<String>) -> Self {
        Self {
            user_id,
            device_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Topic(String),
    Recipients(Vec<Recipient>),
}

/// Immutable description of one push, produced by [`NotificationBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub title: LocalizedText,
    pub body: LocalizedText,
    pub icon: Option<String>,
    pub target: Target,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationBuilder {
    title: LocalizedText,
    body: LocalizedText,
    icon: Option<String>,
    topic: Option<String>,
    recipients: Vec<Recipient>,
    data: BTreeMap<String, String>,
}

impl NotificationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = LocalizedText::new(title);
        self
    }

    pub fn localized_title(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.title = LocalizedText::localized(primary, secondary);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = LocalizedText::new(body);
        self
    }

    pub fn localized_body(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.body = LocalizedText::localized(primary, secondary);
        self
    }

    /// Image URL shown by Android and by iOS notification service extensions.
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Broadcast to an FCM topic. Takes precedence over recipients.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn users(self, recipients: Vec<Recipient>) -> Self {
        self.recipients(recipients)
    }

    pub fn recipients(mut self, recipients: Vec<Recipient>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn data(mut self, data: BTreeMap<String, String>) -> Self {
        self.data = data;
        self
    }

    pub fn data_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> NotificationRequest {
        let target = match self.topic {
            Some(topic) if !topic.is_empty() => Target::Topic(topic),
            _ => Target::Recipients(self.recipients),
        };

        NotificationRequest {
            title: self.title,
            body: self.body,
            icon: self.icon,
            target,
            data: self.data,
        }
    }
}

impl NotificationRequest {
    pub fn builder() -> NotificationBuilder {
        NotificationBuilder::new()
    }

    pub fn is_topic(&self) -> bool {
        matches!(self.target, Target::Topic(_))
    }

    pub fn is_localized(&self) -> bool {
        self.title.secondary.is_some() || self.body.secondary.is_some()
    }

    /// Device tokens in send order: recipients as supplied, then each
    /// recipient's tokens. Empty tokens are skipped.
    pub fn device_tokens(&self) -> Vec<&str> {
        match &self.target {
            Target::Topic(_) => Vec::new(),
            Target::Recipients(recipients) => recipients
                .iter()
                .flat_map(|r| r.device_tokens.iter())
                .map(String::as_str)
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }

    pub fn recipient_user_ids(&self) -> Vec<i64> {
        match &self.target {
            Target::Topic(_) => Vec::new(),
            Target::Recipients(recipients) => recipients.iter().map(|r| r.user_id).collect(),
        }
    }

    /// Renders the body of an HTTP v1 `messages:send` request. A topic target
    /// ignores `device_token`; a recipient target addresses `device_token`.
    pub fn build_payload(&self, device_token: Option<&str>) -> Value {
        let image = self.icon.clone().unwrap_or_default();

        let mut message = Map::new();
        message.insert("data".to_string(), Value::Object(self.render_data()));
        message.insert(
            "android".to_string(),
            json!({ "notification": { "image": image } }),
        );
        message.insert(
            "apns".to_string(),
            json!({
                "payload": { "aps": { "mutable-content": 1 } },
                "fcm_options": { "image": image },
            }),
        );

        match &self.target {
            Target::Topic(topic) => {
                message.insert("topic".to_string(), Value::String(topic.clone()));
            }
            Target::Recipients(_) => {
                message.insert(
                    "token".to_string(),
                    Value::String(device_token.unwrap_or_default().to_string()),
                );
            }
        }

        json!({ "message": message })
    }

    fn render_data(&self) -> Map<String, Value> {
        let mut data = Map::new();

        if self.is_localized() {
            let text = |v: &Option<String>| Value::String(v.clone().unwrap_or_default());
            data.insert("title_en".to_string(), Value::String(self.title.primary.clone()));
            data.insert("title_ar".to_string(), text(&self.title.secondary));
            data.insert("body_en".to_string(), Value::String(self.body.primary.clone()));
            data.insert("body_ar".to_string(), text(&self.body.secondary));
        } else {
            data.insert("title".to_string(), Value::String(self.title.primary.clone()));
            data.insert("body".to_string(), Value::String(self.body.primary.clone()));
        }

        // FCM only accepts string values in `message.data`.
        if !self.is_localized() || !self.data.is_empty() {
            let encoded = serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".to_string());
            data.insert("additional_data".to_string(), Value::String(encoded));
        }

        data
    }
}
