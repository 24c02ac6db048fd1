use anyhow::{anyhow, Result};
use async_trait::async_trait;
use push_core::{FirebaseConfig, NotificationStore, PushContext, PushError, PushResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing;

use crate::access_token::{AccessToken, ServiceAccountExchange};
use crate::payload::{NotificationRequest, Target};
use crate::recorder::PersistenceRecorder;
use crate::token_store::{MemoryTokenStore, RedisTokenStore, TokenStore};

const UNREADABLE_BODY: &str = "<unreadable body>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FcmResponse {
    pub status: u16,
    pub body: String,
}

/// Carries one rendered message to the FCM `messages:send` endpoint.
#[async_trait]
pub trait FcmTransport: Send + Sync {
    async fn send(&self, url: &str, bearer_token: &str, payload: &Value) -> PushResult<FcmResponse>;
}

pub struct HttpFcmTransport {
    client: reqwest::Client,
}

impl HttpFcmTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FcmTransport for HttpFcmTransport {
    async fn send(&self, url: &str, bearer_token: &str, payload: &Value) -> PushResult<FcmResponse> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", bearer_token))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = body_or_placeholder(response.text().await);

        Ok(FcmResponse { status, body })
    }
}

fn body_or_placeholder<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| {
        tracing::debug!("Failed to read FCM response body: {}", e);
        UNREADABLE_BODY.to_string()
    })
}

/// Sends notification requests to FCM and records successful pushes.
pub struct FirebaseNotifier {
    config: FirebaseConfig,
    access_token: Arc<AccessToken>,
    transport: Arc<dyn FcmTransport>,
    recorder: PersistenceRecorder,
}

impl FirebaseNotifier {
    pub fn new(
        config: FirebaseConfig,
        access_token: Arc<AccessToken>,
        transport: Arc<dyn FcmTransport>,
        store: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            config,
            access_token,
            transport,
            recorder: PersistenceRecorder::new(store),
        }
    }

    pub fn from_context(ctx: &PushContext) -> Result<Self> {
        tracing::info!("Initializing FCM client");

        let config = ctx.config.firebase.clone();
        if config.credentials_file_path.is_empty() || config.project_id.is_empty() {
            tracing::warn!("Firebase credentials not configured; pushes will fail until they are");
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let token_store: Arc<dyn TokenStore> = match &ctx.redis_pool {
            Some(pool) => Arc::new(RedisTokenStore::new(pool.clone())),
            None => Arc::new(MemoryTokenStore::new()),
        };
        let access_token = Arc::new(AccessToken::new(
            token_store,
            Arc::new(ServiceAccountExchange::new(http_client.clone())),
        ));

        tracing::info!("FCM client initialized for project {}", config.project_id);

        Ok(Self::new(
            config,
            access_token,
            Arc::new(HttpFcmTransport::new(http_client)),
            Arc::new(ctx.notification_store()),
        ))
    }

    pub fn access_token(&self) -> &Arc<AccessToken> {
        &self.access_token
    }

    /// Delivers `request` and, when every send succeeded, records it.
    ///
    /// Recipient pushes stop at the first failed send; earlier sends are not
    /// rolled back and nothing is recorded. Returns `Ok(false)` on delivery
    /// failure; token acquisition and persistence errors are returned as `Err`.
    pub async fn push(&self, request: &NotificationRequest) -> PushResult<bool> {
        self.access_token
            .initialize(
                self.config.credentials_file_path.clone(),
                self.config.project_id.clone(),
            )
            .await?;

        match &request.target {
            Target::Topic(topic) => {
                tracing::debug!("Sending FCM notification to topic {}", topic);
                if !self.send(&request.build_payload(None)).await? {
                    return Ok(false);
                }
            }
            Target::Recipients(_) => {
                let tokens = request.device_tokens();
                tracing::debug!("Sending FCM notification to {} device(s)", tokens.len());
                for token in tokens {
                    if !self.send(&request.build_payload(Some(token))).await? {
                        return Ok(false);
                    }
                }
            }
        }

        let notification_id = self.recorder.save(request).await?;
        tracing::info!("FCM notification {} delivered and recorded", notification_id);

        Ok(true)
    }

    async fn send(&self, payload: &Value) -> PushResult<bool> {
        let bearer_token = self.access_token.get_token().await?;
        let url = self.config.send_url();

        match self.transport.send(&url, &bearer_token, payload).await {
            Ok(response) if response.status == 200 => Ok(true),
            Ok(response) => {
                let body: Value = serde_json::from_str(&response.body)
                    .unwrap_or(Value::String(response.body.clone()));
                tracing::error!(
                    status = response.status,
                    response = %body,
                    payload = %payload,
                    "Firebase notification failed"
                );
                Ok(false)
            }
            Err(e) => {
                tracing::error!(payload = %payload, "Firebase notification failed: {}", e);
                Ok(false)
            }
        }
    }
}
