use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use push_core::{PushError, PushResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing;

use crate::token_store::TokenStore;

pub const CACHE_KEY: &str = "firebase_access_token";
pub const FIREBASE_MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const TOKEN_LIFETIME_MINUTES: i64 = 60;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub credentials_file_path: String,
    pub project_id: String,
}

/// Google service account key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub async fn from_file(path: &str) -> PushResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PushError::Credentials(format!("cannot read {}: {}", path, e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| PushError::Credentials(format!("cannot parse {}: {}", path, e)))
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchanges credentials for a bearer token at the identity provider.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// `Ok(None)` when the provider answered without a token.
    async fn fetch_token(&self, credentials: &Credentials) -> PushResult<Option<String>>;
}

/// OAuth2 JWT-bearer grant for a service account key file.
pub struct ServiceAccountExchange {
    http_client: reqwest::Client,
}

impl ServiceAccountExchange {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    fn sign_assertion(key: &ServiceAccountKey) -> PushResult<String> {
        let iat = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &key.client_email,
            sub: &key.client_email,
            scope: FIREBASE_MESSAGING_SCOPE,
            aud: &key.token_uri,
            iat,
            exp: iat + 3600,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| PushError::Credentials(format!("invalid private key: {}", e)))?;

        encode(&header, &claims, &encoding_key)
            .map_err(|e| PushError::Credentials(format!("failed to sign assertion: {}", e)))
    }
}

#[async_trait]
impl TokenExchange for ServiceAccountExchange {
    async fn fetch_token(&self, credentials: &Credentials) -> PushResult<Option<String>> {
        let key = ServiceAccountKey::from_file(&credentials.credentials_file_path).await?;
        let assertion = Self::sign_assertion(&key)?;

        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self
            .http_client
            .post(&key.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| PushError::TokenFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PushError::TokenFetch(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| PushError::TokenFetch(format!("invalid token response: {}", e)))?;

        tracing::debug!(
            "Token endpoint issued access token (expires_in: {:?})",
            token.expires_in
        );

        Ok(token.access_token)
    }
}

/// Bearer token cache for the FCM API.
///
/// The token is kept under [`CACHE_KEY`] for a fixed lifetime, independent of
/// the `expires_in` reported by the provider. Refreshes are serialised, so
/// concurrent callers trigger at most one exchange.
pub struct AccessToken {
    credentials: RwLock<Option<Credentials>>,
    store: Arc<dyn TokenStore>,
    exchange: Arc<dyn TokenExchange>,
    lifetime: Duration,
    refresh: Mutex<()>,
}

impl AccessToken {
    pub fn new(store: Arc<dyn TokenStore>, exchange: Arc<dyn TokenExchange>) -> Self {
        Self::with_lifetime(store, exchange, Duration::minutes(TOKEN_LIFETIME_MINUTES))
    }

    pub fn with_lifetime(
        store: Arc<dyn TokenStore>,
        exchange: Arc<dyn TokenExchange>,
        lifetime: Duration,
    ) -> Self {
        Self {
            credentials: RwLock::new(None),
            store,
            exchange,
            lifetime,
            refresh: Mutex::new(()),
        }
    }

    /// Sets the credentials used for the next exchange. Switching to different
    /// credentials drops the cached token.
    pub async fn initialize(
        &self,
        credentials_file_path: impl Into<String>,
        project_id: impl Into<String>,
    ) -> PushResult<()> {
        let credentials = Credentials {
            credentials_file_path: credentials_file_path.into(),
            project_id: project_id.into(),
        };

        if self.current_credentials()?.as_ref() == Some(&credentials) {
            return Ok(());
        }

        // Wait for an in-flight refresh so it cannot cache a token for the
        // credentials being replaced.
        let _guard = self.refresh.lock().await;

        let replaced = {
            let mut current = self
                .credentials
                .write()
                .map_err(|_| PushError::Cache("credentials lock poisoned".to_string()))?;
            if current.as_ref() == Some(&credentials) {
                false
            } else {
                let had_previous = current.is_some();
                *current = Some(credentials);
                had_previous
            }
        };

        if replaced {
            tracing::info!("Firebase credentials changed, discarding cached access token");
            self.store.remove(CACHE_KEY).await?;
        }

        Ok(())
    }

    fn current_credentials(&self) -> PushResult<Option<Credentials>> {
        self.credentials
            .read()
            .map(|current| current.clone())
            .map_err(|_| PushError::Cache("credentials lock poisoned".to_string()))
    }

    fn credentials(&self) -> PushResult<Credentials> {
        match self.current_credentials()? {
            Some(c) if !c.credentials_file_path.is_empty() && !c.project_id.is_empty() => Ok(c),
            _ => Err(PushError::NotInitialized),
        }
    }

    pub async fn get_token(&self) -> PushResult<String> {
        self.credentials()?;

        if let Some(token) = self.store.get(CACHE_KEY).await? {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we were waiting.
        if let Some(token) = self.store.get(CACHE_KEY).await? {
            return Ok(token);
        }

        // Credentials only change under the refresh lock.
        let credentials = self.credentials()?;

        tracing::info!("Fetching FCM access token for project {}", credentials.project_id);

        let token = self
            .exchange
            .fetch_token(&credentials)
            .await
            .map_err(|e| match e {
                PushError::TokenFetch(_) => e,
                other => PushError::TokenFetch(other.to_string()),
            })?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PushError::TokenFetch("token response did not contain an access token".to_string())
            })?;

        if self.current_credentials()?.as_ref() != Some(&credentials) {
            tracing::warn!("Firebase credentials changed during refresh, not caching token");
            return Ok(token);
        }

        self.store.put(CACHE_KEY, &token, self.lifetime).await?;

        Ok(token)
    }
}
