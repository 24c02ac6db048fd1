use async_trait::async_trait;
use push_core::{PushError, PushResult};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::fcm::{FcmResponse, FcmTransport};

#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub url: String,
    pub bearer_token: String,
    pub payload: Value,
}

/// In-process transport that records requests and answers with scripted
/// statuses (200 once the script runs out). Lets callers exercise the push
/// pipeline without reaching Google.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentRequest>>,
    statuses: Mutex<VecDeque<u16>>,
    unreachable: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Every send fails before a response is received.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FcmTransport for RecordingTransport {
    async fn send(&self, url: &str, bearer_token: &str, payload: &Value) -> PushResult<FcmResponse> {
        self.sent
            .lock()
            .map_err(|_| PushError::Transport("recording lock poisoned".to_string()))?
            .push(SentRequest {
                url: url.to_string(),
                bearer_token: bearer_token.to_string(),
                payload: payload.clone(),
            });

        if self.unreachable {
            return Err(PushError::Transport("connection refused".to_string()));
        }

        let status = self
            .statuses
            .lock()
            .map_err(|_| PushError::Transport("recording lock poisoned".to_string()))?
            .pop_front()
            .unwrap_or(200);

        Ok(FcmResponse {
            status,
            body: if status == 200 {
                r#"{"name":"projects/test/messages/1"}"#.to_string()
            } else {
                r#"{"error":{"status":"INTERNAL"}}"#.to_string()
            },
        })
    }
}

