pub mod access_token;
pub mod fcm;
pub mod payload;
pub mod recorder;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod token_store;

pub use access_token::{AccessToken, Credentials, ServiceAccountExchange, TokenExchange};
pub use fcm::{FcmResponse, FcmTransport, FirebaseNotifier, HttpFcmTransport};
pub use payload::{LocalizedText, NotificationBuilder, NotificationRequest, Recipient, Target};
pub use recorder::{resolve_recipients, PersistenceRecorder};
#[cfg(any(test, feature = "test-util"))]
pub use testing::{RecordingTransport, SentRequest};
pub use token_store::{MemoryTokenStore, RedisTokenStore, TokenStore};
