//! Ludicé Core Library
//!
//! Client core of the Ludicé dice-betting Mini App:
//! - Canonical JSON signing (HMAC-SHA256)
//! - Backend API client over a pluggable Transport
//! - Host bridge abstraction and the session controller

pub mod api;
pub mod config;
pub mod crypto;
pub mod host;
pub mod session;

pub use api::{
    ApiError, ApiResponse, LudiceApi, MockTransport, ReqwestTransport, ResponseBody, Transport,
};
pub use config::{ConfigError, Endpoints, LudiceConfig};
pub use crypto::{canonical_json, SignatureError, SignedRequest, Signer};
pub use host::{Control, HostBridge, RecordingHost, ThemeParams, UserIdentity};
pub use session::{MatchPhase, Profile, Screen, SessionController, SessionError, SessionState};
