//! Chat platform transport capability
//!
//! The engine never links a platform client library. It talks to an
//! injected `ChatTransport`, and every wire-level failure arrives as one
//! `TransportError` variant for the executor to classify.

mod session;

pub use session::{SessionConnector, SessionPool};

use async_trait::async_trait;
use outreach_common::types::MediaKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level address of a chat
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatHandle {
    /// Numeric chat id (negative for groups/channels)
    Id(i64),
    /// Public name still to be resolved by the platform
    Name(String),
}

/// Media attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    /// Platform file reference
    pub file_ref: String,
}

/// Outgoing message payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub text: String,
    /// When set, the media is sent with `text` as caption
    pub media: Option<MediaAttachment>,
}

impl MessagePayload {
    /// Plain text payload
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
        }
    }
}

/// Acknowledgement of an accepted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Transport-assigned message id
    pub id: i64,
}

/// Result of the pre-flight account probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountHealth {
    Healthy,
    /// Account is under the platform's anti-flood restriction
    Restricted,
}

/// Wire-level failure reported by the platform
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("flood wait: retry after {seconds}s")]
    FloodWait { seconds: u64 },

    #[error("sending account suspended by the platform")]
    PeerFlood,

    #[error("recipient has blocked the sender")]
    Blocked,

    #[error("recipient not found: {0}")]
    UserNotFound(String),

    #[error("recipient account deactivated")]
    Deactivated,

    #[error("recipient privacy settings reject the message")]
    PrivacyRestricted,

    #[error("sender is not a participant of the target chat")]
    NotParticipant,

    #[error("admin rights required")]
    AdminRequired,

    #[error("target chat is private")]
    ChannelPrivate,

    #[error("invite link invalid or expired: {0}")]
    InviteInvalid(String),

    #[error("could not join chat: {0}")]
    JoinFailed(String),

    #[error("platform API error: {0}")]
    Api(String),

    #[error("{0}")]
    Other(String),
}

/// Capability interface to the chat platform
///
/// `enumerate_members` is lazy and non-restartable on the platform side;
/// an interrupted enumeration must be re-issued from scratch.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Resolve a public name to a chat handle
    async fn resolve(&self, name: &str) -> Result<ChatHandle, TransportError>;

    /// Join a private chat via invite hash, returning its handle
    async fn join_invite(&self, hash: &str) -> Result<ChatHandle, TransportError>;

    /// Deliver one message
    async fn send(
        &self,
        handle: &ChatHandle,
        payload: &MessagePayload,
    ) -> Result<SentMessage, TransportError>;

    /// List member user ids of a group
    async fn enumerate_members(&self, group: &ChatHandle) -> Result<Vec<i64>, TransportError>;

    /// Pre-flight check of the sending account
    async fn probe_health(&self) -> Result<AccountHealth, TransportError>;
}
