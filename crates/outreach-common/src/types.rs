//! Common types for Outreach

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for templates
pub type TemplateId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for recipients
pub type RecipientId = Uuid;

/// Platform-assigned numeric identity of an operator (campaign owner)
pub type OwnerId = i64;

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Terminal states are entered at most once and never left
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Pending => write!(f, "pending"),
            CampaignStatus::Processing => write!(f, "processing"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CampaignStatus::Pending),
            "processing" => Ok(CampaignStatus::Processing),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// How a raw recipient token was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    ChatId,
    Username,
    Link,
    InviteLink,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierKind::ChatId => write!(f, "chat_id"),
            IdentifierKind::Username => write!(f, "username"),
            IdentifierKind::Link => write!(f, "link"),
            IdentifierKind::InviteLink => write!(f, "invite_link"),
        }
    }
}

impl std::str::FromStr for IdentifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat_id" => Ok(IdentifierKind::ChatId),
            "username" => Ok(IdentifierKind::Username),
            "link" => Ok(IdentifierKind::Link),
            "invite_link" => Ok(IdentifierKind::InviteLink),
            _ => Err(format!("Invalid identifier kind: {}", s)),
        }
    }
}

/// Classified outcome of a delivery attempt
///
/// Every transport failure maps to exactly one kind; `Unknown` is the
/// fallback for failures the classifier cannot place. `Duplicate` is
/// synthetic: it records a detector skip, not a transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Blocked,
    InvalidUser,
    Deleted,
    Privacy,
    NotParticipant,
    AdminRequired,
    PrivateChat,
    InvalidInvite,
    JoinFailed,
    RateLimit,
    PeerFlood,
    Technical,
    Unknown,
    Duplicate,
}

impl OutcomeKind {
    /// Only an account-level anti-flood block aborts the whole campaign
    pub fn is_fatal(&self) -> bool {
        matches!(self, OutcomeKind::PeerFlood)
    }

    /// Human-readable description used in owner reports
    pub fn describe(&self) -> &'static str {
        match self {
            OutcomeKind::Blocked => "recipient has blocked the sender",
            OutcomeKind::InvalidUser => "recipient not found",
            OutcomeKind::Deleted => "account no longer exists",
            OutcomeKind::Privacy => "privacy settings reject the message",
            OutcomeKind::NotParticipant => "sender is not a member of the group",
            OutcomeKind::AdminRequired => "admin rights required",
            OutcomeKind::PrivateChat => "private chat, not joined",
            OutcomeKind::InvalidInvite => "invite link invalid or expired",
            OutcomeKind::JoinFailed => "could not join via invite link",
            OutcomeKind::RateLimit => "message rate limit exceeded",
            OutcomeKind::PeerFlood => "sending account suspended by the platform",
            OutcomeKind::Technical => "platform-side technical error",
            OutcomeKind::Unknown => "unknown error",
            OutcomeKind::Duplicate => "skipped, already received this template",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeKind::Blocked => "blocked",
            OutcomeKind::InvalidUser => "invalid_user",
            OutcomeKind::Deleted => "deleted",
            OutcomeKind::Privacy => "privacy",
            OutcomeKind::NotParticipant => "not_participant",
            OutcomeKind::AdminRequired => "admin_required",
            OutcomeKind::PrivateChat => "private_chat",
            OutcomeKind::InvalidInvite => "invalid_invite",
            OutcomeKind::JoinFailed => "join_failed",
            OutcomeKind::RateLimit => "rate_limit",
            OutcomeKind::PeerFlood => "peer_flood",
            OutcomeKind::Technical => "technical",
            OutcomeKind::Unknown => "unknown",
            OutcomeKind::Duplicate => "duplicate",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for OutcomeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocked" => Ok(OutcomeKind::Blocked),
            "invalid_user" | "not_found" => Ok(OutcomeKind::InvalidUser),
            "deleted" => Ok(OutcomeKind::Deleted),
            "privacy" => Ok(OutcomeKind::Privacy),
            "not_participant" => Ok(OutcomeKind::NotParticipant),
            "admin_required" => Ok(OutcomeKind::AdminRequired),
            "private_chat" => Ok(OutcomeKind::PrivateChat),
            "invalid_invite" => Ok(OutcomeKind::InvalidInvite),
            "join_failed" => Ok(OutcomeKind::JoinFailed),
            "rate_limit" => Ok(OutcomeKind::RateLimit),
            "peer_flood" => Ok(OutcomeKind::PeerFlood),
            "technical" => Ok(OutcomeKind::Technical),
            "unknown" => Ok(OutcomeKind::Unknown),
            "duplicate" => Ok(OutcomeKind::Duplicate),
            _ => Err(format!("Invalid outcome kind: {}", s)),
        }
    }
}

/// Kind of media attached to a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    VideoNote,
    Animation,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::VideoNote => "video_note",
            MediaKind::Animation => "animation",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            "audio" => Ok(MediaKind::Audio),
            "voice" => Ok(MediaKind::Voice),
            "video_note" => Ok(MediaKind::VideoNote),
            "animation" => Ok(MediaKind::Animation),
            _ => Err(format!("Invalid media kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn campaign_status_roundtrip() {
        for status in [
            CampaignStatus::Pending,
            CampaignStatus::Processing,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
        ] {
            assert_eq!(CampaignStatus::from_str(&status.to_string()), Ok(status));
        }
        assert!(!CampaignStatus::Pending.is_terminal());
        assert!(CampaignStatus::Failed.is_terminal());
    }

    #[test]
    fn outcome_kind_roundtrip() {
        for kind in [
            OutcomeKind::Blocked,
            OutcomeKind::InvalidUser,
            OutcomeKind::Deleted,
            OutcomeKind::Privacy,
            OutcomeKind::NotParticipant,
            OutcomeKind::AdminRequired,
            OutcomeKind::PrivateChat,
            OutcomeKind::InvalidInvite,
            OutcomeKind::JoinFailed,
            OutcomeKind::RateLimit,
            OutcomeKind::PeerFlood,
            OutcomeKind::Technical,
            OutcomeKind::Unknown,
            OutcomeKind::Duplicate,
        ] {
            assert_eq!(OutcomeKind::from_str(&kind.to_string()), Ok(kind));
        }
    }

    #[test]
    fn only_peer_flood_is_fatal() {
        assert!(OutcomeKind::PeerFlood.is_fatal());
        assert!(!OutcomeKind::RateLimit.is_fatal());
        assert!(!OutcomeKind::Blocked.is_fatal());
        assert!(!OutcomeKind::Duplicate.is_fatal());
    }

    #[test]
    fn not_found_aliases_invalid_user() {
        assert_eq!(OutcomeKind::from_str("not_found"), Ok(OutcomeKind::InvalidUser));
    }
}
