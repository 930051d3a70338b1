//! Single delivery attempt
//!
//! Resolves the recipient to a transport handle, dispatches text or media,
//! and classifies every failure into the fixed outcome taxonomy. The
//! executor never raises: it always returns a structured `SendOutcome`.

use crate::recipients::{is_numeric_id, RecipientParser};
use crate::transport::{ChatHandle, ChatTransport, MediaAttachment, MessagePayload, TransportError};
use outreach_common::config::EngineConfig;
use outreach_common::types::OutcomeKind;
use outreach_storage::{Recipient, Template};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Structured result of one delivery attempt
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub kind: Option<OutcomeKind>,
    pub detail: Option<String>,
    /// Transport-assigned message id on success
    pub message_ref: Option<i64>,
}

impl SendOutcome {
    fn delivered(message_ref: i64) -> Self {
        Self {
            success: true,
            kind: None,
            detail: None,
            message_ref: Some(message_ref),
        }
    }

    fn failed(kind: OutcomeKind, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: Some(kind),
            detail: Some(detail.into()),
            message_ref: None,
        }
    }

    /// Whether this outcome must abort the whole campaign
    pub fn is_fatal(&self) -> bool {
        self.kind.map_or(false, |k| k.is_fatal())
    }
}

/// Bounds on flood-wait re-attempts for a single send
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Re-attempts after the initial try
    pub max_retries: u32,
    /// Ceiling on accumulated mandated wait
    pub wait_ceiling: Duration,
}

impl RetryPolicy {
    /// Derive the policy from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.flood_retry_limit,
            wait_ceiling: Duration::from_secs(config.flood_wait_ceiling_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            wait_ceiling: Duration::from_secs(300),
        }
    }
}

/// Map a wire-level failure to exactly one outcome kind
pub fn classify(err: &TransportError) -> OutcomeKind {
    match err {
        TransportError::FloodWait { .. } => OutcomeKind::RateLimit,
        TransportError::PeerFlood => OutcomeKind::PeerFlood,
        TransportError::Blocked => OutcomeKind::Blocked,
        TransportError::UserNotFound(_) => OutcomeKind::InvalidUser,
        TransportError::Deactivated => OutcomeKind::Deleted,
        TransportError::PrivacyRestricted => OutcomeKind::Privacy,
        TransportError::NotParticipant => OutcomeKind::NotParticipant,
        TransportError::AdminRequired => OutcomeKind::AdminRequired,
        TransportError::ChannelPrivate => OutcomeKind::PrivateChat,
        TransportError::InviteInvalid(_) => OutcomeKind::InvalidInvite,
        TransportError::JoinFailed(_) => OutcomeKind::JoinFailed,
        TransportError::Api(_) => OutcomeKind::Technical,
        TransportError::Other(_) => OutcomeKind::Unknown,
    }
}

/// Performs addressed delivery attempts against the transport capability
pub struct SendExecutor {
    parser: RecipientParser,
    retry: RetryPolicy,
}

impl SendExecutor {
    /// Create an executor with the given retry bounds
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            parser: RecipientParser::new(),
            retry,
        }
    }

    /// Attempt one delivery
    ///
    /// A flood-wait signal pauses for the mandated duration and re-attempts,
    /// bounded by the retry policy; past the bound the attempt is recorded
    /// as a `rate_limit` failure.
    pub async fn attempt(
        &self,
        transport: &dyn ChatTransport,
        recipient: &Recipient,
        template: &Template,
    ) -> SendOutcome {
        let payload = payload_for(template);

        let mut retries = 0u32;
        let mut waited = Duration::ZERO;

        loop {
            match self.attempt_once(transport, &recipient.identifier, &payload).await {
                Ok(message_ref) => {
                    debug!(
                        identifier = %recipient.identifier,
                        message_ref,
                        "Message delivered"
                    );
                    return SendOutcome::delivered(message_ref);
                }
                Err(TransportError::FloodWait { seconds }) => {
                    let wait = Duration::from_secs(seconds);
                    if retries >= self.retry.max_retries
                        || waited + wait > self.retry.wait_ceiling
                    {
                        warn!(
                            identifier = %recipient.identifier,
                            retries,
                            waited_secs = waited.as_secs(),
                            "Flood-wait retry budget exhausted"
                        );
                        return SendOutcome::failed(
                            OutcomeKind::RateLimit,
                            format!("flood wait of {}s exceeded the retry budget", seconds),
                        );
                    }

                    warn!(
                        identifier = %recipient.identifier,
                        seconds,
                        "Flood wait signalled, pausing before re-attempt"
                    );
                    retries += 1;
                    waited += wait;
                    sleep(wait).await;
                }
                Err(err) => {
                    let kind = classify(&err);
                    warn!(
                        identifier = %recipient.identifier,
                        kind = %kind,
                        "Delivery failed: {}",
                        err
                    );
                    return SendOutcome::failed(kind, err.to_string());
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        transport: &dyn ChatTransport,
        identifier: &str,
        payload: &MessagePayload,
    ) -> Result<i64, TransportError> {
        let handle = self.resolve_target(transport, identifier).await?;
        let sent = transport.send(&handle, payload).await?;
        Ok(sent.id)
    }

    /// Turn a recipient identifier into a transport handle
    ///
    /// Numeric ids pass through untouched; private invite links are joined
    /// first; public links and usernames go through the lookup capability.
    async fn resolve_target(
        &self,
        transport: &dyn ChatTransport,
        identifier: &str,
    ) -> Result<ChatHandle, TransportError> {
        let trimmed = identifier.trim();

        if is_numeric_id(trimmed) {
            let id = trimmed
                .parse::<i64>()
                .map_err(|e| TransportError::Other(format!("unparseable chat id: {}", e)))?;
            return Ok(ChatHandle::Id(id));
        }

        if let Some(hash) = self.parser.invite_hash(trimmed) {
            let handle = transport.join_invite(hash).await?;
            debug!(identifier = %trimmed, "Joined private chat via invite link");
            return Ok(handle);
        }

        let name = self.parser.normalize(trimmed);
        if name.is_empty() {
            return Err(TransportError::UserNotFound(trimmed.to_string()));
        }

        transport.resolve(&name).await
    }
}

/// Build the outgoing payload from a template
fn payload_for(template: &Template) -> MessagePayload {
    let media = template.media_kind_enum().and_then(|kind| {
        template.media_ref.as_ref().map(|file_ref| MediaAttachment {
            kind,
            file_ref: file_ref.clone(),
        })
    });

    MessagePayload {
        text: template.body.clone(),
        media,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::testutil::{recipient, template, ScriptedTransport};
    use outreach_common::types::IdentifierKind;
    use tokio::time::Instant;

    fn executor() -> SendExecutor {
        SendExecutor::new(RetryPolicy::default())
    }

    #[test]
    fn classification_covers_every_transport_error() {
        let cases = [
            (TransportError::FloodWait { seconds: 5 }, OutcomeKind::RateLimit),
            (TransportError::PeerFlood, OutcomeKind::PeerFlood),
            (TransportError::Blocked, OutcomeKind::Blocked),
            (
                TransportError::UserNotFound("x".into()),
                OutcomeKind::InvalidUser,
            ),
            (TransportError::Deactivated, OutcomeKind::Deleted),
            (TransportError::PrivacyRestricted, OutcomeKind::Privacy),
            (TransportError::NotParticipant, OutcomeKind::NotParticipant),
            (TransportError::AdminRequired, OutcomeKind::AdminRequired),
            (TransportError::ChannelPrivate, OutcomeKind::PrivateChat),
            (
                TransportError::InviteInvalid("x".into()),
                OutcomeKind::InvalidInvite,
            ),
            (TransportError::JoinFailed("x".into()), OutcomeKind::JoinFailed),
            (TransportError::Api("x".into()), OutcomeKind::Technical),
            (TransportError::Other("x".into()), OutcomeKind::Unknown),
        ];

        for (err, expected) in cases {
            assert_eq!(classify(&err), expected, "classifying {:?}", err);
        }
    }

    #[tokio::test]
    async fn numeric_id_passes_through_without_lookup() {
        let transport = ScriptedTransport::new();
        let rec = recipient("-100500", "100500", IdentifierKind::ChatId);

        let outcome = executor().attempt(&transport, &rec, &template()).await;

        assert!(outcome.success);
        assert_eq!(transport.resolve_calls(), 0);
        assert_eq!(
            transport.sent_handles(),
            vec![ChatHandle::Id(-100500)]
        );
    }

    #[tokio::test]
    async fn username_resolves_before_send() {
        let transport = ScriptedTransport::new();
        let rec = recipient("@Alice", "alice", IdentifierKind::Username);

        let outcome = executor().attempt(&transport, &rec, &template()).await;

        assert!(outcome.success);
        assert_eq!(transport.resolve_calls(), 1);
        assert_eq!(
            transport.sent_handles(),
            vec![ChatHandle::Name("alice".into())]
        );
    }

    #[tokio::test]
    async fn invite_link_joins_first() {
        let transport = ScriptedTransport::new();
        let rec = recipient(
            "https://t.me/joinchat/AbC-123",
            "joinchat",
            IdentifierKind::InviteLink,
        );

        let outcome = executor().attempt(&transport, &rec, &template()).await;

        assert!(outcome.success);
        assert_eq!(transport.joined_hashes(), vec!["AbC-123".to_string()]);
    }

    #[tokio::test]
    async fn resolution_failure_is_invalid_user() {
        let transport =
            ScriptedTransport::new().failing_resolve(TransportError::UserNotFound("ghost".into()));
        let rec = recipient("@ghost", "ghost", IdentifierKind::Username);

        let outcome = executor().attempt(&transport, &rec, &template()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(OutcomeKind::InvalidUser));
        assert_eq!(transport.send_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flood_wait_sleeps_and_reattempts() {
        let transport = ScriptedTransport::new().failing_sends(vec![
            TransportError::FloodWait { seconds: 5 },
            TransportError::FloodWait { seconds: 5 },
        ]);
        let rec = recipient("123", "123", IdentifierKind::ChatId);

        let start = Instant::now();
        let outcome = executor().attempt(&transport, &rec, &template()).await;

        assert!(outcome.success);
        assert_eq!(transport.send_calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn flood_wait_retry_count_is_bounded() {
        let transport = ScriptedTransport::new().failing_sends(vec![
            TransportError::FloodWait { seconds: 1 },
            TransportError::FloodWait { seconds: 1 },
            TransportError::FloodWait { seconds: 1 },
            TransportError::FloodWait { seconds: 1 },
            TransportError::FloodWait { seconds: 1 },
        ]);
        let rec = recipient("123", "123", IdentifierKind::ChatId);

        let outcome = executor().attempt(&transport, &rec, &template()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(OutcomeKind::RateLimit));
        // initial try plus three bounded re-attempts
        assert_eq!(transport.send_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn flood_wait_ceiling_refuses_oversized_wait() {
        let transport = ScriptedTransport::new()
            .failing_sends(vec![TransportError::FloodWait { seconds: 400 }]);
        let rec = recipient("123", "123", IdentifierKind::ChatId);

        let start = Instant::now();
        let outcome = executor().attempt(&transport, &rec, &template()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(OutcomeKind::RateLimit));
        assert_eq!(transport.send_calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn media_template_sends_caption_payload() {
        let transport = ScriptedTransport::new();
        let rec = recipient("123", "123", IdentifierKind::ChatId);
        let mut tpl = template();
        tpl.media_kind = Some("photo".to_string());
        tpl.media_ref = Some("file-42".to_string());

        let outcome = executor().attempt(&transport, &rec, &tpl).await;

        assert!(outcome.success);
        let payloads = transport.sent_payloads();
        assert_eq!(payloads.len(), 1);
        let media = payloads[0].media.as_ref().expect("media attached");
        assert_eq!(media.file_ref, "file-42");
        assert_eq!(payloads[0].text, tpl.body);
    }
}
