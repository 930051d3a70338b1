//! Recipient list parsing and normalization
//!
//! Free-text recipient input (comma, whitespace, or newline separated) is
//! turned into an ordered, deduplicated set of addressable targets. The
//! normalized identifier is the canonical key used for duplicate matching
//! within a batch and across campaigns.

use outreach_common::types::IdentifierKind;
use outreach_common::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Hard ceiling on recipients per campaign
pub const MAX_RECIPIENTS: usize = 1000;

/// One parsed recipient token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientEntry {
    /// Token exactly as supplied
    pub original: String,
    /// Canonical lowercase key
    pub normalized: String,
    pub kind: IdentifierKind,
}

/// Parser for free-text recipient lists
pub struct RecipientParser {
    split: Regex,
    link_path: Regex,
    invite_path: Regex,
    strip: Regex,
}

impl Default for RecipientParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipientParser {
    /// Create a parser with compiled patterns
    pub fn new() -> Self {
        Self {
            split: Regex::new(r"[,\s]+").expect("valid split pattern"),
            link_path: Regex::new(r"(?:t\.me/|telegram\.me/)(?:c/)?([A-Za-z0-9_]+)")
                .expect("valid link pattern"),
            invite_path: Regex::new(r"(?:t\.me/|telegram\.me/)(?:joinchat/|\+)([A-Za-z0-9_-]+)")
                .expect("valid invite pattern"),
            strip: Regex::new(r"[^A-Za-z0-9_]").expect("valid strip pattern"),
        }
    }

    /// Canonicalize a single identifier
    ///
    /// Strips a leading `@`, extracts the path segment of public links, drops
    /// everything outside `[A-Za-z0-9_]`, and lowercases. Returns an empty
    /// string for tokens with nothing addressable left.
    pub fn normalize(&self, identifier: &str) -> String {
        let mut identifier = identifier.trim();
        identifier = identifier.strip_prefix('@').unwrap_or(identifier);

        let extracted;
        if identifier.contains("t.me/") || identifier.contains("telegram.me/") {
            if let Some(caps) = self.link_path.captures(identifier) {
                extracted = caps.get(1).map(|m| m.as_str()).unwrap_or(identifier);
            } else {
                extracted = identifier;
            }
        } else {
            extracted = identifier;
        }

        self.strip.replace_all(extracted, "").to_lowercase()
    }

    /// Classify a raw token
    fn classify(&self, token: &str) -> IdentifierKind {
        if is_numeric_id(token) {
            IdentifierKind::ChatId
        } else if token.starts_with('@') {
            IdentifierKind::Username
        } else if token.contains("t.me") || token.contains("telegram.me") {
            if token.contains("joinchat") || token.contains("/+") {
                IdentifierKind::InviteLink
            } else {
                IdentifierKind::Link
            }
        } else {
            IdentifierKind::Username
        }
    }

    /// Parse a free-text recipient list
    ///
    /// Deduplicates by normalized identifier (first occurrence wins) and
    /// preserves first-seen order; unnormalizable tokens are dropped.
    pub fn parse_list(&self, text: &str) -> Vec<RecipientEntry> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries = Vec::new();

        for part in self.split.split(text) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let normalized = self.normalize(part);
            if normalized.is_empty() || seen.contains(&normalized) {
                continue;
            }
            seen.insert(normalized.clone());

            entries.push(RecipientEntry {
                original: part.to_string(),
                normalized,
                kind: self.classify(part),
            });
        }

        entries
    }

    /// Parse and validate a recipient batch
    pub fn parse_validated(&self, text: &str) -> Result<Vec<RecipientEntry>> {
        let entries = self.parse_list(text);
        if entries.is_empty() {
            return Err(Error::EmptyRecipientList);
        }
        if entries.len() > MAX_RECIPIENTS {
            return Err(Error::TooManyRecipients(MAX_RECIPIENTS));
        }
        Ok(entries)
    }

    /// Extract the invite hash of a private-invite link, if any
    pub fn invite_hash<'a>(&self, identifier: &'a str) -> Option<&'a str> {
        self.invite_path
            .captures(identifier)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Pure-numeric identifier, optionally negative (group chat ids)
pub fn is_numeric_id(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parser() -> RecipientParser {
        RecipientParser::new()
    }

    #[test]
    fn normalize_strips_at_and_lowercases() {
        let p = parser();
        assert_eq!(p.normalize("@Bob"), "bob");
        assert_eq!(p.normalize("  alice_99  "), "alice_99");
        assert_eq!(p.normalize("123"), "123");
    }

    #[test]
    fn normalize_extracts_link_path() {
        let p = parser();
        assert_eq!(p.normalize("https://t.me/SomeChannel"), "somechannel");
        assert_eq!(p.normalize("telegram.me/c/other_chat"), "other_chat");
    }

    #[test]
    fn normalize_drops_foreign_characters() {
        let p = parser();
        assert_eq!(p.normalize("bob!#$"), "bob");
        assert_eq!(p.normalize("!!!"), "");
    }

    #[test]
    fn dedup_by_normalized_first_wins_order_kept() {
        let p = parser();
        let entries = p.parse_list("@Bob, bob, 123, 123");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].original, "@Bob");
        assert_eq!(entries[0].normalized, "bob");
        assert_eq!(entries[1].original, "123");
        assert_eq!(entries[1].normalized, "123");
    }

    #[test]
    fn output_len_equals_distinct_normalized() {
        let p = parser();
        let entries = p.parse_list("a b c a @b C");
        let distinct: HashSet<_> = entries.iter().map(|e| e.normalized.clone()).collect();
        assert_eq!(entries.len(), distinct.len());
    }

    #[test]
    fn classification_order() {
        let p = parser();
        let entries =
            p.parse_list("123 -456 @alice https://t.me/chan t.me/joinchat/AbC t.me/+Xyz plain");

        let kinds: Vec<_> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IdentifierKind::ChatId,
                IdentifierKind::ChatId,
                IdentifierKind::Username,
                IdentifierKind::Link,
                IdentifierKind::InviteLink,
                IdentifierKind::InviteLink,
                IdentifierKind::Username,
            ]
        );
    }

    #[test]
    fn separators_commas_whitespace_newlines() {
        let p = parser();
        let entries = p.parse_list("one,two\nthree\t four");
        let originals: Vec<_> = entries.iter().map(|e| e.original.as_str()).collect();
        assert_eq!(originals, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn empty_batch_rejected() {
        let p = parser();
        assert!(matches!(
            p.parse_validated("  , \n "),
            Err(Error::EmptyRecipientList)
        ));
        assert!(matches!(
            p.parse_validated("!!! ???"),
            Err(Error::EmptyRecipientList)
        ));
    }

    #[test]
    fn ceiling_enforced() {
        let p = parser();
        let text: Vec<String> = (0..1001).map(|i| format!("user{}", i)).collect();
        assert!(matches!(
            p.parse_validated(&text.join(" ")),
            Err(Error::TooManyRecipients(MAX_RECIPIENTS))
        ));

        let text: Vec<String> = (0..1000).map(|i| format!("user{}", i)).collect();
        assert_eq!(p.parse_validated(&text.join(" ")).unwrap().len(), 1000);
    }

    #[test]
    fn invite_hash_extraction() {
        let p = parser();
        assert_eq!(p.invite_hash("t.me/joinchat/AbCd-123"), Some("AbCd-123"));
        assert_eq!(p.invite_hash("https://t.me/+XyZ_9"), Some("XyZ_9"));
        assert_eq!(p.invite_hash("t.me/public_chan"), None);
    }

    #[test]
    fn numeric_ids() {
        assert!(is_numeric_id("123"));
        assert!(is_numeric_id("-100123456"));
        assert!(!is_numeric_id("12a"));
        assert!(!is_numeric_id("-"));
        assert!(!is_numeric_id(""));
    }
}
