//! Opaque row-version tokens for optimistic concurrency.
//!
//! # Responsibility
//! - Carry the last-known persisted state of one mutable record.
//! - Decide whether a caller-supplied token satisfies a write precondition.
//!
//! # Invariants
//! - Tokens are compared for byte-exact equality only; never ordered.
//! - `successor()` never returns a token equal to its receiver.
//! - Update/Delete writes require a non-empty token before any load.

use crate::model::mutation::MutationKind;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REVISION_BYTES: usize = 8;
const ISSUED_TOKEN_LEN: usize = 16;

/// Opaque marker of a record's last persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(Vec<u8>);

impl VersionToken {
    /// Wraps raw bytes as read from storage or decoded from the wire.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Placeholder carried by records that were never persisted.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Token issued for a freshly created record.
    pub fn initial() -> Self {
        Self::issue(1)
    }

    /// Issues the token that replaces `self` after a successful write.
    ///
    /// Minted tokens embed a big-endian revision counter followed by random
    /// entropy; the counter alone makes the successor differ from `self`.
    /// Foreign-shaped tokens restart at revision 1.
    pub fn successor(&self) -> Self {
        let next = match self.revision() {
            Some(revision) => revision.wrapping_add(1).max(1),
            None => 1,
        };
        Self::issue(next)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering used on the wire.
    pub fn encode(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parses the lowercase or uppercase hex wire form.
    pub fn decode(value: &str) -> Result<Self, TokenParseError> {
        let trimmed = value.trim();
        hex::decode(trimmed)
            .map(Self)
            .map_err(|_| TokenParseError(trimmed.to_string()))
    }

    /// Byte-exact comparison against a stored token.
    pub fn matches(&self, stored: &VersionToken) -> bool {
        matches(stored, self)
    }

    fn revision(&self) -> Option<u64> {
        if self.0.len() != ISSUED_TOKEN_LEN {
            return None;
        }
        let mut counter = [0_u8; REVISION_BYTES];
        counter.copy_from_slice(&self.0[..REVISION_BYTES]);
        Some(u64::from_be_bytes(counter))
    }

    fn issue(revision: u64) -> Self {
        let entropy = Uuid::new_v4();
        let mut bytes = Vec::with_capacity(ISSUED_TOKEN_LEN);
        bytes.extend_from_slice(&revision.to_be_bytes());
        bytes.extend_from_slice(&entropy.as_bytes()[..ISSUED_TOKEN_LEN - REVISION_BYTES]);
        Self(bytes)
    }
}

impl Display for VersionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for VersionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for VersionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::decode(&text).map_err(serde::de::Error::custom)
    }
}

/// Wire token could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParseError(pub String);

impl Display for TokenParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid version token `{}`", self.0)
    }
}

impl Error for TokenParseError {}

/// Update/Delete was requested without a usable version token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreconditionMissing {
    pub kind: MutationKind,
}

impl Display for PreconditionMissing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} requires a version token precondition", self.kind)
    }
}

impl Error for PreconditionMissing {}

/// Returns whether the caller-supplied token equals the stored one.
pub fn matches(stored: &VersionToken, supplied: &VersionToken) -> bool {
    stored.as_bytes() == supplied.as_bytes()
}

/// Resolves the effective precondition for a write of `kind`.
///
/// Create has no prior version, so any supplied token is ignored and `None`
/// is returned. Update and Delete must carry a non-empty token.
pub fn check_precondition(
    kind: MutationKind,
    supplied: Option<&VersionToken>,
) -> Result<Option<&VersionToken>, PreconditionMissing> {
    match kind {
        MutationKind::Create => Ok(None),
        MutationKind::Update | MutationKind::Delete => match supplied {
            Some(token) if !token.is_empty() => Ok(Some(token)),
            _ => Err(PreconditionMissing { kind }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{check_precondition, matches, VersionToken};
    use crate::model::mutation::MutationKind;

    #[test]
    fn successor_differs_and_advances_revision() {
        let first = VersionToken::initial();
        let second = first.successor();
        assert_ne!(first, second);
        assert_eq!(second.revision(), Some(2));
    }

    #[test]
    fn successor_of_foreign_token_restarts_revision() {
        let foreign = VersionToken::from_bytes(vec![7_u8; 4]);
        let next = foreign.successor();
        assert_ne!(foreign, next);
        assert_eq!(next.revision(), Some(1));
    }

    #[test]
    fn matching_is_byte_exact_without_prefix_semantics() {
        let stored = VersionToken::from_bytes(vec![1, 2, 3, 4]);
        assert!(matches(&stored, &VersionToken::from_bytes(vec![1, 2, 3, 4])));
        assert!(!matches(&stored, &VersionToken::from_bytes(vec![1, 2, 3])));
        assert!(!matches(&stored, &VersionToken::from_bytes(vec![1, 2, 3, 4, 0])));
    }

    #[test]
    fn hex_wire_form_decodes_back() {
        let token = VersionToken::initial();
        let decoded = VersionToken::decode(&token.encode()).unwrap();
        assert_eq!(decoded, token);
        assert!(VersionToken::decode("not-hex").is_err());
    }

    #[test]
    fn precondition_is_mandatory_for_update_and_delete_only() {
        let empty = VersionToken::from_bytes(Vec::new());
        assert_eq!(check_precondition(MutationKind::Create, None), Ok(None));
        assert!(check_precondition(MutationKind::Update, None).is_err());
        assert!(check_precondition(MutationKind::Delete, Some(&empty)).is_err());

        let token = VersionToken::initial();
        assert_eq!(
            check_precondition(MutationKind::Update, Some(&token)),
            Ok(Some(&token))
        );
    }
}
