//! Transport boundary: outcome translation and header helpers.
//!
//! # Responsibility
//! - Translate `WriteResult`/`WriteError` into status, ETag and body.
//! - Map request verbs to mutation kinds and parse `If-Match` style tokens.
//!
//! # Invariants
//! - Every `MutationOutcome` has exactly one response mapping.
//! - Storage failures never expose internal detail in the body.

pub mod response;

use crate::model::mutation::MutationKind;
use crate::model::version::{TokenParseError, VersionToken};

pub use response::{
    render, render_error, render_write, ResponseBody, ResponsePreference, TransportResponse,
};

/// Maps a request verb to the intended mutation kind.
///
/// `POST` creates, `PUT`/`PATCH` update, `DELETE` deletes. Other verbs do not
/// mutate and return `None`.
pub fn kind_from_method(method: &str) -> Option<MutationKind> {
    match method.trim().to_ascii_uppercase().as_str() {
        "POST" => Some(MutationKind::Create),
        "PUT" | "PATCH" => Some(MutationKind::Update),
        "DELETE" => Some(MutationKind::Delete),
        _ => None,
    }
}

/// Renders a token as a quoted entity tag.
pub fn format_etag(token: &VersionToken) -> String {
    format!("\"{}\"", token.encode())
}

/// Parses an `If-Match` style header value.
///
/// Accepts quoted (`"ab12"`), weak (`W/"ab12"`) and bare (`ab12`) forms.
/// A missing or blank header yields `Ok(None)`, which the write pipeline
/// rejects for Update/Delete.
pub fn parse_if_match(header: Option<&str>) -> Result<Option<VersionToken>, TokenParseError> {
    let Some(raw) = header.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let unweak = raw.strip_prefix("W/").unwrap_or(raw);
    let unquoted = unweak
        .strip_prefix('"')
        .and_then(|value| value.strip_suffix('"'))
        .unwrap_or(unweak);
    VersionToken::decode(unquoted).map(Some)
}

#[cfg(test)]
mod tests {
    use super::{format_etag, kind_from_method, parse_if_match};
    use crate::model::mutation::MutationKind;
    use crate::model::version::VersionToken;

    #[test]
    fn verbs_map_to_kinds() {
        assert_eq!(kind_from_method("post"), Some(MutationKind::Create));
        assert_eq!(kind_from_method("PATCH"), Some(MutationKind::Update));
        assert_eq!(kind_from_method("PUT"), Some(MutationKind::Update));
        assert_eq!(kind_from_method("DELETE"), Some(MutationKind::Delete));
        assert_eq!(kind_from_method("GET"), None);
    }

    #[test]
    fn if_match_accepts_quoted_weak_and_bare_forms() {
        let token = VersionToken::initial();
        let etag = format_etag(&token);
        let weak = format!("W/{etag}");
        let bare = token.encode();

        for header in [etag.as_str(), weak.as_str(), bare.as_str()] {
            assert_eq!(parse_if_match(Some(header)), Ok(Some(token.clone())));
        }
        assert_eq!(parse_if_match(Some("   ")), Ok(None));
        assert_eq!(parse_if_match(None), Ok(None));
        assert!(parse_if_match(Some("\"zz\"")).is_err());
    }
}
