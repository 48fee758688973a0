//! Write outcome and error translation into transport responses.

use crate::model::mutation::{MutationOutcome, WriteResult};
use crate::service::pipeline::{WriteError, WriteOutcome};
use crate::transport::format_etag;
use log::{error, warn};
use serde::Serialize;
use serde_json::{json, Value};

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_NO_CONTENT: u16 = 204;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_PRECONDITION_REQUIRED: u16 = 428;
/// Non-standard "client closed request", used for cancelled writes.
pub const STATUS_CLIENT_CLOSED: u16 = 499;
pub const STATUS_INTERNAL_ERROR: u16 = 500;
pub const STATUS_UNAVAILABLE: u16 = 503;

/// Response body shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Json(Value),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Empty => None,
            Self::Json(value) => Some(value),
        }
    }
}

/// Client choice of body for successful creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponsePreference {
    /// Status marker only.
    Minimal,
    /// Full resource representation.
    #[default]
    ReturnRepresentation,
}

/// Transport-neutral response: status, optional ETag header, body.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Quoted entity tag carrying the new version token.
    pub etag: Option<String>,
    pub body: ResponseBody,
}

impl TransportResponse {
    fn new(status: u16, etag: Option<String>, body: ResponseBody) -> Self {
        Self { status, etag, body }
    }

    fn json(status: u16, body: Value) -> Self {
        Self::new(status, None, ResponseBody::Json(body))
    }
}

/// Maps one write result to its response.
///
/// | Outcome  | Status | Header    |
/// |----------|--------|-----------|
/// | Created  | 201    | new token |
/// | Updated  | 204    | new token |
/// | Deleted  | 204    | none      |
/// | NoOp     | 200    | none      |
/// | NotFound | 404    | none      |
/// | Conflict | 409    | none      |
pub fn render_write<T: Serialize>(
    result: &WriteResult<T>,
    preference: ResponsePreference,
) -> TransportResponse {
    let etag = result.version().map(format_etag);
    match result.outcome() {
        MutationOutcome::Created => {
            TransportResponse::new(STATUS_CREATED, etag, created_body(result, preference))
        }
        MutationOutcome::Updated => {
            TransportResponse::new(STATUS_NO_CONTENT, etag, ResponseBody::Empty)
        }
        MutationOutcome::Deleted => {
            TransportResponse::new(STATUS_NO_CONTENT, None, ResponseBody::Empty)
        }
        MutationOutcome::NoOp => TransportResponse::json(STATUS_OK, json!({ "status": "no_op" })),
        MutationOutcome::NotFound => {
            TransportResponse::json(STATUS_NOT_FOUND, json!({ "error": "not_found" }))
        }
        MutationOutcome::Conflict => TransportResponse::json(
            STATUS_CONFLICT,
            json!({
                "error": "conflict",
                "current_version": result.current_version().map(|token| token.encode()),
            }),
        ),
    }
}

/// Maps a failed write to its response without leaking storage detail.
pub fn render_error(err: &WriteError) -> TransportResponse {
    match err {
        WriteError::Validation(errors) => TransportResponse::json(
            STATUS_BAD_REQUEST,
            json!({
                "error": "validation_failed",
                "violations": errors.violations,
            }),
        ),
        WriteError::PreconditionMissing(missing) => TransportResponse::json(
            STATUS_PRECONDITION_REQUIRED,
            json!({
                "error": "precondition_required",
                "message": missing.to_string(),
            }),
        ),
        WriteError::Cancelled(_) => {
            TransportResponse::new(STATUS_CLIENT_CLOSED, None, ResponseBody::Empty)
        }
        WriteError::Storage(storage) if err.is_unavailable() => {
            warn!(
                "event=write_failed module=transport status=unavailable error={}",
                storage
            );
            TransportResponse::json(STATUS_UNAVAILABLE, json!({ "error": "unavailable" }))
        }
        WriteError::Storage(storage) => {
            error!(
                "event=write_failed module=transport status=error error={}",
                storage
            );
            TransportResponse::json(STATUS_INTERNAL_ERROR, json!({ "error": "internal" }))
        }
    }
}

/// Renders either side of a write outcome.
pub fn render<T: Serialize>(
    outcome: &WriteOutcome<T>,
    preference: ResponsePreference,
) -> TransportResponse {
    match outcome {
        Ok(result) => render_write(result, preference),
        Err(err) => render_error(err),
    }
}

fn created_body<T: Serialize>(
    result: &WriteResult<T>,
    preference: ResponsePreference,
) -> ResponseBody {
    let minimal = json!({ "status": "created" });
    let body = match (preference, result.record()) {
        (ResponsePreference::ReturnRepresentation, Some(record)) => {
            serde_json::to_value(record).unwrap_or_else(|err| {
                warn!(
                    "event=representation_skipped module=transport status=error error={}",
                    err
                );
                minimal
            })
        }
        _ => minimal,
    };
    ResponseBody::Json(body)
}

#[cfg(test)]
mod tests {
    use super::{render_write, ResponseBody, ResponsePreference, STATUS_CREATED};
    use crate::model::mutation::WriteResult;
    use crate::model::version::VersionToken;
    use serde_json::json;

    #[test]
    fn minimal_preference_returns_status_marker() {
        let version = VersionToken::initial();
        let result = WriteResult::created(json!({ "id": 1 }), version.clone());
        let response = render_write(&result, ResponsePreference::Minimal);
        assert_eq!(response.status, STATUS_CREATED);
        assert_eq!(response.etag, Some(format!("\"{}\"", version.encode())));
        assert_eq!(
            response.body,
            ResponseBody::Json(json!({ "status": "created" }))
        );
    }
}
