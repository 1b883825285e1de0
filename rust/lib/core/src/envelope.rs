//! The single value every asynchronous boundary hands back.
//!
//! An [`Envelope`] is produced exactly once per logical operation. Its
//! [`Outcome`] makes the three result shapes mutually exclusive:
//!
//! ```text
//! Success(payload)                 everything worked
//! Partial { payload, items }       the operation ran, some rows failed
//! Failure { error, items }         nothing usable, optionally per-row detail
//! ```
//!
//! Callers tell "total failure" from "partial failure" by matching the
//! outcome; a partial result is never reported as a plain success.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Failure attributed to one input row of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub id: String,
    pub message: String,
}

impl ItemError {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// What an operation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Partial { payload: T, items: Vec<ItemError> },
    Failure { error: ServiceError, items: Vec<ItemError> },
}

/// Result of one operation plus the metadata its producer attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub outcome: Outcome<T>,
    /// Transport status chosen by the producer.
    pub status: StatusCode,
    /// Total matching rows; only list/count producers set this.
    pub total: Option<u64>,
}

impl<T> Envelope<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            outcome: Outcome::Success(payload),
            status: StatusCode::OK,
            total: None,
        }
    }

    /// A page of rows together with the count of all matching rows.
    pub fn listed(payload: T, total: u64) -> Self {
        Self {
            total: Some(total),
            ..Self::ok(payload)
        }
    }

    pub fn partial(payload: T, items: Vec<ItemError>) -> Self {
        Self {
            outcome: Outcome::Partial { payload, items },
            status: StatusCode::MULTI_STATUS,
            total: None,
        }
    }

    pub fn fail(error: ServiceError) -> Self {
        Self {
            status: error.status_code(),
            outcome: Outcome::Failure {
                error,
                items: Vec::new(),
            },
            total: None,
        }
    }

    /// Rows rejected before any write: every offending row, with the
    /// status of the error kind.
    pub fn rejected(error: ServiceError, items: Vec<ItemError>) -> Self {
        Self {
            status: error.status_code(),
            outcome: Outcome::Failure { error, items },
            total: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.outcome, Outcome::Partial { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Success(payload) | Outcome::Partial { payload, .. } => Some(payload),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ServiceError> {
        match &self.outcome {
            Outcome::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn item_errors(&self) -> &[ItemError] {
        match &self.outcome {
            Outcome::Success(_) => &[],
            Outcome::Partial { items, .. } | Outcome::Failure { items, .. } => items,
        }
    }

    /// Collapse to a `Result`, discarding per-row detail of a partial result.
    pub fn into_payload(self) -> Result<T, ServiceError> {
        match self.outcome {
            Outcome::Success(payload) | Outcome::Partial { payload, .. } => Ok(payload),
            Outcome::Failure { error, .. } => Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        let outcome = match self.outcome {
            Outcome::Success(payload) => Outcome::Success(f(payload)),
            Outcome::Partial { payload, items } => Outcome::Partial {
                payload: f(payload),
                items,
            },
            Outcome::Failure { error, items } => Outcome::Failure { error, items },
        };
        Envelope {
            outcome,
            status: self.status,
            total: self.total,
        }
    }
}

impl Envelope<serde_json::Value> {
    /// Decode a loosely-typed payload into the type the consumer expects.
    ///
    /// A mismatch is a producer/consumer contract fault and surfaces as
    /// `Internal`, not as a validation problem of the caller's input.
    pub fn decode<U: DeserializeOwned>(self) -> Envelope<U> {
        let status = self.status;
        let total = self.total;
        let decoded = match self.outcome {
            Outcome::Success(payload) => {
                serde_json::from_value(payload).map(Outcome::Success)
            }
            Outcome::Partial { payload, items } => serde_json::from_value(payload)
                .map(|payload| Outcome::Partial { payload, items }),
            Outcome::Failure { error, items } => Ok(Outcome::Failure { error, items }),
        };
        match decoded {
            Ok(outcome) => Envelope {
                outcome,
                status,
                total,
            },
            Err(e) => Envelope::fail(ServiceError::Internal(format!(
                "payload type mismatch: {e}"
            ))),
        }
    }
}

impl<T> From<Result<T, ServiceError>> for Envelope<T> {
    fn from(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(payload) => Envelope::ok(payload),
            Err(error) => Envelope::fail(error),
        }
    }
}

/// HTTP rendering used at the handler boundary.
///
/// - success: `{"data": payload}` (plus `"total"` for list producers)
/// - rows failed: `{"message": "...", "data": [{"id", "message"}]}`, plus
///   `"result": payload` when the operation still produced one
/// - plain failure: `{"code", "message"}`
impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = match self.outcome {
            Outcome::Success(payload) => match self.total {
                Some(total) => serde_json::json!({ "data": payload, "total": total }),
                None => serde_json::json!({ "data": payload }),
            },
            Outcome::Partial { payload, items } => serde_json::json!({
                "message": format!("{} item(s) failed", items.len()),
                "data": items,
                "result": payload,
            }),
            Outcome::Failure { error, items } if !items.is_empty() => serde_json::json!({
                "message": error.to_string(),
                "data": items,
            }),
            Outcome::Failure { error, .. } => serde_json::json!({
                "code": error.error_code(),
                "message": error.to_string(),
            }),
        };
        (status, axum::Json(body)).into_response()
    }
}
