//! Drive a batch through a per-item operation and fold the results into
//! one [`BulkOutcome`].
//!
//! Two modes:
//!
//! ```text
//! RejectAll:
//!   Start → Validating ─┬─ all clean ──────→ Committing → Done(Success | CommitErrors)
//!                       ├─ rows rejected ─→ Done(Rejected), zero writes
//!                       └─ infrastructure fault → Done(Aborted), zero writes
//!
//! ContinueOnError:
//!   for each item, in input order: validate, commit; record failure, move on
//! ```
//!
//! The commit phase of RejectAll is itself best-effort: a failed write is
//! recorded and earlier writes are kept.
//!
//! Item failures are logged at debug only. Storage faults were already
//! logged with their statement where they were detected.

use axum::http::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::{Envelope, ItemError, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkMode {
    RejectAll,
    ContinueOnError,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkState {
    Success,
    /// RejectAll: one or more rows failed validation; nothing written.
    Rejected,
    /// RejectAll: validation hit an infrastructure fault; nothing written.
    Aborted,
    CommitErrors,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub mode: BulkMode,
    pub state: BulkState,
    /// Number of items submitted.
    pub total: usize,
    /// Validation-phase failures (RejectAll only).
    pub rejected: Vec<ItemError>,
    /// Per-item failures during commit.
    pub commit_errors: Vec<ItemError>,
    /// Ids of items written, in input order.
    pub written: Vec<String>,
    /// Set when the run ended `Rejected` or `Aborted`.
    #[serde(skip)]
    pub error: Option<ServiceError>,
}

impl BulkOutcome {
    /// Wrap `payload` according to how the run ended.
    ///
    /// Rejected rows become a `Failure` carrying every offending row: 400
    /// if any row was malformed, 409 when every row is a uniqueness
    /// conflict. An aborted run is a plain failure of the fault's kind.
    /// Commit errors become a `Partial` result: `207` for RejectAll, `200`
    /// for ContinueOnError where per-item failures are an expected part of
    /// a successful run.
    pub fn into_envelope<T>(self, payload: T) -> Envelope<T> {
        match self.state {
            BulkState::Success => Envelope::ok(payload),
            BulkState::Rejected => Envelope::rejected(
                self.error
                    .unwrap_or_else(|| ServiceError::Conflict("batch rejected".into())),
                self.rejected,
            ),
            BulkState::Aborted => Envelope::fail(
                self.error
                    .unwrap_or_else(|| ServiceError::Internal("bulk run aborted".into())),
            ),
            BulkState::CommitErrors => {
                let status = match self.mode {
                    BulkMode::RejectAll => StatusCode::MULTI_STATUS,
                    BulkMode::ContinueOnError => StatusCode::OK,
                };
                Envelope::partial(payload, self.commit_errors).with_status(status)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BulkAggregator {
    mode: BulkMode,
}

impl BulkAggregator {
    pub fn new(mode: BulkMode) -> Self {
        Self { mode }
    }

    pub fn reject_all() -> Self {
        Self::new(BulkMode::RejectAll)
    }

    pub fn continue_on_error() -> Self {
        Self::new(BulkMode::ContinueOnError)
    }

    pub fn mode(&self) -> BulkMode {
        self.mode
    }

    /// Run `items` through `validate` and `commit`.
    ///
    /// `id_of` names an item in the error list. Items are visited strictly
    /// in input order in both modes. In RejectAll, an infrastructure error
    /// from `validate` stops the run at once.
    pub fn run<I, K, V, C>(&self, items: &[I], id_of: K, mut validate: V, mut commit: C) -> BulkOutcome
    where
        K: Fn(&I) -> String,
        V: FnMut(&I) -> Result<(), ServiceError>,
        C: FnMut(&I) -> Result<(), ServiceError>,
    {
        let mut outcome = BulkOutcome {
            mode: self.mode,
            state: BulkState::Success,
            total: items.len(),
            rejected: Vec::new(),
            commit_errors: Vec::new(),
            written: Vec::new(),
            error: None,
        };

        match self.mode {
            BulkMode::RejectAll => {
                debug!(items = items.len(), "bulk reject-all: validating");
                let mut malformed = false;
                for item in items {
                    let Err(e) = validate(item) else { continue };
                    let id = id_of(item);
                    if e.is_infrastructure() {
                        debug!(%id, "bulk reject-all: aborted, nothing written");
                        outcome.state = BulkState::Aborted;
                        outcome.error = Some(e);
                        return outcome;
                    }
                    debug!(%id, error = %e, "bulk item rejected");
                    malformed |= !matches!(e, ServiceError::Conflict(_));
                    outcome.rejected.push(ItemError::new(id, e.to_string()));
                }
                if !outcome.rejected.is_empty() {
                    let n = outcome.rejected.len();
                    debug!(rejected = n, "bulk reject-all: rows rejected, nothing written");
                    outcome.state = BulkState::Rejected;
                    outcome.error = Some(if malformed {
                        ServiceError::Validation(format!("{n} of {} item(s) invalid", items.len()))
                    } else {
                        ServiceError::Conflict(format!("{n} of {} item(s) conflict", items.len()))
                    });
                    return outcome;
                }

                debug!("bulk reject-all: all clean, committing");
                for item in items {
                    commit_one(item, &id_of, &mut commit, &mut outcome);
                }
            }
            BulkMode::ContinueOnError => {
                debug!(items = items.len(), "bulk continue-on-error: processing");
                for item in items {
                    if let Err(e) = validate(item) {
                        let id = id_of(item);
                        debug!(%id, error = %e, "bulk item skipped");
                        outcome.commit_errors.push(ItemError::new(id, e.to_string()));
                        continue;
                    }
                    commit_one(item, &id_of, &mut commit, &mut outcome);
                }
            }
        }

        if !outcome.commit_errors.is_empty() {
            outcome.state = BulkState::CommitErrors;
        }
        debug!(
            written = outcome.written.len(),
            failed = outcome.commit_errors.len(),
            "bulk run done"
        );
        outcome
    }
}

fn commit_one<I, K, C>(item: &I, id_of: &K, commit: &mut C, outcome: &mut BulkOutcome)
where
    K: Fn(&I) -> String,
    C: FnMut(&I) -> Result<(), ServiceError>,
{
    let id = id_of(item);
    match commit(item) {
        Ok(()) => outcome.written.push(id),
        Err(e) => {
            debug!(%id, error = %e, "bulk item write failed");
            outcome.commit_errors.push(ItemError::new(id, e.to_string()));
        }
    }
}
