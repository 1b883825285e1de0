//! Member usecases.
//!
//! Each operation returns a [`Pending`] conduit. The worker behind it drives
//! the repository through its `*_sync` forms on the worker's own thread,
//! one item at a time in input order.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use memberd_core::{
    BulkAggregator, Envelope, PageMeta, Paginator, Pending, Runner, ServiceError,
};

use crate::model::{
    ExportReport, ImportReport, Member, MemberListQuery, MemberPage, MemberStatus, NewMember,
    Notice, SendReport,
};
use crate::notify::Notifier;
use crate::store::MemberStore;

const LIST: Runner = Runner::new("member.list");
const IMPORT: Runner = Runner::new("member.import");
const SEND: Runner = Runner::new("member.send");
const EXPORT: Runner = Runner::new("member.export");

#[derive(Clone)]
pub struct MemberService {
    store: MemberStore,
    paginator: Paginator,
    notifier: Arc<dyn Notifier>,
}

impl MemberService {
    pub fn new(store: MemberStore, paginator: Paginator, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            paginator,
            notifier,
        }
    }

    pub fn store(&self) -> &MemberStore {
        &self.store
    }

    /// One page of members plus paging metadata.
    pub fn list_members(&self, query: &MemberListQuery) -> Pending<MemberPage> {
        let prepared = self
            .paginator
            .resolve(&query.page, &query.limit)
            .and_then(|page| Ok((page, self.store.plan_list(query)?)));
        let (page, plan) = match prepared {
            Ok(p) => p,
            Err(e) => return Pending::ready(LIST.op(), Envelope::fail(e)),
        };
        let store = self.store.clone();
        LIST.run(move || {
            let list = match store.list_sync(&plan, &page) {
                Ok(list) => list,
                Err(e) => return Envelope::fail(e),
            };
            let total = list.total;
            match PageMeta::new(&page, total) {
                Ok(meta) => Envelope::listed(
                    MemberPage {
                        items: list.items,
                        meta,
                    },
                    total,
                ),
                Err(e) => Envelope::fail(e),
            }
        })
    }

    pub fn get_member(&self, id: &str) -> Pending<Member> {
        self.store.get(id)
    }

    pub fn delete_member(&self, id: &str) -> Pending<()> {
        self.store.soft_delete(id)
    }

    /// All-or-nothing import.
    ///
    /// Every row is checked first: shape, duplicates inside the batch, and
    /// emails already registered. Any rejected row fails the batch with the
    /// full list of offending rows and nothing is written. A storage fault
    /// while checking fails the batch as a storage error.
    pub fn import_members(&self, rows: Vec<NewMember>) -> Pending<ImportReport> {
        let store = self.store.clone();
        IMPORT.run(move || {
            let mut seen = HashSet::new();
            let mut imported = Vec::with_capacity(rows.len());
            let outcome = BulkAggregator::reject_all().run(
                &rows,
                NewMember::normalized_email,
                |row| {
                    row.check()?;
                    let email = row.normalized_email();
                    if !seen.insert(email.clone()) {
                        return Err(ServiceError::Conflict(format!(
                            "email {email} appears more than once in the batch"
                        )));
                    }
                    if store.email_exists_sync(&email)? {
                        return Err(ServiceError::Conflict(format!(
                            "email {email} is already registered"
                        )));
                    }
                    Ok(())
                },
                |row| {
                    let member = Member::create(store.id_prefix(), row);
                    store.insert_sync(&member)?;
                    imported.push(member);
                    Ok(())
                },
            );
            info!(
                submitted = outcome.total,
                imported = imported.len(),
                state = ?outcome.state,
                "member import finished"
            );
            outcome.into_envelope(ImportReport { imported })
        })
    }

    /// Best-effort notification. Unknown or non-active members are
    /// reported per id; the rest are still notified.
    pub fn send_members(&self, ids: Vec<String>, notice: Notice) -> Pending<SendReport> {
        if ids.is_empty() {
            return Pending::ready(
                SEND.op(),
                Envelope::fail(ServiceError::Validation("ids must not be empty".into())),
            );
        }
        if notice.subject.trim().is_empty() {
            return Pending::ready(
                SEND.op(),
                Envelope::fail(ServiceError::Validation("subject is required".into())),
            );
        }
        let store = self.store.clone();
        let notifier = Arc::clone(&self.notifier);
        SEND.run(move || {
            let outcome = BulkAggregator::continue_on_error().run(
                &ids,
                |id| id.clone(),
                |id| require_id(id),
                |id| {
                    let member = store.get_sync(id)?;
                    if member.status != MemberStatus::Active {
                        return Err(ServiceError::Validation(format!(
                            "member {id} is {}",
                            member.status
                        )));
                    }
                    notifier.notify(&member, &notice)
                },
            );
            debug!(sent = outcome.written.len(), failed = outcome.commit_errors.len(), "member send finished");
            let report = SendReport {
                sent: outcome.written.clone(),
            };
            outcome.into_envelope(report)
        })
    }

    /// Export the requested members. Ids that cannot be exported become
    /// skip entries next to the exported rows.
    pub fn export_members(&self, ids: Vec<String>) -> Pending<ExportReport> {
        if ids.is_empty() {
            return Pending::ready(
                EXPORT.op(),
                Envelope::fail(ServiceError::Validation("ids must not be empty".into())),
            );
        }
        let store = self.store.clone();
        EXPORT.run(move || {
            let mut rows = Vec::with_capacity(ids.len());
            let outcome = BulkAggregator::continue_on_error().run(
                &ids,
                |id| id.clone(),
                |id| require_id(id),
                |id| {
                    rows.push(store.get_sync(id)?);
                    Ok(())
                },
            );
            Envelope::ok(ExportReport {
                rows,
                skipped: outcome.commit_errors,
            })
        })
    }
}

fn require_id(id: &str) -> Result<(), ServiceError> {
    if id.trim().is_empty() {
        Err(ServiceError::Validation("member id is required".into()))
    } else {
        Ok(())
    }
}
