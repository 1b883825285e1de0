//! Outbound delivery seam for member notifications.
//!
//! Mail and queue publishers live outside this crate; they plug in by
//! implementing [`Notifier`].

use std::sync::Mutex;

use tracing::info;

use memberd_core::ServiceError;

use crate::model::{Member, Notice};

/// Deliver one notice to one member. Called from worker threads, so
/// implementations may block.
pub trait Notifier: Send + Sync {
    fn notify(&self, member: &Member, notice: &Notice) -> Result<(), ServiceError>;
}

/// Records each delivery through tracing and nothing else.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, member: &Member, notice: &Notice) -> Result<(), ServiceError> {
        info!(
            member = %member.id,
            email = %member.email,
            subject = %notice.subject,
            "member notified"
        );
        Ok(())
    }
}

/// Keeps every delivery in memory. Handy in tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(String, Notice)>>,
}

impl MemoryNotifier {
    /// Deliveries so far as `(member id, notice)`, in send order.
    pub fn sent(&self) -> Vec<(String, Notice)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, member: &Member, notice: &Notice) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .map_err(|e| ServiceError::Internal(format!("notifier poisoned: {e}")))?
            .push((member.id.clone(), notice.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewMember;

    #[test]
    fn memory_notifier_records_in_order() {
        let notifier = MemoryNotifier::default();
        let notice = Notice {
            subject: "hi".into(),
            body: "welcome".into(),
        };
        for email in ["a@x.com", "b@x.com"] {
            let m = Member::create(
                "MBR-",
                &NewMember {
                    merchant_id: "m1".into(),
                    first_name: String::new(),
                    last_name: String::new(),
                    email: email.into(),
                    status: None,
                },
            );
            notifier.notify(&m, &notice).unwrap();
            LogNotifier.notify(&m, &notice).unwrap();
        }
        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, notice);
    }
}
