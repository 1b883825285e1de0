use serde::{Deserialize, Serialize};

use memberd_core::{new_id, now_rfc3339, ItemError, PageMeta, ServiceError};
use memberd_sql::{Sort, SortColumn, SortDirection, Value};

// ---------------------------------------------------------------------------
// MemberStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
    Suspended,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }

    /// Parse a caller-supplied status, case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "suspended" => Ok(Self::Suspended),
            other => Err(ServiceError::Validation(format!(
                "unknown member status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MemberStatus> for Value {
    fn from(status: MemberStatus) -> Self {
        Value::from(status.as_str())
    }
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A member account owned by a merchant.
///
/// Stored as JSON in the `data` column; the filterable fields are copied to
/// indexed columns on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub merchant_id: String,
    pub first_name: String,
    pub last_name: String,
    /// Always stored lowercased.
    pub email: String,
    pub status: MemberStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl Member {
    /// Build a new member from an import row. The id is `{id_prefix}{uuid}`.
    pub fn create(id_prefix: &str, row: &NewMember) -> Self {
        let now = now_rfc3339();
        Self {
            id: format!("{id_prefix}{}", new_id()),
            merchant_id: row.merchant_id.trim().to_string(),
            first_name: row.first_name.trim().to_string(),
            last_name: row.last_name.trim().to_string(),
            email: row.normalized_email(),
            status: row.status.unwrap_or(MemberStatus::Active),
            created_at: now.clone(),
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// One row of a bulk import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub merchant_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub status: Option<MemberStatus>,
}

impl NewMember {
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    /// Shape checks only; uniqueness is checked against storage by the
    /// import.
    pub fn check(&self) -> Result<(), ServiceError> {
        if self.merchant_id.trim().is_empty() {
            return Err(ServiceError::Validation("merchantId is required".into()));
        }
        let email = self.normalized_email();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::Validation(format!(
                "invalid email '{}'",
                self.email
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Sortable member columns. Only these keys are accepted from `orderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberColumn {
    FirstName,
    LastName,
    Email,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn for MemberColumn {
    const ALL: &'static [Self] = &[
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Status,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Email => "email",
            Self::Status => "status",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Status => "status",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

/// Newest first.
pub const DEFAULT_SORT: Sort<MemberColumn> = Sort {
    column: MemberColumn::CreatedAt,
    direction: SortDirection::Desc,
};

/// Raw list parameters exactly as they arrive on the query string.
///
/// Everything is a string so that parsing and defaulting happen in one
/// place (paginator, sort allow-list, filter builder).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberListQuery {
    pub page: String,
    pub limit: String,
    pub order_by: String,
    pub sort_by: String,
    pub search: String,
    /// Comma-separated statuses.
    pub status: String,
    pub merchant_id: String,
    /// Inclusive lower bound on `createdAt` (RFC 3339 or date prefix).
    pub created_from: String,
    /// Inclusive upper bound on `createdAt`.
    pub created_to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPage {
    pub items: Vec<Member>,
    pub meta: PageMeta,
}

// ---------------------------------------------------------------------------
// Bulk requests and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub members: Vec<NewMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: Vec<Member>,
}

/// A message delivered to each addressed member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub notice: Notice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReport {
    pub sent: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub ids: Vec<String>,
}

/// Exported rows plus one entry per id that could not be exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    pub rows: Vec<Member>,
    pub skipped: Vec<ItemError>,
}
