//! Allow-listed ORDER BY.
//!
//! Identifiers cannot be bound as parameters, so a caller's `orderBy` is
//! only ever used to *select* one variant of a closed enum. The SQL text
//! comes from the enum, never from the request.

use std::fmt;

use memberd_core::ServiceError;

/// A closed set of sortable columns for one entity.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum MemberColumn { Name, CreatedAt }
///
/// impl SortColumn for MemberColumn {
///     const ALL: &'static [Self] = &[Self::Name, Self::CreatedAt];
///     fn key(self) -> &'static str { match self { Self::Name => "name", Self::CreatedAt => "createdAt" } }
///     fn column(self) -> &'static str { match self { Self::Name => "name", Self::CreatedAt => "created_at" } }
/// }
/// ```
pub trait SortColumn: Copy + Eq + fmt::Debug + 'static {
    /// Every sortable column of the entity.
    const ALL: &'static [Self];

    /// Name accepted from callers (`orderBy=`).
    fn key(self) -> &'static str;

    /// SQL identifier.
    fn column(self) -> &'static str;

    /// Match a caller-supplied name against the allow-list.
    fn parse(raw: &str) -> Result<Self, ServiceError> {
        let raw = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.key().eq_ignore_ascii_case(raw))
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|c| c.key()).collect();
                ServiceError::Validation(format!(
                    "orderBy '{raw}' is not allowed (expected one of: {})",
                    allowed.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ServiceError::Validation(format!(
                "sortBy '{other}' is not allowed (expected asc or desc)"
            ))),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A validated ordering for entity columns `C`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<C: SortColumn> {
    pub column: C,
    pub direction: SortDirection,
}

impl<C: SortColumn> Sort<C> {
    pub fn new(column: C, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    /// Parse raw `orderBy` / `sortBy` values. A blank value keeps the
    /// corresponding part of `default`.
    pub fn parse(order_by: &str, sort_by: &str, default: Sort<C>) -> Result<Self, ServiceError> {
        let column = if order_by.trim().is_empty() {
            default.column
        } else {
            C::parse(order_by)?
        };
        let direction = if sort_by.trim().is_empty() {
            default.direction
        } else {
            SortDirection::parse(sort_by)?
        };
        Ok(Self { column, direction })
    }

    pub fn to_sql(&self) -> String {
        format!("ORDER BY {} {}", self.column.column(), self.direction.as_sql())
    }
}
