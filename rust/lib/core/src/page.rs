//! Pagination arithmetic.
//!
//! `page` and `limit` arrive as raw query-string values. Absent, blank or
//! non-numeric input falls back to the defaults; numeric input must be
//! positive. `limit == 0` is rejected here, before any page count is
//! computed.

use serde::{Deserialize, Serialize};

use crate::ServiceError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Paging limits, usually read from the server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    #[serde(default = "max_limit")]
    pub max_limit: u64,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn max_limit() -> u64 {
    MAX_LIMIT
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Pagination metadata returned next to list rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub limit: u64,
    pub total_records: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(request: &PageRequest, total_records: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            page: request.page,
            limit: request.limit,
            total_records,
            total_pages: total_pages(total_records, request.limit)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    default_limit: u64,
    max_limit: u64,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Result<Self, ServiceError> {
        if config.default_limit == 0 || config.max_limit == 0 {
            return Err(ServiceError::Validation(
                "pagination limits must be greater than zero".into(),
            ));
        }
        if config.default_limit > config.max_limit {
            return Err(ServiceError::Validation(format!(
                "default limit {} exceeds max limit {}",
                config.default_limit, config.max_limit
            )));
        }
        Ok(Self {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
        })
    }

    pub fn default_limit(&self) -> u64 {
        self.default_limit
    }

    pub fn max_limit(&self) -> u64 {
        self.max_limit
    }

    /// Turn raw `page`/`limit` strings into a page window.
    pub fn resolve(&self, raw_page: &str, raw_limit: &str) -> Result<PageRequest, ServiceError> {
        let page = parse_positive("page", raw_page, DEFAULT_PAGE)?;
        let limit = parse_positive("limit", raw_limit, self.default_limit)?;
        if limit > self.max_limit {
            return Err(ServiceError::Validation(format!(
                "limit must not exceed {}",
                self.max_limit
            )));
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| ServiceError::Validation(format!("page {page} is out of range")))?;
        Ok(PageRequest {
            page,
            limit,
            offset,
        })
    }
}

/// `ceil(total / limit)`. A zero limit is a validation error, never a
/// division.
pub fn total_pages(total: u64, limit: u64) -> Result<u64, ServiceError> {
    if limit == 0 {
        return Err(ServiceError::Validation(
            "limit must be greater than zero".into(),
        ));
    }
    Ok(total.div_ceil(limit))
}

fn parse_positive(field: &str, raw: &str, default: u64) -> Result<u64, ServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n as u64),
        Ok(_) => Err(ServiceError::Validation(format!(
            "{field} must be greater than zero"
        ))),
        Err(_) if is_integer(raw) => Err(ServiceError::Validation(format!(
            "{field} is out of range"
        ))),
        Err(_) => Ok(default),
    }
}

fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
