pub mod bulk;
pub mod config;
pub mod envelope;
pub mod error;
pub mod module;
pub mod page;
pub mod runner;
pub mod types;

pub use bulk::{BulkAggregator, BulkMode, BulkOutcome, BulkState};
pub use config::ServiceConfig;
pub use envelope::{Envelope, ItemError, Outcome};
pub use error::ServiceError;
pub use module::Module;
pub use page::{total_pages, PageMeta, PageRequest, PaginationConfig, Paginator};
pub use runner::{Pending, Runner};
pub use types::{ListResult, new_id, now_rfc3339};
