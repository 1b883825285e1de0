pub mod error;
pub mod filter;
pub mod pool;
pub mod sort;
pub mod sqlite;
pub mod traits;

pub use error::SQLError;
pub use filter::{Filter, Group, Placeholder, SearchRule, SearchTarget};
pub use pool::DbPool;
pub use sort::{Sort, SortColumn, SortDirection};
pub use sqlite::SqliteStore;
pub use traits::{Row, SQLStore, Value};
