use std::path::Path;
use std::sync::Arc;

use crate::error::SQLError;
use crate::sqlite::SqliteStore;
use crate::traits::SQLStore;

/// Separate read and write handles to the same database.
///
/// Repositories send list/count/lookup queries to `read` and every
/// mutation to `write`. Both handles are safe for concurrent use; no
/// other shared state exists in the data layer.
#[derive(Clone)]
pub struct DbPool {
    read: Arc<dyn SQLStore>,
    write: Arc<dyn SQLStore>,
}

impl DbPool {
    pub fn new(read: Arc<dyn SQLStore>, write: Arc<dyn SQLStore>) -> Self {
        Self { read, write }
    }

    /// One handle serving both roles (in-memory databases, tests).
    pub fn single(store: Arc<dyn SQLStore>) -> Self {
        Self {
            read: Arc::clone(&store),
            write: store,
        }
    }

    /// Open two connections to a file-backed SQLite database.
    pub fn open_sqlite(path: &Path) -> Result<Self, SQLError> {
        let write: Arc<dyn SQLStore> = Arc::new(SqliteStore::open(path)?);
        let read: Arc<dyn SQLStore> = Arc::new(SqliteStore::open(path)?);
        Ok(Self { read, write })
    }

    pub fn read(&self) -> &Arc<dyn SQLStore> {
        &self.read
    }

    pub fn write(&self) -> &Arc<dyn SQLStore> {
        &self.write
    }
}
