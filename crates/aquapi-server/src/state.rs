use std::path::Path;
use std::sync::Arc;

use aquapi_core::db::StoreDb;
use aquapi_core::store::{MemoryStore, Store};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// State backed by a process-local store.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// State backed by the redb database at `db_path`, created if missing.
    pub fn open(db_path: &Path) -> aquapi_core::Result<Self> {
        let db = StoreDb::open(db_path)?;
        Ok(Self::new(Arc::new(db)))
    }
}
