pub mod api;
pub mod model;
pub mod notify;
pub mod service;
pub mod store;

use std::sync::Arc;

use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;

use memberd_core::{Module, Paginator, ServiceError};
use memberd_sql::DbPool;

use notify::Notifier;
use service::MemberService;
use store::MemberStore;

/// `[member]` table of the server config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberConfig {
    /// Prefix of generated member ids. A search value starting with it is
    /// treated as an id lookup.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

fn default_id_prefix() -> String {
    "MBR-".to_string()
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_id_prefix(),
        }
    }
}

/// The member module: accounts, imports and bulk notifications.
pub struct MemberModule {
    service: Arc<MemberService>,
}

impl MemberModule {
    /// Initialise storage and wire the usecases.
    pub fn new(
        pool: DbPool,
        config: &MemberConfig,
        paginator: Paginator,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ServiceError> {
        if config.id_prefix.trim().is_empty() {
            return Err(ServiceError::Validation("member id_prefix must not be empty".into()));
        }
        let store = MemberStore::new(pool, &config.id_prefix)?;
        info!(id_prefix = %config.id_prefix, "member store ready");
        Ok(Self {
            service: Arc::new(MemberService::new(store, paginator, notifier)),
        })
    }

    pub fn service(&self) -> &Arc<MemberService> {
        &self.service
    }
}

impl Module for MemberModule {
    fn name(&self) -> &str {
        "member"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}
