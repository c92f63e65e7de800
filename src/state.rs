//! Shared application state: the immutable registry plus the store and
//! storage collaborators, loaded once at startup and passed to every
//! handler.

use crate::schema::Registry;
use crate::storage::FileStorage;
use crate::store::DataStore;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RouterOptions {
    /// Prefix under which the admin surface is mounted, e.g. "/admin".
    /// Redirect destinations are built from it.
    pub base_path: String,
    /// In development mode classified store errors are rethrown with full
    /// diagnostics instead of being sanitized.
    pub dev_mode: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            base_path: "/admin".to_string(),
            dev_mode: false,
        }
    }
}

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn DataStore>,
    pub storage: Arc<dyn FileStorage>,
    pub options: Arc<RouterOptions>,
}

impl AdminState {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn DataStore>,
        storage: Arc<dyn FileStorage>,
        options: RouterOptions,
    ) -> Self {
        AdminState {
            registry,
            store,
            storage,
            options: Arc::new(options),
        }
    }
}
