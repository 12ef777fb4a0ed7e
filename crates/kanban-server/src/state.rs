use std::path::Path;
use std::sync::Arc;

use kanban_core::attachment::{BlobStore, FsBlobStore};
use kanban_core::config::Config;
use kanban_core::{paths, Store};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, blobs: Arc<dyn BlobStore>, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            blobs,
            config: Arc::new(config),
        }
    }

    /// Open the project rooted at `root`: config, database and blob directory.
    pub fn load(root: &Path) -> kanban_core::Result<Self> {
        let config = Config::load(root)?;
        let store = Store::open_project(root, &config)?;
        let blobs = FsBlobStore::new(paths::blobs_dir(root))?;
        Ok(Self::new(store, Arc::new(blobs), config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_core::KanbanError;

    #[test]
    fn load_requires_initialized_project() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            AppState::load(dir.path()),
            Err(KanbanError::NotInitialized)
        ));
    }

    #[test]
    fn load_opens_initialized_project() {
        let dir = tempfile::TempDir::new().unwrap();
        Config::default().save(dir.path()).unwrap();
        let state = AppState::load(dir.path()).unwrap();
        assert_eq!(state.config.server.port, 3141);
        assert!(paths::blobs_dir(dir.path()).is_dir());
    }
}
