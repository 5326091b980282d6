use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use explorer_core::comments::SeedComments;
use explorer_core::error::CoreError;
use explorer_core::guide::GuideCatalog;
use explorer_core::normalize::SourceKind;
use explorer_core::source::EntitySource;
use explorer_db::local_cache::LocalCache;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// The relational store. Tests substitute an in-memory source.
    pub remote: Arc<dyn EntitySource>,
    /// Local mirror, favorites and user comments.
    pub local: Arc<LocalCache>,
    pub guides: Arc<GuideCatalog>,
    pub seed_comments: Arc<SeedComments>,
}

impl AppState {
    /// The backend for a given source kind.
    pub fn source(&self, kind: SourceKind) -> &dyn EntitySource {
        match kind {
            SourceKind::Remote => self.remote.as_ref(),
            SourceKind::Local => self.local.as_ref(),
        }
    }
}

/// Load the guide collection. A missing file is an empty catalog.
pub fn load_guides(path: &Path) -> Result<GuideCatalog, CoreError> {
    match read_optional(path)? {
        Some(json) => GuideCatalog::from_json(&json),
        None => {
            tracing::warn!(path = %path.display(), "Guides file not found, serving no guides");
            Ok(GuideCatalog::default())
        }
    }
}

/// Load curated seed comments. A missing file means no seeds.
pub fn load_seed_comments(path: &Path) -> Result<SeedComments, CoreError> {
    match read_optional(path)? {
        Some(json) => SeedComments::from_json(&json),
        None => {
            tracing::warn!(path = %path.display(), "Seed comments file not found");
            Ok(SeedComments::default())
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, CoreError> {
    match std::fs::read_to_string(path) {
        Ok(json) => Ok(Some(json)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::Internal(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn missing_files_load_as_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_guides(&dir.path().join("guides.json")).unwrap().is_empty());
        assert!(load_seed_comments(&dir.path().join("seeds.json")).unwrap().is_empty());
    }

    #[test]
    fn malformed_files_are_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guides.json");
        std::fs::write(&path, "{ not a list").unwrap();
        assert_matches!(load_guides(&path), Err(CoreError::Parse(_)));
    }

    #[test]
    fn bundled_data_files_parse() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data");
        let guides = load_guides(&root.join("guides.json")).unwrap();
        assert!(!guides.is_empty());
        let seeds = load_seed_comments(&root.join("seed_comments.json")).unwrap();
        assert!(!seeds.is_empty());
    }
}
