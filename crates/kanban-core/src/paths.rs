use crate::error::{KanbanError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const KANBAN_DIR: &str = ".kanban";
pub const BLOBS_DIR: &str = ".kanban/blobs";

pub const CONFIG_FILE: &str = ".kanban/config.yaml";
pub const DATABASE_FILE: &str = ".kanban/kanban.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn kanban_dir(root: &Path) -> PathBuf {
    root.join(KANBAN_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE)
}

pub fn blobs_dir(root: &Path) -> PathBuf {
    root.join(BLOBS_DIR)
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").expect("slug regex is valid")
    })
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(KanbanError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
