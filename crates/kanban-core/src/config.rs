use crate::column::BoardLayout;
use crate::error::{KanbanError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: u32,
    #[serde(default = "default_invite_ttl")]
    pub invite_ttl_hours: u32,
    #[serde(default)]
    pub secure_cookies: bool,
}

fn default_port() -> u16 {
    3141
}

fn default_cookie_name() -> String {
    "kanban_session".to_string()
}

fn default_session_ttl() -> u32 {
    24 * 7
}

fn default_invite_ttl() -> u32 {
    72
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cookie_name: default_cookie_name(),
            session_ttl_hours: default_session_ttl(),
            invite_ttl_hours: default_invite_ttl(),
            secure_cookies: false,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_max_attachment")]
    pub max_attachment_bytes: u64,
}

fn default_max_attachment() -> u64 {
    10 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: default_max_attachment(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub board: BoardLayout,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            board: BoardLayout::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load `.kanban/config.yaml`, rejecting configs with error-level warnings.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(KanbanError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;

        let errors: Vec<String> = cfg
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if !errors.is_empty() {
            return Err(KanbanError::InvalidInput(format!(
                "config.yaml: {}",
                errors.join("; ")
            )));
        }
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let columns = &self.board.columns;

        if columns.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "board.columns must list at least one column".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for col in columns {
            if paths::validate_slug(&col.id).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("column id '{}' is not a valid slug", col.id),
                });
            }
            if !seen.insert(col.id.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("duplicate column id '{}'", col.id),
                });
            }
            if col.capacity == Some(0) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("column '{}' has capacity 0", col.id),
                });
            }
            if col.intake && col.capacity.is_some() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "intake column '{}' has a capacity; task creation will fail once it fills",
                        col.id
                    ),
                });
            }
        }

        let intake_count = columns.iter().filter(|c| c.intake).count();
        if intake_count > 1 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("{intake_count} columns are marked intake; expected one"),
            });
        } else if intake_count == 0 && !columns.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "no intake column; new tasks will land in '{}'",
                    columns[0].id
                ),
            });
        }

        if self.server.session_ttl_hours == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "server.session_ttl_hours must be greater than 0".to_string(),
            });
        }

        let cookie = &self.server.cookie_name;
        if cookie.is_empty()
            || !cookie
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("server.cookie_name '{cookie}' must be alphanumeric, '_' or '-'"),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.board, BoardLayout::default());
        assert_eq!(parsed.server.cookie_name, "kanban_session");
    }

    #[test]
    fn missing_sections_use_defaults() {
        let parsed: Config = serde_yaml::from_str("version: 1\n").unwrap();
        assert_eq!(parsed.server.port, 3141);
        assert_eq!(parsed.board.columns.len(), 4);
        assert_eq!(parsed.storage.max_attachment_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn validate_default_config_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_duplicate_column() {
        let mut cfg = Config::default();
        cfg.board.columns.push(ColumnDef::new("done", "Done again"));
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("duplicate")));
    }

    #[test]
    fn validate_zero_capacity() {
        let mut cfg = Config::default();
        cfg.board.columns[1].capacity = Some(0);
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("capacity 0")));
    }

    #[test]
    fn validate_multiple_intake_columns() {
        let mut cfg = Config::default();
        cfg.board.columns[2].intake = true;
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("intake")));
    }

    #[test]
    fn validate_bad_column_slug() {
        let mut cfg = Config::default();
        cfg.board.columns[3].id = "Done Now".to_string();
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("not a valid slug")));
    }

    #[test]
    fn validate_cookie_name() {
        let mut cfg = Config::default();
        cfg.server.cookie_name = "bad name;".to_string();
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("cookie_name")));
    }

    #[test]
    fn load_rejects_error_level_config() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.board.columns.clear();
        cfg.save(dir.path()).unwrap();

        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, KanbanError::InvalidInput(_)));
    }

    #[test]
    fn load_without_init_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(KanbanError::NotInitialized)
        ));
    }
}
