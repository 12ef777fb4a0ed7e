use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use kanban_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        return print_json(&config);
    }

    println!("port:           {}", config.server.port);
    println!("session ttl:    {}h", config.server.session_ttl_hours);
    println!("invite ttl:     {}h", config.server.invite_ttl_hours);
    println!("max attachment: {} bytes", config.storage.max_attachment_bytes);
    println!();
    let rows: Vec<Vec<String>> = config
        .board
        .columns
        .iter()
        .map(|c| {
            vec![
                c.id.clone(),
                c.title.clone(),
                c.capacity.map_or_else(|| "-".to_string(), |n| n.to_string()),
                if c.intake { "yes" } else { "" }.to_string(),
            ]
        })
        .collect();
    print_table(&["COLUMN", "TITLE", "CAPACITY", "INTAKE"], &rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let path = kanban_core::paths::config_path(root);
    if !path.exists() {
        return Err(kanban_core::KanbanError::NotInitialized.into());
    }
    // Parse without Config::load so error-level findings are listed, not just rejected.
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data).context("config.yaml is not valid YAML")?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
