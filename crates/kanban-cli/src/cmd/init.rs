use anyhow::Context;
use kanban_core::{config::Config, io, paths, Store};
use std::path::Path;

pub fn run(root: &Path, force: bool) -> anyhow::Result<()> {
    println!("Initializing kanban in: {}", root.display());

    let dir = paths::kanban_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    // 1. Write config.yaml if missing (or when forced)
    let config_path = paths::config_path(root);
    let config = if !config_path.exists() || force {
        let cfg = Config::default();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load existing config.yaml")?
    };

    // 2. Blob storage
    let blobs = paths::blobs_dir(root);
    io::ensure_dir(&blobs).with_context(|| format!("failed to create {}", blobs.display()))?;

    // 3. Database with every table created
    let existed = paths::database_path(root).exists();
    Store::open_project(root, &config).context("failed to create database")?;
    if existed {
        println!("  exists:  {}", paths::DATABASE_FILE);
    } else {
        println!("  created: {}", paths::DATABASE_FILE);
    }

    println!("\nNext: kanban account create --name <team> --email <you> --password <secret>");
    Ok(())
}
