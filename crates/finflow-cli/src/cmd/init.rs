use anyhow::Context;
use finflow_core::{config::Config, defaults, paths, store::PromptDb};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing finflow in: {}", root.display());

    for dir in [paths::FINFLOW_DIR, paths::PROJECTS_DIR] {
        let p = root.join(dir);
        std::fs::create_dir_all(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load config")?
    } else {
        let cfg = Config::default();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    let db_path = config.database_path(root);
    let db = PromptDb::open(&db_path)
        .with_context(|| format!("failed to open prompt database {}", db_path.display()))?;
    let seeded = defaults::seed_default_templates(&db).context("failed to seed templates")?;
    if seeded.is_empty() {
        println!("  exists:  built-in templates");
    } else {
        for name in &seeded {
            println!("  seeded:  template {name}");
        }
    }

    println!("\nfinflow initialized. Create a project with: finflow project create <id>");
    Ok(())
}
