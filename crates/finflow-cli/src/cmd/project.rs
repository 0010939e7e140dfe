use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use finflow_core::{config::Config, project::YamlProjectStore};
use std::path::Path;

#[derive(Subcommand)]
pub enum ProjectSubcommand {
    /// Create a project in the requirements phase
    Create {
        /// Project id (lowercase letters, digits and hyphens)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show one project with its phase, requirements and components
    Show { id: String },

    /// List all projects
    List,
}

pub fn run(root: &Path, subcmd: ProjectSubcommand, json: bool) -> anyhow::Result<()> {
    // Projects live in the workspace, so require it to be initialized.
    Config::load(root).context("failed to load config")?;
    let store = YamlProjectStore::new(root);
    match subcmd {
        ProjectSubcommand::Create { id, name, owner } => create(&store, &id, name, owner, json),
        ProjectSubcommand::Show { id } => show(&store, &id, json),
        ProjectSubcommand::List => list(&store, json),
    }
}

fn create(
    store: &YamlProjectStore,
    id: &str,
    name: Option<String>,
    owner: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let project = store
        .create(id, name, owner)
        .with_context(|| format!("failed to create project '{id}'"))?;
    if json {
        return print_json(&project);
    }
    println!("Created project '{}' ({} phase).", project.id, project.phase());
    Ok(())
}

fn show(store: &YamlProjectStore, id: &str, json: bool) -> anyhow::Result<()> {
    let project = store
        .read(id)?
        .with_context(|| format!("project '{id}' not found"))?;
    if json {
        return print_json(&project);
    }

    println!("Project: {}", project.id);
    println!("Phase:   {}", project.phase());
    println!(
        "Status:  {}",
        project.status.as_deref().unwrap_or("(none)")
    );
    if let Some(owner) = &project.owner {
        println!("Owner:   {owner}");
    }
    println!("\n{}", project.context());

    let missing = project.missing_requirements();
    if !missing.is_empty() {
        println!("\nStill needed: {}", missing.join(", "));
    }

    if !project.components.is_empty() {
        println!();
        let rows = project
            .components
            .iter()
            .map(|c| {
                vec![
                    c.name.clone(),
                    c.status.to_string(),
                    if c.dependencies.is_empty() {
                        "-".to_string()
                    } else {
                        c.dependencies.join(", ")
                    },
                ]
            })
            .collect();
        print_table(&["COMPONENT", "STATUS", "DEPENDS ON"], rows);
    }
    Ok(())
}

fn list(store: &YamlProjectStore, json: bool) -> anyhow::Result<()> {
    let projects = store.list().context("failed to list projects")?;
    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects. Create one with: finflow project create <id>");
        return Ok(());
    }
    let rows = projects
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.name.clone().unwrap_or_else(|| "-".to_string()),
                p.phase().to_string(),
                p.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "PHASE", "UPDATED"], rows);
    Ok(())
}
