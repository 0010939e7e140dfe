use crate::cmd::open_workspace;
use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use clap::{Args, Subcommand};
use finflow_core::{
    render::undeclared_placeholders,
    store::PromptDb,
    template::{NewTemplate, PromptTemplate, TemplatePatch, TemplateVariable},
    types::TemplateCategory,
};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum TemplateSubcommand {
    /// Create a new version of a template (version 1 if the name is new)
    Create {
        name: String,
        #[command(flatten)]
        body: TemplateBody,
    },

    /// Show a template (latest resolved version unless --version is given)
    Show {
        name: String,
        #[arg(long = "version", id = "template_version", value_name = "VERSION")]
        version: Option<u32>,
        /// Resolve through this project's overrides first
        #[arg(long)]
        project: Option<String>,
    },

    /// List the resolved latest version of every template
    List,

    /// List every version of one template
    Versions { name: String },

    /// Patch the content, description or tags of one version
    Update {
        name: String,
        #[arg(id = "template_version", value_name = "VERSION")]
        version: u32,
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// Read the new content from a file
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        description: Option<String>,
        /// Replace the tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Mark a version active
    Activate {
        name: String,
        #[arg(id = "template_version", value_name = "VERSION")]
        version: u32,
    },

    /// Mark a version inactive
    Deactivate {
        name: String,
        #[arg(id = "template_version", value_name = "VERSION")]
        version: u32,
    },

    /// Manage per-project template overrides
    Override {
        #[command(subcommand)]
        subcommand: OverrideSubcommand,
    },
}

#[derive(Subcommand)]
pub enum OverrideSubcommand {
    /// Create a new override version for a project
    Create {
        project: String,
        name: String,
        #[command(flatten)]
        body: TemplateBody,
    },

    /// List a project's overrides
    List { project: String },

    /// Mark an override version active
    Activate {
        project: String,
        name: String,
        #[arg(id = "template_version", value_name = "VERSION")]
        version: u32,
    },

    /// Mark an override version inactive (falls back to the global template)
    Deactivate {
        project: String,
        name: String,
        #[arg(id = "template_version", value_name = "VERSION")]
        version: u32,
    },
}

#[derive(Args)]
pub struct TemplateBody {
    /// Template content with {{placeholders}}
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    content: Option<String>,
    /// Read the content from a file
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    description: Option<String>,
    /// general, requirements, blueprint, component, support or chat
    #[arg(long, default_value = "general")]
    category: String,
    /// Tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// Required variable name (repeatable)
    #[arg(long = "var")]
    vars: Vec<String>,
    /// Optional variable name (repeatable)
    #[arg(long = "optional-var")]
    optional_vars: Vec<String>,
}

impl TemplateBody {
    fn into_new(self, name: String) -> anyhow::Result<NewTemplate> {
        let content = read_content(self.content, self.file.as_deref())?
            .context("--content or --file is required")?;
        let category: TemplateCategory = self.category.parse()?;
        let mut new = NewTemplate::new(name, content).category(category);
        if let Some(d) = self.description {
            new = new.description(d);
        }
        for tag in self.tags {
            new = new.tag(tag);
        }
        for var in self.vars {
            new = new.variable(TemplateVariable::required(var));
        }
        for var in self.optional_vars {
            new = new.variable(TemplateVariable::optional(var));
        }
        Ok(new)
    }
}

fn read_content(inline: Option<String>, file: Option<&Path>) -> anyhow::Result<Option<String>> {
    match (inline, file) {
        (Some(c), _) => Ok(Some(c)),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("failed to read {}", path.display())),
        (None, None) => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: TemplateSubcommand, json: bool) -> anyhow::Result<()> {
    let (_, db) = open_workspace(root)?;
    match subcmd {
        TemplateSubcommand::Create { name, body } => create(&db, name, body, json),
        TemplateSubcommand::Show {
            name,
            version,
            project,
        } => show(&db, &name, version, project.as_deref(), json),
        TemplateSubcommand::List => list(&db, json),
        TemplateSubcommand::Versions { name } => versions(&db, &name, json),
        TemplateSubcommand::Update {
            name,
            version,
            content,
            file,
            description,
            tags,
        } => {
            let patch = TemplatePatch {
                content: read_content(content, file.as_deref())?,
                description,
                tags: (!tags.is_empty()).then_some(tags),
            };
            update(&db, &name, version, patch, json)
        }
        TemplateSubcommand::Activate { name, version } => {
            set_active(&db, &name, version, true, json)
        }
        TemplateSubcommand::Deactivate { name, version } => {
            set_active(&db, &name, version, false, json)
        }
        TemplateSubcommand::Override { subcommand } => run_override(&db, subcommand, json),
    }
}

// ---------------------------------------------------------------------------
// Global templates
// ---------------------------------------------------------------------------

fn create(db: &PromptDb, name: String, body: TemplateBody, json: bool) -> anyhow::Result<()> {
    let new = body.into_new(name)?;
    let template = db.create_template(new).context("failed to create template")?;
    let undeclared = undeclared_placeholders(&template);

    if json {
        return print_json(&serde_json::json!({
            "template": template,
            "undeclared_placeholders": undeclared,
        }));
    }
    println!("Created template '{}' v{}.", template.name, template.version);
    warn_undeclared(&undeclared);
    Ok(())
}

fn warn_undeclared(undeclared: &[String]) {
    if !undeclared.is_empty() {
        eprintln!(
            "warning: placeholders not declared as variables: {}",
            undeclared.join(", ")
        );
    }
}

fn show(
    db: &PromptDb,
    name: &str,
    version: Option<u32>,
    project: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let template = match project {
        Some(p) => db.get_project_template(p, name, version)?,
        None => db.get_template(name, version)?,
    };
    let template = template.with_context(|| match version {
        Some(v) => format!("template '{name}' v{v} not found"),
        None => format!("template '{name}' not found"),
    })?;

    if json {
        return print_json(&template);
    }
    print_template(&template);
    Ok(())
}

fn print_template(t: &PromptTemplate) {
    println!("Template: {} v{}", t.name, t.version);
    println!("Id:       {}", t.id);
    println!("Category: {}", t.category);
    println!("Active:   {}", if t.active { "yes" } else { "no" });
    if let Some(d) = &t.description {
        println!("About:    {d}");
    }
    if !t.tags.is_empty() {
        println!("Tags:     {}", t.tags.join(", "));
    }
    if !t.variables.is_empty() {
        let vars: Vec<String> = t
            .variables
            .iter()
            .map(|v| {
                if v.required {
                    v.name.clone()
                } else {
                    format!("{}?", v.name)
                }
            })
            .collect();
        println!("Vars:     {}", vars.join(", "));
    }
    println!("\n{}", t.content);
}

fn template_rows(templates: &[PromptTemplate]) -> Vec<Vec<String>> {
    templates
        .iter()
        .map(|t| {
            vec![
                t.name.clone(),
                t.version.to_string(),
                t.category.to_string(),
                if t.active { "yes" } else { "no" }.to_string(),
                truncate(t.description.as_deref().unwrap_or("-"), 48),
            ]
        })
        .collect()
}

fn list(db: &PromptDb, json: bool) -> anyhow::Result<()> {
    let templates = db.list_templates().context("failed to list templates")?;
    if json {
        return print_json(&templates);
    }
    if templates.is_empty() {
        println!("No templates. Run 'finflow init' to seed the built-ins.");
        return Ok(());
    }
    print_table(
        &["NAME", "VERSION", "CATEGORY", "ACTIVE", "DESCRIPTION"],
        template_rows(&templates),
    );
    Ok(())
}

fn versions(db: &PromptDb, name: &str, json: bool) -> anyhow::Result<()> {
    let versions = db.list_versions(name)?;
    if versions.is_empty() {
        anyhow::bail!("template '{name}' not found");
    }
    if json {
        return print_json(&versions);
    }
    print_table(
        &["NAME", "VERSION", "CATEGORY", "ACTIVE", "DESCRIPTION"],
        template_rows(&versions),
    );
    Ok(())
}

fn update(
    db: &PromptDb,
    name: &str,
    version: u32,
    patch: TemplatePatch,
    json: bool,
) -> anyhow::Result<()> {
    if patch.is_empty() {
        anyhow::bail!("nothing to update: pass --content, --file, --description or --tag");
    }
    let template = db
        .update_template(name, version, patch)?
        .with_context(|| format!("template '{name}' v{version} not found"))?;
    if json {
        return print_json(&template);
    }
    println!("Updated template '{name}' v{version}.");
    warn_undeclared(&undeclared_placeholders(&template));
    Ok(())
}

fn set_active(
    db: &PromptDb,
    name: &str,
    version: u32,
    active: bool,
    json: bool,
) -> anyhow::Result<()> {
    let template = db
        .set_template_active(name, version, active)?
        .with_context(|| format!("template '{name}' v{version} not found"))?;
    if json {
        return print_json(&template);
    }
    let state = if active { "activated" } else { "deactivated" };
    println!("Template '{name}' v{version} {state}.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Project overrides
// ---------------------------------------------------------------------------

fn run_override(db: &PromptDb, subcmd: OverrideSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        OverrideSubcommand::Create {
            project,
            name,
            body,
        } => {
            let new = body.into_new(name)?;
            let record = db
                .create_project_template(&project, new, None)
                .context("failed to create override")?;
            let undeclared = undeclared_placeholders(&record.template);
            if json {
                return print_json(&serde_json::json!({
                    "override": record,
                    "undeclared_placeholders": undeclared,
                }));
            }
            println!(
                "Created override '{}' v{} for project '{project}'.",
                record.template.name, record.template.version
            );
            warn_undeclared(&undeclared);
            Ok(())
        }
        OverrideSubcommand::List { project } => {
            let records = db.list_project_templates(&project)?;
            if json {
                return print_json(&records);
            }
            if records.is_empty() {
                println!("Project '{project}' has no overrides.");
                return Ok(());
            }
            let rows = records
                .iter()
                .map(|r| {
                    vec![
                        r.template.name.clone(),
                        r.template.version.to_string(),
                        if r.template.active { "yes" } else { "no" }.to_string(),
                        r.based_on
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            print_table(&["NAME", "VERSION", "ACTIVE", "BASED ON"], rows);
            Ok(())
        }
        OverrideSubcommand::Activate {
            project,
            name,
            version,
        } => set_override_active(db, &project, &name, version, true, json),
        OverrideSubcommand::Deactivate {
            project,
            name,
            version,
        } => set_override_active(db, &project, &name, version, false, json),
    }
}

fn set_override_active(
    db: &PromptDb,
    project: &str,
    name: &str,
    version: u32,
    active: bool,
    json: bool,
) -> anyhow::Result<()> {
    let record = db
        .set_project_template_active(project, name, version, active)?
        .with_context(|| format!("override '{name}' v{version} not found for '{project}'"))?;
    if json {
        return print_json(&record);
    }
    let state = if active { "activated" } else { "deactivated" };
    println!("Override '{name}' v{version} for '{project}' {state}.");
    Ok(())
}
