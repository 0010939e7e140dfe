mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, perf::PerfSubcommand, project::ProjectSubcommand,
    template::TemplateSubcommand,
};
use std::path::PathBuf;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser)]
#[command(
    name = "finflow",
    about = "Chat-driven assistant that takes a financial project from requirements to code",
    version
)]
struct Cli {
    /// Workspace root (default: auto-detect from .finflow/ or .git/)
    #[arg(long, global = true, env = "FINFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at info level (-v) or debug level (-vv); a non-empty RUST_LOG wins
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a finflow workspace and seed the built-in templates
    Init,

    /// Manage prompt templates and per-project overrides
    Template {
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        subcommand: ProjectSubcommand,
    },

    /// Send one chat message to a project
    Chat {
        /// Project id
        project: String,

        /// The message to send
        message: String,

        /// Who is sending the message
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Inspect prompt performance records
    Perf {
        #[command(subcommand)]
        subcommand: PerfSubcommand,
    },

    /// Inspect and validate the workspace configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// RUST_LOG directives when set, otherwise a level chosen by `-v`.
fn log_filter(verbose: u8, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log.map(str::trim).filter(|d| !d.is_empty()) {
        return EnvFilter::new(directives);
    }
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    EnvFilter::new(level.to_string())
}

fn main() {
    let cli = Cli::parse();

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Template { subcommand } => cmd::template::run(&root, subcommand, cli.json),
        Commands::Project { subcommand } => cmd::project::run(&root, subcommand, cli.json),
        Commands::Chat {
            project,
            message,
            user,
        } => cmd::chat::run(&root, &project, &message, &user, cli.json),
        Commands::Perf { subcommand } => cmd::perf::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn template_version_flag_parses() {
        let cli = Cli::try_parse_from(["finflow", "template", "show", "greeting", "--version", "2"])
            .unwrap();
        match cli.command {
            Commands::Template {
                subcommand: TemplateSubcommand::Show { version, .. },
            } => assert_eq!(version, Some(2)),
            _ => panic!("expected template show"),
        }
    }

    #[test]
    fn verbosity_sets_the_default_level() {
        assert_eq!(log_filter(0, None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(1, None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(3, Some("  ")).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        assert_eq!(log_filter(0, Some("trace")).max_level_hint(), Some(LevelFilter::TRACE));
        assert_eq!(log_filter(2, Some("error")).max_level_hint(), Some(LevelFilter::ERROR));
    }
}
