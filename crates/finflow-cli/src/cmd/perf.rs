use crate::cmd::open_workspace;
use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use finflow_core::store::PerformanceFilter;
use std::path::Path;

#[derive(Subcommand)]
pub enum PerfSubcommand {
    /// List recorded prompt executions, newest first
    List {
        /// Only this template
        #[arg(long)]
        template: Option<String>,
        /// Only this conversation (the project id)
        #[arg(long)]
        conversation: Option<String>,
        /// Only failed executions
        #[arg(long, conflicts_with = "succeeded")]
        failed: bool,
        /// Only successful executions
        #[arg(long)]
        succeeded: bool,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub fn run(root: &Path, subcmd: PerfSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PerfSubcommand::List {
            template,
            conversation,
            failed,
            succeeded,
            limit,
        } => {
            let success = match (failed, succeeded) {
                (true, _) => Some(false),
                (_, true) => Some(true),
                _ => None,
            };
            let filter = PerformanceFilter {
                template_name: template,
                conversation_id: conversation,
                success,
                limit: Some(limit),
            };
            list(root, &filter, json)
        }
    }
}

fn list(root: &Path, filter: &PerformanceFilter, json: bool) -> anyhow::Result<()> {
    let (_, db) = open_workspace(root)?;
    let records = db.list_performance(filter)?;
    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No performance records.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                r.template_name.clone(),
                r.conversation_id.clone(),
                if r.success { "ok" } else { "failed" }.to_string(),
                r.latency_ms.to_string(),
                r.token_usage.total.to_string(),
                truncate(r.error_details.as_deref().unwrap_or(""), 40),
            ]
        })
        .collect();
    print_table(
        &["WHEN", "TEMPLATE", "CONVERSATION", "RESULT", "MS", "TOKENS", "ERROR"],
        rows,
    );
    Ok(())
}
