use crate::cmd::open_workspace;
use crate::output::print_json;
use anyhow::Context;
use finflow_completion::{ClaudeCliService, CompletionGateway};
use finflow_core::{
    conversation::PhaseController,
    pipeline::PromptRunner,
    project::{ProjectRepository, YamlProjectStore},
};
use std::path::Path;
use std::sync::Arc;

pub fn run(
    root: &Path,
    project_id: &str,
    message: &str,
    user: &str,
    json: bool,
) -> anyhow::Result<()> {
    let (config, db) = open_workspace(root)?;

    let service = ClaudeCliService::new(config.completion.executable.clone())
        .with_cwd(root)
        .with_default_model(config.completion.model.clone());
    let gateway = CompletionGateway::new(Arc::new(service), config.retry.policy());
    let runner = PromptRunner::new(Arc::new(db), gateway).with_options(config.completion.options());

    let store = YamlProjectStore::new(root);
    let projects: Arc<dyn ProjectRepository> = Arc::new(store);
    let controller = PhaseController::with_prompted_generators(projects.clone(), Arc::new(runner));

    let rt = tokio::runtime::Runtime::new()?;
    let response = rt.block_on(async {
        let response = controller
            .process_message(project_id, message, user)
            .await
            .with_context(|| format!("failed to process message for '{project_id}'"))?;
        if let (true, Some(project)) = (response.update_project, &response.project_data) {
            projects
                .save(project)
                .await
                .with_context(|| format!("failed to save project '{project_id}'"))?;
            tracing::debug!(project = %project_id, status = ?project.status, "project saved");
        }
        anyhow::Ok(response)
    })?;

    if json {
        return print_json(&response);
    }
    println!("{}", response.message);
    if let Some(phase) = response.next_phase {
        println!("\n(moved to the {phase} phase)");
    }
    Ok(())
}
