use crate::error::Result;
use crate::store::PromptDb;
use crate::template::{NewTemplate, TemplateVariable};
use crate::types::TemplateCategory;

/// Names of the templates the engine resolves.
pub mod names {
    pub const DETERMINE_INTENT: &str = "determine_intent";
    pub const EXTRACT_REQUIREMENTS: &str = "extract_requirements";
    pub const GENERAL_QUERY: &str = "general_query";
    pub const BLUEPRINT_QUERY: &str = "blueprint_query";
    pub const BLUEPRINT_MODIFICATION: &str = "blueprint_modification";
    pub const GENERATE_BLUEPRINT: &str = "generate_blueprint";
    pub const GENERATE_COMPONENT: &str = "generate_component";
    pub const COMPONENT_QUERY: &str = "component_query";
}

const INTENT_PROMPT: &str = "\
Classify the intent of the user's message in a conversation about building a \
financial software project.

Answer with exactly one word from this list:
- query: the user asks a question or wants information
- generate: the user wants something created (a blueprint, a component, code)
- modify: the user wants to change something that already exists
- approve: the user accepts or confirms what was proposed
- reject: the user declines what was proposed

Message:
{{message}}

Intent:";

const EXTRACT_PROMPT: &str = "\
Extract project requirements from the user's message. Respond with a single \
JSON object and nothing else, using these keys:

{
  \"name\": project name or null,
  \"description\": one-sentence description or null,
  \"requirements\": detailed functional requirements or null,
  \"techStack\": array of technologies or null,
  \"financialDomain\": e.g. trading, payments, lending, or null,
  \"tradingVenue\": e.g. forex, equities, crypto, or null
}

Use null for anything the message does not state.

Message:
{{message}}";

const GENERAL_QUERY_PROMPT: &str = "\
You are an assistant helping a user design and build financial software.

Project so far:
{{project_context}}

Answer the user's message helpfully and concisely.

Message:
{{message}}";

const BLUEPRINT_QUERY_PROMPT: &str = "\
Answer the user's question about this architecture blueprint.

Blueprint (JSON):
{{blueprint}}

Question:
{{message}}";

const BLUEPRINT_MODIFICATION_PROMPT: &str = "\
The user wants to change the architecture blueprint below. Describe the \
changes you would make and why. Do not rewrite the whole blueprint.

Blueprint (JSON):
{{blueprint}}

Requested change:
{{message}}";

const GENERATE_BLUEPRINT_PROMPT: &str = "\
Design an architecture blueprint for this financial software project.

{{project_context}}

Respond with a single JSON object and nothing else:
{
  \"summary\": short overview,
  \"architecture\": description of the overall architecture,
  \"components\": [
    {\"name\": \"...\", \"description\": \"...\", \"dependencies\": [\"other component names\"]}
  ]
}";

const GENERATE_COMPONENT_PROMPT: &str = "\
Write the implementation of one component of a financial software project.

{{project_context}}

Blueprint (JSON):
{{blueprint}}

Component: {{component_name}}
Responsibilities: {{component_description}}

Respond with the source code only.";

const COMPONENT_QUERY_PROMPT: &str = "\
Answer the user's question about the components of this project.

Components:
{{components}}

Question:
{{message}}";

/// The built-in templates, at their initial content.
pub fn default_templates() -> Vec<NewTemplate> {
    vec![
        NewTemplate::new(names::DETERMINE_INTENT, INTENT_PROMPT)
            .category(TemplateCategory::Chat)
            .description("Classify a chat message as query, generate, modify, approve or reject")
            .variable(TemplateVariable::required("message")),
        NewTemplate::new(names::EXTRACT_REQUIREMENTS, EXTRACT_PROMPT)
            .category(TemplateCategory::Requirements)
            .description("Extract structured project requirements as JSON")
            .variable(TemplateVariable::required("message")),
        NewTemplate::new(names::GENERAL_QUERY, GENERAL_QUERY_PROMPT)
            .category(TemplateCategory::General)
            .description("Answer a general question with the project as context")
            .variable(TemplateVariable::required("message"))
            .variable(TemplateVariable::optional("project_context")),
        NewTemplate::new(names::BLUEPRINT_QUERY, BLUEPRINT_QUERY_PROMPT)
            .category(TemplateCategory::Blueprint)
            .variable(TemplateVariable::required("message"))
            .variable(TemplateVariable::required("blueprint")),
        NewTemplate::new(names::BLUEPRINT_MODIFICATION, BLUEPRINT_MODIFICATION_PROMPT)
            .category(TemplateCategory::Blueprint)
            .description("Suggest blueprint changes without applying them")
            .variable(TemplateVariable::required("message"))
            .variable(TemplateVariable::required("blueprint")),
        NewTemplate::new(names::GENERATE_BLUEPRINT, GENERATE_BLUEPRINT_PROMPT)
            .category(TemplateCategory::Blueprint)
            .description("Produce a blueprint with its component list as JSON")
            .variable(TemplateVariable::required("project_context")),
        NewTemplate::new(names::GENERATE_COMPONENT, GENERATE_COMPONENT_PROMPT)
            .category(TemplateCategory::Component)
            .variable(TemplateVariable::required("component_name"))
            .variable(TemplateVariable::required("component_description"))
            .variable(TemplateVariable::optional("project_context"))
            .variable(TemplateVariable::optional("blueprint")),
        NewTemplate::new(names::COMPONENT_QUERY, COMPONENT_QUERY_PROMPT)
            .category(TemplateCategory::Component)
            .variable(TemplateVariable::required("message"))
            .variable(TemplateVariable::required("components")),
    ]
}

/// Create version 1 of every built-in template that has no version yet.
/// Returns the names created.
pub fn seed_default_templates(db: &PromptDb) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for template in default_templates() {
        if db.get_template(&template.name, None)?.is_some() {
            continue;
        }
        created.push(db.create_template(template)?.name);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::undeclared_placeholders;
    use crate::store::open_tmp;
    use crate::template::PromptTemplate;

    #[test]
    fn seeding_is_idempotent() {
        let (_dir, db) = open_tmp();
        let first = seed_default_templates(&db).unwrap();
        assert_eq!(first.len(), 8);
        let second = seed_default_templates(&db).unwrap();
        assert!(second.is_empty());
        assert_eq!(db.list_versions(names::DETERMINE_INTENT).unwrap().len(), 1);
    }

    #[test]
    fn every_placeholder_is_declared() {
        for new in default_templates() {
            let name = new.name.clone();
            let t = PromptTemplate::from_new(new, 1);
            assert!(
                undeclared_placeholders(&t).is_empty(),
                "{name} has undeclared placeholders"
            );
        }
    }
}
