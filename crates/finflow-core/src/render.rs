use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{FinflowError, Result};
use crate::template::PromptTemplate;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap())
}

/// Fill the `{{key}}` placeholders of `template` from `variables`.
///
/// Every required declared variable must be supplied; otherwise the error
/// names all of the missing ones. Placeholders with no supplied value are
/// left as they are, and keys the template never mentions are ignored.
pub fn render(template: &PromptTemplate, variables: &HashMap<String, String>) -> Result<String> {
    let missing: Vec<String> = template
        .required_variables()
        .filter(|name| !variables.contains_key(*name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(FinflowError::MissingVariable {
            template: template.name.clone(),
            names: missing,
        });
    }

    // Single pass: substituted values are never rescanned for placeholders.
    let mut out = String::with_capacity(template.content.len());
    let mut rest = template.content.as_str();
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let key = &after[..end];
        out.push_str(&rest[..start]);
        match variables.get(key) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(key);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Distinct placeholder names in `content`, in order of first appearance.
pub fn placeholders(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for cap in placeholder_re().captures_iter(content) {
        let name = &cap[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Placeholders used in the content but not declared as variables.
pub fn undeclared_placeholders(template: &PromptTemplate) -> Vec<String> {
    placeholders(&template.content)
        .into_iter()
        .filter(|p| !template.variables.iter().any(|v| &v.name == p))
        .collect()
}
