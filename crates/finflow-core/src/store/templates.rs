use redb::ReadableTable;
use uuid::Uuid;

use super::{decode, encode, PromptDb, PROJECT_TEMPLATES, TEMPLATES};
use crate::error::{store_err, Result};
use crate::paths::{validate_project_id, validate_template_name};
use crate::template::{NewTemplate, ProjectPromptOverride, PromptTemplate, TemplatePatch};

/// Highest active version, else the highest version of any state.
fn pick_latest(versions: Vec<PromptTemplate>) -> Option<PromptTemplate> {
    let active = versions.iter().rposition(|t| t.active);
    let idx = active.or_else(|| versions.len().checked_sub(1))?;
    versions.into_iter().nth(idx)
}

// ---------------------------------------------------------------------------
// Global templates
// ---------------------------------------------------------------------------

impl PromptDb {
    /// Store a new version of `new.name`. The version is one past the highest
    /// existing version (inactive ones included), starting at 1.
    pub fn create_template(&self, new: NewTemplate) -> Result<PromptTemplate> {
        validate_template_name(&new.name)?;
        let name = new.name.clone();

        let wt = self.db.begin_write().map_err(store_err)?;
        let template = {
            let mut table = wt.open_table(TEMPLATES).map_err(store_err)?;
            let latest = match table
                .range((name.as_str(), 0u32)..=(name.as_str(), u32::MAX))
                .map_err(store_err)?
                .next_back()
            {
                Some(entry) => entry.map_err(store_err)?.0.value().1,
                None => 0,
            };
            let template = PromptTemplate::from_new(new, latest + 1);
            let value = encode(&template)?;
            table
                .insert((name.as_str(), template.version), value.as_slice())
                .map_err(store_err)?;
            template
        };
        wt.commit().map_err(store_err)?;

        tracing::debug!(template = %name, version = template.version, "created template");
        Ok(template)
    }

    /// Look up a template. With a version this is an exact lookup regardless
    /// of the active flag; without one it resolves the latest version.
    pub fn get_template(&self, name: &str, version: Option<u32>) -> Result<Option<PromptTemplate>> {
        match version {
            Some(v) => {
                let rt = self.db.begin_read().map_err(store_err)?;
                let table = rt.open_table(TEMPLATES).map_err(store_err)?;
                let found = table.get((name, v)).map_err(store_err)?;
                found.map(|g| decode(g.value())).transpose()
            }
            None => Ok(pick_latest(self.list_versions(name)?)),
        }
    }

    /// Every stored version of `name`, ascending.
    pub fn list_versions(&self, name: &str) -> Result<Vec<PromptTemplate>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(TEMPLATES).map_err(store_err)?;
        let mut result = Vec::new();
        for entry in table
            .range((name, 0u32)..=(name, u32::MAX))
            .map_err(store_err)?
        {
            let (_, v) = entry.map_err(store_err)?;
            result.push(decode(v.value())?);
        }
        Ok(result)
    }

    /// The resolved latest version of every template name, sorted by name.
    pub fn list_templates(&self) -> Result<Vec<PromptTemplate>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(TEMPLATES).map_err(store_err)?;

        let mut result = Vec::new();
        let mut group: Vec<PromptTemplate> = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            let template: PromptTemplate = decode(v.value())?;
            if group.first().is_some_and(|t| t.name != template.name) {
                result.extend(pick_latest(std::mem::take(&mut group)));
            }
            group.push(template);
        }
        result.extend(pick_latest(group));
        Ok(result)
    }

    /// Patch content, description or tags of one version in place.
    pub fn update_template(
        &self,
        name: &str,
        version: u32,
        patch: TemplatePatch,
    ) -> Result<Option<PromptTemplate>> {
        self.modify_template(name, version, |t| t.apply(patch))
    }

    pub fn set_template_active(
        &self,
        name: &str,
        version: u32,
        active: bool,
    ) -> Result<Option<PromptTemplate>> {
        self.modify_template(name, version, |t| {
            t.active = active;
            t.updated_at = chrono::Utc::now();
        })
    }

    fn modify_template(
        &self,
        name: &str,
        version: u32,
        f: impl FnOnce(&mut PromptTemplate),
    ) -> Result<Option<PromptTemplate>> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let updated = {
            let mut table = wt.open_table(TEMPLATES).map_err(store_err)?;
            let current: Option<PromptTemplate> = match table.get((name, version)).map_err(store_err)? {
                Some(g) => Some(decode(g.value())?),
                None => None,
            };
            match current {
                Some(mut template) => {
                    f(&mut template);
                    let value = encode(&template)?;
                    table
                        .insert((name, version), value.as_slice())
                        .map_err(store_err)?;
                    Some(template)
                }
                None => None,
            }
        };
        wt.commit().map_err(store_err)?;
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Project overrides
// ---------------------------------------------------------------------------

impl PromptDb {
    /// Store a new override version for `(project_id, new.name)`.
    ///
    /// Versions are numbered per project and name, independently of the
    /// global template. When `based_on` is `None` the override points at the
    /// global template it currently shadows, if there is one.
    pub fn create_project_template(
        &self,
        project_id: &str,
        new: NewTemplate,
        based_on: Option<Uuid>,
    ) -> Result<ProjectPromptOverride> {
        validate_project_id(project_id)?;
        validate_template_name(&new.name)?;
        let name = new.name.clone();
        let based_on = match based_on {
            Some(id) => Some(id),
            None => self.get_template(&name, None)?.map(|t| t.id),
        };

        let wt = self.db.begin_write().map_err(store_err)?;
        let record = {
            let mut table = wt.open_table(PROJECT_TEMPLATES).map_err(store_err)?;
            let latest = match table
                .range(
                    (project_id, name.as_str(), 0u32)..=(project_id, name.as_str(), u32::MAX),
                )
                .map_err(store_err)?
                .next_back()
            {
                Some(entry) => entry.map_err(store_err)?.0.value().2,
                None => 0,
            };
            let record = ProjectPromptOverride {
                project_id: project_id.to_string(),
                based_on,
                template: PromptTemplate::from_new(new, latest + 1),
            };
            let value = encode(&record)?;
            table
                .insert(
                    (project_id, name.as_str(), record.template.version),
                    value.as_slice(),
                )
                .map_err(store_err)?;
            record
        };
        wt.commit().map_err(store_err)?;

        tracing::debug!(
            project = project_id,
            template = %name,
            version = record.template.version,
            "created project template override"
        );
        Ok(record)
    }

    /// Resolve an override only. Without a version, only active overrides
    /// are candidates: a project whose overrides are all deactivated has no
    /// override.
    pub fn get_project_override(
        &self,
        project_id: &str,
        name: &str,
        version: Option<u32>,
    ) -> Result<Option<ProjectPromptOverride>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(PROJECT_TEMPLATES).map_err(store_err)?;

        if let Some(v) = version {
            let found = table.get((project_id, name, v)).map_err(store_err)?;
            return found.map(|g| decode(g.value())).transpose();
        }

        for entry in table
            .range((project_id, name, 0u32)..=(project_id, name, u32::MAX))
            .map_err(store_err)?
            .rev()
        {
            let (_, v) = entry.map_err(store_err)?;
            let record: ProjectPromptOverride = decode(v.value())?;
            if record.template.active {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Resolve a template for a project: its override first, then the global
    /// template.
    pub fn get_project_template(
        &self,
        project_id: &str,
        name: &str,
        version: Option<u32>,
    ) -> Result<Option<PromptTemplate>> {
        if let Some(record) = self.get_project_override(project_id, name, version)? {
            return Ok(Some(record.template));
        }
        self.get_template(name, version)
    }

    pub fn set_project_template_active(
        &self,
        project_id: &str,
        name: &str,
        version: u32,
        active: bool,
    ) -> Result<Option<ProjectPromptOverride>> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let updated = {
            let mut table = wt.open_table(PROJECT_TEMPLATES).map_err(store_err)?;
            let current: Option<ProjectPromptOverride> =
                match table.get((project_id, name, version)).map_err(store_err)? {
                    Some(g) => Some(decode(g.value())?),
                    None => None,
                };
            match current {
                Some(mut record) => {
                    record.template.active = active;
                    record.template.updated_at = chrono::Utc::now();
                    let value = encode(&record)?;
                    table
                        .insert((project_id, name, version), value.as_slice())
                        .map_err(store_err)?;
                    Some(record)
                }
                None => None,
            }
        };
        wt.commit().map_err(store_err)?;
        Ok(updated)
    }

    /// Every override version stored for `project_id`, by name then version.
    pub fn list_project_templates(&self, project_id: &str) -> Result<Vec<ProjectPromptOverride>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(PROJECT_TEMPLATES).map_err(store_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (k, v) = entry.map_err(store_err)?;
            if k.value().0 != project_id {
                continue;
            }
            result.push(decode(v.value())?);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FinflowError;
    use crate::store::open_tmp;
    use crate::types::TemplateCategory;

    fn new(name: &str, content: &str) -> NewTemplate {
        NewTemplate::new(name, content).category(TemplateCategory::Chat)
    }

    #[test]
    fn versions_start_at_one_and_increase_without_gaps() {
        let (_dir, db) = open_tmp();
        let v: Vec<u32> = (0..3)
            .map(|i| db.create_template(new("greet", &format!("v{i}"))).unwrap().version)
            .collect();
        assert_eq!(v, vec![1, 2, 3]);

        db.set_template_active("greet", 3, false).unwrap();
        let next = db.create_template(new("greet", "v4")).unwrap();
        assert_eq!(next.version, 4, "deactivated versions are never reused");
    }

    #[test]
    fn versions_are_per_name() {
        let (_dir, db) = open_tmp();
        db.create_template(new("a", "x")).unwrap();
        db.create_template(new("a", "y")).unwrap();
        assert_eq!(db.create_template(new("b", "z")).unwrap().version, 1);
    }

    #[test]
    fn latest_skips_inactive_versions() {
        let (_dir, db) = open_tmp();
        db.create_template(new("greet", "one")).unwrap();
        db.create_template(new("greet", "two")).unwrap();
        db.set_template_active("greet", 2, false).unwrap();

        let t = db.get_template("greet", None).unwrap().unwrap();
        assert_eq!(t.version, 1);
        assert_eq!(t.content, "one");
    }

    #[test]
    fn latest_falls_back_to_highest_when_none_active() {
        let (_dir, db) = open_tmp();
        db.create_template(new("greet", "one")).unwrap();
        db.create_template(new("greet", "two")).unwrap();
        db.set_template_active("greet", 1, false).unwrap();
        db.set_template_active("greet", 2, false).unwrap();

        let t = db.get_template("greet", None).unwrap().unwrap();
        assert_eq!(t.version, 2);
        assert!(!t.active);
    }

    #[test]
    fn explicit_version_ignores_active_flag() {
        let (_dir, db) = open_tmp();
        db.create_template(new("greet", "one")).unwrap();
        db.set_template_active("greet", 1, false).unwrap();
        let t = db.get_template("greet", Some(1)).unwrap().unwrap();
        assert_eq!(t.content, "one");
        assert!(db.get_template("greet", Some(9)).unwrap().is_none());
    }

    #[test]
    fn unknown_template_is_none() {
        let (_dir, db) = open_tmp();
        assert!(db.get_template("nope", None).unwrap().is_none());
        assert!(db.update_template("nope", 1, TemplatePatch::default()).unwrap().is_none());
    }

    #[test]
    fn update_patches_only_target_version() {
        let (_dir, db) = open_tmp();
        db.create_template(new("greet", "one")).unwrap();
        db.create_template(new("greet", "two")).unwrap();

        let patched = db
            .update_template(
                "greet",
                1,
                TemplatePatch {
                    content: Some("uno".into()),
                    description: Some("first".into()),
                    tags: None,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(patched.version, 1);
        assert_eq!(patched.content, "uno");

        assert_eq!(db.get_template("greet", Some(1)).unwrap().unwrap().content, "uno");
        assert_eq!(db.get_template("greet", Some(2)).unwrap().unwrap().content, "two");
    }

    #[test]
    fn invalid_name_is_rejected() {
        let (_dir, db) = open_tmp();
        let err = db.create_template(new("Bad Name", "x")).unwrap_err();
        assert!(matches!(err, FinflowError::InvalidTemplateName(_)));
    }

    #[test]
    fn list_templates_returns_resolved_latest_per_name() {
        let (_dir, db) = open_tmp();
        db.create_template(new("alpha", "a1")).unwrap();
        db.create_template(new("alpha", "a2")).unwrap();
        db.create_template(new("beta", "b1")).unwrap();
        db.set_template_active("alpha", 2, false).unwrap();

        let all = db.list_templates().unwrap();
        let summary: Vec<(&str, u32)> = all.iter().map(|t| (t.name.as_str(), t.version)).collect();
        assert_eq!(summary, vec![("alpha", 1), ("beta", 1)]);
        assert_eq!(db.list_versions("alpha").unwrap().len(), 2);
    }

    // --- overrides ---------------------------------------------------------

    #[test]
    fn override_takes_precedence_then_falls_back() {
        let (_dir, db) = open_tmp();
        let global = db.create_template(new("general_query", "global")).unwrap();
        let o = db
            .create_project_template("fx-dash", new("general_query", "override"), None)
            .unwrap();
        assert_eq!(o.based_on, Some(global.id));

        let t = db
            .get_project_template("fx-dash", "general_query", None)
            .unwrap()
            .unwrap();
        assert_eq!(t.content, "override");

        db.set_project_template_active("fx-dash", "general_query", 1, false)
            .unwrap();
        let t = db
            .get_project_template("fx-dash", "general_query", None)
            .unwrap()
            .unwrap();
        assert_eq!(t.content, "global");
    }

    #[test]
    fn other_projects_see_global_template() {
        let (_dir, db) = open_tmp();
        db.create_template(new("general_query", "global")).unwrap();
        db.create_project_template("fx-dash", new("general_query", "override"), None)
            .unwrap();
        let t = db
            .get_project_template("crypto-bot", "general_query", None)
            .unwrap()
            .unwrap();
        assert_eq!(t.content, "global");
    }

    #[test]
    fn override_versions_are_independent() {
        let (_dir, db) = open_tmp();
        for _ in 0..3 {
            db.create_template(new("general_query", "g")).unwrap();
        }
        let a1 = db
            .create_project_template("alpha", new("general_query", "a"), None)
            .unwrap();
        let a2 = db
            .create_project_template("alpha", new("general_query", "a"), None)
            .unwrap();
        let b1 = db
            .create_project_template("beta", new("general_query", "b"), None)
            .unwrap();
        assert_eq!(a1.template.version, 1);
        assert_eq!(a2.template.version, 2);
        assert_eq!(b1.template.version, 1);
        assert_eq!(db.list_project_templates("alpha").unwrap().len(), 2);
    }

    #[test]
    fn override_without_global_template() {
        let (_dir, db) = open_tmp();
        let o = db
            .create_project_template("fx-dash", new("custom_intro", "hello"), None)
            .unwrap();
        assert!(o.based_on.is_none());
        assert!(db.get_template("custom_intro", None).unwrap().is_none());
        assert!(db
            .get_project_template("fx-dash", "custom_intro", None)
            .unwrap()
            .is_some());
    }

    #[test]
    fn explicit_version_falls_back_to_global_version() {
        let (_dir, db) = open_tmp();
        db.create_template(new("general_query", "g1")).unwrap();
        db.create_template(new("general_query", "g2")).unwrap();
        db.create_project_template("fx-dash", new("general_query", "o1"), None)
            .unwrap();

        let v1 = db
            .get_project_template("fx-dash", "general_query", Some(1))
            .unwrap()
            .unwrap();
        assert_eq!(v1.content, "o1");
        let v2 = db
            .get_project_template("fx-dash", "general_query", Some(2))
            .unwrap()
            .unwrap();
        assert_eq!(v2.content, "g2");
    }
}
