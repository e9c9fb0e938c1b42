//! Generic API resources.
//!
//! The automation controllers return heterogeneous JSON objects. Most fields
//! are passed through opaquely; a small stable subset (id, name, the
//! `summary_fields` cross-references) is read through typed accessors.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// A generic API resource (organization, team, credential, job template...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct Resource(pub Map<String, Value>);

impl Resource {
    /// The numeric ID of the resource, or 0 when absent.
    pub fn id(&self) -> i64 {
        value_to_i64(self.0.get("id"))
    }

    /// The natural key of the resource: `name`, falling back to `username`.
    pub fn name(&self) -> &str {
        self.str_field("name")
            .filter(|s| !s.is_empty())
            .or_else(|| self.str_field("username"))
            .unwrap_or("")
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// String field with `""` standing in for null/missing/wrong type.
    pub fn str_field_or_empty(&self, field: &str) -> &str {
        self.str_field(field).unwrap_or("")
    }

    pub fn int_field(&self, field: &str) -> i64 {
        value_to_i64(self.0.get(field))
    }

    pub fn bool_field(&self, field: &str) -> bool {
        self.0
            .get(field)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Navigates `summary_fields.{section}.{field}`.
    pub fn summary_field(&self, section: &str, field: &str) -> Option<&Value> {
        self.0
            .get("summary_fields")?
            .as_object()?
            .get(section)?
            .as_object()?
            .get(field)
    }

    fn summary_name(&self, section: &str) -> Option<&str> {
        self.summary_field(section, "name").and_then(Value::as_str)
    }

    /// `summary_fields.organization.name`
    pub fn org_name(&self) -> &str {
        self.summary_name("organization").unwrap_or("")
    }

    /// `summary_fields.project.name`
    pub fn project_name(&self) -> &str {
        self.summary_name("project").unwrap_or("")
    }

    /// `summary_fields.inventory.name`
    pub fn inventory_name(&self) -> &str {
        self.summary_name("inventory").unwrap_or("")
    }

    /// `summary_fields.credential_type.name`
    pub fn credential_type_name(&self) -> &str {
        self.summary_name("credential_type").unwrap_or("")
    }

    /// `summary_fields.credential.name` (the SCM credential on projects)
    pub fn scm_credential_name(&self) -> &str {
        self.summary_name("credential").unwrap_or("")
    }

    /// `summary_fields.unified_job_template.name` (schedules, workflow nodes)
    pub fn unified_job_template_name(&self) -> &str {
        self.summary_name("unified_job_template").unwrap_or("")
    }

    /// Names from `summary_fields.credentials[].name` (job templates).
    pub fn credential_names(&self) -> Vec<&str> {
        self.0
            .get("summary_fields")
            .and_then(Value::as_object)
            .and_then(|sf| sf.get("credentials"))
            .and_then(Value::as_array)
            .map(|creds| {
                creds
                    .iter()
                    .filter_map(|c| c.as_object()?.get("name")?.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Numeric IDs from an edge list field (`success_nodes` and friends).
    pub fn id_list(&self, field: &str) -> Vec<i64> {
        self.0
            .get(field)
            .and_then(Value::as_array)
            .map(|ids| ids.iter().map(|v| value_to_i64(Some(v))).collect())
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for Resource {
    fn from(map: Map<String, Value>) -> Self {
        Resource(map)
    }
}

/// Converts a loose JSON value to an i64, 0 for anything non-numeric.
pub fn value_to_i64(v: Option<&Value>) -> i64 {
    v.and_then(Value::as_i64).unwrap_or(0)
}

/// Static descriptor for a browsable resource kind on a platform.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResourceType {
    /// Stable machine key, e.g. `job_templates`.
    pub name: String,
    /// Human-readable label, e.g. "Job Templates".
    pub label: String,
    /// API path template, e.g. `/api/v2/job_templates/`.
    pub api_path: String,
    /// Names that must never be deleted.
    #[serde(skip)]
    pub skip: HashSet<String>,
    /// Minimum platform version offering this kind; empty = always.
    #[serde(skip)]
    pub min_version: String,
}

impl ResourceType {
    pub fn new(name: &str, label: &str, api_path: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            api_path: api_path.to_string(),
            skip: HashSet::new(),
            min_version: String::new(),
        }
    }

    pub fn with_skip(mut self, names: &[&str]) -> Self {
        self.skip = names.iter().map(|s| s.to_string()).collect();
        self
    }
}
