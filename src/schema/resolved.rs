//! Resolved resource model: descriptors validated and flattened for runtime
//! use, with per-field customization hooks attached.

use crate::payload::{FieldValue, FormMode, FormattedPayload, RawValue};
use crate::schema::types::{Multiplicity, ScalarType};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Custom formatter override: raw submitted value plus create/update mode,
/// returning the store-ready value or a violation message.
pub type FormatFn = dyn Fn(&RawValue, FormMode) -> Result<FieldValue, String> + Send + Sync;

/// Custom validation function: formatted value plus the whole payload so
/// cross-field rules are possible. Err is a violation message.
pub type ValidateFn = dyn Fn(&FieldValue, &FormattedPayload) -> Result<(), String> + Send + Sync;

/// Identifier type for coercing path segments and delete-many bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdType {
    Int,
    Uuid,
    Text,
}

#[derive(Clone, Debug)]
pub struct RelationSpec {
    /// Name of the referenced resource.
    pub resource: String,
    /// FK column: ours for to_one, the related resource's for to_many.
    pub fk_column: String,
    pub multiplicity: Multiplicity,
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    Scalar(ScalarType),
    Relation(RelationSpec),
    File,
}

/// Declarative per-field rules checked by the validator.
#[derive(Clone, Debug, Default)]
pub struct FieldRules {
    pub pattern: Option<String>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
}

#[derive(Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub unique: bool,
    pub alias: Option<String>,
    pub rules: FieldRules,
    pub formatter: Option<Arc<FormatFn>>,
    pub validator: Option<Arc<ValidateFn>>,
}

impl Field {
    /// Human label used in violation messages.
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("alias", &self.alias)
            .field("rules", &self.rules)
            .field("formatter", &self.formatter.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Resource {
    /// Canonical name, e.g. "Post". Lookup is case-insensitive.
    pub name: String,
    /// URL segment used in redirect destinations (lowercased name).
    pub path_segment: String,
    /// Backing table/collection name.
    pub table: String,
    pub id_field: String,
    pub fields: Vec<Field>,
}

impl Resource {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn identifier(&self) -> &Field {
        // Resolution guarantees the id field exists and is scalar.
        self.fields
            .iter()
            .find(|f| f.name == self.id_field)
            .expect("resolved resource always has its identifier field")
    }

    pub fn id_type(&self) -> IdType {
        match self.identifier().kind {
            FieldKind::Scalar(ScalarType::Int) | FieldKind::Scalar(ScalarType::BigInt) => {
                IdType::Int
            }
            FieldKind::Scalar(ScalarType::Uuid) => IdType::Uuid,
            _ => IdType::Text,
        }
    }

    /// Fields the caller may write: everything except the identifier.
    pub fn writable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.name != self.id_field)
    }
}

/// Immutable, process-wide resource registry built once at startup and
/// passed explicitly to each component.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    resources: Vec<Resource>,
    by_lower: HashMap<String, usize>,
}

impl Registry {
    pub(crate) fn from_resources(resources: Vec<Resource>) -> Self {
        let by_lower = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.to_lowercase(), i))
            .collect();
        Registry { resources, by_lower }
    }

    /// Case-insensitive lookup by resource name.
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.by_lower
            .get(&name.to_lowercase())
            .map(|&i| &self.resources[i])
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource_names(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_field(name: &str, ty: ScalarType) -> Field {
        Field {
            name: name.to_string(),
            kind: FieldKind::Scalar(ty),
            required: false,
            unique: false,
            alias: None,
            rules: FieldRules::default(),
            formatter: None,
            validator: None,
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = Registry::from_resources(vec![Resource {
            name: "Post".into(),
            path_segment: "post".into(),
            table: "post".into(),
            id_field: "id".into(),
            fields: vec![scalar_field("id", ScalarType::Int)],
        }]);
        assert!(registry.resource("post").is_some());
        assert!(registry.resource("POST").is_some());
        assert!(registry.resource("posts").is_none());
    }

    #[test]
    fn id_type_follows_identifier_scalar() {
        let mut resource = Resource {
            name: "Doc".into(),
            path_segment: "doc".into(),
            table: "doc".into(),
            id_field: "id".into(),
            fields: vec![scalar_field("id", ScalarType::Uuid)],
        };
        assert_eq!(resource.id_type(), IdType::Uuid);
        resource.fields[0].kind = FieldKind::Scalar(ScalarType::BigInt);
        assert_eq!(resource.id_type(), IdType::Int);
    }
}
