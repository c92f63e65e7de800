//! Build the resolved registry from descriptors (call after validate),
//! attaching per-field customization supplied by the embedding application.

use crate::error::SchemaError;
use crate::schema::resolved::{
    Field, FieldKind, FieldRules, FormatFn, Registry, RelationSpec, Resource, ValidateFn,
};
use crate::schema::types::{FieldKindDescriptor, SchemaDescriptor};
use crate::schema::validator::validate;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-field customization: overrides layered on top of the introspected
/// descriptor. All members optional; unset members keep descriptor values.
#[derive(Clone, Default)]
pub struct FieldOptions {
    pub alias: Option<String>,
    pub required: Option<bool>,
    pub rules: FieldRules,
    pub formatter: Option<Arc<FormatFn>>,
    pub validator: Option<Arc<ValidateFn>>,
}

#[derive(Clone, Default)]
pub struct ResourceOptions {
    pub fields: HashMap<String, FieldOptions>,
}

/// Code-supplied admin configuration keyed by resource name.
#[derive(Clone, Default)]
pub struct AdminOptions {
    pub resources: HashMap<String, ResourceOptions>,
}

impl AdminOptions {
    pub fn field(
        mut self,
        resource: impl Into<String>,
        field: impl Into<String>,
        options: FieldOptions,
    ) -> Self {
        self.resources
            .entry(resource.into())
            .or_default()
            .fields
            .insert(field.into(), options);
        self
    }
}

/// Build the resolved registry from a descriptor and admin options.
/// Options naming an unknown resource or field are an error: a typo there
/// would otherwise silently disable a formatter or validator.
pub fn resolve(schema: &SchemaDescriptor, options: &AdminOptions) -> Result<Registry, SchemaError> {
    validate(schema)?;

    let known: HashMap<String, &crate::schema::types::ModelDescriptor> = schema
        .models
        .iter()
        .map(|m| (m.name.to_lowercase(), m))
        .collect();
    for (name, opts) in &options.resources {
        let Some(model) = known.get(&name.to_lowercase()) else {
            return Err(SchemaError::MissingReference {
                kind: "resource",
                id: name.clone(),
            });
        };
        for field_name in opts.fields.keys() {
            if !model.fields.iter().any(|f| f.name == *field_name) {
                return Err(SchemaError::MissingReference {
                    kind: "field",
                    id: format!("{}.{}", model.name, field_name),
                });
            }
        }
    }

    let mut resources = Vec::with_capacity(schema.models.len());
    for model in &schema.models {
        let resource_opts = options
            .resources
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&model.name))
            .map(|(_, v)| v);

        let mut fields = Vec::with_capacity(model.fields.len());
        for fd in &model.fields {
            let overrides = resource_opts.and_then(|o| o.fields.get(&fd.name));
            let kind = match &fd.kind {
                FieldKindDescriptor::Scalar { type_ } => FieldKind::Scalar(*type_),
                FieldKindDescriptor::Relation {
                    resource,
                    fk_column,
                    multiplicity,
                } => FieldKind::Relation(RelationSpec {
                    resource: resource.clone(),
                    fk_column: fk_column.clone(),
                    multiplicity: *multiplicity,
                }),
                FieldKindDescriptor::File => FieldKind::File,
            };
            fields.push(Field {
                name: fd.name.clone(),
                kind,
                required: overrides
                    .and_then(|o| o.required)
                    .unwrap_or(fd.required),
                unique: fd.unique,
                alias: overrides
                    .and_then(|o| o.alias.clone())
                    .or_else(|| fd.alias.clone()),
                rules: overrides.map(|o| o.rules.clone()).unwrap_or_default(),
                formatter: overrides.and_then(|o| o.formatter.clone()),
                validator: overrides.and_then(|o| o.validator.clone()),
            });
        }

        resources.push(Resource {
            path_segment: model.name.to_lowercase(),
            table: model
                .table
                .clone()
                .unwrap_or_else(|| model.name.to_lowercase()),
            name: model.name.clone(),
            id_field: model.id_field.clone(),
            fields,
        });
    }

    Ok(Registry::from_resources(resources))
}
