//! Descriptor validation: referential integrity and identifier consistency.

use crate::error::SchemaError;
use crate::schema::types::{FieldKindDescriptor, ScalarType, SchemaDescriptor};
use std::collections::HashSet;

pub fn validate(schema: &SchemaDescriptor) -> Result<(), SchemaError> {
    let mut names = HashSet::new();
    for model in &schema.models {
        if !names.insert(model.name.to_lowercase()) {
            return Err(SchemaError::DuplicateResource(model.name.clone()));
        }
    }

    let known: HashSet<String> = schema
        .models
        .iter()
        .map(|m| m.name.to_lowercase())
        .collect();

    for model in &schema.models {
        let mut field_names = HashSet::new();
        for field in &model.fields {
            if !field_names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    resource: model.name.clone(),
                    field: field.name.clone(),
                });
            }
            if let FieldKindDescriptor::Relation {
                resource, fk_column, ..
            } = &field.kind
            {
                if !known.contains(&resource.to_lowercase()) {
                    return Err(SchemaError::MissingReference {
                        kind: "resource",
                        id: resource.clone(),
                    });
                }
                if fk_column.is_empty() {
                    return Err(SchemaError::MissingReference {
                        kind: "fk_column",
                        id: format!("{}.{}", model.name, field.name),
                    });
                }
            }
        }

        let id = model
            .fields
            .iter()
            .find(|f| f.name == model.id_field)
            .ok_or_else(|| SchemaError::InvalidIdentifier {
                resource: model.name.clone(),
                field: model.id_field.clone(),
            })?;
        match &id.kind {
            FieldKindDescriptor::Scalar { type_ } => match type_ {
                ScalarType::Int | ScalarType::BigInt | ScalarType::Uuid | ScalarType::Text => {}
                _ => {
                    return Err(SchemaError::InvalidIdentifier {
                        resource: model.name.clone(),
                        field: model.id_field.clone(),
                    })
                }
            },
            _ => {
                return Err(SchemaError::InvalidIdentifier {
                    resource: model.name.clone(),
                    field: model.id_field.clone(),
                })
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{FieldDescriptor, ModelDescriptor};

    fn scalar(name: &str, type_: ScalarType) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            kind: FieldKindDescriptor::Scalar { type_ },
            required: false,
            unique: false,
            alias: None,
        }
    }

    fn model(name: &str, fields: Vec<FieldDescriptor>) -> ModelDescriptor {
        ModelDescriptor {
            name: name.to_string(),
            table: None,
            id_field: "id".to_string(),
            fields,
        }
    }

    #[test]
    fn rejects_missing_identifier_field() {
        let schema = SchemaDescriptor {
            models: vec![model("Post", vec![scalar("title", ScalarType::Text)])],
        };
        assert!(matches!(
            validate(&schema),
            Err(SchemaError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn rejects_non_scalar_identifier() {
        let schema = SchemaDescriptor {
            models: vec![model("Post", vec![scalar("id", ScalarType::Float)])],
        };
        assert!(matches!(
            validate(&schema),
            Err(SchemaError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn rejects_relation_to_unknown_resource() {
        let mut m = model("Post", vec![scalar("id", ScalarType::Int)]);
        m.fields.push(FieldDescriptor {
            name: "author".into(),
            kind: FieldKindDescriptor::Relation {
                resource: "Ghost".into(),
                fk_column: "author_id".into(),
                multiplicity: crate::schema::types::Multiplicity::ToOne,
            },
            required: false,
            unique: false,
            alias: None,
        });
        let schema = SchemaDescriptor { models: vec![m] };
        assert!(matches!(
            validate(&schema),
            Err(SchemaError::MissingReference { kind: "resource", .. })
        ));
    }

    #[test]
    fn rejects_duplicate_resource_names_case_insensitive() {
        let schema = SchemaDescriptor {
            models: vec![
                model("Post", vec![scalar("id", ScalarType::Int)]),
                model("post", vec![scalar("id", ScalarType::Int)]),
            ],
        };
        assert!(matches!(
            validate(&schema),
            Err(SchemaError::DuplicateResource(_))
        ));
    }

    #[test]
    fn accepts_consistent_schema() {
        let schema = SchemaDescriptor {
            models: vec![model(
                "Post",
                vec![scalar("id", ScalarType::Int), scalar("title", ScalarType::Text)],
            )],
        };
        assert!(validate(&schema).is_ok());
    }
}
