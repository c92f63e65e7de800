//! Raw schema descriptor types matching the introspector's JSON output.

use serde::{Deserialize, Serialize};

/// Scalar primitive a column can hold. Identifier fields are restricted to
/// Int, BigInt, Uuid, and Text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Int,
    BigInt,
    Float,
    Boolean,
    Text,
    DateTime,
    Uuid,
    Json,
}

/// Which side holds the foreign key for a relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    /// This resource carries the FK column (many-to-one).
    ToOne,
    /// The related resource carries the FK column pointing back here.
    ToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKindDescriptor {
    Scalar {
        #[serde(rename = "type")]
        type_: ScalarType,
    },
    Relation {
        /// Name of the referenced resource.
        resource: String,
        /// FK column: ours for to_one, the related resource's for to_many.
        fk_column: String,
        #[serde(default = "default_to_one")]
        multiplicity: Multiplicity,
    },
    File,
}

fn default_to_one() -> Multiplicity {
    Multiplicity::ToOne
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKindDescriptor,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    /// Backing table/collection name; defaults to the lowercased resource name.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    pub fields: Vec<FieldDescriptor>,
}

fn default_id_field() -> String {
    "id".to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub models: Vec<ModelDescriptor>,
}
