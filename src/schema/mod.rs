pub mod loader;
pub mod resolved;
pub mod types;
pub mod validator;

pub use loader::{resolve, AdminOptions, FieldOptions, ResourceOptions};
pub use resolved::{
    Field, FieldKind, FieldRules, FormatFn, IdType, Registry, RelationSpec, Resource, ValidateFn,
};
pub use types::{
    FieldDescriptor, FieldKindDescriptor, ModelDescriptor, Multiplicity, ScalarType,
    SchemaDescriptor,
};
pub use validator::validate;
