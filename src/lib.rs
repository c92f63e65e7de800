//! Steward SDK: schema-driven admin CRUD backend library.

pub mod error;
pub mod handlers;
pub mod message;
pub mod payload;
pub mod props;
pub mod request;
pub mod respond;
pub mod routes;
pub mod schema;
pub mod service;
pub mod state;
pub mod storage;
pub mod store;

pub use error::{AdminError, SchemaError};
pub use message::{FlashMessage, MessageKind};
pub use payload::{
    FieldValue, FormMode, FormattedPayload, RawValue, RecordId, RelationDirective, SubmittedForm,
    UploadedBlob,
};
pub use props::PageProps;
pub use request::{FormAction, FormControl, ListQuery, SortDirection};
pub use respond::OperationResult;
pub use routes::{admin_routes, common_routes};
pub use schema::{
    resolve, AdminOptions, Field, FieldKind, FieldOptions, Registry, Resource, ScalarType,
    SchemaDescriptor,
};
pub use service::{Dispatcher, FieldFormatter, ValidationResult, Validator};
pub use state::{AdminState, RouterOptions};
pub use store::{DataStore, ListPage, MemoryStore, PgStore, StoreError};
pub use storage::{FileStorage, LocalFileStorage, StorageError};
