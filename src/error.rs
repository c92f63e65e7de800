//! Typed errors and HTTP mapping.

use crate::storage::StorageError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid identifier field: resource {resource} field {field}")]
    InvalidIdentifier { resource: String, field: String },
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),
    #[error("duplicate field: {resource}.{field}")]
    DuplicateField { resource: String, field: String },
}

#[derive(Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AdminError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            AdminError::UnknownResource(_) => (StatusCode::NOT_FOUND, "not_found"),
            AdminError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AdminError::Store(e) => match e {
                StoreError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                StoreError::Constraint(_) => (StatusCode::CONFLICT, "conflict"),
                StoreError::Unavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable")
                }
            },
            AdminError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
