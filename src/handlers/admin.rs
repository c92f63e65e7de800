//! Admin HTTP handlers. Path extractors receive the resource segment and
//! optional identifier; the dispatcher resolves the resource by name.

use crate::error::AdminError;
use crate::payload::{SubmittedForm, UploadedBlob};
use crate::request::form_from_urlencoded;
use crate::respond::OperationResult;
use crate::service::Dispatcher;
use crate::state::AdminState;
use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

/// Upper bound for submitted bodies, uploads included.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub async fn show(
    State(state): State<AdminState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<OperationResult, AdminError> {
    Dispatcher::view(&state, &resource, None, &params).await
}

pub async fn show_record(
    State(state): State<AdminState>,
    Path((resource, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<OperationResult, AdminError> {
    Dispatcher::view(&state, &resource, Some(&id), &params).await
}

pub async fn submit(
    State(state): State<AdminState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    req: Request,
) -> Result<OperationResult, AdminError> {
    let form = decode_form(req).await?;
    Dispatcher::submit(&state, &resource, None, &params, form).await
}

pub async fn submit_record(
    State(state): State<AdminState>,
    Path((resource, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    req: Request,
) -> Result<OperationResult, AdminError> {
    let form = decode_form(req).await?;
    Dispatcher::submit(&state, &resource, Some(&id), &params, form).await
}

pub async fn remove_many(
    State(state): State<AdminState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(ids): Json<Vec<Value>>,
) -> Result<OperationResult, AdminError> {
    Dispatcher::delete_many(&state, &resource, &params, ids).await
}

/// Decode the submitted body into a form: multipart when the content type
/// says so, urlencoded otherwise.
async fn decode_form(req: Request) -> Result<SubmittedForm, AdminError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| AdminError::BadRequest(format!("malformed multipart body: {}", e)))?;
        let mut form = SubmittedForm::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AdminError::BadRequest(format!("malformed multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if let Some(filename) = field.file_name().map(str::to_string) {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AdminError::BadRequest(format!("upload read failed: {}", e)))?;
                form.push_blob(
                    name,
                    UploadedBlob {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    },
                );
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AdminError::BadRequest(format!("field read failed: {}", e)))?;
                form.push_text(name, text);
            }
        }
        Ok(form)
    } else {
        let bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| AdminError::BadRequest(format!("body read failed: {}", e)))?;
        form_from_urlencoded(&bytes)
    }
}
