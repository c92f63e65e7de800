//! The uniform result envelope returned to the HTTP layer, and the
//! destination builder for redirect responses.

use crate::message::FlashMessage;
use crate::payload::RecordId;
use crate::props::PageProps;
use crate::service::validate::ValidationResult;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Tagged outcome of a dispatched request. Exactly one per request; owns
/// the HTTP-facing response shape.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum OperationResult {
    Redirect {
        destination: String,
        message: FlashMessage,
    },
    Rendered {
        props: PageProps,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<FlashMessage>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        validation: Option<ValidationResult>,
    },
    NotFound,
}

impl OperationResult {
    pub fn redirect(destination: String, message: FlashMessage) -> Self {
        OperationResult::Redirect {
            destination,
            message,
        }
    }

    pub fn rendered(props: PageProps) -> Self {
        OperationResult::Rendered {
            props,
            message: None,
            error: None,
            validation: None,
        }
    }

    pub fn rendered_with_message(props: PageProps, message: Option<FlashMessage>) -> Self {
        OperationResult::Rendered {
            props,
            message,
            error: None,
            validation: None,
        }
    }

    /// Validation failure: the echoed submitted values live in the props so
    /// the caller can repopulate the form.
    pub fn validation_failure(props: PageProps, validation: ValidationResult) -> Self {
        OperationResult::Rendered {
            props,
            message: None,
            error: Some(validation.summary()),
            validation: Some(validation),
        }
    }

    pub fn operation_error(props: PageProps, error: String) -> Self {
        OperationResult::Rendered {
            props,
            message: None,
            error: Some(error),
            validation: None,
        }
    }

    pub fn not_found() -> Self {
        OperationResult::NotFound
    }
}

/// Redirect destination: `<base>/<segment>[/<id>]?message=<json>`.
/// The message parameter is decoded on the subsequent GET.
pub fn destination(
    base_path: &str,
    path_segment: &str,
    id: Option<&RecordId>,
    message: &FlashMessage,
) -> String {
    let mut out = format!("{}/{}", base_path, path_segment);
    if let Some(id) = id {
        out.push('/');
        out.push_str(&id.to_string());
    }
    out.push_str("?message=");
    out.push_str(&message.encode());
    out
}

impl IntoResponse for OperationResult {
    fn into_response(self) -> Response {
        match self {
            OperationResult::Redirect { destination, .. } => {
                let location = header::HeaderValue::from_str(&destination)
                    .unwrap_or_else(|_| header::HeaderValue::from_static("/"));
                (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
            }
            rendered @ OperationResult::Rendered { .. } => {
                (StatusCode::OK, Json(rendered)).into_response()
            }
            OperationResult::NotFound => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FlashMessage, CREATED_MESSAGE};

    #[test]
    fn destination_includes_id_and_message() {
        let msg = FlashMessage::success(CREATED_MESSAGE);
        assert_eq!(
            destination("/admin", "post", Some(&RecordId::Int(5)), &msg),
            r#"/admin/post/5?message={"type":"success","content":"Created successfully"}"#
        );
        assert_eq!(
            destination("/admin", "post", None, &msg),
            r#"/admin/post?message={"type":"success","content":"Created successfully"}"#
        );
    }
}
