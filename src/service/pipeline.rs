//! Operation dispatch: a state machine over {list, create, update, delete,
//! delete-many}. Exactly one store operation per request; every store
//! error is caught and classified at this boundary so each path resolves
//! to one result envelope.

use crate::error::AdminError;
use crate::message::{
    FlashMessage, CREATED_MESSAGE, DELETED_MESSAGE, UPDATED_MESSAGE,
};
use crate::payload::{FormMode, FormattedPayload, RecordId, SubmittedForm};
use crate::props::{detail_props, form_props, list_props, PageProps};
use crate::request::{
    parse_record_segment, record_id_from_json, FormAction, FormControl, ListQuery, NEW_SEGMENT,
};
use crate::respond::{destination, OperationResult};
use crate::schema::Resource;
use crate::service::format::{FieldFormatter, ARTIFACT_KEY_SUFFIX};
use crate::service::validate::Validator;
use crate::state::AdminState;
use crate::store::StoreError;
use serde_json::Value;
use std::collections::HashMap;

pub struct Dispatcher;

impl Dispatcher {
    /// GET path: list, detail, or create-form props. Idempotent; no
    /// mutation ever happens here.
    pub async fn view(
        state: &AdminState,
        resource_name: &str,
        id_segment: Option<&str>,
        params: &HashMap<String, String>,
    ) -> Result<OperationResult, AdminError> {
        let Some(resource) = state.registry.resource(resource_name) else {
            return Ok(OperationResult::not_found());
        };
        let message = carried_message(params);

        if let Some(segment) = id_segment {
            if segment == NEW_SEGMENT {
                return Ok(OperationResult::rendered_with_message(
                    form_props(state, resource),
                    message,
                ));
            }
            let Some(id) = parse_record_segment(segment, resource) else {
                return Ok(OperationResult::not_found());
            };
            let Some(props) = detail_props(state, resource, &id).await? else {
                return Ok(OperationResult::not_found());
            };
            return Ok(OperationResult::rendered_with_message(props, message));
        }

        let query = ListQuery::from_params(params, resource);
        let props = list_props(state, resource, &query).await?;
        Ok(OperationResult::rendered_with_message(props, message))
    }

    /// POST path: save (create/update) or delete, driven by the control
    /// envelope stripped from the form.
    pub async fn submit(
        state: &AdminState,
        resource_name: &str,
        id_segment: Option<&str>,
        params: &HashMap<String, String>,
        mut form: SubmittedForm,
    ) -> Result<OperationResult, AdminError> {
        let Some(resource) = state.registry.resource(resource_name) else {
            return Ok(OperationResult::not_found());
        };
        let control = FormControl::take_from(&mut form);
        let record_id = id_segment.and_then(|seg| parse_record_segment(seg, resource));

        // Delete/redirect intent without a usable identifier: re-render the
        // list with any carried status message instead of touching the
        // store. Covers the post-redirect re-submission the client layer
        // performs without dropping the HTTP method.
        let dangling_segment = matches!(id_segment, Some(seg) if seg != NEW_SEGMENT);
        if record_id.is_none()
            && (control.action == FormAction::Delete || (control.redirect && dangling_segment))
        {
            let query = ListQuery::from_params(params, resource);
            let props = list_props(state, resource, &query).await?;
            return Ok(OperationResult::rendered_with_message(
                props,
                carried_message(params),
            ));
        }

        if let (FormAction::Delete, Some(id)) = (control.action, &record_id) {
            return match state.store.remove(resource, id).await {
                Ok(_) => {
                    tracing::debug!(resource = %resource.name, id = %id, "deleted");
                    Ok(OperationResult::redirect(
                        destination(
                            &state.options.base_path,
                            &resource.path_segment,
                            None,
                            &FlashMessage::success(DELETED_MESSAGE),
                        ),
                        FlashMessage::success(DELETED_MESSAGE),
                    ))
                }
                Err(e) => Self::classified(state, resource, params, None, e).await,
            };
        }

        let mode = match record_id {
            Some(_) => FormMode::Update,
            None => FormMode::Create,
        };
        let outcome =
            FieldFormatter::format(&form, &state.registry, resource, mode, state.storage.as_ref())
                .await?;
        let validation = Validator::validate(&outcome.payload, resource, outcome.violations);
        if !validation.is_empty() {
            let echo = echo_values(&form, &outcome.payload);
            let props = Self::reject_props(state, resource, params, record_id.as_ref()).await?;
            return Ok(OperationResult::validation_failure(
                props.with_form_values(echo),
                validation,
            ));
        }

        match record_id {
            Some(id) => {
                Self::update(state, resource, params, control, id, outcome.payload).await
            }
            None => Self::create(state, resource, params, control, outcome.payload).await,
        }
    }

    /// DELETE path: batch removal from a JSON identifier array. Partial
    /// success (identifiers with no matching row) is overall success.
    pub async fn delete_many(
        state: &AdminState,
        resource_name: &str,
        params: &HashMap<String, String>,
        ids: Vec<Value>,
    ) -> Result<OperationResult, AdminError> {
        let Some(resource) = state.registry.resource(resource_name) else {
            return Ok(OperationResult::not_found());
        };
        let id_type = resource.id_type();
        let targets: Vec<RecordId> = ids
            .iter()
            .filter_map(|v| {
                let id = record_id_from_json(v, id_type);
                if id.is_none() {
                    tracing::debug!(resource = %resource.name, value = %v, "skipping malformed identifier");
                }
                id
            })
            .collect();

        match state.store.remove_many(resource, &targets).await {
            Ok(count) => {
                tracing::debug!(resource = %resource.name, count, "batch deleted");
                let query = ListQuery::from_params(params, resource);
                let props = list_props(state, resource, &query).await?;
                Ok(OperationResult::rendered_with_message(
                    props,
                    Some(FlashMessage::success(DELETED_MESSAGE)),
                ))
            }
            Err(e) => Self::classified(state, resource, params, None, e).await,
        }
    }

    async fn update(
        state: &AdminState,
        resource: &Resource,
        params: &HashMap<String, String>,
        control: FormControl,
        id: RecordId,
        payload: FormattedPayload,
    ) -> Result<OperationResult, AdminError> {
        match state.store.update(resource, &id, &payload).await {
            Ok(Some(row)) => {
                tracing::debug!(resource = %resource.name, id = %id, "updated");
                if control.redirect {
                    Ok(OperationResult::redirect(
                        destination(
                            &state.options.base_path,
                            &resource.path_segment,
                            None,
                            &FlashMessage::success(UPDATED_MESSAGE),
                        ),
                        FlashMessage::success(UPDATED_MESSAGE),
                    ))
                } else {
                    let mut props = form_props(state, resource);
                    props.record = Some(row);
                    Ok(OperationResult::rendered_with_message(
                        props,
                        Some(FlashMessage::success(UPDATED_MESSAGE)),
                    ))
                }
            }
            // Zero matching rows is a recoverable condition, not success.
            Ok(None) => {
                Self::classified(state, resource, params, Some(&payload), StoreError::NotFound)
                    .await
            }
            Err(e) => Self::classified(state, resource, params, Some(&payload), e).await,
        }
    }

    async fn create(
        state: &AdminState,
        resource: &Resource,
        params: &HashMap<String, String>,
        control: FormControl,
        payload: FormattedPayload,
    ) -> Result<OperationResult, AdminError> {
        match state.store.insert(resource, &payload).await {
            Ok(row) => {
                let new_id = row
                    .get(&resource.id_field)
                    .and_then(|v| record_id_from_json(v, resource.id_type()));
                tracing::debug!(
                    resource = %resource.name,
                    id = new_id.as_ref().map(|i| i.to_string()).unwrap_or_default(),
                    "created"
                );
                // Redirect always; the flag picks the created record over
                // the list view.
                let target = if control.redirect { new_id.as_ref() } else { None };
                let message = FlashMessage::success(CREATED_MESSAGE);
                Ok(OperationResult::redirect(
                    destination(
                        &state.options.base_path,
                        &resource.path_segment,
                        target,
                        &message,
                    ),
                    message,
                ))
            }
            Err(e) => Self::classified(state, resource, params, Some(&payload), e).await,
        }
    }

    /// Props for re-rendering after a rejected mutation: the detail view
    /// for updates (falling back to the list when the record is gone), the
    /// create form otherwise.
    async fn reject_props(
        state: &AdminState,
        resource: &Resource,
        params: &HashMap<String, String>,
        record_id: Option<&RecordId>,
    ) -> Result<PageProps, AdminError> {
        if let Some(id) = record_id {
            if let Some(props) = detail_props(state, resource, id).await? {
                return Ok(props);
            }
        } else {
            return Ok(form_props(state, resource));
        }
        let query = ListQuery::from_params(params, resource);
        Ok(list_props(state, resource, &query).await?)
    }

    /// Classify a store error at the dispatcher boundary. Recoverable
    /// classes render as an error with the payload preserved; in
    /// development mode they are rethrown for full diagnostics.
    /// Infrastructure failures always abort.
    async fn classified(
        state: &AdminState,
        resource: &Resource,
        params: &HashMap<String, String>,
        payload: Option<&FormattedPayload>,
        error: StoreError,
    ) -> Result<OperationResult, AdminError> {
        if !error.is_recoverable() || state.options.dev_mode {
            return Err(AdminError::Store(error));
        }
        tracing::debug!(resource = %resource.name, error = %error, "store error classified");
        let message = sanitized(&error);
        let query = ListQuery::from_params(params, resource);
        let mut props = list_props(state, resource, &query).await?;
        if let Some(payload) = payload {
            props = props.with_form_values(payload.to_json());
        }
        Ok(OperationResult::operation_error(props, message))
    }
}

fn carried_message(params: &HashMap<String, String>) -> Option<FlashMessage> {
    params.get("message").and_then(|raw| FlashMessage::decode(raw))
}

fn sanitized(error: &StoreError) -> String {
    match error {
        StoreError::NotFound => "The requested record no longer exists".to_string(),
        StoreError::Constraint(_) => "The operation conflicts with existing data".to_string(),
        StoreError::Unavailable(_) => "The operation could not be completed".to_string(),
    }
}

/// Full round-trip echo for form repopulation: the formatted payload,
/// overlaid with raw text for fields that never made it into the payload
/// (coercion failures included).
fn echo_values(form: &SubmittedForm, payload: &FormattedPayload) -> Value {
    let mut obj = match payload.to_json() {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    for (key, raw) in form.iter() {
        if obj.contains_key(key) || key.ends_with(ARTIFACT_KEY_SUFFIX) {
            continue;
        }
        match raw {
            crate::payload::RawValue::Text(s) => {
                obj.insert(key.clone(), Value::String(s.clone()));
            }
            crate::payload::RawValue::TextList(items) => {
                obj.insert(
                    key.clone(),
                    Value::Array(items.iter().cloned().map(Value::String).collect()),
                );
            }
            crate::payload::RawValue::Blob(_) => {}
        }
    }
    Value::Object(obj)
}
