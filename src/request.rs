//! Request parsing: path segments, query parameters, and submitted bodies
//! become typed inputs for the dispatch pipeline.
//!
//! The wire protocol reserves two body keys (`__admin_action`,
//! `__admin_redirect`); they are stripped into a typed [`FormControl`]
//! envelope here so control metadata never mixes with domain field values
//! downstream.

use crate::error::AdminError;
use crate::payload::{RecordId, SubmittedForm};
use crate::schema::{IdType, Resource};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Reserved body key selecting the action; anything but "delete" saves.
pub const ACTION_KEY: &str = "__admin_action";
/// Reserved body key requesting a redirect response instead of rendered props.
pub const REDIRECT_KEY: &str = "__admin_redirect";
/// Path segment meaning "no identifier" (the create form posts here).
pub const NEW_SEGMENT: &str = "new";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormAction {
    Save,
    Delete,
}

/// Control metadata extracted from the reserved form keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormControl {
    pub action: FormAction,
    pub redirect: bool,
}

impl FormControl {
    /// Strip the reserved keys out of the form. Must run before formatting
    /// so the field mapping only ever sees domain values.
    pub fn take_from(form: &mut SubmittedForm) -> Self {
        let action = match form.remove(ACTION_KEY).as_ref().and_then(|v| v.as_text()) {
            Some("delete") => FormAction::Delete,
            _ => FormAction::Save,
        };
        let redirect = form
            .remove(REDIRECT_KEY)
            .as_ref()
            .and_then(|v| v.as_text())
            .map(|v| matches!(v, "true" | "1" | "on"))
            .unwrap_or(false);
        FormControl { action, redirect }
    }
}

/// Coerce a path segment into the resource's identifier type. The literal
/// "new" and anything that does not parse yield None; the caller decides
/// whether that means create or a list re-render.
pub fn parse_record_segment(segment: &str, resource: &Resource) -> Option<RecordId> {
    if segment == NEW_SEGMENT {
        return None;
    }
    parse_record_id(segment, resource.id_type())
}

pub fn parse_record_id(raw: &str, id_type: IdType) -> Option<RecordId> {
    match id_type {
        IdType::Int => raw.parse::<i64>().ok().map(RecordId::Int),
        IdType::Uuid => Uuid::parse_str(raw).ok().map(RecordId::Uuid),
        IdType::Text => {
            if raw.is_empty() {
                None
            } else {
                Some(RecordId::Text(raw.to_string()))
            }
        }
    }
}

/// Coerce one entry of a delete-many JSON body into the identifier type.
pub fn record_id_from_json(value: &serde_json::Value, id_type: IdType) -> Option<RecordId> {
    match (value, id_type) {
        (serde_json::Value::Number(n), IdType::Int) => n.as_i64().map(RecordId::Int),
        (serde_json::Value::String(s), _) => parse_record_id(s, id_type),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// List view parameters: search, sort, pagination. Malformed numbers fall
/// back to defaults; a sort column is accepted only if it names a field.
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub sort_column: Option<String>,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub items_per_page: u32,
}

impl ListQuery {
    pub fn from_params(params: &HashMap<String, String>, resource: &Resource) -> Self {
        let search = params
            .get("search")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let sort_column = params
            .get("sortColumn")
            .filter(|c| resource.field(c.as_str()).is_some())
            .cloned();
        let sort_direction = match params.get("sortDirection").map(String::as_str) {
            Some("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        let page = params
            .get("page")
            .and_then(|v| v.parse().ok())
            .filter(|&p| p >= 1)
            .unwrap_or(1);
        let items_per_page = params
            .get("itemsPerPage")
            .and_then(|v| v.parse().ok())
            .filter(|&n| n >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        ListQuery {
            search,
            sort_column,
            sort_direction,
            page,
            items_per_page,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.items_per_page)
    }
}

/// Decode an `application/x-www-form-urlencoded` body. Repeated keys
/// accumulate into multi-value entries.
pub fn form_from_urlencoded(body: &[u8]) -> Result<SubmittedForm, AdminError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| AdminError::BadRequest(format!("malformed form body: {}", e)))?;
    let mut form = SubmittedForm::new();
    for (k, v) in pairs {
        form.push_text(k, v);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::RawValue;
    use crate::schema::{resolve, AdminOptions, SchemaDescriptor};

    fn post_resource() -> crate::schema::Registry {
        let schema: SchemaDescriptor = serde_json::from_value(serde_json::json!({
            "models": [{
                "name": "Post",
                "fields": [
                    {"name": "id", "kind": "scalar", "type": "int"},
                    {"name": "title", "kind": "scalar", "type": "text", "required": true},
                    {"name": "views", "kind": "scalar", "type": "int"}
                ]
            }]
        }))
        .unwrap();
        resolve(&schema, &AdminOptions::default()).unwrap()
    }

    #[test]
    fn control_keys_are_stripped_into_envelope() {
        let mut form = SubmittedForm::new();
        form.push_text(ACTION_KEY, "delete");
        form.push_text(REDIRECT_KEY, "true");
        form.push_text("title", "Hello");
        let control = FormControl::take_from(&mut form);
        assert_eq!(control.action, FormAction::Delete);
        assert!(control.redirect);
        assert!(!form.contains(ACTION_KEY));
        assert!(!form.contains(REDIRECT_KEY));
        assert_eq!(form.get("title"), Some(&RawValue::Text("Hello".into())));
    }

    #[test]
    fn default_control_is_save_without_redirect() {
        let mut form = SubmittedForm::new();
        let control = FormControl::take_from(&mut form);
        assert_eq!(control.action, FormAction::Save);
        assert!(!control.redirect);
    }

    #[test]
    fn record_segment_coerces_to_identifier_type() {
        let registry = post_resource();
        let post = registry.resource("post").unwrap();
        assert_eq!(parse_record_segment("5", post), Some(RecordId::Int(5)));
        assert_eq!(parse_record_segment("new", post), None);
        assert_eq!(parse_record_segment("abc", post), None);
    }

    #[test]
    fn list_query_falls_back_on_malformed_params() {
        let registry = post_resource();
        let post = registry.resource("post").unwrap();
        let params: HashMap<String, String> = [
            ("page".to_string(), "zero".to_string()),
            ("itemsPerPage".to_string(), "100000".to_string()),
            ("sortColumn".to_string(), "nope".to_string()),
            ("sortDirection".to_string(), "desc".to_string()),
        ]
        .into();
        let q = ListQuery::from_params(&params, post);
        assert_eq!(q.page, 1);
        assert_eq!(q.items_per_page, MAX_PAGE_SIZE);
        assert_eq!(q.sort_column, None);
        assert_eq!(q.sort_direction, SortDirection::Desc);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn urlencoded_body_decodes_with_repeats() {
        let form = form_from_urlencoded(b"title=Hello+World&tags=1&tags=2").unwrap();
        assert_eq!(
            form.get("title"),
            Some(&RawValue::Text("Hello World".into()))
        );
        assert_eq!(form.get("tags").unwrap().text_items(), vec!["1", "2"]);
    }
}
