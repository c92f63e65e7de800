//! Declarative validation over the formatted payload. Aggregates every
//! violation instead of failing fast so the caller can surface them
//! together.

use crate::payload::{FieldValue, FormattedPayload};
use crate::schema::Resource;
use regex::Regex;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Set of per-field violations. Empty means the payload may be dispatched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationResult {
    violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct Validator;

impl Validator {
    /// Check every writable field of the resource against the formatted
    /// payload. `prior` carries coercion violations recorded by the
    /// formatter; they come first in the result.
    pub fn validate(
        payload: &FormattedPayload,
        resource: &Resource,
        prior: Vec<Violation>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();
        for v in prior {
            result.push(v);
        }

        for field in resource.writable_fields() {
            let value = payload.get(&field.name);

            if field.required && value.map(FieldValue::is_empty).unwrap_or(true) {
                result.push(Violation::new(
                    &field.name,
                    format!("{} is required", field.label()),
                ));
            }

            let Some(value) = value else { continue };

            if let FieldValue::Text(s) = value {
                if !s.is_empty() {
                    check_rules(field, s, &mut result);
                }
            }

            if let Some(custom) = &field.validator {
                if let Err(message) = custom(value, payload) {
                    result.push(Violation::new(&field.name, message));
                }
            }
        }
        result
    }
}

fn check_rules(field: &crate::schema::Field, s: &str, result: &mut ValidationResult) {
    let rules = &field.rules;
    if let Some(max) = rules.max_length {
        if s.chars().count() > max as usize {
            result.push(Violation::new(
                &field.name,
                format!("{} must be at most {} characters", field.label(), max),
            ));
        }
    }
    if let Some(min) = rules.min_length {
        if s.chars().count() < min as usize {
            result.push(Violation::new(
                &field.name,
                format!("{} must be at least {} characters", field.label(), min),
            ));
        }
    }
    if let Some(pattern) = &rules.pattern {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(s) {
                    result.push(Violation::new(
                        &field.name,
                        format!("{} does not match required pattern", field.label()),
                    ));
                }
            }
            Err(_) => result.push(Violation::new(
                &field.name,
                format!("invalid pattern for {}", field.label()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{resolve, AdminOptions, FieldOptions, FieldRules, SchemaDescriptor};
    use std::sync::Arc;

    fn registry(options: AdminOptions) -> crate::schema::Registry {
        let schema: SchemaDescriptor = serde_json::from_value(serde_json::json!({
            "models": [{
                "name": "Post",
                "fields": [
                    {"name": "id", "kind": "scalar", "type": "int"},
                    {"name": "title", "kind": "scalar", "type": "text", "required": true},
                    {"name": "slug", "kind": "scalar", "type": "text"},
                    {"name": "views", "kind": "scalar", "type": "int"}
                ]
            }]
        }))
        .unwrap();
        resolve(&schema, &options).unwrap()
    }

    #[test]
    fn missing_required_field_is_always_reported() {
        let registry = registry(AdminOptions::default());
        let post = registry.resource("post").unwrap();
        let result = Validator::validate(&FormattedPayload::new(), post, Vec::new());
        assert_eq!(result.len(), 1);
        assert_eq!(result.violations()[0].field, "title");
    }

    #[test]
    fn empty_formatted_value_counts_as_missing() {
        let registry = registry(AdminOptions::default());
        let post = registry.resource("post").unwrap();
        let mut payload = FormattedPayload::new();
        payload.set("title", FieldValue::Text(String::new()));
        let result = Validator::validate(&payload, post, Vec::new());
        assert_eq!(result.violations()[0].field, "title");
    }

    #[test]
    fn all_violations_aggregate() {
        let options = AdminOptions::default().field(
            "Post",
            "slug",
            FieldOptions {
                rules: FieldRules {
                    pattern: Some("^[a-z-]+$".into()),
                    min_length: Some(3),
                    ..FieldRules::default()
                },
                ..FieldOptions::default()
            },
        );
        let registry = registry(options);
        let post = registry.resource("post").unwrap();
        let mut payload = FormattedPayload::new();
        payload.set("slug", FieldValue::Text("A!".into()));
        let result = Validator::validate(&payload, post, Vec::new());
        // required title + slug length + slug pattern
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn custom_validator_sees_whole_payload() {
        let options = AdminOptions::default().field(
            "Post",
            "views",
            FieldOptions {
                validator: Some(Arc::new(|value, payload| {
                    let has_title = payload
                        .get("title")
                        .map(|t| !t.is_empty())
                        .unwrap_or(false);
                    match value {
                        FieldValue::Int(n) if *n > 0 && !has_title => {
                            Err("views require a title".into())
                        }
                        _ => Ok(()),
                    }
                })),
                ..FieldOptions::default()
            },
        );
        let registry = registry(options);
        let post = registry.resource("post").unwrap();
        let mut payload = FormattedPayload::new();
        payload.set("views", FieldValue::Int(5));
        let result = Validator::validate(&payload, post, Vec::new());
        assert!(result
            .violations()
            .iter()
            .any(|v| v.field == "views" && v.message == "views require a title"));
    }

    #[test]
    fn prior_violations_come_first() {
        let registry = registry(AdminOptions::default());
        let post = registry.resource("post").unwrap();
        let mut payload = FormattedPayload::new();
        payload.set("title", FieldValue::Text("ok".into()));
        let result = Validator::validate(
            &payload,
            post,
            vec![Violation::new("views", "views must be a number")],
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result.violations()[0].field, "views");
    }
}
