//! Field formatting: raw submitted values become store-ready field values.
//! Pure per-field transformation except for file persistence, which is a
//! side effect that must complete (or fail the request) before validation.

use crate::error::AdminError;
use crate::payload::{
    FieldValue, FormMode, FormattedPayload, RawValue, RecordId, RelationDirective, SubmittedForm,
};
use crate::schema::{FieldKind, IdType, Multiplicity, Registry, Resource, ScalarType};
use crate::service::validate::Violation;
use crate::storage::FileStorage;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

/// Submitted text value on a file field requesting artifact removal.
pub const FILE_REMOVE_MARKER: &str = "delete";

/// Companion-key suffix carrying the currently stored handle of a file
/// field, so removal can delete the previous blob without a store read.
pub const ARTIFACT_KEY_SUFFIX: &str = "@artifact";

pub struct FormatOutcome {
    pub payload: FormattedPayload,
    /// Coercion failures, reported through the validator so they surface
    /// alongside rule violations.
    pub violations: Vec<Violation>,
}

pub struct FieldFormatter;

impl FieldFormatter {
    /// Transform the submitted form into a store-ready payload for the
    /// resource. Unknown keys are ignored; the identifier field is never
    /// writable from the caller.
    pub async fn format(
        form: &SubmittedForm,
        registry: &Registry,
        resource: &Resource,
        mode: FormMode,
        storage: &dyn FileStorage,
    ) -> Result<FormatOutcome, AdminError> {
        let mut payload = FormattedPayload::new();
        let mut violations = Vec::new();

        for field in resource.writable_fields() {
            let raw = form.get(&field.name);

            if let Some(custom) = &field.formatter {
                // Custom formatters take precedence and always see the
                // field, absent input included, so they can synthesize
                // values.
                let raw = raw.cloned().unwrap_or(RawValue::Text(String::new()));
                match custom(&raw, mode) {
                    Ok(value) => payload.set(&field.name, value),
                    Err(message) => violations.push(Violation::new(&field.name, message)),
                }
                continue;
            }

            match &field.kind {
                FieldKind::Scalar(ty) => match raw {
                    Some(raw) => match coerce_scalar(raw, *ty, field.required) {
                        Ok(value) => payload.set(&field.name, value),
                        Err(message) => violations.push(Violation::new(&field.name, message)),
                    },
                    None => {
                        if field.required {
                            // Required fields must be represented so the
                            // validator reports them.
                            payload.set(&field.name, FieldValue::Null);
                        }
                    }
                },
                FieldKind::Relation(spec) => {
                    let Some(raw) = raw else {
                        if field.required {
                            payload.set(
                                &field.name,
                                FieldValue::Relation(empty_directive(mode)),
                            );
                        }
                        continue;
                    };
                    let referenced_id_type = registry
                        .resource(&spec.resource)
                        .map(Resource::id_type)
                        .unwrap_or(IdType::Text);
                    match coerce_relation(raw, referenced_id_type, spec.multiplicity, mode) {
                        Ok(directive) => {
                            payload.set(&field.name, FieldValue::Relation(directive))
                        }
                        Err(message) => violations.push(Violation::new(&field.name, message)),
                    }
                }
                FieldKind::File => {
                    let formatted =
                        format_file(form, &field.name, raw, storage).await?;
                    if let Some(value) = formatted {
                        payload.set(&field.name, value);
                    } else if field.required && mode == FormMode::Create {
                        payload.set(&field.name, FieldValue::Null);
                    }
                }
            }
        }

        Ok(FormatOutcome {
            payload,
            violations,
        })
    }
}

fn empty_directive(mode: FormMode) -> RelationDirective {
    match mode {
        FormMode::Create => RelationDirective::Link(Vec::new()),
        FormMode::Update => RelationDirective::Replace(Vec::new()),
    }
}

/// Coerce one submitted value to the declared scalar type. An empty string
/// on an optional field is an explicit unset; on a required Text field it
/// is kept so the validator can report it.
fn coerce_scalar(
    raw: &RawValue,
    ty: ScalarType,
    required: bool,
) -> Result<FieldValue, String> {
    let Some(text) = raw.as_text() else {
        return Err("expected a text value, got a file".to_string());
    };
    if text.is_empty() {
        return Ok(match ty {
            ScalarType::Text if required => FieldValue::Text(String::new()),
            _ => FieldValue::Null,
        });
    }
    match ty {
        ScalarType::Int | ScalarType::BigInt => text
            .parse::<i64>()
            .map(FieldValue::Int)
            .map_err(|_| format!("'{}' is not a whole number", text)),
        ScalarType::Float => text
            .parse::<f64>()
            .map(FieldValue::Float)
            .map_err(|_| format!("'{}' is not a number", text)),
        ScalarType::Boolean => Ok(FieldValue::Bool(matches!(text, "on" | "true" | "1"))),
        ScalarType::Text => Ok(FieldValue::Text(text.to_string())),
        ScalarType::DateTime => parse_datetime(text)
            .map(FieldValue::DateTime)
            .ok_or_else(|| format!("'{}' is not a valid date-time", text)),
        ScalarType::Uuid => Uuid::parse_str(text)
            .map(FieldValue::Uuid)
            .map_err(|_| format!("'{}' is not a valid UUID", text)),
        ScalarType::Json => serde_json::from_str(text)
            .map(FieldValue::Json)
            .map_err(|_| format!("'{}' is not valid JSON", text)),
    }
}

/// Accepts RFC 3339 and the `datetime-local` input shape.
fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn coerce_relation(
    raw: &RawValue,
    id_type: IdType,
    multiplicity: Multiplicity,
    mode: FormMode,
) -> Result<RelationDirective, String> {
    let mut ids: Vec<RecordId> = Vec::new();
    for item in raw.text_items() {
        if item.is_empty() {
            continue;
        }
        let id = crate::request::parse_record_id(item, id_type)
            .ok_or_else(|| format!("'{}' is not a valid identifier", item))?;
        ids.push(id);
    }
    if multiplicity == Multiplicity::ToOne && ids.len() > 1 {
        return Err("expected a single related record".to_string());
    }
    Ok(match mode {
        // A new record has nothing linked yet, so only link directives are
        // valid on create.
        FormMode::Create => RelationDirective::Link(ids),
        FormMode::Update => RelationDirective::Replace(ids),
    })
}

/// File fields: persist uploads, honor the removal marker, and pass
/// through an already-stored handle unchanged. None means the field was
/// not addressed by this request.
async fn format_file(
    form: &SubmittedForm,
    field: &str,
    raw: Option<&RawValue>,
    storage: &dyn FileStorage,
) -> Result<Option<FieldValue>, AdminError> {
    match raw {
        None => Ok(None),
        Some(RawValue::Blob(blob)) => {
            if blob.is_empty() {
                return Ok(None);
            }
            let handle = storage.store(field, blob).await?;
            Ok(Some(FieldValue::FileRef(handle)))
        }
        Some(text) => {
            let value = text.as_text().unwrap_or_default();
            if value == FILE_REMOVE_MARKER {
                let companion = format!("{}{}", field, ARTIFACT_KEY_SUFFIX);
                if let Some(handle) = form.get(&companion).and_then(|v| v.as_text()) {
                    if !handle.is_empty() {
                        storage.remove(handle).await?;
                    }
                }
                Ok(Some(FieldValue::Null))
            } else if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(FieldValue::FileRef(value.to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::UploadedBlob;
    use crate::schema::{resolve, AdminOptions, FieldOptions, SchemaDescriptor};
    use crate::storage::LocalFileStorage;
    use std::sync::Arc;

    fn registry() -> Registry {
        let schema: SchemaDescriptor = serde_json::from_value(serde_json::json!({
            "models": [
                {
                    "name": "Post",
                    "fields": [
                        {"name": "id", "kind": "scalar", "type": "int"},
                        {"name": "title", "kind": "scalar", "type": "text", "required": true},
                        {"name": "views", "kind": "scalar", "type": "int"},
                        {"name": "published", "kind": "scalar", "type": "boolean"},
                        {"name": "author", "kind": "relation", "resource": "User", "fk_column": "author_id"},
                        {"name": "cover", "kind": "file"}
                    ]
                },
                {
                    "name": "User",
                    "fields": [{"name": "id", "kind": "scalar", "type": "int"}]
                }
            ]
        }))
        .unwrap();
        resolve(&schema, &AdminOptions::default()).unwrap()
    }

    async fn run_format(
        form: &SubmittedForm,
        mode: FormMode,
        storage: &dyn FileStorage,
    ) -> FormatOutcome {
        let registry = registry();
        let post = registry.resource("post").unwrap();
        FieldFormatter::format(form, &registry, post, mode, storage)
            .await
            .unwrap()
    }

    fn temp_storage() -> (tempfile::TempDir, LocalFileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn coerces_scalars_and_checkbox_booleans() {
        let (_dir, storage) = temp_storage();
        let mut form = SubmittedForm::new();
        form.push_text("title", "Hello");
        form.push_text("views", "42");
        form.push_text("published", "on");
        let out = run_format(&form, FormMode::Create, &storage).await;
        assert!(out.violations.is_empty());
        assert_eq!(out.payload.get("title"), Some(&FieldValue::Text("Hello".into())));
        assert_eq!(out.payload.get("views"), Some(&FieldValue::Int(42)));
        assert_eq!(out.payload.get("published"), Some(&FieldValue::Bool(true)));
    }

    #[tokio::test]
    async fn empty_optional_scalar_becomes_explicit_unset() {
        let (_dir, storage) = temp_storage();
        let mut form = SubmittedForm::new();
        form.push_text("title", "t");
        form.push_text("views", "");
        let out = run_format(&form, FormMode::Update, &storage).await;
        assert_eq!(out.payload.get("views"), Some(&FieldValue::Null));
        // An unaddressed optional field stays absent.
        assert_eq!(out.payload.get("published"), None);
    }

    #[tokio::test]
    async fn coercion_failure_is_a_violation_not_a_drop() {
        let (_dir, storage) = temp_storage();
        let mut form = SubmittedForm::new();
        form.push_text("title", "t");
        form.push_text("views", "many");
        let out = run_format(&form, FormMode::Create, &storage).await;
        assert_eq!(out.payload.get("views"), None);
        assert_eq!(out.violations.len(), 1);
        assert_eq!(out.violations[0].field, "views");
    }

    #[tokio::test]
    async fn relations_link_on_create_and_replace_on_update() {
        let (_dir, storage) = temp_storage();
        let mut form = SubmittedForm::new();
        form.push_text("title", "t");
        form.push_text("author", "7");
        let created = run_format(&form, FormMode::Create, &storage).await;
        assert_eq!(
            created.payload.get("author"),
            Some(&FieldValue::Relation(RelationDirective::Link(vec![
                RecordId::Int(7)
            ])))
        );
        let updated = run_format(&form, FormMode::Update, &storage).await;
        assert_eq!(
            updated.payload.get("author"),
            Some(&FieldValue::Relation(RelationDirective::Replace(vec![
                RecordId::Int(7)
            ])))
        );
    }

    #[tokio::test]
    async fn file_upload_persists_and_yields_handle() {
        let (dir, storage) = temp_storage();
        let mut form = SubmittedForm::new();
        form.push_text("title", "t");
        form.push_blob(
            "cover",
            UploadedBlob {
                filename: "c.png".into(),
                content_type: Some("image/png".into()),
                bytes: b"img".to_vec(),
            },
        );
        let out = run_format(&form, FormMode::Create, &storage).await;
        let Some(FieldValue::FileRef(handle)) = out.payload.get("cover") else {
            panic!("expected file handle");
        };
        assert!(dir.path().join(handle).exists());
    }

    #[tokio::test]
    async fn file_removal_marker_deletes_previous_artifact() {
        let (dir, storage) = temp_storage();
        let handle = storage
            .store(
                "cover",
                &UploadedBlob {
                    filename: "old.png".into(),
                    content_type: None,
                    bytes: b"old".to_vec(),
                },
            )
            .await
            .unwrap();
        assert!(dir.path().join(&handle).exists());

        let mut form = SubmittedForm::new();
        form.push_text("title", "t");
        form.push_text("cover", FILE_REMOVE_MARKER);
        form.push_text(format!("cover{}", ARTIFACT_KEY_SUFFIX), handle.clone());
        let out = run_format(&form, FormMode::Update, &storage).await;
        assert_eq!(out.payload.get("cover"), Some(&FieldValue::Null));
        assert!(!dir.path().join(&handle).exists());
    }

    #[tokio::test]
    async fn custom_formatter_overrides_builtin_coercion() {
        let (_dir, storage) = temp_storage();
        let schema: SchemaDescriptor = serde_json::from_value(serde_json::json!({
            "models": [{
                "name": "Post",
                "fields": [
                    {"name": "id", "kind": "scalar", "type": "int"},
                    {"name": "title", "kind": "scalar", "type": "text"}
                ]
            }]
        }))
        .unwrap();
        let options = AdminOptions::default().field(
            "Post",
            "title",
            FieldOptions {
                formatter: Some(Arc::new(|raw, mode| {
                    let text = raw.as_text().unwrap_or_default().trim();
                    let suffix = match mode {
                        FormMode::Create => " (new)",
                        FormMode::Update => "",
                    };
                    Ok(FieldValue::Text(format!("{}{}", text, suffix)))
                })),
                ..FieldOptions::default()
            },
        );
        let registry = resolve(&schema, &options).unwrap();
        let post = registry.resource("post").unwrap();
        let mut form = SubmittedForm::new();
        form.push_text("title", "  Hi  ");
        let out = FieldFormatter::format(&form, &registry, post, FormMode::Create, &storage)
            .await
            .unwrap();
        assert_eq!(
            out.payload.get("title"),
            Some(&FieldValue::Text("Hi (new)".into()))
        );
    }
}
