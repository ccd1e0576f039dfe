//! Validation of dynamic activity forms.
//!
//! A submission is a JSON object keyed by field name. Each value is checked
//! against the field's declared kind and turned into a typed [`FieldValue`],
//! or into pending uploads that the caller stores before persisting. All
//! errors are collected and reported together, before anything is written.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use model::entities::activity_field::{self, FieldKind};
use model::entities::activity_field_option;
use model::entities::user_activity::FieldValue;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ComputeError, FieldErrors, Result};

pub const REQUIRED: &str = "The field is required.";
pub const MAX_IMAGES: usize = 10;
const TEXT_MAX_CHARS: usize = 255;
const TEXTAREA_MAX_CHARS: usize = 65_535;

/// Accepted extensions and size ceiling for one kind of upload.
#[derive(Debug, Clone, Copy)]
pub struct MediaRule {
    pub extensions: &'static [&'static str],
    pub max_kb: usize,
}

pub const FILE_RULE: MediaRule = MediaRule {
    extensions: &["csv", "doc", "docx", "xls", "xlsx", "pdf", "txt"],
    max_kb: 1024,
};
pub const IMAGE_RULE: MediaRule = MediaRule {
    extensions: &["jpeg", "jpg", "png", "bmp"],
    max_kb: 5120,
};
pub const AUDIO_RULE: MediaRule = MediaRule {
    extensions: &["mpeg", "mpga", "mp3", "wav"],
    max_kb: 2048,
};
pub const VIDEO_RULE: MediaRule = MediaRule {
    extensions: &["avi", "mpeg", "mov", "qt", "mp4"],
    max_kb: 13_000,
};

/// What the validator needs to know about one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub title: String,
    pub kind: FieldKind,
    pub is_required: bool,
    /// Allowed option values. Empty means unrestricted.
    pub options: Vec<String>,
}

impl FieldSpec {
    pub fn from_model(field: &activity_field::Model, options: &[activity_field_option::Model]) -> Self {
        Self {
            name: field.name.clone(),
            title: field.title.clone(),
            kind: field.field_type,
            is_required: field.is_required,
            options: options.iter().map(|o| o.value.clone()).collect(),
        }
    }
}

/// A decoded upload waiting to be written to the media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn size_kb(&self) -> usize {
        self.bytes.len().div_ceil(1024)
    }
}

/// Wire shape of an upload: base64 content plus its original name.
#[derive(Debug, Deserialize)]
struct RawUpload {
    file_name: String,
    #[serde(default)]
    content_type: Option<String>,
    data: String,
}

/// A validated value, possibly still holding uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    Value(FieldValue),
    File(Upload),
    Images(Vec<Upload>),
}

/// The validated submission, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptedForm {
    pub entries: BTreeMap<String, Accepted>,
}

impl AcceptedForm {
    pub fn upload_count(&self) -> usize {
        self.entries
            .values()
            .map(|a| match a {
                Accepted::Value(_) => 0,
                Accepted::File(_) => 1,
                Accepted::Images(items) => items.len(),
            })
            .sum()
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

/// Validates `input` against `fields`. Keys that match no field are ignored.
pub fn validate_submission(fields: &[FieldSpec], input: &Map<String, Value>) -> Result<AcceptedForm> {
    let mut errors = FieldErrors::new();
    let mut form = AcceptedForm::default();

    for field in fields {
        let raw = input.get(&field.name);
        if is_blank(raw) {
            if field.is_required {
                errors.entry(field.name.clone()).or_default().push(REQUIRED.to_string());
            }
            continue;
        }
        let Some(raw) = raw else { continue };

        match accept(field, raw) {
            Ok(accepted) => {
                form.entries.insert(field.name.clone(), accepted);
            }
            Err(messages) => {
                errors.entry(field.name.clone()).or_default().extend(messages);
            }
        }
    }

    if errors.is_empty() {
        debug!(fields = form.entries.len(), uploads = form.upload_count(), "submission accepted");
        Ok(form)
    } else {
        debug!(?errors, "submission rejected");
        Err(ComputeError::Validation(errors))
    }
}

fn accept(field: &FieldSpec, raw: &Value) -> std::result::Result<Accepted, Vec<String>> {
    match field.kind {
        FieldKind::Text => text(raw, TEXT_MAX_CHARS).map(|s| Accepted::Value(FieldValue::Text(s))),
        FieldKind::Textarea => {
            text(raw, TEXTAREA_MAX_CHARS).map(|s| Accepted::Value(FieldValue::Text(s)))
        }
        FieldKind::Integer | FieldKind::Number => {
            integer(raw).map(|n| Accepted::Value(FieldValue::Integer(n)))
        }
        FieldKind::Date => date(raw).map(|d| Accepted::Value(FieldValue::Date(d))),
        FieldKind::File => media(raw, FILE_RULE).map(Accepted::File),
        FieldKind::Image => media(raw, IMAGE_RULE).map(Accepted::File),
        FieldKind::Audio => media(raw, AUDIO_RULE).map(Accepted::File),
        FieldKind::Video => media(raw, VIDEO_RULE).map(Accepted::File),
        FieldKind::MultiImages => images(raw).map(Accepted::Images),
        FieldKind::Checkbox => choices(raw, &field.options).map(|c| Accepted::Value(FieldValue::Choices(c))),
        FieldKind::Dropdown | FieldKind::Radio | FieldKind::Select2 => {
            choice(raw, &field.options).map(|c| Accepted::Value(FieldValue::Choice(c)))
        }
    }
}

fn text(raw: &Value, max_chars: usize) -> std::result::Result<String, Vec<String>> {
    let s = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(vec!["The field must be a string.".to_string()]),
    };
    if s.chars().count() > max_chars {
        return Err(vec![format!("The field must not be greater than {max_chars} characters.")]);
    }
    Ok(s)
}

fn integer(raw: &Value) -> std::result::Result<i64, Vec<String>> {
    let parsed = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| vec!["The field must be an integer.".to_string()])
}

fn date(raw: &Value) -> std::result::Result<NaiveDate, Vec<String>> {
    raw.as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .ok_or_else(|| vec!["The field is not a valid date.".to_string()])
}

fn decode_upload(raw: &Value) -> std::result::Result<Upload, String> {
    let parsed: RawUpload = serde_json::from_value(raw.clone())
        .map_err(|_| "The field must be a file.".to_string())?;
    let bytes = STANDARD
        .decode(parsed.data.trim())
        .map_err(|_| "The field must be a file.".to_string())?;
    Ok(Upload {
        file_name: parsed.file_name,
        content_type: parsed.content_type,
        bytes,
    })
}

fn check_rule(upload: &Upload, rule: MediaRule) -> Vec<String> {
    let mut messages = Vec::new();
    let ext_ok = upload
        .extension()
        .is_some_and(|ext| rule.extensions.contains(&ext.as_str()));
    if !ext_ok {
        messages.push(format!(
            "The field must be a file of type: {}.",
            rule.extensions.join(", ")
        ));
    }
    if upload.size_kb() > rule.max_kb {
        messages.push(format!("The field must not be greater than {} kilobytes.", rule.max_kb));
    }
    messages
}

fn media(raw: &Value, rule: MediaRule) -> std::result::Result<Upload, Vec<String>> {
    let upload = decode_upload(raw).map_err(|m| vec![m])?;
    let messages = check_rule(&upload, rule);
    if messages.is_empty() { Ok(upload) } else { Err(messages) }
}

fn images(raw: &Value) -> std::result::Result<Vec<Upload>, Vec<String>> {
    let Value::Array(items) = raw else {
        return Err(vec!["The field must be an array.".to_string()]);
    };
    if items.len() > MAX_IMAGES {
        return Err(vec![format!("The field must not have more than {MAX_IMAGES} items.")]);
    }
    let mut uploads = Vec::with_capacity(items.len());
    let mut messages = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match media(item, IMAGE_RULE) {
            Ok(upload) => uploads.push(upload),
            Err(errs) => messages.extend(errs.into_iter().map(|m| format!("Item {}: {m}", index + 1))),
        }
    }
    if messages.is_empty() { Ok(uploads) } else { Err(messages) }
}

fn choices(raw: &Value, options: &[String]) -> std::result::Result<Vec<String>, Vec<String>> {
    let values: Vec<String> = match raw {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| vec!["The field must be an array of strings.".to_string()])?,
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect(),
        _ => return Err(vec!["The field must be an array.".to_string()]),
    };
    if !options.is_empty() && values.iter().any(|v| !options.contains(v)) {
        return Err(vec!["The selected field is invalid.".to_string()]);
    }
    Ok(values)
}

fn choice(raw: &Value, options: &[String]) -> std::result::Result<String, Vec<String>> {
    let value = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(vec!["The field must be a string.".to_string()]),
    };
    if !options.is_empty() && !options.contains(&value) {
        return Err(vec!["The selected field is invalid.".to_string()]);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str, kind: FieldKind, required: bool, options: &[&str]) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            title: name.to_string(),
            kind,
            is_required: required,
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn upload(name: &str, bytes: usize) -> Value {
        json!({ "file_name": name, "content_type": "application/octet-stream", "data": STANDARD.encode(vec![7u8; bytes]) })
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn field_errors(err: ComputeError) -> FieldErrors {
        match err {
            ComputeError::Validation(errors) => errors,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn required_fields_reject_blank_values() {
        let fields = vec![
            spec("topic", FieldKind::Text, true, &[]),
            spec("photos", FieldKind::MultiImages, true, &[]),
            spec("notes", FieldKind::Textarea, false, &[]),
        ];
        let errors = field_errors(
            validate_submission(&fields, &input(json!({ "topic": "  ", "photos": [] }))).unwrap_err(),
        );
        assert_eq!(errors["topic"], vec![REQUIRED.to_string()]);
        assert_eq!(errors["photos"], vec![REQUIRED.to_string()]);
        assert!(!errors.contains_key("notes"));
    }

    #[test]
    fn scalar_kinds_are_typed() {
        let fields = vec![
            spec("participants", FieldKind::Integer, true, &[]),
            spec("held_on", FieldKind::Date, true, &[]),
            spec("venue", FieldKind::Dropdown, true, &["school", "mosque"]),
            spec("audience", FieldKind::Checkbox, false, &["men", "women"]),
        ];
        let form = validate_submission(
            &fields,
            &input(json!({
                "participants": "35",
                "held_on": "2026-02-14",
                "venue": "school",
                "audience": ["women", "men"],
                "unrelated": 1
            })),
        )
        .unwrap();

        assert_eq!(form.entries["participants"], Accepted::Value(FieldValue::Integer(35)));
        assert_eq!(
            form.entries["held_on"],
            Accepted::Value(FieldValue::Date(NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()))
        );
        assert_eq!(form.entries["venue"], Accepted::Value(FieldValue::Choice("school".to_string())));
        assert_eq!(
            form.entries["audience"],
            Accepted::Value(FieldValue::Choices(vec!["women".to_string(), "men".to_string()]))
        );
        assert!(!form.entries.contains_key("unrelated"));
    }

    #[test]
    fn type_errors_are_collected_per_field() {
        let fields = vec![
            spec("participants", FieldKind::Integer, true, &[]),
            spec("held_on", FieldKind::Date, true, &[]),
            spec("venue", FieldKind::Radio, true, &["school"]),
        ];
        let errors = field_errors(
            validate_submission(
                &fields,
                &input(json!({ "participants": "many", "held_on": "14/02/2026", "venue": "park" })),
            )
            .unwrap_err(),
        );
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["participants"], vec!["The field must be an integer.".to_string()]);
        assert_eq!(errors["held_on"], vec!["The field is not a valid date.".to_string()]);
        assert_eq!(errors["venue"], vec!["The selected field is invalid.".to_string()]);
    }

    #[test]
    fn media_rules_check_extension_and_size() {
        let fields = vec![
            spec("report", FieldKind::File, true, &[]),
            spec("clip", FieldKind::Audio, true, &[]),
        ];
        let errors = field_errors(
            validate_submission(
                &fields,
                &input(json!({
                    "report": upload("report.exe", 10),
                    "clip": upload("clip.mp3", 3 * 1024 * 1024)
                })),
            )
            .unwrap_err(),
        );
        assert!(errors["report"][0].starts_with("The field must be a file of type: csv"));
        assert_eq!(errors["clip"], vec!["The field must not be greater than 2048 kilobytes.".to_string()]);

        let ok = validate_submission(&fields, &input(json!({
            "report": upload("Report.PDF", 1024),
            "clip": upload("clip.wav", 2048 * 1024)
        })))
        .unwrap();
        assert_eq!(ok.upload_count(), 2);
    }

    #[test]
    fn multi_images_keep_order_and_cap_count() {
        let fields = vec![spec("photos", FieldKind::MultiImages, true, &[])];
        let form = validate_submission(
            &fields,
            &input(json!({ "photos": [upload("1.png", 5), upload("2.jpg", 5), upload("3.bmp", 5)] })),
        )
        .unwrap();
        let Accepted::Images(images) = &form.entries["photos"] else {
            panic!("expected images");
        };
        let names: Vec<_> = images.iter().map(|u| u.file_name.as_str()).collect();
        assert_eq!(names, vec!["1.png", "2.jpg", "3.bmp"]);

        let eleven: Vec<Value> = (0..11).map(|i| upload(&format!("{i}.png"), 1)).collect();
        let errors = field_errors(
            validate_submission(&fields, &input(json!({ "photos": eleven }))).unwrap_err(),
        );
        assert_eq!(errors["photos"], vec!["The field must not have more than 10 items.".to_string()]);
    }

    #[test]
    fn undecodable_upload_is_rejected() {
        let fields = vec![spec("photo", FieldKind::Image, true, &[])];
        let errors = field_errors(
            validate_submission(
                &fields,
                &input(json!({ "photo": { "file_name": "a.png", "data": "***" } })),
            )
            .unwrap_err(),
        );
        assert_eq!(errors["photo"], vec!["The field must be a file.".to_string()]);
    }
}
