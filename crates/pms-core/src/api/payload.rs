//! Record payloads with optional file attachments.
//!
//! A payload is sent as JSON unless it carries a file. Files force multipart
//! encoding, where nested objects and arrays travel as their JSON text in a
//! single form field.

use serde::Serialize;
use serde_json::{Map, Value};

use super::request::{Attachment, FormValue, RequestBody};
use super::ApiError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Map<String, Value>,
    attachments: Vec<(String, Attachment)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any record that serializes to a JSON object
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, ApiError> {
        match serde_json::to_value(record) {
            Ok(Value::Object(fields)) => Ok(Self {
                fields,
                attachments: Vec::new(),
            }),
            Ok(other) => Err(ApiError::InvalidRequest(format!(
                "payload must be an object, got {}",
                other
            ))),
            Err(e) => Err(ApiError::InvalidRequest(format!(
                "failed to serialize payload: {}",
                e
            ))),
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Attach a file; `None` leaves the field out entirely
    pub fn attach(mut self, name: &str, file: Option<Attachment>) -> Self {
        self.fields.remove(name);
        if let Some(file) = file {
            self.attachments.push((name.to_string(), file));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn into_body(self) -> RequestBody {
        if self.has_attachments() {
            self.into_multipart()
        } else {
            RequestBody::Json(Value::Object(self.fields))
        }
    }

    /// Multipart encoding regardless of attachments
    pub fn into_multipart(self) -> RequestBody {
        let mut parts: Vec<(String, FormValue)> = self
            .fields
            .into_iter()
            .filter_map(|(name, value)| form_text(value).map(|text| (name, FormValue::Text(text))))
            .collect();
        parts.extend(
            self.attachments
                .into_iter()
                .map(|(name, file)| (name, FormValue::File(file))),
        );
        RequestBody::Multipart(parts)
    }
}

fn form_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested @ (Value::Array(_) | Value::Object(_)) => Some(nested.to_string()),
    }
}
