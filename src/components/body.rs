// Request Body Component
//
// Exposes request body fields as fuzzable parts. Two encodings are handled:
//
// - JSON: every scalar leaf is a part, keyed by its dotted path
//     {"user": {"id": 7}, "tags": ["a"]}  →  user.id = "7", tags.0 = "a"
//   A '.' or '\' inside a field name is escaped with '\': {"a.b": 1} → a\.b
// - Form (application/x-www-form-urlencoded): one part per field
//
// Non-string JSON leaves keep their type when the new value still parses as
// that type, so restoring "7" on a number leaf yields the number 7 again.

use serde_json::Value;

use super::query::{form_decode, form_encode};
use super::{set_pair_at, Component};
use crate::error::FuzzError;
use crate::models::{FuzzRequest, PartKind};
use crate::values::value_to_string;

#[derive(Debug, Clone)]
enum BodyData {
    Empty,
    /// Current state plus the body as parsed, used to keep leaf types stable
    Json { current: Value, pristine: Value },
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct BodyComponent {
    request: FuzzRequest,
    data: BodyData,
}

impl BodyComponent {
    pub fn parse(request: &FuzzRequest) -> Result<Self, FuzzError> {
        let data = match request.body.as_deref() {
            None => BodyData::Empty,
            Some(body) if body.trim().is_empty() => BodyData::Empty,
            Some(body) if is_json(request, body) => {
                let parsed: Value = serde_json::from_str(body)
                    .map_err(|e| FuzzError::InvalidRequest(format!("malformed JSON body: {}", e)))?;
                BodyData::Json {
                    current: parsed.clone(),
                    pristine: parsed,
                }
            }
            Some(body) => BodyData::Form(form_decode(body)?),
        };

        Ok(Self {
            request: request.clone(),
            data,
        })
    }
}

fn is_json(request: &FuzzRequest, body: &str) -> bool {
    match request.header("Content-Type") {
        Some(content_type) => content_type.to_ascii_lowercase().contains("json"),
        None => {
            let trimmed = body.trim_start();
            trimmed.starts_with('{') || trimmed.starts_with('[')
        }
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('\\', "\\\\").replace('.', "\\.")
}

/// Split a dotted key back into raw field names, honouring escapes
fn split_key(key: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn collect_leaves(value: &Value, prefix: &str, out: &mut Vec<(String, String)>) {
    let join = |segment: &str| {
        let segment = escape_segment(segment);
        if prefix.is_empty() {
            segment
        } else {
            format!("{}.{}", prefix, segment)
        }
    };

    match value {
        Value::Object(map) => {
            for (k, v) in map {
                collect_leaves(v, &join(k), out);
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                collect_leaves(v, &join(&i.to_string()), out);
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.push((prefix.to_string(), value_to_string(leaf)));
            }
        }
    }
}

fn json_pointer(key: &str) -> String {
    split_key(key)
        .iter()
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

fn leaf_mut<'a>(root: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    match root.pointer_mut(&json_pointer(key))? {
        Value::Object(_) | Value::Array(_) => None,
        leaf => Some(leaf),
    }
}

fn typed_like(original: &Value, new_value: &str) -> Value {
    if original.is_string() {
        return Value::String(new_value.to_string());
    }
    match serde_json::from_str::<Value>(new_value) {
        Ok(parsed) if !parsed.is_string() && !parsed.is_object() && !parsed.is_array() => parsed,
        _ => Value::String(new_value.to_string()),
    }
}

impl Component for BodyComponent {
    fn kind(&self) -> PartKind {
        PartKind::Body
    }

    fn iterate(&self) -> Vec<(String, String)> {
        match &self.data {
            BodyData::Empty => Vec::new(),
            BodyData::Json { current, .. } => {
                let mut leaves = Vec::new();
                collect_leaves(current, "", &mut leaves);
                leaves
            }
            BodyData::Form(fields) => fields.clone(),
        }
    }

    fn set_value(&mut self, key: &str, value: &str) -> Result<(), FuzzError> {
        match &mut self.data {
            BodyData::Empty => Err(FuzzError::InvalidKey(key.to_string())),
            BodyData::Json { current, pristine } => {
                let leaf = leaf_mut(current, key).ok_or_else(|| FuzzError::InvalidKey(key.to_string()))?;
                *leaf = match pristine.pointer(&json_pointer(key)) {
                    Some(original) => typed_like(original, value),
                    None => Value::String(value.to_string()),
                };
                Ok(())
            }
            BodyData::Form(fields) => match fields.iter_mut().find(|(k, _)| k == key) {
                Some((_, v)) => {
                    *v = value.to_string();
                    Ok(())
                }
                None => Err(FuzzError::InvalidKey(key.to_string())),
            },
        }
    }

    /// Form fields may repeat and are addressed by position; JSON keys are unique
    fn set_value_at(&mut self, position: usize, key: &str, value: &str) -> Result<(), FuzzError> {
        if let BodyData::Form(fields) = &mut self.data {
            return set_pair_at(fields, position, key, value, |a, b| a == b);
        }
        self.set_value(key, value)
    }

    fn rebuild(&self) -> Result<FuzzRequest, FuzzError> {
        let mut request = self.request.clone();
        match &self.data {
            BodyData::Empty => {}
            BodyData::Json { current, .. } => {
                request.body = Some(serde_json::to_string(current).map_err(|e| FuzzError::Build(e.to_string()))?);
            }
            BodyData::Form(fields) => {
                request.body = Some(form_encode(fields)?);
            }
        }
        Ok(request)
    }
}
