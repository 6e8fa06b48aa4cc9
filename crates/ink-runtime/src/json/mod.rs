//! Hand-written codecs between runtime objects and their JSON tokens.
//!
//! The top-level story and save documents are serde structs in `ink-core`; the
//! tokens inside them are heterogeneous and go through the helpers here.

mod read;
mod save;
mod write;

use ink_core::{InkError, Path};
use serde_json::{json, Map, Value as JsonValue};

use crate::list::{InkList, InkListItem};
use crate::object::{ControlCommand, GlueKind, Object};
use crate::value::Value;

pub(crate) fn json_error(code: &str, message: impl Into<String>) -> InkError {
    InkError::new(code, message)
}

pub(crate) fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Int(value) => json!(value),
        Value::Float(value) => float_to_json(*value),
        Value::String(text) if text == "\n" => json!("\n"),
        Value::String(text) => json!(format!("^{}", text)),
        Value::List(list) => list_to_json(list),
        Value::DivertTarget(path) => json!({ "^->": path.to_string() }),
        Value::VariablePointer {
            name,
            context_index,
        } => json!({ "^var": name, "ci": context_index }),
    }
}

fn float_to_json(value: f32) -> JsonValue {
    // Whole floats must keep a fraction or they read back as ints.
    let widened = f64::from(value);
    match serde_json::Number::from_f64(widened) {
        Some(number) => JsonValue::Number(number),
        None => JsonValue::Null,
    }
}

fn list_to_json(list: &InkList) -> JsonValue {
    let mut items = Map::new();
    for (item, value) in list.iter() {
        items.insert(item.full_name(), json!(value));
    }
    let mut object = Map::new();
    object.insert("list".to_string(), JsonValue::Object(items));
    if list.is_empty() && !list.origin_names().is_empty() {
        object.insert("origins".to_string(), json!(list.origin_names()));
    }
    JsonValue::Object(object)
}

/// Literal values: numbers, `^text`, `\n`, divert targets, variable pointers
/// and lists. `None` when the token is something else.
pub(crate) fn value_from_json(token: &JsonValue) -> Option<Value> {
    match token {
        JsonValue::Number(number) => Some(match number.as_i64() {
            Some(int) => Value::Int(int as i32),
            None => Value::Float(number.as_f64().unwrap_or(0.0) as f32),
        }),
        JsonValue::String(text) if text == "\n" => Some(Value::String("\n".to_string())),
        JsonValue::String(text) => text
            .strip_prefix('^')
            .map(|rest| Value::String(rest.to_string())),
        JsonValue::Object(object) => value_from_json_object(object),
        _ => None,
    }
}

fn value_from_json_object(object: &Map<String, JsonValue>) -> Option<Value> {
    if let Some(path) = object.get("^->").and_then(JsonValue::as_str) {
        return Some(Value::DivertTarget(Path::parse(path)));
    }
    if let Some(name) = object.get("^var").and_then(JsonValue::as_str) {
        let context_index = object
            .get("ci")
            .and_then(JsonValue::as_i64)
            .unwrap_or(-1) as i32;
        return Some(Value::VariablePointer {
            name: name.to_string(),
            context_index,
        });
    }
    let items = object.get("list")?.as_object()?;
    let mut list = InkList::new();
    for (full_name, value) in items {
        let rank = value.as_i64().unwrap_or(0) as i32;
        list.insert(InkListItem::from_full_name(full_name), rank);
    }
    if let Some(origins) = object.get("origins").and_then(JsonValue::as_array) {
        list.set_initial_origin_names(
            origins
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect(),
        );
    }
    Some(Value::List(list))
}

pub(crate) fn object_to_json(object: &Object) -> JsonValue {
    match object {
        Object::Value(value) => value_to_json(value),
        Object::Void => json!("void"),
        Object::Glue(kind) => json!(kind.token()),
        Object::Command(command) => json!(command.token()),
        Object::Tag(text) => json!({ "#": text }),
    }
}

/// Objects that can appear on the output stream or the evaluation stack.
pub(crate) fn object_from_json(token: &JsonValue) -> Result<Object, InkError> {
    if let Some(value) = value_from_json(token) {
        return Ok(Object::Value(value));
    }
    let object = match token {
        JsonValue::String(text) if text == "void" => Some(Object::Void),
        JsonValue::String(text) => GlueKind::from_token(text)
            .map(Object::Glue)
            .or_else(|| ControlCommand::from_token(text).map(Object::Command)),
        JsonValue::Object(map) => map
            .get("#")
            .and_then(JsonValue::as_str)
            .map(|text| Object::Tag(text.to_string())),
        _ => None,
    };
    object.ok_or_else(|| {
        json_error(
            "SAVE_OBJECT",
            format!("Failed to read runtime object from {}", token),
        )
    })
}
