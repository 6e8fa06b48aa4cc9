use ink_core::{InkError, Path, StoryFile, INK_VERSION_CURRENT, INK_VERSION_MINIMUM_COMPATIBLE};
use serde_json::{Map, Value as JsonValue};

use super::{json_error, value_from_json};
use crate::graph::{Container, Content, GraphBuilder, NodeId, StoryGraph};
use crate::list::{ListDefinition, ListDefinitions};
use crate::native_ops::NativeOp;
use crate::object::{
    ChoicePoint, ControlCommand, Divert, DivertKind, GlueKind, PushPopType, VariableAssignment,
    VariableReference,
};

impl StoryGraph {
    /// Reads a compiled story document.
    pub fn from_json(source: &str) -> Result<Self, InkError> {
        let file: StoryFile = serde_json::from_str(source)
            .map_err(|error| json_error("STORY_JSON", format!("Invalid story JSON: {}", error)))?;
        Self::from_story_file(file)
    }

    pub fn from_story_file(file: StoryFile) -> Result<Self, InkError> {
        check_ink_version(file.ink_version)?;

        let definitions = file
            .list_defs
            .into_iter()
            .map(|(name, items)| ListDefinition::new(name, items))
            .collect();

        let JsonValue::Array(root) = &file.root else {
            return Err(json_error(
                "STORY_JSON",
                "Story root must be a container array.",
            ));
        };
        let mut builder = GraphBuilder::default();
        let root = read_container(&mut builder, root)?;
        builder.finish(root, ListDefinitions::new(definitions))
    }
}

fn check_ink_version(version: i32) -> Result<(), InkError> {
    if version > INK_VERSION_CURRENT {
        return Err(json_error(
            "STORY_VERSION",
            format!(
                "Story was compiled for ink format {}, newer than the supported {}.",
                version, INK_VERSION_CURRENT
            ),
        ));
    }
    if version < INK_VERSION_MINIMUM_COMPATIBLE {
        return Err(json_error(
            "STORY_VERSION",
            format!(
                "Story was compiled for ink format {}, older than the minimum supported {}.",
                version, INK_VERSION_MINIMUM_COMPATIBLE
            ),
        ));
    }
    if version != INK_VERSION_CURRENT {
        log::warn!(
            "story ink format {} differs from current {}; loading anyway",
            version,
            INK_VERSION_CURRENT
        );
    }
    Ok(())
}

/// A container array ends with `null` or an object holding named-only
/// children plus the `#f` count flags and `#n` name.
fn read_container(builder: &mut GraphBuilder, items: &[JsonValue]) -> Result<NodeId, InkError> {
    let id = builder.push(Content::Container(Container::default()));
    let Some((terminator, content)) = items.split_last() else {
        return Ok(id);
    };

    for token in content {
        let child = read_content(builder, token)?;
        builder.container_mut(id).content.push(child);
        if let Some(name) = builder.container_name(child) {
            builder.container_mut(id).named_content.insert(name, child);
        }
    }

    match terminator {
        JsonValue::Null => Ok(id),
        JsonValue::Object(map) => {
            read_terminator(builder, id, map)?;
            Ok(id)
        }
        other => Err(json_error(
            "STORY_JSON",
            format!("Container must end with null or an object, found {}.", other),
        )),
    }
}

fn read_terminator(
    builder: &mut GraphBuilder,
    id: NodeId,
    map: &Map<String, JsonValue>,
) -> Result<(), InkError> {
    for (key, token) in map {
        match key.as_str() {
            "#f" => {
                let flags = token.as_i64().unwrap_or(0) as i32;
                builder.container_mut(id).set_count_flags(flags);
            }
            "#n" => {
                builder.container_mut(id).name = token.as_str().map(str::to_string);
            }
            name => {
                let JsonValue::Array(items) = token else {
                    return Err(json_error(
                        "STORY_JSON",
                        format!("Named content '{}' must be a container.", name),
                    ));
                };
                let child = read_container(builder, items)?;
                builder.container_mut(child).name = Some(name.to_string());
                builder
                    .container_mut(id)
                    .named_content
                    .insert(name.to_string(), child);
            }
        }
    }
    Ok(())
}

fn read_content(builder: &mut GraphBuilder, token: &JsonValue) -> Result<NodeId, InkError> {
    if let JsonValue::Array(items) = token {
        return read_container(builder, items);
    }
    let content = content_from_token(token)?;
    Ok(builder.push(content))
}

fn content_from_token(token: &JsonValue) -> Result<Content, InkError> {
    if let Some(value) = value_from_json(token) {
        return Ok(Content::Value(value));
    }
    let content = match token {
        JsonValue::String(text) => content_from_string(text),
        JsonValue::Object(map) => content_from_object(map),
        _ => None,
    };
    content.ok_or_else(|| {
        json_error(
            "STORY_JSON",
            format!("Failed to convert token to runtime object: {}", token),
        )
    })
}

fn content_from_string(text: &str) -> Option<Content> {
    if text == "void" {
        return Some(Content::Void);
    }
    if let Some(kind) = GlueKind::from_token(text) {
        return Some(Content::Glue(kind));
    }
    if let Some(command) = ControlCommand::from_token(text) {
        return Some(Content::Command(command));
    }
    NativeOp::from_token(text).map(Content::NativeCall)
}

fn flag(map: &Map<String, JsonValue>, key: &str) -> bool {
    map.get(key).and_then(JsonValue::as_bool).unwrap_or(false)
}

fn content_from_object(map: &Map<String, JsonValue>) -> Option<Content> {
    for (key, push_type) in [
        ("->", None),
        ("f()", Some(PushPopType::Function)),
        ("->t->", Some(PushPopType::Tunnel)),
        ("x()", None),
    ] {
        let Some(target) = map.get(key).and_then(JsonValue::as_str) else {
            continue;
        };
        let kind = if key == "x()" {
            DivertKind::External {
                name: target.to_string(),
                args: map.get("exArgs").and_then(JsonValue::as_u64).unwrap_or(0) as usize,
            }
        } else if flag(map, "var") {
            DivertKind::Variable(target.to_string())
        } else {
            DivertKind::Path {
                path: Path::parse(target),
                pointer: None,
            }
        };
        return Some(Content::Divert(Divert {
            kind,
            is_conditional: flag(map, "c"),
            push_type,
        }));
    }

    if let Some(path) = map.get("*").and_then(JsonValue::as_str) {
        let flags = map.get("flg").and_then(JsonValue::as_i64).unwrap_or(0) as i32;
        return Some(Content::ChoicePoint(ChoicePoint::from_flags(
            Path::parse(path),
            flags,
        )));
    }

    if let Some(name) = map.get("VAR?").and_then(JsonValue::as_str) {
        return Some(Content::VariableReference(VariableReference::Named(
            name.to_string(),
        )));
    }
    if let Some(path) = map.get("CNT?").and_then(JsonValue::as_str) {
        return Some(Content::VariableReference(VariableReference::ReadCount {
            path: Path::parse(path),
            container: None,
        }));
    }

    for (key, is_global) in [("VAR=", true), ("temp=", false)] {
        if let Some(name) = map.get(key).and_then(JsonValue::as_str) {
            return Some(Content::VariableAssignment(VariableAssignment {
                name: name.to_string(),
                is_new_declaration: !flag(map, "re"),
                is_global,
            }));
        }
    }

    map.get("#")
        .and_then(JsonValue::as_str)
        .map(|text| Content::Tag(text.to_string()))
}
