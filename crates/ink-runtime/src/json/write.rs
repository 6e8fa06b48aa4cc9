use ink_core::{InkError, StoryFile, INK_VERSION_CURRENT};
use serde_json::{json, Map, Value as JsonValue};

use super::{json_error, value_to_json};
use crate::graph::{Content, NodeId, StoryGraph};
use crate::object::{DivertKind, PushPopType, VariableReference};

impl StoryGraph {
    /// Writes the graph back to the compiled story format.
    pub fn to_json(&self) -> Result<String, InkError> {
        serde_json::to_string(&self.to_story_file())
            .map_err(|error| json_error("STORY_JSON", format!("Failed to write story: {}", error)))
    }

    pub fn to_story_file(&self) -> StoryFile {
        let list_defs = self
            .list_definitions()
            .lists()
            .map(|definition| (definition.name().to_string(), definition.raw_items().clone()))
            .collect();
        StoryFile {
            ink_version: INK_VERSION_CURRENT,
            root: self.container_to_json(self.root(), false),
            list_defs,
        }
    }

    fn container_to_json(&self, id: NodeId, without_name: bool) -> JsonValue {
        let container = self.container(id);
        let mut items: Vec<JsonValue> = container
            .content
            .iter()
            .map(|child| self.node_to_json(*child))
            .collect();

        let mut terminator = Map::new();
        for (name, child) in container.named_only_content() {
            terminator.insert(name.clone(), self.container_to_json(child, true));
        }
        let flags = container.count_flags();
        if flags > 0 {
            terminator.insert("#f".to_string(), json!(flags));
        }
        if let Some(name) = container.name.as_ref().filter(|_| !without_name) {
            terminator.insert("#n".to_string(), json!(name));
        }

        items.push(if terminator.is_empty() {
            JsonValue::Null
        } else {
            JsonValue::Object(terminator)
        });
        JsonValue::Array(items)
    }

    fn node_to_json(&self, id: NodeId) -> JsonValue {
        match self.content(id) {
            Content::Container(_) => self.container_to_json(id, false),
            Content::Value(value) => value_to_json(value),
            Content::Void => json!("void"),
            Content::Glue(kind) => json!(kind.token()),
            Content::Command(command) => json!(command.token()),
            Content::NativeCall(op) => json!(op.token()),
            Content::Tag(text) => json!({ "#": text }),
            Content::Divert(divert) => {
                let mut map = Map::new();
                let (key, target) = match &divert.kind {
                    DivertKind::External { name, .. } => ("x()", name.clone()),
                    DivertKind::Variable(name) => (divert_key(divert.push_type), name.clone()),
                    DivertKind::Path { path, .. } => {
                        (divert_key(divert.push_type), path.to_string())
                    }
                };
                map.insert(key.to_string(), json!(target));
                if matches!(divert.kind, DivertKind::Variable(_)) {
                    map.insert("var".to_string(), json!(true));
                }
                if divert.is_conditional {
                    map.insert("c".to_string(), json!(true));
                }
                if let DivertKind::External { args, .. } = divert.kind {
                    if args > 0 {
                        map.insert("exArgs".to_string(), json!(args));
                    }
                }
                JsonValue::Object(map)
            }
            Content::ChoicePoint(choice) => json!({
                "*": choice.path_on_choice.to_string(),
                "flg": choice.flags(),
            }),
            Content::VariableReference(VariableReference::Named(name)) => json!({ "VAR?": name }),
            Content::VariableReference(VariableReference::ReadCount { path, .. }) => {
                json!({ "CNT?": path.to_string() })
            }
            Content::VariableAssignment(assignment) => {
                let key = if assignment.is_global { "VAR=" } else { "temp=" };
                let mut map = Map::new();
                map.insert(key.to_string(), json!(assignment.name));
                if !assignment.is_new_declaration {
                    map.insert("re".to_string(), json!(true));
                }
                JsonValue::Object(map)
            }
        }
    }
}

fn divert_key(push_type: Option<PushPopType>) -> &'static str {
    match push_type {
        Some(PushPopType::Function) => "f()",
        Some(PushPopType::Tunnel) => "->t->",
        _ => "->",
    }
}

#[cfg(test)]
mod write_tests {
    use super::*;

    const STORY: &str = r##"{"inkVersion":17,"root":[["^Hi",{"->t->":"knot"},"ev",{"VAR?":"x"},1,"+",{"temp=":"y","re":true},"/ev",{"*":".^.c-0","flg":20},{"c-0":["^chosen","\n",{"->":"0.3","c":true},{"#f":5}]}],"done",{"knot":[{"#":"t"},"G<","->->",{"#f":1}],"global decl":["ev",{"list":{"Colours.red":1}},{"VAR=":"x"},"/ev","end",null]}],"listDefs":{"Colours":{"red":1}}}"##;

    #[test]
    fn written_story_reads_back_identically() {
        let graph = StoryGraph::from_json(STORY).expect("story should load");
        let written = graph.to_json().expect("story should write");
        let reread = StoryGraph::from_json(&written).expect("written story should load");
        assert_eq!(reread, graph);
    }

    #[test]
    fn named_only_children_carry_no_name_key() {
        let graph = StoryGraph::from_json(STORY).expect("story should load");
        let file = graph.to_story_file();
        let terminator = &file.root.as_array().expect("root array")[2];
        assert!(terminator["knot"].is_array());
        let knot = terminator["knot"].as_array().expect("knot array");
        assert_eq!(knot.last(), Some(&json!({"#f": 1})));
    }
}
