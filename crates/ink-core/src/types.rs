use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const INK_VERSION_CURRENT: i32 = 17;
pub const INK_VERSION_MINIMUM_COMPATIBLE: i32 = 16;
pub const INK_SAVE_STATE_VERSION: i32 = 7;
pub const INK_SAVE_STATE_MINIMUM_COMPATIBLE: i32 = 6;

/// Top level of a compiled `.ink.json` story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryFile {
    #[serde(rename = "inkVersion")]
    pub ink_version: i32,
    pub root: JsonValue,
    #[serde(rename = "listDefs", default)]
    pub list_defs: BTreeMap<String, BTreeMap<String, i32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStackElementFile {
    #[serde(rename = "cPath", default, skip_serializing_if = "Option::is_none")]
    pub container_path: Option<String>,
    #[serde(rename = "idx", default)]
    pub index: i32,
    #[serde(rename = "exp", default)]
    pub in_expression_evaluation: bool,
    #[serde(rename = "type")]
    pub push_type: i32,
    #[serde(rename = "temp", default)]
    pub temporary_variables: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStackThreadFile {
    pub callstack: Vec<CallStackElementFile>,
    pub thread_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_content_object: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStackFile {
    pub threads: Vec<CallStackThreadFile>,
    pub thread_counter: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceFile {
    pub text: String,
    pub index: usize,
    pub original_choice_path: String,
    pub original_thread_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_invisible_default: bool,
}

/// Persisted execution state, one document per save slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStateFile {
    pub ink_save_version: i32,
    #[serde(default)]
    pub ink_format_version: i32,
    pub callstack_threads: CallStackFile,
    pub variables_state: BTreeMap<String, JsonValue>,
    pub eval_stack: Vec<JsonValue>,
    pub output_stream: Vec<JsonValue>,
    pub current_choices: Vec<ChoiceFile>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub choice_threads: BTreeMap<String, CallStackThreadFile>,
    pub visit_counts: BTreeMap<String, i32>,
    pub turn_indices: BTreeMap<String, i32>,
    pub turn_idx: i32,
    pub story_seed: i32,
    #[serde(default)]
    pub previous_random: i32,
    #[serde(
        rename = "currRightGlue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_right_glue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_divert_target: Option<String>,
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn story_file_defaults_missing_list_defs() {
        let parsed: StoryFile =
            serde_json::from_str(r#"{"inkVersion":17,"root":[["done",null],null]}"#)
                .expect("story file should parse");
        assert_eq!(parsed.ink_version, INK_VERSION_CURRENT);
        assert!(parsed.list_defs.is_empty());
        assert!(parsed.root.is_array());
    }

    #[test]
    fn save_state_uses_wire_key_names() {
        let save = SaveStateFile {
            ink_save_version: INK_SAVE_STATE_VERSION,
            ink_format_version: INK_VERSION_CURRENT,
            callstack_threads: CallStackFile {
                threads: vec![CallStackThreadFile {
                    callstack: vec![CallStackElementFile {
                        container_path: Some("0".to_string()),
                        index: 2,
                        in_expression_evaluation: false,
                        push_type: 0,
                        temporary_variables: BTreeMap::new(),
                    }],
                    thread_index: 0,
                    previous_content_object: None,
                }],
                thread_counter: 0,
            },
            variables_state: BTreeMap::new(),
            eval_stack: Vec::new(),
            output_stream: Vec::new(),
            current_choices: Vec::new(),
            choice_threads: BTreeMap::new(),
            visit_counts: BTreeMap::new(),
            turn_indices: BTreeMap::new(),
            turn_idx: -1,
            story_seed: 42,
            previous_random: 0,
            current_right_glue: Some("0.3".to_string()),
            current_divert_target: None,
        };

        let encoded = serde_json::to_value(&save).expect("save should encode");
        let object = encoded.as_object().expect("save is an object");
        for key in [
            "inkSaveVersion",
            "inkFormatVersion",
            "callstackThreads",
            "variablesState",
            "evalStack",
            "outputStream",
            "currentChoices",
            "visitCounts",
            "turnIndices",
            "turnIdx",
            "storySeed",
            "currRightGlue",
        ] {
            assert!(object.contains_key(key), "missing key {}", key);
        }
        assert!(!object.contains_key("choiceThreads"));
        assert!(!object.contains_key("currentDivertTarget"));
        assert_eq!(encoded["callstackThreads"]["threads"][0]["callstack"][0]["cPath"], "0");

        let decoded: SaveStateFile = serde_json::from_value(encoded).expect("save should decode");
        assert_eq!(decoded, save);
    }

    #[test]
    fn choice_file_reads_invisible_default_flag() {
        let plain: ChoiceFile = serde_json::from_str(
            r#"{"text":"a","index":0,"originalChoicePath":"0.3","originalThreadIndex":0}"#,
        )
        .expect("choice should parse");
        assert!(!plain.is_invisible_default);

        let fallback: ChoiceFile = serde_json::from_str(
            r#"{"text":"","index":1,"originalChoicePath":"0.4","originalThreadIndex":0,"isInvisibleDefault":true}"#,
        )
        .expect("choice should parse");
        assert!(fallback.is_invisible_default);
    }
}
