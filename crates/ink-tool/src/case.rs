use serde::{Deserialize, Serialize};

pub const TESTCASE_SCHEMA_V1: &str = "ink-tool-case.v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    #[serde(default = "default_random_seed")]
    pub random_seed: i32,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub expected_events: Vec<ExpectedEvent>,
}

fn default_random_seed() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TestAction {
    Choose { index: usize },
}

impl TestAction {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Choose { .. } => "choose",
        }
    }
}

/// One observable step of a playthrough. Text lines drop their newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExpectedEvent {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tags: Vec<String>,
    },
    Choices {
        choices: Vec<String>,
    },
    End,
}

#[cfg(test)]
mod case_tests {
    use super::*;

    #[test]
    fn default_random_seed_is_fixed() {
        assert_eq!(default_random_seed(), 1);
    }

    #[test]
    fn test_action_kind_name_reports_expected_value() {
        assert_eq!(TestAction::Choose { index: 0 }.kind_name(), "choose");
    }

    #[test]
    fn testcase_deserialize_applies_defaults() {
        let parsed: TestCase = serde_json::from_str(
            r#"{
  "schemaVersion": "ink-tool-case.v1"
}"#,
        )
        .expect("testcase should deserialize");

        assert_eq!(parsed.schema_version, TESTCASE_SCHEMA_V1);
        assert_eq!(parsed.random_seed, 1);
        assert!(parsed.actions.is_empty());
        assert!(parsed.expected_events.is_empty());
    }

    #[test]
    fn expected_event_deserialize_supports_all_variants() {
        let parsed: Vec<ExpectedEvent> = serde_json::from_str(
            r#"[
  {"kind":"text","text":"a"},
  {"kind":"text","text":"b","tags":["loud"]},
  {"kind":"choices","choices":["A"]},
  {"kind":"end"}
]"#,
        )
        .expect("events should deserialize");

        assert_eq!(parsed.len(), 4);
        assert_eq!(
            parsed[0],
            ExpectedEvent::Text {
                text: "a".to_string(),
                tags: Vec::new(),
            }
        );
        assert!(matches!(&parsed[1], ExpectedEvent::Text { tags, .. } if tags == &["loud"]));
        assert!(matches!(parsed[2], ExpectedEvent::Choices { .. }));
        assert!(matches!(parsed[3], ExpectedEvent::End));
    }

    #[test]
    fn text_without_tags_serializes_compactly() {
        let event = ExpectedEvent::Text {
            text: "a".to_string(),
            tags: Vec::new(),
        };
        assert_eq!(
            serde_json::to_string(&event).expect("event should serialize"),
            r#"{"kind":"text","text":"a"}"#
        );
    }
}
