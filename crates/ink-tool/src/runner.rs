use std::path::Path;

use ink_api::{create_story_from_json, CreateStoryOptions};

use crate::source::{read_story_json_from_dir, read_test_case};
use crate::{ExpectedEvent, InkToolError, TestAction, TestCase};

const MAX_STEPS: usize = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub observed_events: Vec<ExpectedEvent>,
    pub consumed_actions: usize,
    pub steps: usize,
}

/// Plays the story under `example_dir`, answering choices from the case's
/// actions in order.
pub fn run_case(example_dir: &Path, case: &TestCase) -> Result<RunReport, InkToolError> {
    let story_json = read_story_json_from_dir(example_dir)?;
    let mut story = create_story_from_json(CreateStoryOptions {
        story_json,
        host_functions: None,
        random_seed: Some(case.random_seed),
        allow_external_function_fallbacks: true,
    })?;

    let mut observed_events = Vec::new();
    let mut action_index = 0usize;

    for step in 1..=MAX_STEPS {
        if story.can_continue() {
            let line = story.continue_story()?;
            if story.has_error() {
                return Err(InkToolError::Narrative {
                    event_index: observed_events.len(),
                    messages: story
                        .current_errors()
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                });
            }
            let text = line.trim_end_matches('\n');
            if !text.is_empty() {
                observed_events.push(ExpectedEvent::Text {
                    text: text.to_string(),
                    tags: story.current_tags(),
                });
            }
            continue;
        }

        let choices = story
            .current_choices()
            .iter()
            .map(|choice| choice.text().to_string())
            .collect::<Vec<_>>();
        if choices.is_empty() {
            observed_events.push(ExpectedEvent::End);
            if action_index != case.actions.len() {
                return Err(InkToolError::UnusedActions {
                    used: action_index,
                    total: case.actions.len(),
                });
            }
            return Ok(RunReport {
                observed_events,
                consumed_actions: action_index,
                steps: step,
            });
        }

        observed_events.push(ExpectedEvent::Choices { choices });
        let event_index = observed_events.len() - 1;
        let action = case
            .actions
            .get(action_index)
            .ok_or_else(|| InkToolError::MissingAction {
                event_index,
                expected_action_kind: "choose".to_string(),
            })?;
        match action {
            TestAction::Choose { index } => story.choose_choice_index(*index)?,
        }
        action_index += 1;
    }

    Err(InkToolError::GuardExceeded {
        max_steps: MAX_STEPS,
    })
}

pub fn assert_case(example_dir: &Path, case_path: &Path) -> Result<(), InkToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(example_dir, &case)?;

    if report.observed_events.len() != case.expected_events.len() {
        let observed = serde_json::to_string_pretty(&report.observed_events)
            .map_err(InkToolError::EventSerialize)?;
        return Err(InkToolError::EventCountMismatch {
            expected: case.expected_events.len(),
            actual: report.observed_events.len(),
            observed,
        });
    }

    for (index, (expected, actual)) in case
        .expected_events
        .iter()
        .zip(report.observed_events.iter())
        .enumerate()
    {
        if expected != actual {
            let expected =
                serde_json::to_string(expected).map_err(InkToolError::EventSerialize)?;
            let actual = serde_json::to_string(actual).map_err(InkToolError::EventSerialize)?;
            return Err(InkToolError::EventMismatch {
                index,
                expected,
                actual,
            });
        }
    }

    Ok(())
}
