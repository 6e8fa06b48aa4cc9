use std::fs;

use ink_api::{create_story_from_json, resume_story_from_json, CreateStoryOptions, ResumeStoryOptions};
use ink_runtime::Story;
use ink_test_example::{demos_root, story_path, testcase_path};
use ink_tool::{assert_case, discover_case_dirs, read_test_case};

fn play_to_end(story: &mut Story, actions: &[usize]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut actions = actions.iter();
    loop {
        while story.can_continue() {
            lines.push(story.continue_story().expect("continue should pass"));
        }
        assert!(!story.has_error(), "errors: {:?}", story.current_errors());
        if story.current_choices().is_empty() {
            return lines;
        }
        let index = actions.next().copied().expect("an action per choice");
        story.choose_choice_index(index).expect("choose should pass");
    }
}

fn choose_indices(name: &str) -> Vec<usize> {
    let case = read_test_case(&testcase_path(name)).expect("testcase should parse");
    case.actions
        .iter()
        .map(|action| match action {
            ink_tool::TestAction::Choose { index } => *index,
        })
        .collect()
}

#[test]
fn every_demo_story_matches_its_testcase() {
    let dirs = discover_case_dirs(&demos_root());
    assert!(!dirs.is_empty(), "expected demo stories");

    for dir in dirs {
        if let Err(error) = assert_case(&dir, &dir.join("testcase.json")) {
            panic!("demo {} failed: {}", dir.display(), error);
        }
    }
}

#[test]
fn saving_after_every_line_replays_the_same_transcript() {
    for dir in discover_case_dirs(&demos_root()) {
        let name = dir
            .file_name()
            .expect("demo dir should have a name")
            .to_string_lossy()
            .to_string();
        let story_json = fs::read_to_string(story_path(&name)).expect("story should be readable");
        let actions = choose_indices(&name);

        let mut straight = create_story_from_json(CreateStoryOptions {
            story_json: story_json.clone(),
            host_functions: None,
            random_seed: Some(1),
            allow_external_function_fallbacks: true,
        })
        .expect("story should build");
        let expected = play_to_end(&mut straight, &actions);

        let mut story = create_story_from_json(CreateStoryOptions {
            story_json: story_json.clone(),
            host_functions: None,
            random_seed: Some(1),
            allow_external_function_fallbacks: true,
        })
        .expect("story should build");
        let mut lines = Vec::new();
        let mut actions_left = actions.iter();
        loop {
            if story.can_continue() {
                lines.push(story.continue_story().expect("continue should pass"));
            } else if let Some(index) = actions_left.next() {
                story.choose_choice_index(*index).expect("choose should pass");
            } else {
                break;
            }
            let save_json = story.to_json().expect("save should pass");
            story = resume_story_from_json(ResumeStoryOptions {
                story_json: story_json.clone(),
                save_json,
                host_functions: None,
                allow_external_function_fallbacks: true,
            })
            .expect("resume should pass");
        }

        assert_eq!(lines, expected, "demo {}", name);
    }
}
