use std::sync::Arc;

use ink_core::InkError;
use ink_runtime::{HostFunctionRegistry, Story, StoryGraph, StoryOptions};

#[derive(Clone)]
pub struct CreateStoryOptions {
    pub story_json: String,
    pub host_functions: Option<Arc<dyn HostFunctionRegistry>>,
    pub random_seed: Option<i32>,
    pub allow_external_function_fallbacks: bool,
}

#[derive(Clone)]
pub struct ResumeStoryOptions {
    pub story_json: String,
    pub save_json: String,
    pub host_functions: Option<Arc<dyn HostFunctionRegistry>>,
    pub allow_external_function_fallbacks: bool,
}

pub fn load_story_graph(story_json: &str) -> Result<Arc<StoryGraph>, InkError> {
    StoryGraph::from_json(story_json).map(Arc::new)
}

pub fn create_story_from_json(options: CreateStoryOptions) -> Result<Story, InkError> {
    let graph = load_story_graph(&options.story_json)?;
    create_story_from_graph(
        graph,
        options.host_functions,
        StoryOptions {
            random_seed: options.random_seed,
            allow_external_function_fallbacks: options.allow_external_function_fallbacks,
        },
    )
}

pub fn resume_story_from_json(options: ResumeStoryOptions) -> Result<Story, InkError> {
    let graph = load_story_graph(&options.story_json)?;
    let mut story = create_story_from_graph(
        graph,
        options.host_functions,
        StoryOptions {
            random_seed: None,
            allow_external_function_fallbacks: options.allow_external_function_fallbacks,
        },
    )?;
    story.load_json(&options.save_json)?;
    Ok(story)
}

/// Starts a story over a graph that other stories may share.
pub fn create_story_from_graph(
    graph: Arc<StoryGraph>,
    host_functions: Option<Arc<dyn HostFunctionRegistry>>,
    options: StoryOptions,
) -> Result<Story, InkError> {
    let mut story = Story::from_graph(graph, options)?;
    if let Some(registry) = host_functions {
        story.bind_host_functions(registry)?;
    }
    Ok(story)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ink_runtime::Value;

    const STORY: &str = r##"{"inkVersion":17,"root":[["^Hello","\n","ev","str","^Pick","/str","/ev",{"*":"0.c-0","flg":20},"done",{"c-0":["ev",1,2,{"x()":"add","exArgs":2},"out","/ev","\n","end",{"#f":5}]}],"done",null]}"##;

    struct AddRegistry {
        names: Vec<String>,
    }

    impl HostFunctionRegistry for AddRegistry {
        fn call(&self, _name: &str, args: &[Value]) -> Result<Option<Value>, InkError> {
            Ok(Some(Value::Int(args.iter().filter_map(Value::as_int).sum())))
        }

        fn names(&self) -> &[String] {
            &self.names
        }
    }

    fn registry() -> Arc<dyn HostFunctionRegistry> {
        Arc::new(AddRegistry {
            names: vec!["add".to_string()],
        })
    }

    #[test]
    fn create_story_from_json_binds_host_functions() {
        let mut story = create_story_from_json(CreateStoryOptions {
            story_json: STORY.to_string(),
            host_functions: Some(registry()),
            random_seed: Some(7),
            allow_external_function_fallbacks: true,
        })
        .expect("story should build");

        assert_eq!(story.continue_story().expect("continue should pass"), "Hello\n");
        story.choose_choice_index(0).expect("choose should pass");
        assert_eq!(story.continue_story().expect("continue should pass"), "3\n");
    }

    #[test]
    fn create_story_from_json_rejects_bad_story() {
        let error = create_story_from_json(CreateStoryOptions {
            story_json: r#"{"inkVersion":3,"root":[null]}"#.to_string(),
            host_functions: None,
            random_seed: None,
            allow_external_function_fallbacks: true,
        })
        .expect_err("old story version should fail");
        assert_eq!(error.code, "STORY_VERSION");
    }

    #[test]
    fn create_story_without_bindings_reports_missing_external() {
        let mut story = create_story_from_json(CreateStoryOptions {
            story_json: STORY.to_string(),
            host_functions: None,
            random_seed: Some(7),
            allow_external_function_fallbacks: true,
        })
        .expect("story should build");
        let error = story
            .continue_story()
            .expect_err("unbound external should fail");
        assert_eq!(error.code, "STORY_EXTERNAL_MISSING");
    }

    #[test]
    fn resume_story_from_json_resumes_from_save() {
        let mut story = create_story_from_json(CreateStoryOptions {
            story_json: STORY.to_string(),
            host_functions: Some(registry()),
            random_seed: Some(1),
            allow_external_function_fallbacks: true,
        })
        .expect("story should build");
        story.continue_story().expect("continue should pass");
        let save_json = story.to_json().expect("save should pass");

        let mut resumed = resume_story_from_json(ResumeStoryOptions {
            story_json: STORY.to_string(),
            save_json,
            host_functions: Some(registry()),
            allow_external_function_fallbacks: true,
        })
        .expect("resume should pass");
        assert_eq!(resumed.current_choices().len(), 1);
        resumed.choose_choice_index(0).expect("choose should pass");
        assert_eq!(resumed.continue_story().expect("continue should pass"), "3\n");
    }

    #[test]
    fn stories_can_share_one_graph() {
        let graph = load_story_graph(STORY).expect("graph should load");
        let mut first = create_story_from_graph(
            Arc::clone(&graph),
            Some(registry()),
            StoryOptions::default(),
        )
        .expect("story should build");
        let second = create_story_from_graph(graph, None, StoryOptions::default())
            .expect("story should build");

        first.continue_story().expect("continue should pass");
        assert!(first.current_choices().len() == 1);
        assert!(second.current_choices().is_empty());
        assert!(Arc::ptr_eq(first.story_graph(), second.story_graph()));
    }
}
