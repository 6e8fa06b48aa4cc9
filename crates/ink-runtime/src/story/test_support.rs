use std::sync::Mutex;

use ink_core::InkError;

use super::{HostFunctionRegistry, Story, StoryOptions};
use crate::value::Value;

pub(crate) const LINES: &str =
    r##"{"inkVersion":17,"root":[["^Hello","\n","^World","\n","done",null],"done",null]}"##;

pub(crate) const CHOICES: &str = r##"{"inkVersion":17,"root":[["^Hello","\n","ev","str","^Apple","/str","/ev",{"*":"0.c-0","flg":20},"ev","str","^Banana","/str","/ev",{"*":"0.c-1","flg":20},{"c-0":["^Ate apple","\n","end",{"#f":5}],"c-1":["^Ate banana","\n","end",{"#f":5}]}],"done",null]}"##;

pub(crate) const VARIABLES: &str = r##"{"inkVersion":17,"root":[["ev",{"VAR?":"x"},"out","/ev","\n","ev",{"VAR?":"x"},1,"+",{"VAR=":"x","re":true},"/ev","ev",{"VAR?":"x"},"out","/ev","\n","end",null],"done",{"global decl":["ev",5,{"VAR=":"x"},"/ev","end",null]}]}"##;

pub(crate) const DOUBLE: &str = r##"{"inkVersion":17,"root":[["ev",21,{"f()":"double"},"out","/ev","\n","end",null],"done",{"double":[{"temp=":"x"},"ev",{"VAR?":"x"},2,"*","/ev","~ret",{"#f":1}]}]}"##;

pub(crate) const EXTERNAL_ADD: &str = r##"{"inkVersion":17,"root":[["ev",3,4,{"x()":"add","exArgs":2},"out","/ev","\n","end",null],"done",null]}"##;

pub(crate) const EXTERNAL_ADD_WITH_FALLBACK: &str = r##"{"inkVersion":17,"root":[["ev",3,4,{"x()":"add","exArgs":2},"out","/ev","\n","end",null],"done",{"add":[{"temp=":"b"},{"temp=":"a"},"ev",{"VAR?":"a"},{"VAR?":"b"},"-","/ev","~ret",{"#f":1}]}]}"##;

pub(crate) fn story(json: &str) -> Story {
    story_with_seed(json, 1)
}

pub(crate) fn story_with_seed(json: &str, seed: i32) -> Story {
    Story::with_options(
        json,
        StoryOptions {
            random_seed: Some(seed),
            ..StoryOptions::default()
        },
    )
    .expect("story should load")
}

/// Every line until the story stops at a choice or the end.
pub(crate) fn lines(story: &mut Story) -> Vec<String> {
    let mut lines = Vec::new();
    while story.can_continue() {
        lines.push(story.continue_story().expect("continue should pass"));
    }
    lines
}

pub(crate) fn choice_texts(story: &Story) -> Vec<String> {
    story
        .current_choices()
        .iter()
        .map(|choice| choice.text().to_string())
        .collect()
}

pub(crate) fn error_codes(story: &Story) -> Vec<&str> {
    story
        .current_errors()
        .iter()
        .map(|error| error.code.as_str())
        .collect()
}

/// Host functions that add their int arguments and log every call.
pub(crate) struct TestRegistry {
    names: Vec<String>,
    pub(crate) calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl TestRegistry {
    pub(crate) fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|name| name.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl HostFunctionRegistry for TestRegistry {
    fn call(&self, name: &str, args: &[Value]) -> Result<Option<Value>, InkError> {
        self.calls
            .lock()
            .expect("calls lock should not be poisoned")
            .push((name.to_string(), args.to_vec()));
        let sum = args.iter().filter_map(Value::as_int).sum();
        Ok(Some(Value::Int(sum)))
    }

    fn names(&self) -> &[String] {
        &self.names
    }
}
