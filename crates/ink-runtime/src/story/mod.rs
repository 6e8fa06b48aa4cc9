//! The story engine and the host API around it.

mod choices;
mod continuation;
mod external;
mod flow_control;
mod step;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod flow_tests;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ink_core::{InkError, Path};

use crate::choice::Choice;
use crate::graph::{NodeId, StoryGraph};
use crate::rng::time_seed;
use crate::story_state::StoryState;
use crate::value::Value;

pub use external::{ExternalFunction, FunctionResult, HostFunctionRegistry};

use external::ExternalBinding;

pub type VariableObserver = Box<dyn FnMut(&str, &Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryOptions {
    /// Fixed seed for `RANDOM` and shuffles; a time-derived one otherwise.
    pub random_seed: Option<i32>,
    /// Unbound external functions run the ink function of the same name.
    pub allow_external_function_fallbacks: bool,
}

impl Default for StoryOptions {
    fn default() -> Self {
        Self {
            random_seed: None,
            allow_external_function_fallbacks: true,
        }
    }
}

/// A running story: the shared content graph plus one execution state.
pub struct Story {
    graph: Arc<StoryGraph>,
    state: StoryState,
    snapshot_at_last_newline: Option<StoryState>,
    externals: BTreeMap<String, ExternalBinding>,
    observers: BTreeMap<String, Vec<VariableObserver>>,
    options: StoryOptions,
    has_validated_externals: bool,
    saw_lookahead_unsafe_function_after_newline: bool,
    continue_depth: usize,
}

impl fmt::Debug for Story {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Story")
            .field("options", &self.options)
            .field("externals", &self.externals.keys().collect::<Vec<_>>())
            .field("observed", &self.observers.keys().collect::<Vec<_>>())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Story {
    pub fn new(json: &str) -> Result<Self, InkError> {
        Self::with_options(json, StoryOptions::default())
    }

    pub fn with_options(json: &str, options: StoryOptions) -> Result<Self, InkError> {
        let graph = StoryGraph::from_json(json)?;
        Self::from_graph(Arc::new(graph), options)
    }

    /// Starts a story over an already loaded graph, which may be shared with
    /// other stories.
    pub fn from_graph(graph: Arc<StoryGraph>, options: StoryOptions) -> Result<Self, InkError> {
        let seed = options.random_seed.unwrap_or_else(time_seed);
        let state = StoryState::new(&graph, seed);
        let mut story = Self {
            graph,
            state,
            snapshot_at_last_newline: None,
            externals: BTreeMap::new(),
            observers: BTreeMap::new(),
            options,
            has_validated_externals: false,
            saw_lookahead_unsafe_function_after_newline: false,
            continue_depth: 0,
        };
        story.reset_globals()?;
        Ok(story)
    }

    pub fn story_graph(&self) -> &Arc<StoryGraph> {
        &self.graph
    }

    pub fn state(&self) -> &StoryState {
        &self.state
    }

    pub fn options(&self) -> StoryOptions {
        self.options
    }

    pub fn can_continue(&self) -> bool {
        self.state.can_continue()
    }

    /// Choices the player can pick from, without invisible defaults.
    pub fn current_choices(&self) -> Vec<&Choice> {
        self.state
            .current_choices
            .iter()
            .filter(|choice| !choice.is_invisible_default)
            .collect()
    }

    pub fn current_text(&self) -> String {
        self.state.current_text()
    }

    pub fn current_tags(&self) -> Vec<String> {
        self.state.current_tags()
    }

    /// Tags at the very top of the story.
    pub fn global_tags(&self) -> Result<Vec<String>, InkError> {
        self.graph.tags_at_start_of_flow_container(&Path::root())
    }

    /// Tags at the start of a knot or stitch.
    pub fn tags_for_content_at_path(&self, path: &str) -> Result<Vec<String>, InkError> {
        self.graph
            .tags_at_start_of_flow_container(&Path::parse(path))
    }

    pub fn current_errors(&self) -> &[InkError] {
        self.state.current_errors()
    }

    pub fn current_warnings(&self) -> &[String] {
        self.state.current_warnings()
    }

    pub fn has_error(&self) -> bool {
        self.state.has_error()
    }

    pub fn has_warning(&self) -> bool {
        self.state.has_warning()
    }

    pub fn reset_errors(&mut self) {
        self.state.reset_errors();
    }

    pub fn visit_count_at_path_string(&self, path: &str) -> i32 {
        self.state.visit_count_at_path_string(path)
    }

    pub fn turns_since_for_path_string(&self, path: &str) -> i32 {
        self.state.turns_since_for_path_string(path)
    }

    /// Back to the beginning with fresh globals. Bindings and observers stay.
    pub fn reset_state(&mut self) -> Result<(), InkError> {
        let seed = self.options.random_seed.unwrap_or_else(time_seed);
        self.state = StoryState::new(&self.graph, seed);
        self.snapshot_at_last_newline = None;
        self.reset_globals()
    }

    /// Runs the `global decl` container so declared globals get their initial
    /// values, then records those as the defaults.
    fn reset_globals(&mut self) -> Result<(), InkError> {
        if self.knot_container_with_name("global decl").is_some() {
            let original_pointer = self.state.current_pointer();
            self.state.start_patching();
            self.choose_path(&Path::parse("global decl"), false)?;
            self.continue_internal()?;
            self.state.set_current_pointer(original_pointer);
            self.state.apply_any_patch();
        }
        self.state.variables_state.snapshot_default_globals();
        self.state.variables_state.take_changed_variables();
        Ok(())
    }

    pub(crate) fn knot_container_with_name(&self, name: &str) -> Option<NodeId> {
        self.graph
            .container(self.graph.root())
            .named_content
            .get(name)
            .copied()
            .filter(|node| self.graph.is_container(*node))
    }

    /// Current value of a global variable.
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.state
            .variables_state
            .global(name, self.state.patch.as_ref())
            .cloned()
    }

    /// Sets a global declared by the story. Observers hear about it at once.
    pub fn set_variable(&mut self, name: &str, value: Value) -> Result<(), InkError> {
        if !self
            .state
            .variables_state
            .default_globals()
            .contains_key(name)
        {
            return Err(InkError::new(
                "STORY_VARIABLE_UNDECLARED",
                format!(
                    "Cannot assign to a variable ({}) that hasn't been declared in the story",
                    name
                ),
            ));
        }
        self.state
            .variables_state
            .set_global(name, value, self.state.patch.as_mut());
        if self.continue_depth == 0 {
            self.notify_variable_observers();
        }
        Ok(())
    }

    /// Calls `observer` whenever the global `name` changes. Changes made while
    /// the story continues are reported once the continue finishes.
    pub fn observe_variable<F>(&mut self, name: &str, observer: F) -> Result<(), InkError>
    where
        F: FnMut(&str, &Value) + 'static,
    {
        if !self
            .state
            .variables_state
            .global_exists(name, self.state.patch.as_ref())
        {
            return Err(InkError::new(
                "STORY_VARIABLE_UNDECLARED",
                format!(
                    "Cannot observe variable '{}' because it wasn't declared in the ink story.",
                    name
                ),
            ));
        }
        self.observers
            .entry(name.to_string())
            .or_default()
            .push(Box::new(observer));
        Ok(())
    }

    pub fn remove_variable_observers(&mut self, name: &str) {
        self.observers.remove(name);
    }

    fn notify_variable_observers(&mut self) {
        let changed = self.state.variables_state.take_changed_variables();
        for name in changed {
            let Some(observers) = self.observers.get_mut(&name) else {
                continue;
            };
            let Some(value) = self.state.variables_state.global(&name, None).cloned() else {
                continue;
            };
            for observer in observers.iter_mut() {
                observer(&name, &value);
            }
        }
    }

    /// Save state as JSON.
    pub fn to_json(&self) -> Result<String, InkError> {
        self.state.to_json(&self.graph)
    }

    /// Replaces the execution state with a saved one. On error the current
    /// state is untouched.
    pub fn load_json(&mut self, json: &str) -> Result<(), InkError> {
        let mut state = self.state.clone();
        state.load_json(&self.graph, json)?;
        self.state = state;
        self.snapshot_at_last_newline = None;
        Ok(())
    }
}
