use std::collections::BTreeMap;

use ink_core::{InkError, Path};

use crate::callstack::CallStack;
use crate::choice::Choice;
use crate::graph::{NodeId, StoryGraph};
use crate::object::Object;
use crate::pointer::Pointer;
use crate::state_patch::StatePatch;
use crate::variables_state::VariablesState;

/// Everything that changes while a story runs.
///
/// Cloning is the snapshot mechanism: the lookahead protocol and host-side
/// saves both work on clones.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryState {
    pub(crate) output_stream: Vec<Object>,
    pub(crate) evaluation_stack: Vec<Object>,
    pub(crate) current_choices: Vec<Choice>,
    pub(crate) current_errors: Vec<InkError>,
    pub(crate) current_warnings: Vec<String>,
    pub(crate) visit_counts: BTreeMap<String, i32>,
    pub(crate) turn_indices: BTreeMap<String, i32>,
    pub(crate) current_turn_index: i32,
    pub(crate) story_seed: i32,
    pub(crate) previous_random: i32,
    pub(crate) did_safe_exit: bool,
    pub(crate) current_right_glue: Option<NodeId>,
    pub(crate) diverted_pointer: Option<Pointer>,
    pub(crate) call_stack: CallStack,
    pub(crate) variables_state: VariablesState,
    pub(crate) patch: Option<StatePatch>,
}

impl StoryState {
    pub fn new(graph: &StoryGraph, story_seed: i32) -> Self {
        Self {
            output_stream: Vec::new(),
            evaluation_stack: Vec::new(),
            current_choices: Vec::new(),
            current_errors: Vec::new(),
            current_warnings: Vec::new(),
            visit_counts: BTreeMap::new(),
            turn_indices: BTreeMap::new(),
            current_turn_index: -1,
            story_seed,
            previous_random: 0,
            did_safe_exit: false,
            current_right_glue: None,
            diverted_pointer: None,
            call_stack: CallStack::new(graph.root()),
            variables_state: VariablesState::new(graph.list_definitions().clone()),
            patch: None,
        }
    }

    pub fn output_stream(&self) -> &[Object] {
        &self.output_stream
    }

    pub fn evaluation_stack(&self) -> &[Object] {
        &self.evaluation_stack
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    pub fn variables_state(&self) -> &VariablesState {
        &self.variables_state
    }

    pub fn current_choices(&self) -> &[Choice] {
        &self.current_choices
    }

    pub fn current_errors(&self) -> &[InkError] {
        &self.current_errors
    }

    pub fn current_warnings(&self) -> &[String] {
        &self.current_warnings
    }

    pub fn has_error(&self) -> bool {
        !self.current_errors.is_empty()
    }

    pub fn has_warning(&self) -> bool {
        !self.current_warnings.is_empty()
    }

    pub fn current_turn_index(&self) -> i32 {
        self.current_turn_index
    }

    pub fn story_seed(&self) -> i32 {
        self.story_seed
    }

    pub fn previous_random(&self) -> i32 {
        self.previous_random
    }

    pub fn did_safe_exit(&self) -> bool {
        self.did_safe_exit
    }

    pub fn current_pointer(&self) -> Option<Pointer> {
        self.call_stack.current_element().current_pointer
    }

    pub(crate) fn set_current_pointer(&mut self, pointer: Option<Pointer>) {
        self.call_stack.current_element_mut().current_pointer = pointer;
    }

    pub fn previous_pointer(&self) -> Option<Pointer> {
        self.call_stack.current_thread().previous_pointer
    }

    pub(crate) fn set_previous_pointer(&mut self, pointer: Option<Pointer>) {
        self.call_stack.current_thread_mut().previous_pointer = pointer;
    }

    pub fn in_expression_evaluation(&self) -> bool {
        self.call_stack.current_element().in_expression_evaluation
    }

    pub(crate) fn set_in_expression_evaluation(&mut self, value: bool) {
        self.call_stack.current_element_mut().in_expression_evaluation = value;
    }

    pub fn can_continue(&self) -> bool {
        self.current_pointer().is_some() && !self.has_error()
    }

    pub(crate) fn add_error(&mut self, error: InkError) {
        log::error!("{}", error);
        self.current_errors.push(error);
    }

    pub(crate) fn add_warning(&mut self, message: String) {
        log::warn!("{}", message);
        self.current_warnings.push(message);
    }

    pub(crate) fn reset_errors(&mut self) {
        self.current_errors.clear();
        self.current_warnings.clear();
    }

    pub(crate) fn push_evaluation_stack(&mut self, object: Object) {
        self.evaluation_stack.push(object);
    }

    pub(crate) fn pop_evaluation_stack(&mut self) -> Result<Object, InkError> {
        self.evaluation_stack.pop().ok_or_else(|| {
            InkError::new(
                "RUNTIME_EVALUATION_STACK",
                "Tried to pop from an empty evaluation stack.",
            )
        })
    }

    /// Pops `count` objects, returned in push order.
    pub(crate) fn pop_evaluation_stack_n(&mut self, count: usize) -> Result<Vec<Object>, InkError> {
        if count > self.evaluation_stack.len() {
            return Err(InkError::new(
                "RUNTIME_EVALUATION_STACK",
                format!(
                    "Trying to pop {} objects from an evaluation stack of {}.",
                    count,
                    self.evaluation_stack.len()
                ),
            ));
        }
        let split = self.evaluation_stack.len() - count;
        Ok(self.evaluation_stack.split_off(split))
    }

    pub(crate) fn peek_evaluation_stack(&self) -> Option<&Object> {
        self.evaluation_stack.last()
    }

    fn overlay_count(
        patch_value: Option<i32>,
        committed: &BTreeMap<String, i32>,
        key: &str,
    ) -> Option<i32> {
        patch_value.or_else(|| committed.get(key).copied())
    }

    pub fn visit_count_at_path_string(&self, path: &str) -> i32 {
        let patched = self.patch.as_ref().and_then(|patch| patch.visit_count(path));
        Self::overlay_count(patched, &self.visit_counts, path).unwrap_or(0)
    }

    pub(crate) fn increment_visit_count(&mut self, path: &str) {
        let count = self.visit_count_at_path_string(path) + 1;
        match &mut self.patch {
            Some(patch) => patch.set_visit_count(path, count),
            None => {
                self.visit_counts.insert(path.to_string(), count);
            }
        }
    }

    pub(crate) fn turn_index_at_path_string(&self, path: &str) -> Option<i32> {
        let patched = self.patch.as_ref().and_then(|patch| patch.turn_index(path));
        Self::overlay_count(patched, &self.turn_indices, path)
    }

    pub(crate) fn record_turn_index_visit(&mut self, path: &str) {
        let turn = self.current_turn_index;
        match &mut self.patch {
            Some(patch) => patch.set_turn_index(path, turn),
            None => {
                self.turn_indices.insert(path.to_string(), turn);
            }
        }
    }

    /// Turns since the container was last entered, or -1 if never.
    pub fn turns_since_for_path_string(&self, path: &str) -> i32 {
        self.turn_index_at_path_string(path)
            .map_or(-1, |turn| self.current_turn_index - turn)
    }

    pub(crate) fn start_patching(&mut self) {
        if self.patch.is_none() {
            self.patch = Some(StatePatch::new());
        }
    }

    pub(crate) fn apply_any_patch(&mut self) {
        let Some(patch) = self.patch.take() else {
            return;
        };
        self.variables_state.apply_patch(&patch);
        self.visit_counts.extend(patch.visit_counts);
        self.turn_indices.extend(patch.turn_indices);
    }

    /// Jumps to `path`, dropping the current choices.
    pub(crate) fn set_chosen_path(
        &mut self,
        graph: &StoryGraph,
        path: &Path,
        incrementing_turn_index: bool,
    ) -> Result<(), InkError> {
        self.current_choices.clear();
        let (mut pointer, result) = graph.pointer_at_path(path)?;
        if result.is_approximate() {
            self.add_warning(format!(
                "Failed to find content at path '{}', so it was approximated to '{}'.",
                path,
                graph.path_of(result.approximate_node())
            ));
        }
        if pointer.index == -1 {
            pointer.index = 0;
        }
        self.set_current_pointer(Some(pointer));
        if incrementing_turn_index {
            self.current_turn_index += 1;
        }
        Ok(())
    }

    /// Stops the flow when the top frame is a host function evaluation.
    pub(crate) fn try_exit_function_evaluation_from_game(&mut self) -> bool {
        if !self.call_stack.element_is_evaluate_from_game() {
            return false;
        }
        self.set_current_pointer(None);
        self.did_safe_exit = true;
        true
    }

    /// Unwinds every thread and frame and stops the flow.
    pub(crate) fn force_end(&mut self) {
        while self.call_stack.can_pop_thread() {
            self.call_stack.pop_thread();
        }
        while self.call_stack.can_pop() {
            let _ = self.call_stack.pop(None);
        }
        self.current_choices.clear();
        self.set_current_pointer(None);
        self.set_previous_pointer(None);
        self.did_safe_exit = true;
    }
}
