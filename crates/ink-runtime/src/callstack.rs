use std::collections::BTreeMap;

use ink_core::InkError;

use crate::graph::NodeId;
use crate::object::PushPopType;
use crate::pointer::Pointer;
use crate::value::{retain_list_origins_for_assignment, Value};

/// One frame: where it is, whether it is evaluating, and its temporaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub current_pointer: Option<Pointer>,
    pub in_expression_evaluation: bool,
    pub temporary_variables: BTreeMap<String, Value>,
    pub push_type: PushPopType,
    pub evaluation_stack_height_when_pushed: usize,
}

impl Element {
    pub fn new(
        push_type: PushPopType,
        current_pointer: Option<Pointer>,
        in_expression_evaluation: bool,
    ) -> Self {
        Self {
            current_pointer,
            in_expression_evaluation,
            temporary_variables: BTreeMap::new(),
            push_type,
            evaluation_stack_height_when_pushed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub callstack: Vec<Element>,
    pub thread_index: i32,
    pub previous_pointer: Option<Pointer>,
}

/// Stack of narrative threads, each with its own stack of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct CallStack {
    threads: Vec<Thread>,
    thread_counter: i32,
    start_of_root: Pointer,
}

impl CallStack {
    pub fn new(root: NodeId) -> Self {
        let mut call_stack = Self {
            threads: Vec::new(),
            thread_counter: 0,
            start_of_root: Pointer::start_of(root),
        };
        call_stack.reset();
        call_stack
    }

    pub(crate) fn from_parts(threads: Vec<Thread>, thread_counter: i32, root: NodeId) -> Self {
        Self {
            threads,
            thread_counter,
            start_of_root: Pointer::start_of(root),
        }
    }

    /// Back to a single tunnel frame at the start of the story.
    pub fn reset(&mut self) {
        self.threads = vec![Thread {
            callstack: vec![Element::new(
                PushPopType::Tunnel,
                Some(self.start_of_root),
                false,
            )],
            thread_index: 0,
            previous_pointer: None,
        }];
        self.thread_counter = 0;
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread_counter(&self) -> i32 {
        self.thread_counter
    }

    pub fn current_thread(&self) -> &Thread {
        self.threads.last().expect("call stack always has a thread")
    }

    pub fn current_thread_mut(&mut self) -> &mut Thread {
        self.threads
            .last_mut()
            .expect("call stack always has a thread")
    }

    /// Replaces every thread with `thread`, as when a choice is taken.
    pub fn set_current_thread(&mut self, thread: Thread) {
        self.threads.clear();
        self.threads.push(thread);
    }

    pub fn elements(&self) -> &[Element] {
        &self.current_thread().callstack
    }

    pub fn depth(&self) -> usize {
        self.elements().len()
    }

    pub fn current_element(&self) -> &Element {
        self.elements()
            .last()
            .expect("thread always has a frame")
    }

    pub fn current_element_mut(&mut self) -> &mut Element {
        self.current_thread_mut()
            .callstack
            .last_mut()
            .expect("thread always has a frame")
    }

    pub fn current_element_index(&self) -> usize {
        self.depth() - 1
    }

    pub fn can_pop(&self) -> bool {
        self.depth() > 1
    }

    pub fn can_pop_type(&self, push_type: Option<PushPopType>) -> bool {
        if !self.can_pop() {
            return false;
        }
        match push_type {
            Some(expected) => self.current_element().push_type == expected,
            None => true,
        }
    }

    pub fn element_is_evaluate_from_game(&self) -> bool {
        self.current_element().push_type == PushPopType::FunctionEvaluationFromGame
    }

    pub fn push(&mut self, push_type: PushPopType, evaluation_stack_height: usize) {
        let mut element = Element::new(push_type, self.current_element().current_pointer, false);
        element.evaluation_stack_height_when_pushed = evaluation_stack_height;
        self.current_thread_mut().callstack.push(element);
    }

    pub fn pop(&mut self, push_type: Option<PushPopType>) -> Result<(), InkError> {
        if !self.can_pop_type(push_type) {
            return Err(InkError::new(
                "RUNTIME_CALLSTACK_MISMATCH",
                format!(
                    "Mismatched push/pop in call stack: expected {}, found {}.",
                    push_type.map_or("any frame", PushPopType::name),
                    self.current_element().push_type.name()
                ),
            ));
        }
        self.current_thread_mut().callstack.pop();
        Ok(())
    }

    pub fn can_pop_thread(&self) -> bool {
        self.threads.len() > 1 && !self.element_is_evaluate_from_game()
    }

    /// A deep copy of the current thread under a fresh index.
    pub fn fork_thread(&mut self) -> Thread {
        let mut forked = self.current_thread().clone();
        self.thread_counter += 1;
        forked.thread_index = self.thread_counter;
        forked
    }

    pub fn push_thread(&mut self) {
        let thread = self.fork_thread();
        self.threads.push(thread);
    }

    /// Panics when only the main thread is left.
    pub fn pop_thread(&mut self) {
        assert!(self.can_pop_thread(), "can't pop the last thread");
        self.threads.pop();
    }

    pub fn thread_with_index(&self, index: i32) -> Option<&Thread> {
        self.threads
            .iter()
            .find(|thread| thread.thread_index == index)
    }

    /// 1-based frame index if `name` is a temporary of the current frame,
    /// otherwise 0 (global).
    pub fn context_for_variable_named(&self, name: &str) -> i32 {
        if self
            .current_element()
            .temporary_variables
            .contains_key(name)
        {
            self.current_element_index() as i32 + 1
        } else {
            0
        }
    }

    fn context_element_index(&self, context_index: i32) -> usize {
        if context_index <= 0 {
            self.current_element_index()
        } else {
            context_index as usize - 1
        }
    }

    pub fn temporary_variable(&self, name: &str, context_index: i32) -> Option<&Value> {
        self.elements()
            .get(self.context_element_index(context_index))
            .and_then(|element| element.temporary_variables.get(name))
    }

    pub fn set_temporary_variable(
        &mut self,
        name: &str,
        mut value: Value,
        declare_new: bool,
        context_index: i32,
    ) -> Result<(), InkError> {
        let index = self.context_element_index(context_index);
        let Some(element) = self.current_thread_mut().callstack.get_mut(index) else {
            return Err(InkError::new(
                "RUNTIME_VARIABLE_CONTEXT",
                format!("No call stack frame {} for temporary '{}'.", index, name),
            ));
        };
        let old = element.temporary_variables.get(name);
        if !declare_new && old.is_none() {
            return Err(InkError::new(
                "RUNTIME_VARIABLE_NOT_FOUND",
                format!("Could not find temporary variable to set: {}", name),
            ));
        }
        retain_list_origins_for_assignment(old, &mut value);
        element.temporary_variables.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod callstack_tests {
    use super::*;

    fn stack() -> CallStack {
        CallStack::new(NodeId::from_raw(0))
    }

    #[test]
    fn push_and_pop_must_match_types() {
        let mut stack = stack();
        stack.push(PushPopType::Tunnel, 0);
        assert_eq!(stack.depth(), 2);

        let error = stack
            .pop(Some(PushPopType::Function))
            .expect_err("tunnel frame popped as function");
        assert_eq!(error.code, "RUNTIME_CALLSTACK_MISMATCH");
        assert_eq!(stack.depth(), 2);

        stack.pop(Some(PushPopType::Tunnel)).expect("matching pop");
        assert_eq!(stack.depth(), 1);
        assert!(stack.pop(None).is_err());
    }

    #[test]
    fn pushed_frames_leave_expression_mode() {
        let mut stack = stack();
        stack.current_element_mut().in_expression_evaluation = true;
        stack.push(PushPopType::Function, 3);
        assert!(!stack.current_element().in_expression_evaluation);
        assert_eq!(stack.current_element().evaluation_stack_height_when_pushed, 3);
        assert_eq!(
            stack.current_element().current_pointer,
            stack.elements()[0].current_pointer
        );
    }

    #[test]
    fn forked_threads_are_independent_copies() {
        let mut stack = stack();
        stack
            .set_temporary_variable("x", Value::Int(1), true, 0)
            .expect("declare");
        let mut forked = stack.fork_thread();
        assert_eq!(forked.thread_index, 1);
        forked.callstack[0]
            .temporary_variables
            .insert("x".to_string(), Value::Int(9));
        assert_eq!(stack.temporary_variable("x", 0), Some(&Value::Int(1)));

        stack.push_thread();
        assert_eq!(stack.current_thread().thread_index, 2);
        assert!(stack.can_pop_thread());
        stack.pop_thread();
        assert!(!stack.can_pop_thread());
    }

    #[test]
    fn temporaries_are_addressed_by_context_index() {
        let mut stack = stack();
        stack.push(PushPopType::Function, 0);
        stack
            .set_temporary_variable("local", Value::Int(5), true, -1)
            .expect("declare local");
        assert_eq!(stack.context_for_variable_named("local"), 2);
        assert_eq!(stack.context_for_variable_named("other"), 0);
        assert_eq!(stack.temporary_variable("local", 2), Some(&Value::Int(5)));
        assert_eq!(stack.temporary_variable("local", 1), None);

        let error = stack
            .set_temporary_variable("missing", Value::Int(1), false, -1)
            .expect_err("assignment without declaration");
        assert_eq!(error.code, "RUNTIME_VARIABLE_NOT_FOUND");
    }

    #[test]
    fn set_current_thread_replaces_all_threads() {
        let mut stack = stack();
        stack.push_thread();
        let chosen = stack.fork_thread();
        stack.set_current_thread(chosen);
        assert_eq!(stack.threads().len(), 1);
        assert_eq!(stack.current_thread().thread_index, 2);
    }
}
