use std::collections::BTreeSet;
use std::sync::Arc;

use ink_core::InkError;

use super::Story;
use crate::graph::Content;
use crate::object::{DivertKind, Object, PushPopType};
use crate::pointer::Pointer;
use crate::value::Value;

/// Host function called for an `EXTERNAL` declaration. `None` means the
/// function returns nothing.
pub type ExternalFunction = Box<dyn FnMut(&[Value]) -> Result<Option<Value>, InkError>>;

/// A set of host functions bound in one go.
pub trait HostFunctionRegistry: Send + Sync {
    fn call(&self, name: &str, args: &[Value]) -> Result<Option<Value>, InkError>;
    fn names(&self) -> &[String];
}

pub(super) struct ExternalBinding {
    function: ExternalFunction,
    lookahead_safe: bool,
}

/// What a host-side call of an ink function produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResult {
    pub value: Option<Value>,
    pub text: String,
}

impl Story {
    /// Binds `function` to the `EXTERNAL` called `name`. Functions that are not
    /// `lookahead_safe` are never run speculatively while the engine looks
    /// past a newline for glue.
    pub fn bind_external_function<F>(
        &mut self,
        name: &str,
        function: F,
        lookahead_safe: bool,
    ) -> Result<(), InkError>
    where
        F: FnMut(&[Value]) -> Result<Option<Value>, InkError> + 'static,
    {
        if self.externals.contains_key(name) {
            return Err(InkError::new(
                "STORY_EXTERNAL_BOUND",
                format!("Function '{}' has already been bound.", name),
            ));
        }
        self.externals.insert(
            name.to_string(),
            ExternalBinding {
                function: Box::new(function),
                lookahead_safe,
            },
        );
        Ok(())
    }

    pub fn unbind_external_function(&mut self, name: &str) -> Result<(), InkError> {
        if self.externals.remove(name).is_none() {
            return Err(InkError::new(
                "STORY_EXTERNAL_UNBOUND",
                format!("Function '{}' has not been bound.", name),
            ));
        }
        Ok(())
    }

    /// Binds every function of `registry` as lookahead safe.
    pub fn bind_host_functions(
        &mut self,
        registry: Arc<dyn HostFunctionRegistry>,
    ) -> Result<(), InkError> {
        for name in registry.names().to_vec() {
            let registry = Arc::clone(&registry);
            let bound_name = name.clone();
            self.bind_external_function(
                &name,
                move |args: &[Value]| registry.call(&bound_name, args),
                true,
            )?;
        }
        Ok(())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.knot_container_with_name(name).is_some()
    }

    /// Checks once, before the first continue, that every external the story
    /// calls is bound or has an ink fallback.
    pub(super) fn validate_external_bindings(&mut self) -> Result<(), InkError> {
        let mut missing = BTreeSet::new();
        for (_, content) in self.graph.nodes() {
            let Content::Divert(divert) = content else {
                continue;
            };
            let DivertKind::External { name, .. } = &divert.kind else {
                continue;
            };
            if self.externals.contains_key(name) {
                continue;
            }
            if !self.options.allow_external_function_fallbacks || !self.has_function(name) {
                missing.insert(name.clone());
            }
        }

        if !missing.is_empty() {
            let names = missing.into_iter().collect::<Vec<_>>();
            return Err(InkError::new(
                "STORY_EXTERNAL_MISSING",
                format!(
                    "Missing function binding for external{}: '{}'{}",
                    if names.len() > 1 { "s" } else { "" },
                    names.join("', '"),
                    if self.options.allow_external_function_fallbacks {
                        ", and no fallback ink function found."
                    } else {
                        " (ink fallbacks disabled)"
                    }
                ),
            ));
        }
        self.has_validated_externals = true;
        Ok(())
    }

    pub(super) fn call_external_function(
        &mut self,
        name: &str,
        arg_count: usize,
    ) -> Result<(), InkError> {
        match self.externals.get(name).map(|binding| binding.lookahead_safe) {
            Some(false) if self.snapshot_at_last_newline.is_some() => {
                // Rewound to the newline and run for real on the next continue.
                self.saw_lookahead_unsafe_function_after_newline = true;
                return Ok(());
            }
            Some(_) => {}
            None if self.options.allow_external_function_fallbacks => {
                let Some(fallback) = self.knot_container_with_name(name) else {
                    return Err(InkError::new(
                        "RUNTIME_EXTERNAL_MISSING",
                        format!(
                            "Trying to call EXTERNAL function '{}' which has not been bound, and fallback ink function could not be found.",
                            name
                        ),
                    ));
                };
                let height = self.state.evaluation_stack.len();
                self.state.call_stack.push(PushPopType::Function, height);
                self.state.diverted_pointer = Some(Pointer::start_of(fallback));
                return Ok(());
            }
            None => {
                return Err(InkError::new(
                    "RUNTIME_EXTERNAL_MISSING",
                    format!(
                        "Trying to call EXTERNAL function '{}' which has not been bound (and ink fallbacks disabled).",
                        name
                    ),
                ))
            }
        }

        let mut args = Vec::with_capacity(arg_count);
        for object in self.state.pop_evaluation_stack_n(arg_count)? {
            match object.into_value() {
                Some(value) => args.push(value),
                None => {
                    return Err(InkError::new(
                        "RUNTIME_EXTERNAL_ARGUMENT",
                        format!(
                            "Arguments to EXTERNAL function '{}' must be values.",
                            name
                        ),
                    ))
                }
            }
        }

        log::debug!("calling external '{}' with {} args", name, args.len());
        let Some(binding) = self.externals.get_mut(name) else {
            return Ok(());
        };
        let result = (binding.function)(&args)?;
        self.state
            .push_evaluation_stack(result.map_or(Object::Void, Object::Value));
        Ok(())
    }

    /// Runs the ink function `name` from host code, returning its value and
    /// any text it printed. The story's own output is left untouched.
    pub fn evaluate_function(
        &mut self,
        name: &str,
        args: &[Value],
    ) -> Result<FunctionResult, InkError> {
        if name.trim().is_empty() {
            return Err(InkError::new(
                "STORY_FUNCTION_NAME",
                "Function is empty or white space.",
            ));
        }
        let Some(container) = self.knot_container_with_name(name) else {
            return Err(InkError::new(
                "STORY_FUNCTION_MISSING",
                format!("Function doesn't exist: '{}'", name),
            ));
        };

        if !self.has_validated_externals {
            self.validate_external_bindings()?;
        }

        let call_stack_before = self.state.call_stack.clone();
        let output_before = std::mem::take(&mut self.state.output_stream);
        let height = self.state.evaluation_stack.len();
        self.state
            .call_stack
            .push(PushPopType::FunctionEvaluationFromGame, height);
        self.state
            .set_current_pointer(Some(Pointer::start_of(container)));
        for arg in args {
            self.state.push_evaluation_stack(Object::Value(arg.clone()));
        }

        let result = self.run_function_evaluation();
        self.state.output_stream = output_before;
        if result.is_err() {
            // The main flow must resume where it was.
            self.state.call_stack = call_stack_before;
            self.state.evaluation_stack.truncate(height);
        }
        result
    }

    fn run_function_evaluation(&mut self) -> Result<FunctionResult, InkError> {
        let text = self.continue_function_evaluation()?;
        let value = self.complete_function_evaluation_from_game()?;
        Ok(FunctionResult { value, text })
    }

    fn continue_function_evaluation(&mut self) -> Result<String, InkError> {
        let mut text = String::new();
        while self.can_continue() {
            text.push_str(&self.continue_story()?);
        }
        Ok(text)
    }

    fn complete_function_evaluation_from_game(&mut self) -> Result<Option<Value>, InkError> {
        if !self.state.call_stack.element_is_evaluate_from_game() {
            return Err(InkError::new(
                "STORY_FUNCTION_EVALUATION",
                format!(
                    "Expected external function evaluation to be complete, found a {} frame.",
                    self.state.call_stack.current_element().push_type.name()
                ),
            ));
        }

        let height = self
            .state
            .call_stack
            .current_element()
            .evaluation_stack_height_when_pushed;
        let mut returned = None;
        while self.state.evaluation_stack.len() > height {
            let popped = self.state.pop_evaluation_stack()?;
            if returned.is_none() {
                returned = Some(popped);
            }
        }
        self.state
            .call_stack
            .pop(Some(PushPopType::FunctionEvaluationFromGame))?;
        Ok(returned.and_then(Object::into_value))
    }
}
