use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ink_core::InkError;

use crate::callstack::CallStack;
use crate::list::ListDefinitions;
use crate::object::VariableAssignment;
use crate::state_patch::StatePatch;
use crate::value::{retain_list_origins_for_assignment, Value};

/// Global variables plus the rules for reading and assigning any variable.
///
/// Temporaries live on the call stack and the lookahead overlay lives in the
/// story state, so both are passed in by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct VariablesState {
    globals: BTreeMap<String, Value>,
    default_globals: BTreeMap<String, Value>,
    changed_variables: BTreeSet<String>,
    list_definitions: Arc<ListDefinitions>,
}

impl VariablesState {
    pub fn new(list_definitions: Arc<ListDefinitions>) -> Self {
        Self {
            globals: BTreeMap::new(),
            default_globals: BTreeMap::new(),
            changed_variables: BTreeSet::new(),
            list_definitions,
        }
    }

    pub fn globals(&self) -> &BTreeMap<String, Value> {
        &self.globals
    }

    pub fn default_globals(&self) -> &BTreeMap<String, Value> {
        &self.default_globals
    }

    pub(crate) fn snapshot_default_globals(&mut self) {
        self.default_globals = self.globals.clone();
    }

    /// Installs globals read from a save, back-filling declared variables the
    /// save does not mention.
    pub(crate) fn load_globals(&mut self, mut globals: BTreeMap<String, Value>) {
        for (name, value) in &self.default_globals {
            if !globals.contains_key(name) {
                log::warn!(
                    "save has no value for variable '{}', using its declared default",
                    name
                );
                globals.insert(name.clone(), value.clone());
            }
        }
        self.globals = globals;
    }

    pub(crate) fn apply_patch(&mut self, patch: &StatePatch) {
        for (name, value) in &patch.globals {
            self.globals.insert(name.clone(), value.clone());
        }
        self.changed_variables
            .extend(patch.changed_variables.iter().cloned());
    }

    pub(crate) fn take_changed_variables(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.changed_variables)
    }

    pub fn global_exists(&self, name: &str, patch: Option<&StatePatch>) -> bool {
        self.global(name, patch).is_some()
    }

    /// Patch, then committed globals, then declared defaults.
    pub fn global<'a>(
        &'a self,
        name: &str,
        patch: Option<&'a StatePatch>,
    ) -> Option<&'a Value> {
        patch
            .and_then(|patch| patch.global(name))
            .or_else(|| self.globals.get(name))
            .or_else(|| self.default_globals.get(name))
    }

    fn raw_variable(
        &self,
        name: &str,
        context_index: i32,
        call_stack: &CallStack,
        patch: Option<&StatePatch>,
    ) -> Option<Value> {
        if context_index == 0 || context_index == -1 {
            if let Some(value) = self.global(name, patch) {
                return Some(value.clone());
            }
            if let Some(list) = self.list_definitions.find_single_item_list_with_name(name) {
                return Some(Value::List(list));
            }
        }
        call_stack.temporary_variable(name, context_index).cloned()
    }

    /// Reads a variable, following variable pointers to what they address.
    pub fn variable_with_name(
        &self,
        name: &str,
        context_index: i32,
        call_stack: &CallStack,
        patch: Option<&StatePatch>,
    ) -> Option<Value> {
        let mut name = name.to_string();
        let mut context_index = context_index;
        loop {
            match self.raw_variable(&name, context_index, call_stack, patch)? {
                Value::VariablePointer {
                    name: target,
                    context_index: target_context,
                } => {
                    name = target;
                    context_index = target_context;
                }
                value => return Some(value),
            }
        }
    }

    fn context_index_of_variable_named(
        &self,
        name: &str,
        call_stack: &CallStack,
        patch: Option<&StatePatch>,
    ) -> i32 {
        if self.global_exists(name, patch) {
            0
        } else {
            call_stack.current_element_index() as i32 + 1
        }
    }

    /// A pointer to a pointer collapses to the final target.
    fn resolve_variable_pointer(
        &self,
        name: String,
        context_index: i32,
        call_stack: &CallStack,
        patch: Option<&StatePatch>,
    ) -> Value {
        let context_index = if context_index == -1 {
            self.context_index_of_variable_named(&name, call_stack, patch)
        } else {
            context_index
        };
        match self.raw_variable(&name, context_index, call_stack, patch) {
            Some(pointer @ Value::VariablePointer { .. }) => pointer,
            _ => Value::VariablePointer {
                name,
                context_index,
            },
        }
    }

    pub fn assign(
        &mut self,
        assignment: &VariableAssignment,
        value: Value,
        call_stack: &mut CallStack,
        patch: Option<&mut StatePatch>,
    ) -> Result<(), InkError> {
        let mut name = assignment.name.clone();
        let mut context_index = -1;
        let mut value = value;
        let mut set_global = if assignment.is_new_declaration {
            assignment.is_global
        } else {
            self.global_exists(&name, patch.as_deref())
        };

        if assignment.is_new_declaration {
            if let Value::VariablePointer {
                name: target,
                context_index: target_context,
            } = value
            {
                value = self.resolve_variable_pointer(
                    target,
                    target_context,
                    call_stack,
                    patch.as_deref(),
                );
            }
        } else {
            while let Some(Value::VariablePointer {
                name: target,
                context_index: target_context,
            }) = self.raw_variable(&name, context_index, call_stack, patch.as_deref())
            {
                name = target;
                context_index = target_context;
                set_global = context_index == 0;
            }
        }

        if set_global {
            self.set_global(&name, value, patch);
            Ok(())
        } else {
            call_stack.set_temporary_variable(
                &name,
                value,
                assignment.is_new_declaration,
                context_index,
            )
        }
    }

    pub fn set_global(&mut self, name: &str, mut value: Value, patch: Option<&mut StatePatch>) {
        let old = patch
            .as_deref()
            .and_then(|patch| patch.global(name))
            .or_else(|| self.globals.get(name))
            .cloned();
        retain_list_origins_for_assignment(old.as_ref(), &mut value);
        let changed = old.as_ref() != Some(&value);

        match patch {
            Some(patch) => {
                if changed {
                    patch.add_changed_variable(name);
                }
                patch.set_global(name, value);
            }
            None => {
                if changed {
                    self.changed_variables.insert(name.to_string());
                }
                self.globals.insert(name.to_string(), value);
            }
        }
    }
}

#[cfg(test)]
mod variables_state_tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::list::list_test_support::colours;
    use crate::object::PushPopType;

    fn declare(name: &str, is_global: bool) -> VariableAssignment {
        VariableAssignment {
            name: name.to_string(),
            is_new_declaration: true,
            is_global,
        }
    }

    fn reassign(name: &str) -> VariableAssignment {
        VariableAssignment {
            name: name.to_string(),
            is_new_declaration: false,
            is_global: false,
        }
    }

    fn fixture() -> (VariablesState, CallStack) {
        (
            VariablesState::new(Arc::new(colours())),
            CallStack::new(NodeId::from_raw(0)),
        )
    }

    #[test]
    fn globals_shadow_list_items_and_temporaries() {
        let (mut variables, mut call_stack) = fixture();
        variables
            .assign(&declare("x", true), Value::Int(1), &mut call_stack, None)
            .expect("declare global");
        variables
            .assign(&declare("t", false), Value::Int(2), &mut call_stack, None)
            .expect("declare temp");

        assert_eq!(
            variables.variable_with_name("x", -1, &call_stack, None),
            Some(Value::Int(1))
        );
        assert_eq!(
            variables.variable_with_name("t", -1, &call_stack, None),
            Some(Value::Int(2))
        );
        assert!(matches!(
            variables.variable_with_name("red", 0, &call_stack, None),
            Some(Value::List(_))
        ));
        assert_eq!(variables.variable_with_name("nope", -1, &call_stack, None), None);
    }

    #[test]
    fn patch_writes_stay_out_of_committed_globals() {
        let (mut variables, mut call_stack) = fixture();
        variables.set_global("gold", Value::Int(1), None);
        variables.take_changed_variables();

        let mut patch = StatePatch::new();
        variables
            .assign(
                &reassign("gold"),
                Value::Int(5),
                &mut call_stack,
                Some(&mut patch),
            )
            .expect("reassign in patch");
        assert_eq!(variables.globals().get("gold"), Some(&Value::Int(1)));
        assert_eq!(variables.global("gold", Some(&patch)), Some(&Value::Int(5)));

        variables.apply_patch(&patch);
        assert_eq!(variables.globals().get("gold"), Some(&Value::Int(5)));
        assert!(variables.take_changed_variables().contains("gold"));
    }

    #[test]
    fn global_reads_patch_before_committed_values() {
        let (mut variables, _) = fixture();
        variables.set_global("gold", Value::Int(1), None);
        variables.snapshot_default_globals();
        variables.set_global("gold", Value::Int(2), None);

        let mut patch = StatePatch::new();
        patch.set_global("silver", Value::Int(9));
        assert_eq!(variables.global("gold", Some(&patch)), Some(&Value::Int(2)));
        assert_eq!(variables.global("silver", Some(&patch)), Some(&Value::Int(9)));
        assert_eq!(variables.global("silver", None), None);
        assert!(variables.global_exists("gold", None));
        assert_eq!(variables.default_globals().get("gold"), Some(&Value::Int(1)));
    }

    #[test]
    fn assignment_through_pointer_writes_the_target() {
        let (mut variables, mut call_stack) = fixture();
        variables
            .assign(&declare("score", true), Value::Int(0), &mut call_stack, None)
            .expect("declare score");
        call_stack.push(PushPopType::Function, 0);
        variables
            .assign(
                &declare("ref", false),
                Value::VariablePointer {
                    name: "score".to_string(),
                    context_index: 0,
                },
                &mut call_stack,
                None,
            )
            .expect("declare pointer param");
        variables
            .assign(&reassign("ref"), Value::Int(7), &mut call_stack, None)
            .expect("assign through pointer");

        assert_eq!(variables.globals().get("score"), Some(&Value::Int(7)));
        assert_eq!(
            variables.variable_with_name("ref", -1, &call_stack, None),
            Some(Value::Int(7))
        );
    }

    #[test]
    fn unchanged_values_are_not_reported() {
        let (mut variables, _) = fixture();
        variables.set_global("x", Value::Int(1), None);
        assert!(variables.take_changed_variables().contains("x"));
        variables.set_global("x", Value::Int(1), None);
        assert!(variables.take_changed_variables().is_empty());
    }

    #[test]
    fn loading_back_fills_missing_defaults() {
        let (mut variables, _) = fixture();
        variables.set_global("a", Value::Int(1), None);
        variables.set_global("b", Value::Int(2), None);
        variables.snapshot_default_globals();

        let mut saved = BTreeMap::new();
        saved.insert("a".to_string(), Value::Int(10));
        variables.load_globals(saved);
        assert_eq!(variables.globals().get("a"), Some(&Value::Int(10)));
        assert_eq!(variables.globals().get("b"), Some(&Value::Int(2)));
    }
}
