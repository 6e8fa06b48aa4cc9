use std::sync::Arc;

use ink_core::{InkError, Path};

use super::Story;
use crate::graph::{Content, NodeId};
use crate::list::InkList;
use crate::object::{
    ControlCommand, Divert, DivertKind, Object, PushPopType, VariableAssignment,
    VariableReference,
};
use crate::output::clean_output_whitespace;
use crate::pointer::Pointer;
use crate::rng::Prng;
use crate::value::Value;

/// Conditions: values test their truthiness, anything else is false.
pub(super) fn is_truthy(object: &Object) -> Result<bool, InkError> {
    match object {
        Object::Value(Value::DivertTarget(path)) => Err(InkError::new(
            "RUNTIME_TRUTHINESS",
            format!(
                "Shouldn't use a divert target (to {}) as a conditional value. Did you intend a function call 'likeThis()' or a read count check 'likeThis'? (no arrows)",
                path
            ),
        )),
        Object::Value(value) => value.is_truthy(),
        _ => Ok(false),
    }
}

impl Story {
    /// Runs diverts, commands, variable access and operators. Returns false
    /// for content that belongs on a stream instead.
    pub(super) fn perform_logic_and_flow_control(
        &mut self,
        node: NodeId,
    ) -> Result<bool, InkError> {
        let graph = Arc::clone(&self.graph);
        match graph.content(node) {
            Content::Divert(divert) => {
                self.perform_divert(divert)?;
                Ok(true)
            }
            Content::Command(command) => {
                self.perform_command(*command)?;
                Ok(true)
            }
            Content::VariableAssignment(assignment) => {
                self.perform_assignment(assignment)?;
                Ok(true)
            }
            Content::VariableReference(reference) => {
                self.perform_variable_reference(reference)?;
                Ok(true)
            }
            Content::NativeCall(op) => {
                let params = self.state.pop_evaluation_stack_n(op.parameter_count())?;
                let result = op.call(params, graph.list_definitions())?;
                self.state.push_evaluation_stack(Object::Value(result));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Resolves a path to a pointer, warning when only an approximation of it
    /// exists.
    pub(super) fn pointer_at_path(&mut self, path: &Path) -> Result<Pointer, InkError> {
        let (pointer, result) = self.graph.pointer_at_path(path)?;
        if result.is_approximate() {
            let approximated = self.graph.path_of(result.approximate_node()).to_string();
            self.state.add_warning(format!(
                "Failed to find content at path '{}', so it was approximated to: '{}'.",
                path, approximated
            ));
        }
        Ok(pointer)
    }

    fn perform_divert(&mut self, divert: &Divert) -> Result<(), InkError> {
        if divert.is_conditional {
            let condition = self.state.pop_evaluation_stack()?;
            if !is_truthy(&condition)? {
                return Ok(());
            }
        }

        match &divert.kind {
            DivertKind::Variable(name) => {
                let target = self.divert_target_from_variable(name)?;
                let pointer = self.pointer_at_path(&target)?;
                self.state.diverted_pointer = Some(pointer);
            }
            DivertKind::External { name, args } => {
                return self.call_external_function(name, *args);
            }
            DivertKind::Path { path, pointer } => {
                let Some(pointer) = pointer else {
                    return Err(InkError::new(
                        "RUNTIME_DIVERT_TARGET",
                        format!("Divert resolution failed: {}", path),
                    ));
                };
                self.state.diverted_pointer = Some(*pointer);
            }
        }

        if let Some(push_type) = divert.push_type {
            let height = self.state.evaluation_stack.len();
            self.state.call_stack.push(push_type, height);
        }
        Ok(())
    }

    fn divert_target_from_variable(&self, name: &str) -> Result<Path, InkError> {
        let value = self.state.variables_state.variable_with_name(
            name,
            -1,
            &self.state.call_stack,
            self.state.patch.as_ref(),
        );
        match value {
            Some(Value::DivertTarget(path)) => Ok(path),
            None => Err(InkError::new(
                "RUNTIME_DIVERT_TARGET",
                format!(
                    "Tried to divert using a target from a variable that could not be found ({})",
                    name
                ),
            )),
            Some(Value::Int(0)) => Err(InkError::new(
                "RUNTIME_DIVERT_TARGET",
                format!(
                    "Tried to divert to a target from a variable, but the variable ({}) didn't contain a divert target, it was empty/null (the value 0).",
                    name
                ),
            )),
            Some(other) => Err(InkError::new(
                "RUNTIME_DIVERT_TARGET",
                format!(
                    "Tried to divert to a target from a variable, but the variable ({}) didn't contain a divert target, it contained '{}'.",
                    name, other
                ),
            )),
        }
    }

    fn perform_assignment(&mut self, assignment: &VariableAssignment) -> Result<(), InkError> {
        let Some(value) = self.state.pop_evaluation_stack()?.into_value() else {
            return Err(InkError::new(
                "RUNTIME_VOID_ASSIGNMENT",
                format!(
                    "Can't assign to variable '{}' a value that is void. Did a function not return a value?",
                    assignment.name
                ),
            ));
        };
        let state = &mut self.state;
        state.variables_state.assign(
            assignment,
            value,
            &mut state.call_stack,
            state.patch.as_mut(),
        )
    }

    fn perform_variable_reference(&mut self, reference: &VariableReference) -> Result<(), InkError> {
        let value = match reference {
            VariableReference::ReadCount { path, container } => {
                let Some(container) = container else {
                    return Err(InkError::new(
                        "RUNTIME_READ_COUNT",
                        format!("Failed to find container for read count of '{}'.", path),
                    ));
                };
                Value::Int(self.visit_count_for_container(*container)?)
            }
            VariableReference::Named(name) => {
                let found = self.state.variables_state.variable_with_name(
                    name,
                    -1,
                    &self.state.call_stack,
                    self.state.patch.as_ref(),
                );
                match found {
                    Some(value) => value,
                    None => {
                        self.state.add_warning(format!(
                            "Variable not found: '{}'. Using default value of 0 (false). This can happen with temporary variables if the declaration hasn't yet been hit. Globals are always given a default value on load if a value doesn't exist in the save state.",
                            name
                        ));
                        Value::Int(0)
                    }
                }
            }
        };
        self.state.push_evaluation_stack(Object::Value(value));
        Ok(())
    }

    pub(super) fn visit_count_for_container(&self, node: NodeId) -> Result<i32, InkError> {
        let path = self.graph.path_of(node);
        if !self.graph.container(node).visits_should_be_counted {
            return Err(InkError::new(
                "RUNTIME_READ_COUNT",
                format!(
                    "Read count for target ({}) unknown. The story may need to be compiled with countAllVisits flag (-c).",
                    path
                ),
            ));
        }
        Ok(self.state.visit_count_at_path_string(&path.to_string()))
    }

    fn turns_since_for_container(&self, node: NodeId) -> Result<i32, InkError> {
        let path = self.graph.path_of(node);
        if !self.graph.container(node).turn_index_should_be_counted {
            return Err(InkError::new(
                "RUNTIME_TURNS_SINCE",
                format!(
                    "TURNS_SINCE() for target ({}) unknown. The story may need to be compiled with countAllVisits flag (-c).",
                    path
                ),
            ));
        }
        Ok(self.state.turns_since_for_path_string(&path.to_string()))
    }

    fn pop_int(&mut self, what: &str) -> Result<i32, InkError> {
        match self.state.pop_evaluation_stack()? {
            Object::Value(Value::Int(value)) => Ok(value),
            other => Err(InkError::new(
                "RUNTIME_EXPECTED_INT",
                format!("Invalid value for {}: expected Int, found {}.", what, other.kind_name()),
            )),
        }
    }

    fn perform_command(&mut self, command: ControlCommand) -> Result<(), InkError> {
        match command {
            ControlCommand::EvalStart => self.state.set_in_expression_evaluation(true),
            ControlCommand::EvalEnd => self.state.set_in_expression_evaluation(false),
            ControlCommand::EvalOutput => {
                if !self.state.evaluation_stack.is_empty() {
                    if let Object::Value(value) = self.state.pop_evaluation_stack()? {
                        self.state.push_to_output_stream(Object::text(value.to_string()));
                    }
                }
            }
            ControlCommand::NoOp => {}
            ControlCommand::Duplicate => {
                let Some(top) = self.state.peek_evaluation_stack().cloned() else {
                    return Err(InkError::new(
                        "RUNTIME_EVALUATION_STACK",
                        "Nothing on the evaluation stack to duplicate.",
                    ));
                };
                self.state.push_evaluation_stack(top);
            }
            ControlCommand::PopEvaluatedValue => {
                self.state.pop_evaluation_stack()?;
            }
            ControlCommand::PopFunction => self.pop_flow(PushPopType::Function)?,
            ControlCommand::PopTunnel => self.pop_flow(PushPopType::Tunnel)?,
            ControlCommand::BeginString => {
                self.state.push_to_output_stream(Object::Command(command));
                self.state.set_in_expression_evaluation(false);
            }
            ControlCommand::EndString => {
                let text = self.state.fold_output_since(ControlCommand::BeginString);
                self.state.set_in_expression_evaluation(true);
                self.state.push_evaluation_stack(Object::text(text));
            }
            ControlCommand::ChoiceCount => {
                let count = self.state.current_choices.len() as i32;
                self.state.push_evaluation_stack(Object::Value(Value::Int(count)));
            }
            ControlCommand::TurnsSince | ControlCommand::ReadCount => {
                self.perform_count_query(command)?;
            }
            ControlCommand::Random => self.perform_random()?,
            ControlCommand::SeedRandom => {
                let seed = self.pop_int("the seed of SEED_RANDOM(seed)")?;
                self.state.story_seed = seed;
                self.state.previous_random = 0;
                self.state.push_evaluation_stack(Object::Void);
            }
            ControlCommand::VisitIndex => {
                let Some(pointer) = self.state.current_pointer() else {
                    return Ok(());
                };
                let count = self.visit_count_for_container(pointer.container)? - 1;
                self.state.push_evaluation_stack(Object::Value(Value::Int(count)));
            }
            ControlCommand::SequenceShuffleIndex => {
                let index = self.next_sequence_shuffle_index()?;
                self.state.push_evaluation_stack(Object::Value(Value::Int(index)));
            }
            // Forked once the pointer has moved past the command.
            ControlCommand::StartThread => {}
            ControlCommand::Done => {
                if self.state.call_stack.can_pop_thread() {
                    self.state.call_stack.pop_thread();
                } else {
                    self.state.did_safe_exit = true;
                    self.state.set_current_pointer(None);
                }
            }
            ControlCommand::End => self.state.force_end(),
            ControlCommand::ListFromInt => self.perform_list_from_int()?,
            ControlCommand::ListRange => self.perform_list_range()?,
            ControlCommand::ListRandom => self.perform_list_random()?,
            ControlCommand::BeginTag => self.state.push_to_output_stream(Object::Command(command)),
            ControlCommand::EndTag => {
                let text = self.state.fold_output_since(ControlCommand::BeginTag);
                let tag = Object::Tag(clean_output_whitespace(&text));
                if self.state.in_string_evaluation() {
                    self.state.push_evaluation_stack(tag);
                } else {
                    self.state.push_to_output_stream(tag);
                }
            }
        }
        Ok(())
    }

    /// `~ret` and `->->`. A tunnel return may carry a divert target that
    /// overrides where the flow resumes.
    fn pop_flow(&mut self, expected: PushPopType) -> Result<(), InkError> {
        let mut override_target = None;
        if expected == PushPopType::Tunnel {
            match self.state.peek_evaluation_stack() {
                Some(Object::Value(Value::DivertTarget(_))) => {
                    if let Some(Value::DivertTarget(path)) =
                        self.state.pop_evaluation_stack()?.into_value()
                    {
                        override_target = Some(path);
                    }
                }
                Some(Object::Void) => {
                    self.state.pop_evaluation_stack()?;
                }
                _ => {}
            }
        }

        if self.state.try_exit_function_evaluation_from_game() {
            return Ok(());
        }

        let current = self.state.call_stack.current_element().push_type;
        if current != expected || !self.state.call_stack.can_pop() {
            let expected_name = if self.state.call_stack.can_pop() {
                pop_statement_name(current)
            } else {
                "end of flow (-> END or choice)"
            };
            return Err(InkError::new(
                "RUNTIME_POP_MISMATCH",
                format!(
                    "Found {}, when expected {}",
                    pop_statement_name(expected),
                    expected_name
                ),
            ));
        }

        self.state.call_stack.pop(Some(expected))?;
        if let Some(target) = override_target {
            let pointer = self.pointer_at_path(&target)?;
            self.state.diverted_pointer = Some(pointer);
        }
        Ok(())
    }

    fn perform_count_query(&mut self, command: ControlCommand) -> Result<(), InkError> {
        let is_turns_since = command == ControlCommand::TurnsSince;
        let target = self.state.pop_evaluation_stack()?;
        let Object::Value(Value::DivertTarget(path)) = target else {
            let hint = if matches!(target, Object::Value(Value::Int(_))) {
                ". Did you accidentally pass a read count ('knot_name') instead of a target ('-> knot_name')?"
                    .to_string()
            } else {
                String::new()
            };
            return Err(InkError::new(
                "RUNTIME_COUNT_TARGET",
                format!(
                    "{} expected a divert target (knot, stitch, label name), but saw {}{}",
                    if is_turns_since { "TURNS_SINCE" } else { "READ_COUNT" },
                    target.kind_name(),
                    hint
                ),
            ));
        };

        let container = self
            .graph
            .content_at_path(&path)
            .node()
            .filter(|node| self.graph.is_container(*node));
        let count = match container {
            Some(node) if is_turns_since => self.turns_since_for_container(node)?,
            Some(node) => self.visit_count_for_container(node)?,
            None => {
                self.state.add_warning(format!(
                    "Failed to find container for {} lookup at {}",
                    if is_turns_since { "TURNS_SINCE" } else { "READ_COUNT" },
                    path
                ));
                if is_turns_since {
                    -1
                } else {
                    0
                }
            }
        };
        self.state.push_evaluation_stack(Object::Value(Value::Int(count)));
        Ok(())
    }

    /// Draws from a generator seeded by the story seed plus the previous draw,
    /// so saved states replay the same numbers.
    fn next_random(&mut self) -> i32 {
        let seed = self.state.story_seed.wrapping_add(self.state.previous_random);
        let next = Prng::new(seed).next_int();
        self.state.previous_random = next;
        next
    }

    fn perform_random(&mut self) -> Result<(), InkError> {
        let max = self.pop_int("maximum parameter of RANDOM(min, max)")?;
        let min = self.pop_int("minimum parameter of RANDOM(min, max)")?;

        let range = match max.checked_sub(min).and_then(|span| span.checked_add(1)) {
            Some(range) => range,
            None => {
                return Err(InkError::new(
                    "RUNTIME_RANDOM_RANGE",
                    format!(
                        "RANDOM was called with a range that exceeds the size that ink numbers can use ({} to {}).",
                        min, max
                    ),
                ))
            }
        };
        if range <= 0 {
            return Err(InkError::new(
                "RUNTIME_RANDOM_RANGE",
                format!(
                    "RANDOM was called with minimum as {} and maximum as {}. The maximum must be larger",
                    min, max
                ),
            ));
        }

        let chosen = self.next_random() % range + min;
        self.state
            .push_evaluation_stack(Object::Value(Value::Int(chosen)));
        Ok(())
    }

    /// Shuffled sequences pick without repeats within each loop. The seed
    /// mixes the sequence's path with the loop number.
    fn next_sequence_shuffle_index(&mut self) -> Result<i32, InkError> {
        let element_count = self.pop_int("number of elements in sequence for shuffle index")?;
        let sequence_count = self.pop_int("sequence count for shuffle index")?;
        if element_count <= 0 {
            return Err(InkError::new(
                "RUNTIME_SHUFFLE",
                "Shuffle sequence must have at least one element.",
            ));
        }
        let Some(pointer) = self.state.current_pointer() else {
            return Ok(0);
        };

        let loop_index = sequence_count / element_count;
        let iteration_index = sequence_count % element_count;
        let path_hash = self
            .graph
            .path_of(pointer.container)
            .to_string()
            .chars()
            .fold(0i32, |hash, c| hash.wrapping_add(c as i32));
        let seed = path_hash
            .wrapping_add(loop_index)
            .wrapping_add(self.state.story_seed);

        let mut prng = Prng::new(seed);
        let mut unpicked: Vec<i32> = (0..element_count).collect();
        for _ in 0..iteration_index {
            let chosen = prng.next_int() as usize % unpicked.len();
            unpicked.remove(chosen);
        }
        let chosen = prng.next_int() as usize % unpicked.len();
        Ok(unpicked[chosen])
    }

    fn perform_list_from_int(&mut self) -> Result<(), InkError> {
        let value = self.pop_int("list item value")?;
        let list_name = match self.state.pop_evaluation_stack()? {
            Object::Value(Value::String(name)) => name,
            other => {
                return Err(InkError::new(
                    "RUNTIME_LIST_NAME",
                    format!("Expected a list name, found {}.", other.kind_name()),
                ))
            }
        };

        let Some(definition) = self.graph.list_definitions().definition(&list_name) else {
            return Err(InkError::new(
                "RUNTIME_LIST_NOT_FOUND",
                format!("Failed to find LIST called {}", list_name),
            ));
        };
        let list = match definition.item_with_value(value) {
            Some(item) => InkList::from_item(item, value),
            None => InkList::with_origin(list_name),
        };
        self.state.push_evaluation_stack(Object::Value(Value::List(list)));
        Ok(())
    }

    fn perform_list_range(&mut self) -> Result<(), InkError> {
        let max = self.state.pop_evaluation_stack()?;
        let min = self.state.pop_evaluation_stack()?;
        let target = self.state.pop_evaluation_stack()?;

        let Object::Value(Value::List(list)) = target else {
            return Err(InkError::new(
                "RUNTIME_LIST_RANGE",
                "Expected a list for LIST_RANGE.",
            ));
        };
        let min = range_bound(&min, true)?;
        let max = range_bound(&max, false)?;
        let range = if list.is_empty() {
            InkList::new()
        } else {
            list.list_with_sub_range(min, max)
        };
        self.state.push_evaluation_stack(Object::Value(Value::List(range)));
        Ok(())
    }

    fn perform_list_random(&mut self) -> Result<(), InkError> {
        let Object::Value(Value::List(list)) = self.state.pop_evaluation_stack()? else {
            return Err(InkError::new(
                "RUNTIME_LIST_RANDOM",
                "Expected a list for LIST_RANDOM.",
            ));
        };

        let picked = if list.is_empty() {
            InkList::new()
        } else {
            let index = self.next_random() as usize % list.len();
            match list.iter().nth(index) {
                Some((item, value)) => InkList::from_item(item.clone(), value),
                None => InkList::new(),
            }
        };
        self.state.push_evaluation_stack(Object::Value(Value::List(picked)));
        Ok(())
    }
}

/// A LIST_RANGE bound: an int, or the lowest/highest rank of a list.
fn range_bound(bound: &Object, is_min: bool) -> Result<i32, InkError> {
    match bound {
        Object::Value(Value::Int(value)) => Ok(*value),
        Object::Value(Value::List(list)) => {
            let extreme = if is_min { list.min_item() } else { list.max_item() };
            Ok(match extreme {
                Some((_, value)) => value,
                None if is_min => 0,
                None => i32::MAX,
            })
        }
        other => Err(InkError::new(
            "RUNTIME_LIST_RANGE",
            format!(
                "Expected an int or list bound for LIST_RANGE, found {}.",
                other.kind_name()
            ),
        )),
    }
}

fn pop_statement_name(push_type: PushPopType) -> &'static str {
    match push_type {
        PushPopType::Function => "function return statement (~ return)",
        PushPopType::Tunnel => "tunnel onwards statement (->->)",
        PushPopType::FunctionEvaluationFromGame => "end of function evaluation",
    }
}
