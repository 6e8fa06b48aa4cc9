use std::sync::Arc;

use ink_core::InkError;

use super::Story;
use crate::graph::{Content, NodeId};
use crate::object::{ControlCommand, Object, PushPopType};
use crate::pointer::Pointer;
use crate::value::Value;

impl Story {
    /// Executes one content object and moves the pointer on.
    pub(super) fn step(&mut self) -> Result<(), InkError> {
        let Some(mut pointer) = self.state.current_pointer() else {
            return Ok(());
        };
        let graph = Arc::clone(&self.graph);

        while let Some(node) = pointer.resolve(&graph) {
            let Some(container) = graph.as_container(node) else {
                break;
            };
            self.visit_container(node, true);
            if container.content.is_empty() {
                break;
            }
            pointer = Pointer::start_of(node);
        }
        self.state.set_current_pointer(Some(pointer));

        let Some(node) = pointer.resolve(&graph) else {
            return self.next_content();
        };

        let is_logic_or_flow_control = self.perform_logic_and_flow_control(node)?;
        if self.state.current_pointer().is_none() {
            return Ok(());
        }

        match graph.content(node) {
            Content::ChoicePoint(choice_point) => {
                if let Some(choice) = self.process_choice(node, choice_point)? {
                    self.state.current_choices.push(choice);
                }
            }
            Content::Container(_) => {}
            _ if is_logic_or_flow_control => {}
            content => self.push_content(node, content),
        }

        self.next_content()?;

        if matches!(
            graph.content(node),
            Content::Command(ControlCommand::StartThread)
        ) {
            self.state.call_stack.push_thread();
        }
        Ok(())
    }

    fn push_content(&mut self, node: NodeId, content: &Content) {
        let object = match content {
            Content::Value(Value::VariablePointer {
                name,
                context_index: -1,
            }) => Object::Value(Value::VariablePointer {
                name: name.clone(),
                context_index: self.state.call_stack.context_for_variable_named(name),
            }),
            Content::Value(value) => Object::Value(value.clone()),
            Content::Void => Object::Void,
            Content::Tag(text) => Object::Tag(text.clone()),
            Content::Glue(kind) if !self.state.in_expression_evaluation() => {
                self.state.push_glue(*kind, node, &self.graph);
                return;
            }
            Content::Glue(kind) => Object::Glue(*kind),
            _ => return,
        };

        if self.state.in_expression_evaluation() {
            self.state.push_evaluation_stack(object);
        } else {
            self.state.push_to_output_stream(object);
        }
    }

    pub(super) fn visit_container(&mut self, node: NodeId, at_start: bool) {
        let container = self.graph.container(node);
        if container.counting_at_start_only && !at_start {
            return;
        }
        let path = self.graph.path_of(node).to_string();
        if container.visits_should_be_counted {
            self.state.increment_visit_count(&path);
        }
        if container.turn_index_should_be_counted {
            self.state.record_turn_index_visit(&path);
        }
    }

    /// Counts a visit for every container a divert entered. Containers the
    /// previous position was already inside are not re-entered.
    pub(super) fn visit_changed_containers_due_to_divert(&mut self) {
        let graph = Arc::clone(&self.graph);
        let Some(pointer) = self.state.current_pointer() else {
            return;
        };
        if pointer.index == -1 {
            return;
        }

        let mut previous_containers = Vec::new();
        if let Some(previous) = self.state.previous_pointer() {
            let mut ancestor = previous
                .resolve(&graph)
                .filter(|node| graph.is_container(*node))
                .or(Some(previous.container));
            while let Some(node) = ancestor {
                previous_containers.push(node);
                ancestor = graph.parent(node);
            }
        }

        let Some(mut child) = pointer.resolve(&graph) else {
            return;
        };
        let mut ancestor = graph.parent(child);
        let mut all_children_entered_at_start = true;
        while let Some(container_id) = ancestor {
            let container = graph.container(container_id);
            if previous_containers.contains(&container_id) && !container.counting_at_start_only {
                break;
            }
            let entering_at_start =
                container.content.first() == Some(&child) && all_children_entered_at_start;
            if !entering_at_start {
                all_children_entered_at_start = false;
            }
            self.visit_container(container_id, entering_at_start);
            child = container_id;
            ancestor = graph.parent(container_id);
        }
    }

    pub(super) fn next_content(&mut self) -> Result<(), InkError> {
        self.state.set_previous_pointer(self.state.current_pointer());

        if let Some(diverted) = self.state.diverted_pointer.take() {
            self.state.set_current_pointer(Some(diverted));
            self.visit_changed_containers_due_to_divert();
            return Ok(());
        }

        if self.increment_content_pointer() {
            return Ok(());
        }

        let mut did_pop = false;
        if self
            .state
            .call_stack
            .can_pop_type(Some(PushPopType::Function))
        {
            self.state.call_stack.pop(Some(PushPopType::Function))?;
            // A function that ran off its end inside an expression still
            // yields a value.
            if self.state.in_expression_evaluation() {
                self.state.push_evaluation_stack(Object::Void);
            }
            did_pop = true;
        } else if self.state.call_stack.can_pop_thread() {
            self.state.call_stack.pop_thread();
            did_pop = true;
        } else {
            self.state.try_exit_function_evaluation_from_game();
        }

        if did_pop && self.state.current_pointer().is_some() {
            self.next_content()?;
        }
        Ok(())
    }

    /// Moves to the next sibling, climbing out of finished containers. Clears
    /// the pointer when the top of the tree is passed.
    fn increment_content_pointer(&mut self) -> bool {
        let Some(mut pointer) = self.state.current_pointer() else {
            return false;
        };
        pointer.index += 1;

        let mut successful = true;
        while pointer.index as usize >= self.graph.container(pointer.container).content.len() {
            successful = false;
            let (Some(ancestor), Some(index_in_ancestor)) = (
                self.graph.parent(pointer.container),
                self.graph.index_in_parent(pointer.container),
            ) else {
                break;
            };
            pointer = Pointer::new(ancestor, index_in_ancestor as i32 + 1);
            successful = true;
        }

        self.state
            .set_current_pointer(successful.then_some(pointer));
        successful
    }
}
