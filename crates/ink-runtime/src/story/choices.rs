use ink_core::{InkError, Path};

use super::flow_control::is_truthy;
use super::Story;
use crate::choice::Choice;
use crate::graph::NodeId;
use crate::object::{ChoicePoint, Object, PushPopType};
use crate::value::Value;

impl Story {
    /// Builds the choice for a choice point, or `None` when its condition
    /// fails or a once-only choice was already taken.
    pub(super) fn process_choice(
        &mut self,
        node: NodeId,
        choice_point: &ChoicePoint,
    ) -> Result<Option<Choice>, InkError> {
        let mut show_choice = true;
        if choice_point.has_condition {
            let condition = self.state.pop_evaluation_stack()?;
            if !is_truthy(&condition)? {
                show_choice = false;
            }
        }

        let mut tags = Vec::new();
        let mut choice_only_text = String::new();
        let mut start_text = String::new();
        if choice_point.has_choice_only_content {
            choice_only_text = self.pop_choice_text_and_tags(&mut tags)?;
        }
        if choice_point.has_start_content {
            start_text = self.pop_choice_text_and_tags(&mut tags)?;
        }

        let Some(target) = choice_point.target else {
            return Err(InkError::new(
                "RUNTIME_CHOICE_TARGET",
                format!(
                    "Choice target '{}' could not be found.",
                    choice_point.path_on_choice
                ),
            ));
        };
        if choice_point.once_only && self.visit_count_for_container(target)? > 0 {
            show_choice = false;
        }
        if !show_choice {
            return Ok(None);
        }

        let index = self
            .state
            .current_choices
            .iter()
            .filter(|choice| !choice.is_invisible_default)
            .count();
        let text = format!("{}{}", start_text, choice_only_text)
            .trim_matches(|c| c == ' ' || c == '\t')
            .to_string();
        // Outlives the current thread if the flow pops out of it.
        let thread_at_generation = self.state.call_stack.fork_thread();

        Ok(Some(Choice {
            text,
            index,
            source_path: self.graph.path_of(node).to_string(),
            target_path: self.graph.path_of(target).clone(),
            tags,
            is_invisible_default: choice_point.is_invisible_default,
            original_thread_index: thread_at_generation.thread_index,
            thread_at_generation,
        }))
    }

    /// Pops choice text. Tags evaluated inside the text sit beneath it and are
    /// collected in order.
    fn pop_choice_text_and_tags(&mut self, tags: &mut Vec<String>) -> Result<String, InkError> {
        let text = match self.state.pop_evaluation_stack()? {
            Object::Value(Value::String(text)) => text,
            other => {
                return Err(InkError::new(
                    "RUNTIME_CHOICE_TEXT",
                    format!(
                        "Expected choice text on the evaluation stack, found {}.",
                        other.kind_name()
                    ),
                ))
            }
        };
        let mut popped = Vec::new();
        while let Some(Object::Tag(_)) = self.state.peek_evaluation_stack() {
            if let Object::Tag(tag) = self.state.pop_evaluation_stack()? {
                popped.push(tag);
            }
        }
        popped.reverse();
        popped.append(tags);
        *tags = popped;
        Ok(text)
    }

    /// When only invisible default choices were generated, the first one is
    /// taken without asking the player.
    pub(super) fn try_follow_default_invisible_choice(&mut self) -> Result<bool, InkError> {
        let choices = &self.state.current_choices;
        if choices.is_empty() || choices.iter().any(|choice| !choice.is_invisible_default) {
            return Ok(false);
        }
        let choice = choices[0].clone();

        self.state
            .call_stack
            .set_current_thread(choice.thread_at_generation);
        // A newline snapshot may still share the thread; keep ours distinct.
        if self.snapshot_at_last_newline.is_some() {
            let forked = self.state.call_stack.fork_thread();
            self.state.call_stack.set_current_thread(forked);
        }
        self.choose_path(&choice.target_path, false)?;
        Ok(true)
    }

    /// Picks one of `current_choices()` by position.
    pub fn choose_choice_index(&mut self, index: usize) -> Result<(), InkError> {
        let choices = self.current_choices();
        let Some(choice) = choices.get(index).map(|choice| (*choice).clone()) else {
            return Err(InkError::new(
                "STORY_CHOICE_INDEX",
                format!(
                    "Choice out of range: index {} with {} choices available.",
                    index,
                    choices.len()
                ),
            ));
        };
        log::debug!("choosing '{}' -> {}", choice.text, choice.target_path);

        self.state
            .call_stack
            .set_current_thread(choice.thread_at_generation);
        self.choose_path(&choice.target_path, true)
    }

    /// Jumps to a knot or stitch given as a dotted path. Arguments are left on
    /// the evaluation stack for the target's parameters.
    pub fn choose_path_string(
        &mut self,
        path: &str,
        reset_callstack: bool,
        args: &[Value],
    ) -> Result<(), InkError> {
        if reset_callstack {
            self.state.force_end();
        } else if self.state.call_stack.current_element().push_type == PushPopType::Function {
            let location = self
                .state
                .current_pointer()
                .map(|pointer| pointer.path(&self.graph).to_string())
                .unwrap_or_default();
            return Err(InkError::new(
                "STORY_CHOOSE_IN_FUNCTION",
                format!(
                    "Story was running a function ({}) when choose_path_string({}) was called.",
                    location, path
                ),
            ));
        }

        log::debug!("jumping to '{}' with {} args", path, args.len());
        for arg in args {
            self.state.push_evaluation_stack(Object::Value(arg.clone()));
        }
        self.choose_path(&Path::parse(path), true)
    }

    pub(super) fn choose_path(
        &mut self,
        path: &Path,
        incrementing_turn_index: bool,
    ) -> Result<(), InkError> {
        self.state
            .set_chosen_path(&self.graph, path, incrementing_turn_index)?;
        self.visit_changed_containers_due_to_divert();
        Ok(())
    }
}
