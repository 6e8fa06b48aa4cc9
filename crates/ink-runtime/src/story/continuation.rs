use ink_core::InkError;

use super::Story;
use crate::object::PushPopType;

/// How the text after the last newline changed while looking ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum OutputStateChange {
    NoChange,
    ExtendedBeyondNewline,
    NewlineRemoved,
}

/// Compares the output at a newline snapshot with the current output. Glue
/// can remove the newline; any new visible text or tag extends past it.
pub(super) fn newline_output_state_change(
    previous_text: &str,
    current_text: &str,
    previous_tag_count: usize,
    current_tag_count: usize,
) -> OutputStateChange {
    let previous: Vec<char> = previous_text.chars().collect();
    let current: Vec<char> = current_text.chars().collect();

    let newline_still_exists = current.len() >= previous.len()
        && !previous.is_empty()
        && current[previous.len() - 1] == '\n';
    if previous_tag_count == current_tag_count
        && previous.len() == current.len()
        && newline_still_exists
    {
        return OutputStateChange::NoChange;
    }
    if !newline_still_exists {
        return OutputStateChange::NewlineRemoved;
    }
    if current_tag_count > previous_tag_count {
        return OutputStateChange::ExtendedBeyondNewline;
    }
    if current[previous.len()..]
        .iter()
        .any(|c| *c != ' ' && *c != '\t')
    {
        return OutputStateChange::ExtendedBeyondNewline;
    }
    OutputStateChange::NoChange
}

impl Story {
    /// Runs until the next complete line of output and returns it. Narrative
    /// errors end the line and are left in `current_errors()`.
    pub fn continue_story(&mut self) -> Result<String, InkError> {
        if !self.has_validated_externals {
            self.validate_external_bindings()?;
        }
        self.continue_internal()?;
        Ok(self.state.current_text())
    }

    /// Continues until a choice or the end, joining every line.
    pub fn continue_maximally(&mut self) -> Result<String, InkError> {
        let mut text = String::new();
        while self.can_continue() {
            text.push_str(&self.continue_story()?);
        }
        Ok(text)
    }

    pub(super) fn continue_internal(&mut self) -> Result<(), InkError> {
        if !self.can_continue() {
            return Err(InkError::new(
                "STORY_CANNOT_CONTINUE",
                "Can't continue - should check can_continue before calling continue_story.",
            ));
        }

        self.continue_depth += 1;
        self.state.did_safe_exit = false;
        self.state.reset_output();
        self.saw_lookahead_unsafe_function_after_newline = false;

        loop {
            match self.continue_single_step() {
                Ok(true) => break,
                Ok(false) => {}
                Err(error) => {
                    self.record_narrative_error(error);
                    break;
                }
            }
            if !self.can_continue() {
                break;
            }
        }

        if self.snapshot_at_last_newline.is_some() {
            // Errors raised past the newline must survive the rewind.
            let errors = self.state.current_errors.clone();
            self.restore_state_snapshot();
            self.state.current_errors = errors;
        }
        if self.state.has_error() {
            self.state.set_current_pointer(None);
        } else if !self.can_continue() {
            self.check_end_of_content();
        }

        self.state.did_safe_exit = false;
        self.saw_lookahead_unsafe_function_after_newline = false;
        self.continue_depth -= 1;
        if self.continue_depth == 0 {
            self.notify_variable_observers();
        }
        Ok(())
    }

    /// One step plus the newline bookkeeping. Returns true once a full line is
    /// ready.
    fn continue_single_step(&mut self) -> Result<bool, InkError> {
        self.step()?;

        if !self.can_continue() && !self.state.call_stack.element_is_evaluate_from_game() {
            self.try_follow_default_invisible_choice()?;
        }

        if self.state.in_string_evaluation() {
            return Ok(false);
        }

        if let Some(snapshot) = &self.snapshot_at_last_newline {
            let change = newline_output_state_change(
                &snapshot.current_text(),
                &self.state.current_text(),
                snapshot.current_tags().len(),
                self.state.current_tags().len(),
            );
            if change == OutputStateChange::ExtendedBeyondNewline
                || self.saw_lookahead_unsafe_function_after_newline
            {
                self.restore_state_snapshot();
                return Ok(true);
            }
            if change == OutputStateChange::NewlineRemoved {
                self.discard_snapshot();
            }
        }

        if self.state.output_stream_ends_in_newline() {
            if self.can_continue() {
                if self.snapshot_at_last_newline.is_none() {
                    self.state_snapshot();
                }
            } else {
                self.discard_snapshot();
            }
        }
        Ok(false)
    }

    fn record_narrative_error(&mut self, error: InkError) {
        let location = self
            .state
            .current_pointer()
            .map(|pointer| pointer.path(&self.graph).to_string());
        let error = match location {
            Some(location) => error.located(location),
            None => error,
        };
        self.state.add_error(error);
    }

    fn check_end_of_content(&mut self) {
        if self.state.call_stack.can_pop_thread() {
            self.state.add_error(InkError::new(
                "RUNTIME_THREAD_LEFT",
                "Thread available to pop, threads should always be flat by the end of evaluation?",
            ));
        }
        if !self.state.current_choices.is_empty() || self.state.did_safe_exit {
            return;
        }

        let call_stack = &self.state.call_stack;
        let message = if call_stack.can_pop_type(Some(PushPopType::Tunnel)) {
            "unexpectedly reached end of content. Do you need a '->->' to return from a tunnel?"
        } else if call_stack.can_pop_type(Some(PushPopType::Function)) {
            "unexpectedly reached end of content. Do you need a '~ return'?"
        } else if !call_stack.can_pop() {
            "ran out of content. Do you need a '-> DONE' or '-> END'?"
        } else {
            "unexpectedly reached end of content for unknown reason. Please debug compiler!"
        };
        self.state
            .add_error(InkError::new("RUNTIME_END_OF_CONTENT", message));
    }

    /// Keeps the state at a newline while the engine looks ahead for glue.
    /// Writes from here on go to a patch.
    fn state_snapshot(&mut self) {
        log::debug!("snapshot at newline");
        self.snapshot_at_last_newline = Some(self.state.clone());
        self.state.start_patching();
    }

    fn restore_state_snapshot(&mut self) {
        if let Some(snapshot) = self.snapshot_at_last_newline.take() {
            log::debug!("rewinding to newline snapshot");
            self.state = snapshot;
        }
    }

    /// The lookahead is kept: its patch is committed.
    fn discard_snapshot(&mut self) {
        self.state.apply_any_patch();
        self.snapshot_at_last_newline = None;
    }
}
