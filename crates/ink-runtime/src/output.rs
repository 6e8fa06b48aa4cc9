use crate::graph::{NodeId, StoryGraph};
use crate::object::{ControlCommand, GlueKind, Object};
use crate::story_state::StoryState;
use crate::value::Value;

impl StoryState {
    /// Text of the output stream with inline whitespace runs collapsed.
    pub fn current_text(&self) -> String {
        let raw: String = self
            .output_stream
            .iter()
            .filter_map(Object::as_str)
            .collect();
        clean_output_whitespace(&raw)
    }

    pub fn current_tags(&self) -> Vec<String> {
        self.output_stream
            .iter()
            .filter_map(|object| match object {
                Object::Tag(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn output_stream_ends_in_newline(&self) -> bool {
        for object in self.output_stream.iter().rev() {
            match object {
                Object::Command(_) => break,
                Object::Value(value) if value.is_newline() => return true,
                Object::Value(value) if value.is_non_whitespace() => break,
                _ => {}
            }
        }
        false
    }

    pub fn output_stream_contains_content(&self) -> bool {
        self.output_stream
            .iter()
            .any(|object| matches!(object, Object::Value(Value::String(_))))
    }

    /// True while text is being captured by `str` ... `/str`.
    pub fn in_string_evaluation(&self) -> bool {
        self.output_stream
            .iter()
            .rev()
            .any(|object| object.is_command(ControlCommand::BeginString))
    }

    pub(crate) fn reset_output(&mut self) {
        self.output_stream.clear();
    }

    /// Removes everything back to the last `marker` command and returns the text
    /// that was collected after it.
    pub(crate) fn fold_output_since(&mut self, marker: ControlCommand) -> String {
        let start = self
            .output_stream
            .iter()
            .rposition(|object| object.is_command(marker))
            .unwrap_or(0);
        let folded = self.output_stream.split_off(start);
        folded.iter().filter_map(Object::as_str).collect()
    }

    pub(crate) fn push_to_output_stream(&mut self, object: Object) {
        match object {
            Object::Value(Value::String(text)) => match split_head_tail_whitespace(&text) {
                Some(parts) => {
                    for part in parts {
                        self.push_text_individual(part);
                    }
                }
                None => self.push_text_individual(text),
            },
            Object::Glue(kind) => self.push_glue_individual(kind, None, false),
            other => self.output_stream.push(other),
        }
    }

    /// Glue from the story content. A left glue closes the live right glue when
    /// both come from the same container.
    pub(crate) fn push_glue(&mut self, kind: GlueKind, node: NodeId, graph: &StoryGraph) {
        let matches_right_glue = kind.is_left()
            && self
                .current_right_glue
                .is_some_and(|right| graph.parent(right) == graph.parent(node));
        self.push_glue_individual(kind, Some(node), matches_right_glue);
    }

    fn push_glue_individual(
        &mut self,
        kind: GlueKind,
        node: Option<NodeId>,
        matches_right_glue: bool,
    ) {
        if matches_right_glue {
            self.current_right_glue = None;
        }
        if kind.is_left() || kind.is_bidirectional() {
            self.trim_newlines_from_output_stream(matches_right_glue);
        }
        let is_new_right_glue = kind.is_right() && self.current_right_glue.is_none();
        if is_new_right_glue {
            self.current_right_glue = node;
        }
        if kind.is_bidirectional() || is_new_right_glue {
            self.output_stream.push(Object::Glue(kind));
        }
    }

    fn push_text_individual(&mut self, text: String) {
        let value = Value::String(text);
        let mut include = true;
        if self.current_glue_index().is_some() {
            if value.is_newline() {
                self.trim_from_existing_glue();
                include = false;
            } else if value.is_non_whitespace() {
                self.remove_existing_glue();
            }
        } else if value.is_newline()
            && (self.output_stream_ends_in_newline() || !self.output_stream_contains_content())
        {
            include = false;
        }
        if include {
            self.output_stream.push(Object::Value(value));
        }
    }

    fn current_glue_index(&self) -> Option<usize> {
        for (index, object) in self.output_stream.iter().enumerate().rev() {
            match object {
                Object::Glue(_) => return Some(index),
                Object::Command(_) => return None,
                _ => {}
            }
        }
        None
    }

    /// Drops trailing newline-whitespace. When closing a right glue, keeps
    /// walking back to it and removes it as well.
    fn trim_newlines_from_output_stream(&mut self, stop_and_remove_right_glue: bool) {
        let mut remove_whitespace_from = None;
        let mut right_glue_position = None;
        let mut found_non_whitespace = false;

        for (index, object) in self.output_stream.iter().enumerate().rev() {
            match object {
                Object::Command(_) => {
                    found_non_whitespace = true;
                    if !stop_and_remove_right_glue {
                        break;
                    }
                }
                Object::Value(value) if value.is_non_whitespace() => {
                    found_non_whitespace = true;
                    if !stop_and_remove_right_glue {
                        break;
                    }
                }
                Object::Glue(kind) if stop_and_remove_right_glue && kind.is_right() => {
                    right_glue_position = Some(index);
                    break;
                }
                Object::Value(value) if value.is_newline() && !found_non_whitespace => {
                    remove_whitespace_from = Some(index);
                }
                _ => {}
            }
        }

        if let Some(from) = remove_whitespace_from {
            let mut index = from;
            while index < self.output_stream.len() {
                if matches!(self.output_stream[index], Object::Value(Value::String(_))) {
                    self.output_stream.remove(index);
                } else {
                    index += 1;
                }
            }
        }

        if let Some(position) = right_glue_position {
            self.output_stream.remove(position);
        }
    }

    fn trim_from_existing_glue(&mut self) {
        let Some(mut index) = self.current_glue_index() else {
            return;
        };
        while index < self.output_stream.len() {
            let whitespace = matches!(
                &self.output_stream[index],
                Object::Value(value @ Value::String(_)) if !value.is_non_whitespace()
            );
            if whitespace {
                self.output_stream.remove(index);
            } else {
                index += 1;
            }
        }
    }

    fn remove_existing_glue(&mut self) {
        let mut index = self.output_stream.len();
        while index > 0 {
            index -= 1;
            match self.output_stream[index] {
                Object::Glue(_) => {
                    self.output_stream.remove(index);
                }
                Object::Command(_) => break,
                _ => {}
            }
        }
    }
}

/// Collapses runs of spaces and tabs to one space and drops them at the start
/// and end of each line.
pub(crate) fn clean_output_whitespace(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut whitespace_start = None;
    let mut start_of_line = 0;
    for (index, c) in text.chars().enumerate() {
        if c == ' ' || c == '\t' {
            whitespace_start.get_or_insert(index);
            continue;
        }
        if let Some(start) = whitespace_start.take() {
            if c != '\n' && start > 0 && start != start_of_line {
                cleaned.push(' ');
            }
        }
        if c == '\n' {
            start_of_line = index + 1;
        }
        cleaned.push(c);
    }
    cleaned
}

/// Splits leading and trailing newline runs off `text` so that glue can act
/// on them. Returns `None` when there is nothing to split.
pub(crate) fn split_head_tail_whitespace(text: &str) -> Option<Vec<String>> {
    let bytes = text.as_bytes();

    let mut head_first_newline = None;
    let mut head_last_newline = None;
    for (index, byte) in bytes.iter().enumerate() {
        match byte {
            b'\n' => {
                head_first_newline.get_or_insert(index);
                head_last_newline = Some(index);
            }
            b' ' | b'\t' => {}
            _ => break,
        }
    }

    let mut tail_last_newline = None;
    let mut tail_first_newline = None;
    for (index, byte) in bytes.iter().enumerate().rev() {
        match byte {
            b'\n' => {
                tail_last_newline.get_or_insert(index);
                tail_first_newline = Some(index);
            }
            b' ' | b'\t' => {}
            _ => break,
        }
    }

    if head_first_newline.is_none() && tail_last_newline.is_none() {
        return None;
    }

    let mut parts = Vec::new();
    let mut inner_start = 0;
    let mut inner_end = text.len();

    if let (Some(first), Some(last)) = (head_first_newline, head_last_newline) {
        if first > 0 {
            parts.push(text[..first].to_string());
        }
        parts.push("\n".to_string());
        inner_start = last + 1;
    }

    if let Some(first) = tail_first_newline {
        inner_end = first;
    }

    if inner_end > inner_start {
        parts.push(text[inner_start..inner_end].to_string());
    }

    if let (Some(first), Some(last)) = (tail_first_newline, tail_last_newline) {
        let after_head = match head_last_newline {
            Some(head_last) => first > head_last,
            None => true,
        };
        if after_head {
            parts.push("\n".to_string());
            if last + 1 < text.len() {
                parts.push(text[last + 1..].to_string());
            }
        }
    }

    Some(parts)
}
