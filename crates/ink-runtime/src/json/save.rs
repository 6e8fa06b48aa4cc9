use std::collections::BTreeMap;

use ink_core::{
    CallStackElementFile, CallStackFile, CallStackThreadFile, ChoiceFile, InkError, Path,
    SaveStateFile, INK_SAVE_STATE_MINIMUM_COMPATIBLE, INK_SAVE_STATE_VERSION, INK_VERSION_CURRENT,
};
use serde_json::Value as JsonValue;

use super::{json_error, object_from_json, object_to_json, value_from_json, value_to_json};
use crate::callstack::{CallStack, Element, Thread};
use crate::choice::Choice;
use crate::graph::StoryGraph;
use crate::object::{Object, PushPopType};
use crate::pointer::Pointer;
use crate::story_state::StoryState;
use crate::value::Value;

impl StoryState {
    /// Serializes the committed state. Lookahead overlays are never written.
    pub fn to_save_file(&self, graph: &StoryGraph) -> SaveStateFile {
        let mut choice_threads = BTreeMap::new();
        for choice in &self.current_choices {
            if self
                .call_stack
                .thread_with_index(choice.original_thread_index)
                .is_none()
            {
                choice_threads.insert(
                    choice.original_thread_index.to_string(),
                    thread_to_file(&choice.thread_at_generation, graph),
                );
            }
        }

        SaveStateFile {
            ink_save_version: INK_SAVE_STATE_VERSION,
            ink_format_version: INK_VERSION_CURRENT,
            callstack_threads: CallStackFile {
                threads: self
                    .call_stack
                    .threads()
                    .iter()
                    .map(|thread| thread_to_file(thread, graph))
                    .collect(),
                thread_counter: self.call_stack.thread_counter(),
            },
            variables_state: self
                .variables_state
                .globals()
                .iter()
                .map(|(name, value)| (name.clone(), value_to_json(value)))
                .collect(),
            eval_stack: self.evaluation_stack.iter().map(object_to_json).collect(),
            output_stream: self.output_stream.iter().map(object_to_json).collect(),
            current_choices: self
                .current_choices
                .iter()
                .map(|choice| ChoiceFile {
                    text: choice.text.clone(),
                    index: choice.index,
                    original_choice_path: choice.source_path.clone(),
                    original_thread_index: choice.original_thread_index,
                    target_path: Some(choice.target_path.to_string()),
                    tags: choice.tags.clone(),
                    is_invisible_default: choice.is_invisible_default,
                })
                .collect(),
            choice_threads,
            visit_counts: self.visit_counts.clone(),
            turn_indices: self.turn_indices.clone(),
            turn_idx: self.current_turn_index,
            story_seed: self.story_seed,
            previous_random: self.previous_random,
            current_right_glue: self
                .current_right_glue
                .map(|node| graph.path_of(node).to_string()),
            current_divert_target: self
                .diverted_pointer
                .map(|pointer| pointer.path(graph).to_string()),
        }
    }

    pub fn to_json(&self, graph: &StoryGraph) -> Result<String, InkError> {
        serde_json::to_string(&self.to_save_file(graph))
            .map_err(|error| json_error("SAVE_JSON", format!("Failed to write save: {}", error)))
    }

    /// Replaces the execution state with a saved one. Default globals stay as
    /// they are, so variables missing from the save keep their declared values.
    pub fn load_save_file(
        &mut self,
        graph: &StoryGraph,
        file: SaveStateFile,
    ) -> Result<(), InkError> {
        if file.ink_save_version < INK_SAVE_STATE_MINIMUM_COMPATIBLE {
            return Err(json_error(
                "SAVE_VERSION",
                format!(
                    "Save format {} is older than the minimum supported {}.",
                    file.ink_save_version, INK_SAVE_STATE_MINIMUM_COMPATIBLE
                ),
            ));
        }

        let threads = file
            .callstack_threads
            .threads
            .iter()
            .map(|thread| thread_from_file(thread, graph))
            .collect::<Result<Vec<_>, _>>()?;
        if threads.is_empty() {
            return Err(json_error("SAVE_JSON", "Saved call stack has no threads."));
        }
        let call_stack =
            CallStack::from_parts(threads, file.callstack_threads.thread_counter, graph.root());

        let mut globals = BTreeMap::new();
        for (name, token) in &file.variables_state {
            globals.insert(name.clone(), saved_value(token, name)?);
        }

        let evaluation_stack = file
            .eval_stack
            .iter()
            .map(object_from_json)
            .collect::<Result<Vec<Object>, _>>()?;
        let output_stream = file
            .output_stream
            .iter()
            .map(object_from_json)
            .collect::<Result<Vec<Object>, _>>()?;

        let mut current_choices = Vec::with_capacity(file.current_choices.len());
        for saved in file.current_choices {
            let thread_at_generation = match call_stack.thread_with_index(saved.original_thread_index)
            {
                Some(thread) => thread.clone(),
                None => {
                    let key = saved.original_thread_index.to_string();
                    let Some(thread) = file.choice_threads.get(&key) else {
                        return Err(json_error(
                            "SAVE_JSON",
                            format!("No saved thread {} for choice '{}'.", key, saved.text),
                        ));
                    };
                    thread_from_file(thread, graph)?
                }
            };
            let target_path = saved
                .target_path
                .as_deref()
                .map(Path::parse)
                .unwrap_or_else(|| Path::parse(&saved.original_choice_path));
            current_choices.push(Choice {
                text: saved.text,
                index: saved.index,
                source_path: saved.original_choice_path,
                target_path,
                tags: saved.tags,
                is_invisible_default: saved.is_invisible_default,
                original_thread_index: saved.original_thread_index,
                thread_at_generation,
            });
        }

        let current_right_glue = match &file.current_right_glue {
            Some(path) => Some(
                graph
                    .content_at_path(&Path::parse(path))
                    .node()
                    .ok_or_else(|| {
                        json_error("SAVE_JSON", format!("Saved glue '{}' not found.", path))
                    })?,
            ),
            None => None,
        };
        let diverted_pointer = match &file.current_divert_target {
            Some(path) => Some(graph.pointer_at_path(&Path::parse(path))?.0),
            None => None,
        };

        self.call_stack = call_stack;
        self.variables_state.load_globals(globals);
        self.evaluation_stack = evaluation_stack;
        self.output_stream = output_stream;
        self.current_choices = current_choices;
        self.visit_counts = file.visit_counts;
        self.turn_indices = file.turn_indices;
        self.current_turn_index = file.turn_idx;
        self.story_seed = file.story_seed;
        self.previous_random = file.previous_random;
        self.current_right_glue = current_right_glue;
        self.diverted_pointer = diverted_pointer;
        self.current_errors.clear();
        self.current_warnings.clear();
        self.did_safe_exit = false;
        self.patch = None;
        Ok(())
    }

    pub fn load_json(&mut self, graph: &StoryGraph, source: &str) -> Result<(), InkError> {
        let file: SaveStateFile = serde_json::from_str(source)
            .map_err(|error| json_error("SAVE_JSON", format!("Invalid save JSON: {}", error)))?;
        self.load_save_file(graph, file)
    }
}

fn saved_value(token: &JsonValue, name: &str) -> Result<Value, InkError> {
    value_from_json(token).ok_or_else(|| {
        json_error(
            "SAVE_JSON",
            format!("Saved variable '{}' holds an unreadable value {}.", name, token),
        )
    })
}

fn thread_to_file(thread: &Thread, graph: &StoryGraph) -> CallStackThreadFile {
    CallStackThreadFile {
        callstack: thread
            .callstack
            .iter()
            .map(|element| CallStackElementFile {
                container_path: element
                    .current_pointer
                    .map(|pointer| graph.path_of(pointer.container).to_string()),
                index: element.current_pointer.map_or(0, |pointer| pointer.index),
                in_expression_evaluation: element.in_expression_evaluation,
                push_type: element.push_type.as_i32(),
                temporary_variables: element
                    .temporary_variables
                    .iter()
                    .map(|(name, value)| (name.clone(), value_to_json(value)))
                    .collect(),
            })
            .collect(),
        thread_index: thread.thread_index,
        previous_content_object: thread
            .previous_pointer
            .and_then(|pointer| pointer.resolve(graph))
            .map(|node| graph.path_of(node).to_string()),
    }
}

fn thread_from_file(file: &CallStackThreadFile, graph: &StoryGraph) -> Result<Thread, InkError> {
    let mut callstack = Vec::with_capacity(file.callstack.len());
    for saved in &file.callstack {
        let current_pointer = match &saved.container_path {
            Some(path) => Some(saved_pointer(graph, path, saved.index)?),
            None => None,
        };
        let mut element = Element::new(
            PushPopType::from_i32(saved.push_type)?,
            current_pointer,
            saved.in_expression_evaluation,
        );
        for (name, token) in &saved.temporary_variables {
            element
                .temporary_variables
                .insert(name.clone(), saved_value(token, name)?);
        }
        callstack.push(element);
    }
    if callstack.is_empty() {
        return Err(json_error(
            "SAVE_JSON",
            format!("Saved thread {} has no frames.", file.thread_index),
        ));
    }

    let previous_pointer = match &file.previous_content_object {
        Some(path) => Some(graph.pointer_at_path(&Path::parse(path))?.0),
        None => None,
    };
    Ok(Thread {
        callstack,
        thread_index: file.thread_index,
        previous_pointer,
    })
}

fn saved_pointer(graph: &StoryGraph, path: &str, index: i32) -> Result<Pointer, InkError> {
    let result = graph.content_at_path(&Path::parse(path));
    let found = result.approximate_node();
    if !graph.is_container(found) || (result.is_approximate() && found == graph.root()) {
        return Err(json_error(
            "SAVE_JSON",
            format!(
                "When loading state, story location '{}' couldn't be found.",
                path
            ),
        ));
    }
    if result.is_approximate() {
        log::warn!(
            "saved story location '{}' not found, approximated to '{}'",
            path,
            graph.path_of(found)
        );
    }
    Ok(Pointer::new(found, index))
}
