use std::fmt;

use ink_core::{InkError, Path};

use crate::list::InkList;

/// Ordered by coercion priority: mixed operands are promoted to the higher type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    Int,
    Float,
    List,
    String,
    DivertTarget,
    VariablePointer,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::List => "List",
            Self::String => "String",
            Self::DivertTarget => "DivertTarget",
            Self::VariablePointer => "VariablePointer",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    String(String),
    List(InkList),
    DivertTarget(Path),
    /// `context_index`: -1 unresolved, 0 global, n the n-th call-stack frame.
    VariablePointer { name: String, context_index: i32 },
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::List(_) => ValueType::List,
            Self::DivertTarget(_) => ValueType::DivertTarget,
            Self::VariablePointer { .. } => ValueType::VariablePointer,
        }
    }

    pub fn is_truthy(&self) -> Result<bool, InkError> {
        match self {
            Self::Int(value) => Ok(*value != 0),
            Self::Float(value) => Ok(*value != 0.0),
            Self::String(value) => Ok(!value.is_empty()),
            Self::List(list) => Ok(!list.is_empty()),
            Self::DivertTarget(_) | Self::VariablePointer { .. } => Err(InkError::new(
                "RUNTIME_TRUTHINESS",
                format!(
                    "Shouldn't be checking the truthiness of a {} value.",
                    self.value_type().name()
                ),
            )),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&InkList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_divert_target(&self) -> Option<&Path> {
        match self {
            Self::DivertTarget(path) => Some(path),
            _ => None,
        }
    }

    pub fn cast(&self, target: ValueType) -> Result<Value, InkError> {
        if self.value_type() == target {
            return Ok(self.clone());
        }
        let cast = match (self, target) {
            (Self::Int(value), ValueType::Float) => Some(Self::Float(*value as f32)),
            (Self::Int(_), ValueType::String) | (Self::Float(_), ValueType::String) => {
                Some(Self::String(self.to_string()))
            }
            (Self::Float(value), ValueType::Int) => Some(Self::Int(*value as i32)),
            (Self::String(value), ValueType::Int) => value.trim().parse().ok().map(Self::Int),
            (Self::String(value), ValueType::Float) => value.trim().parse().ok().map(Self::Float),
            (Self::List(list), ValueType::Int) => {
                Some(Self::Int(list.max_item().map_or(0, |(_, rank)| rank)))
            }
            (Self::List(list), ValueType::Float) => {
                Some(Self::Float(list.max_item().map_or(0.0, |(_, rank)| rank as f32)))
            }
            (Self::List(list), ValueType::String) => Some(Self::String(
                list.max_item()
                    .map_or_else(String::new, |(item, _)| item.full_name()),
            )),
            _ => None,
        };
        cast.ok_or_else(|| {
            InkError::new(
                "RUNTIME_BAD_CAST",
                format!(
                    "Can't cast {} from {} to {}",
                    self,
                    self.value_type().name(),
                    target.name()
                ),
            )
        })
    }

    /// A plain string containing only a newline.
    pub fn is_newline(&self) -> bool {
        matches!(self, Self::String(text) if text == "\n")
    }

    pub fn is_inline_whitespace(&self) -> bool {
        matches!(self, Self::String(text) if text.chars().all(|c| c == ' ' || c == '\t'))
    }

    pub fn is_non_whitespace(&self) -> bool {
        matches!(self, Self::String(_)) && !self.is_newline() && !self.is_inline_whitespace()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::String(value) => f.write_str(value),
            Self::List(list) => write!(f, "{}", list),
            Self::DivertTarget(path) => write!(f, "DivertTargetValue({})", path),
            Self::VariablePointer { name, .. } => write!(f, "VariablePointerValue({})", name),
        }
    }
}

/// An empty list assigned over a list keeps the old list's origins so that
/// `LIST_ALL` still works on it.
pub(crate) fn retain_list_origins_for_assignment(old: Option<&Value>, new: &mut Value) {
    if let (Some(Value::List(old_list)), Value::List(new_list)) = (old, new) {
        if new_list.is_empty() {
            new_list.set_initial_origin_names(old_list.origin_names());
        }
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;
    use crate::list::list_test_support::list_of;

    #[test]
    fn type_order_follows_coercion_priority() {
        assert!(ValueType::Int < ValueType::Float);
        assert!(ValueType::Float < ValueType::List);
        assert!(ValueType::List < ValueType::String);
        assert!(ValueType::String < ValueType::DivertTarget);
        assert!(ValueType::DivertTarget < ValueType::VariablePointer);
    }

    #[test]
    fn casts_between_numbers_and_strings() {
        assert_eq!(Value::Int(3).cast(ValueType::Float), Ok(Value::Float(3.0)));
        assert_eq!(Value::Float(2.7).cast(ValueType::Int), Ok(Value::Int(2)));
        assert_eq!(
            Value::Float(1.5).cast(ValueType::String),
            Ok(Value::String("1.5".to_string()))
        );
        assert_eq!(
            Value::String("12".to_string()).cast(ValueType::Int),
            Ok(Value::Int(12))
        );
        let error = Value::String("twelve".to_string())
            .cast(ValueType::Int)
            .expect_err("non numeric string");
        assert_eq!(error.code, "RUNTIME_BAD_CAST");
    }

    #[test]
    fn list_casts_use_max_item() {
        let list = Value::List(list_of(&[("red", 1), ("blue", 3)]));
        assert_eq!(list.cast(ValueType::Int), Ok(Value::Int(3)));
        assert_eq!(
            list.cast(ValueType::String),
            Ok(Value::String("Colours.blue".to_string()))
        );
        assert_eq!(
            Value::List(InkList::new()).cast(ValueType::Int),
            Ok(Value::Int(0))
        );
    }

    #[test]
    fn divert_targets_have_no_truthiness() {
        let target = Value::DivertTarget(Path::parse("knot"));
        assert!(target.is_truthy().is_err());
        assert_eq!(target.to_string(), "DivertTargetValue(knot)");
        assert_eq!(Value::Int(0).is_truthy(), Ok(false));
        assert_eq!(Value::String(String::new()).is_truthy(), Ok(false));
    }

    #[test]
    fn whitespace_classification() {
        assert!(Value::String("\n".to_string()).is_newline());
        assert!(Value::String("  ".to_string()).is_inline_whitespace());
        assert!(Value::String("hi".to_string()).is_non_whitespace());
        assert!(!Value::Int(1).is_non_whitespace());
    }

    #[test]
    fn empty_list_assignment_keeps_origins() {
        let old = Value::List(list_of(&[("red", 1)]));
        let mut new = Value::List(InkList::new());
        retain_list_origins_for_assignment(Some(&old), &mut new);
        let list = new.as_list().expect("still a list");
        assert_eq!(list.origin_names(), vec!["Colours".to_string()]);
    }
}
