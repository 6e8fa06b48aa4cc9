use ink_core::InkError;

use crate::list::{InkList, ListDefinitions};
use crate::object::Object;
use crate::value::{Value, ValueType};

macro_rules! native_ops {
    ($($variant:ident => $token:literal, $arity:literal;)*) => {
        /// Built-in operators callable from compiled expressions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NativeOp {
            $($variant,)*
        }

        impl NativeOp {
            pub fn token(self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)*
                }
            }

            pub fn from_token(token: &str) -> Option<Self> {
                match token {
                    $($token => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn parameter_count(self) -> usize {
                match self {
                    $(Self::$variant => $arity,)*
                }
            }
        }
    };
}

native_ops! {
    Add => "+", 2;
    Subtract => "-", 2;
    Divide => "/", 2;
    Multiply => "*", 2;
    Mod => "%", 2;
    Negate => "_", 1;
    Equal => "==", 2;
    Greater => ">", 2;
    Less => "<", 2;
    GreaterThanOrEquals => ">=", 2;
    LessThanOrEquals => "<=", 2;
    NotEquals => "!=", 2;
    Not => "!", 1;
    And => "&&", 2;
    Or => "||", 2;
    Min => "MIN", 2;
    Max => "MAX", 2;
    Pow => "POW", 2;
    Floor => "FLOOR", 1;
    Ceiling => "CEILING", 1;
    Int => "INT", 1;
    Float => "FLOAT", 1;
    Has => "?", 2;
    Hasnt => "!?", 2;
    Intersect => "L^", 2;
    ListMin => "LIST_MIN", 1;
    ListMax => "LIST_MAX", 1;
    All => "LIST_ALL", 1;
    Count => "LIST_COUNT", 1;
    ValueOfList => "LIST_VALUE", 1;
    Invert => "LIST_INVERT", 1;
}

fn bool_value(value: bool) -> Value {
    Value::Int(i32::from(value))
}

impl NativeOp {
    /// Applies the operator to arguments popped from the evaluation stack, in
    /// call order.
    pub fn call(self, params: Vec<Object>, lists: &ListDefinitions) -> Result<Value, InkError> {
        if params.len() != self.parameter_count() {
            return Err(InkError::new(
                "RUNTIME_NATIVE_ARITY",
                format!(
                    "Unexpected number of parameters to '{}': {}",
                    self.token(),
                    params.len()
                ),
            ));
        }
        let mut values = Vec::with_capacity(params.len());
        for param in params {
            match param {
                Object::Value(value) => values.push(value),
                Object::Void => {
                    return Err(InkError::new(
                        "RUNTIME_VOID_OPERAND",
                        format!(
                            "Attempting to perform '{}' on a void value. Did you forget to 'return' a value from a function you called here?",
                            self.token()
                        ),
                    ))
                }
                other => {
                    return Err(InkError::new(
                        "RUNTIME_NATIVE_OPERAND",
                        format!(
                            "Cannot use a {} as an operand of '{}'.",
                            other.kind_name(),
                            self.token()
                        ),
                    ))
                }
            }
        }

        let has_list = values.iter().any(|value| matches!(value, Value::List(_)));
        if values.len() == 2 && has_list {
            return self.call_binary_list_operation(values, lists);
        }

        let coerced = coerce_to_single_type(values, lists)?;
        match coerced.as_slice() {
            [Value::Int(a)] => self.int_unary(*a),
            [Value::Float(a)] => self.float_unary(*a),
            [Value::List(a)] => self.list_unary(a, lists),
            [Value::Int(a), Value::Int(b)] => self.int_binary(*a, *b),
            [Value::Float(a), Value::Float(b)] => self.float_binary(*a, *b),
            [Value::String(a), Value::String(b)] => self.string_binary(a, b),
            [Value::DivertTarget(a), Value::DivertTarget(b)] => match self {
                Self::Equal => Ok(bool_value(a == b)),
                Self::NotEquals => Ok(bool_value(a != b)),
                _ => Err(self.unsupported(&coerced)),
            },
            _ => Err(self.unsupported(&coerced)),
        }
    }

    fn unsupported(self, values: &[Value]) -> InkError {
        let types = values
            .iter()
            .map(|value| value.value_type().name())
            .collect::<Vec<_>>()
            .join(" and ");
        InkError::new(
            "RUNTIME_NATIVE_UNSUPPORTED",
            format!("Cannot perform operation '{}' on {}", self.token(), types),
        )
    }

    fn call_binary_list_operation(
        self,
        values: Vec<Value>,
        lists: &ListDefinitions,
    ) -> Result<Value, InkError> {
        match (self, &values[0], &values[1]) {
            (Self::Add | Self::Subtract, Value::List(list), Value::Int(delta)) => {
                let delta = i64::from(*delta);
                let delta = if self == Self::Add { delta } else { -delta };
                Ok(Value::List(increment_list(list, delta, lists)))
            }
            (Self::And | Self::Or, a, b)
                if a.value_type() != ValueType::List || b.value_type() != ValueType::List =>
            {
                let a = a.is_truthy()?;
                let b = b.is_truthy()?;
                Ok(bool_value(if self == Self::And { a && b } else { a || b }))
            }
            (_, Value::List(a), Value::List(b)) => self.list_binary(a, b),
            (_, Value::List(_), Value::Int(_)) | (_, Value::Int(_), Value::List(_)) => {
                let coerced = coerce_to_single_type(values.clone(), lists)?;
                match coerced.as_slice() {
                    [Value::List(a), Value::List(b)] => self.list_binary(a, b),
                    _ => Err(self.unsupported(&coerced)),
                }
            }
            _ => Err(InkError::new(
                "RUNTIME_NATIVE_UNSUPPORTED",
                format!(
                    "Can not call use '{}' operation on {} and {}",
                    self.token(),
                    values[0].value_type().name(),
                    values[1].value_type().name()
                ),
            )),
        }
    }

    fn int_unary(self, a: i32) -> Result<Value, InkError> {
        Ok(match self {
            Self::Negate => Value::Int(a.wrapping_neg()),
            Self::Not => bool_value(a == 0),
            Self::Floor | Self::Ceiling | Self::Int => Value::Int(a),
            Self::Float => Value::Float(a as f32),
            _ => return Err(self.unsupported(&[Value::Int(a)])),
        })
    }

    fn float_unary(self, a: f32) -> Result<Value, InkError> {
        Ok(match self {
            Self::Negate => Value::Float(-a),
            Self::Not => bool_value(a == 0.0),
            Self::Floor => Value::Float(a.floor()),
            Self::Ceiling => Value::Float(a.ceil()),
            Self::Int => Value::Int(a as i32),
            Self::Float => Value::Float(a),
            _ => return Err(self.unsupported(&[Value::Float(a)])),
        })
    }

    fn list_unary(self, list: &InkList, lists: &ListDefinitions) -> Result<Value, InkError> {
        Ok(match self {
            Self::Not => bool_value(list.is_empty()),
            Self::ListMin => Value::List(list.min_as_list()),
            Self::ListMax => Value::List(list.max_as_list()),
            Self::All => Value::List(list.all(lists)),
            Self::Count => Value::Int(list.len() as i32),
            Self::ValueOfList => Value::Int(list.max_item().map_or(0, |(_, rank)| rank)),
            Self::Invert => Value::List(list.inverse(lists)),
            _ => return Err(self.unsupported(&[Value::List(list.clone())])),
        })
    }

    fn int_binary(self, a: i32, b: i32) -> Result<Value, InkError> {
        Ok(match self {
            Self::Add => Value::Int(a.wrapping_add(b)),
            Self::Subtract => Value::Int(a.wrapping_sub(b)),
            Self::Multiply => Value::Int(a.wrapping_mul(b)),
            Self::Divide | Self::Mod if b == 0 => return Err(divide_by_zero(self)),
            Self::Divide => Value::Int(a.wrapping_div(b)),
            Self::Mod => Value::Int(a.wrapping_rem(b)),
            Self::Equal => bool_value(a == b),
            Self::NotEquals => bool_value(a != b),
            Self::Greater => bool_value(a > b),
            Self::Less => bool_value(a < b),
            Self::GreaterThanOrEquals => bool_value(a >= b),
            Self::LessThanOrEquals => bool_value(a <= b),
            Self::And => bool_value(a != 0 && b != 0),
            Self::Or => bool_value(a != 0 || b != 0),
            Self::Max => Value::Int(a.max(b)),
            Self::Min => Value::Int(a.min(b)),
            Self::Pow => Value::Float((a as f32).powf(b as f32)),
            _ => return Err(self.unsupported(&[Value::Int(a), Value::Int(b)])),
        })
    }

    fn float_binary(self, a: f32, b: f32) -> Result<Value, InkError> {
        Ok(match self {
            Self::Add => Value::Float(a + b),
            Self::Subtract => Value::Float(a - b),
            Self::Multiply => Value::Float(a * b),
            Self::Divide | Self::Mod if b == 0.0 => return Err(divide_by_zero(self)),
            Self::Divide => Value::Float(a / b),
            Self::Mod => Value::Float(a % b),
            Self::Equal => bool_value(a == b),
            Self::NotEquals => bool_value(a != b),
            Self::Greater => bool_value(a > b),
            Self::Less => bool_value(a < b),
            Self::GreaterThanOrEquals => bool_value(a >= b),
            Self::LessThanOrEquals => bool_value(a <= b),
            Self::And => bool_value(a != 0.0 && b != 0.0),
            Self::Or => bool_value(a != 0.0 || b != 0.0),
            Self::Max => Value::Float(a.max(b)),
            Self::Min => Value::Float(a.min(b)),
            Self::Pow => Value::Float(a.powf(b)),
            _ => return Err(self.unsupported(&[Value::Float(a), Value::Float(b)])),
        })
    }

    fn string_binary(self, a: &str, b: &str) -> Result<Value, InkError> {
        Ok(match self {
            Self::Add => Value::String(format!("{}{}", a, b)),
            Self::Equal => bool_value(a == b),
            Self::NotEquals => bool_value(a != b),
            Self::Has => bool_value(a.contains(b)),
            Self::Hasnt => bool_value(!a.contains(b)),
            _ => {
                return Err(self.unsupported(&[
                    Value::String(a.to_string()),
                    Value::String(b.to_string()),
                ]))
            }
        })
    }

    fn list_binary(self, a: &InkList, b: &InkList) -> Result<Value, InkError> {
        Ok(match self {
            Self::Add => Value::List(a.union(b)),
            Self::Subtract => Value::List(a.without(b)),
            Self::Intersect => Value::List(a.intersect(b)),
            Self::Has => bool_value(a.contains(b)),
            Self::Hasnt => bool_value(!a.contains(b)),
            Self::Equal => bool_value(a == b),
            Self::NotEquals => bool_value(a != b),
            Self::Greater => bool_value(a.greater_than(b)),
            Self::Less => bool_value(a.less_than(b)),
            Self::GreaterThanOrEquals => bool_value(a.greater_than_or_equals(b)),
            Self::LessThanOrEquals => bool_value(a.less_than_or_equals(b)),
            Self::And => bool_value(!a.is_empty() && !b.is_empty()),
            Self::Or => bool_value(!a.is_empty() || !b.is_empty()),
            _ => {
                return Err(
                    self.unsupported(&[Value::List(a.clone()), Value::List(b.clone())])
                )
            }
        })
    }
}

fn divide_by_zero(op: NativeOp) -> InkError {
    InkError::new(
        "RUNTIME_DIVIDE_BY_ZERO",
        format!("Division by zero in '{}'.", op.token()),
    )
}

/// Shifts every item by `delta` ranks within its own origin. Items that land on
/// no defined rank are dropped.
fn increment_list(list: &InkList, delta: i64, lists: &ListDefinitions) -> InkList {
    let mut result = InkList::new();
    for (item, rank) in list.iter() {
        let Ok(target) = i32::try_from(i64::from(rank) + delta) else {
            continue;
        };
        let origin = item
            .origin_name
            .as_deref()
            .and_then(|name| lists.definition(name));
        if let Some(shifted) = origin.and_then(|origin| origin.item_with_value(target)) {
            result.insert(shifted, target);
        }
    }
    result.set_initial_origin_names(list.origin_names());
    result
}

fn coerce_to_single_type(
    values: Vec<Value>,
    lists: &ListDefinitions,
) -> Result<Vec<Value>, InkError> {
    let Some(target) = values.iter().map(Value::value_type).max() else {
        return Ok(values);
    };

    // Ints become the list item of that rank in the list operand's origin.
    let list_origin = values.iter().find_map(|value| match value {
        Value::List(list) => list.origin_of_max_item(lists),
        _ => None,
    });

    values
        .into_iter()
        .map(|value| match (target, &value) {
            (ValueType::List, Value::Int(rank)) => {
                let Some(origin) = list_origin else {
                    return Err(InkError::new(
                        "RUNTIME_LIST_COERCION",
                        format!(
                            "Could not find List item with the value {} so can't convert to a List",
                            rank
                        ),
                    ));
                };
                match origin.item_with_value(*rank) {
                    Some(item) => Ok(Value::List(InkList::from_item(item, *rank))),
                    None => Err(InkError::new(
                        "RUNTIME_LIST_COERCION",
                        format!(
                            "Could not find List item with the value {} in {}",
                            rank,
                            origin.name()
                        ),
                    )),
                }
            }
            (ValueType::List, Value::List(_)) => Ok(value),
            (ValueType::List, other) => Err(InkError::new(
                "RUNTIME_LIST_COERCION",
                format!(
                    "Cannot mix Lists and {} values in this operation",
                    other.value_type().name()
                ),
            )),
            _ => value.cast(target),
        })
        .collect()
}

#[cfg(test)]
mod native_ops_tests {
    use super::*;
    use crate::list::list_test_support::{colours, list_of};

    fn call(op: NativeOp, params: Vec<Value>) -> Result<Value, InkError> {
        op.call(params.into_iter().map(Object::Value).collect(), &colours())
    }

    #[test]
    fn mixed_numbers_promote_to_float() {
        assert_eq!(
            call(NativeOp::Add, vec![Value::Int(1), Value::Float(0.5)]),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            call(NativeOp::Divide, vec![Value::Int(7), Value::Int(2)]),
            Ok(Value::Int(3))
        );
    }

    #[test]
    fn strings_win_over_numbers() {
        assert_eq!(
            call(
                NativeOp::Add,
                vec![Value::String("x".to_string()), Value::Int(2)]
            ),
            Ok(Value::String("x2".to_string()))
        );
        assert_eq!(
            call(
                NativeOp::Has,
                vec![
                    Value::String("hello".to_string()),
                    Value::String("ell".to_string())
                ]
            ),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn comparisons_return_ints() {
        assert_eq!(
            call(NativeOp::Greater, vec![Value::Int(3), Value::Int(2)]),
            Ok(Value::Int(1))
        );
        assert_eq!(
            call(NativeOp::Equal, vec![Value::Float(1.0), Value::Int(2)]),
            Ok(Value::Int(0))
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        for op in [NativeOp::Divide, NativeOp::Mod] {
            let error = call(op, vec![Value::Int(1), Value::Int(0)]).expect_err("zero");
            assert_eq!(error.code, "RUNTIME_DIVIDE_BY_ZERO");
        }
        assert!(call(NativeOp::Divide, vec![Value::Float(1.0), Value::Float(0.0)]).is_err());
    }

    #[test]
    fn void_operands_are_rejected() {
        let error = NativeOp::Add
            .call(vec![Object::Value(Value::Int(1)), Object::Void], &colours())
            .expect_err("void");
        assert_eq!(error.code, "RUNTIME_VOID_OPERAND");
    }

    #[test]
    fn list_increment_moves_and_vanishes() {
        let red = Value::List(list_of(&[("red", 1)]));
        assert_eq!(
            call(NativeOp::Add, vec![red.clone(), Value::Int(1)]),
            Ok(Value::List(list_of(&[("green", 2)])))
        );
        let blue = Value::List(list_of(&[("blue", 3)]));
        let shifted = call(NativeOp::Add, vec![blue, Value::Int(1)]).expect("shift");
        assert_eq!(shifted, Value::List(InkList::new()));
        assert_eq!(
            call(NativeOp::Subtract, vec![red, Value::Int(1)]),
            Ok(Value::List(InkList::new()))
        );
    }

    #[test]
    fn list_increment_past_int_range_drops_items() {
        let red = Value::List(list_of(&[("red", 1)]));
        assert_eq!(
            call(NativeOp::Add, vec![red.clone(), Value::Int(i32::MAX)]),
            Ok(Value::List(InkList::new()))
        );
        assert_eq!(
            call(NativeOp::Subtract, vec![red.clone(), Value::Int(i32::MIN)]),
            Ok(Value::List(InkList::new()))
        );
        assert_eq!(
            call(NativeOp::Subtract, vec![red.clone(), Value::Int(-2)]),
            Ok(Value::List(list_of(&[("blue", 3)])))
        );
        assert_eq!(
            call(NativeOp::Add, vec![red.clone(), Value::Int(0)]),
            Ok(red)
        );
    }

    #[test]
    fn list_with_int_comparison_coerces_by_origin() {
        let green = Value::List(list_of(&[("green", 2)]));
        assert_eq!(
            call(NativeOp::Equal, vec![green.clone(), Value::Int(2)]),
            Ok(Value::Int(1))
        );
        assert!(call(NativeOp::Equal, vec![green, Value::Int(9)]).is_err());
    }

    #[test]
    fn list_and_or_use_truthiness() {
        let empty = Value::List(InkList::new());
        assert_eq!(
            call(NativeOp::Or, vec![empty.clone(), Value::Int(1)]),
            Ok(Value::Int(1))
        );
        assert_eq!(
            call(NativeOp::And, vec![empty, Value::Int(1)]),
            Ok(Value::Int(0))
        );
    }

    #[test]
    fn list_unary_queries() {
        let list = Value::List(list_of(&[("red", 1), ("blue", 3)]));
        assert_eq!(call(NativeOp::Count, vec![list.clone()]), Ok(Value::Int(2)));
        assert_eq!(
            call(NativeOp::ValueOfList, vec![list.clone()]),
            Ok(Value::Int(3))
        );
        assert_eq!(
            call(NativeOp::Invert, vec![list.clone()]),
            Ok(Value::List(list_of(&[("green", 2)])))
        );
        assert_eq!(
            call(NativeOp::ListMin, vec![list]),
            Ok(Value::List(list_of(&[("red", 1)])))
        );
    }

    #[test]
    fn unsupported_pairs_are_errors() {
        let error = call(
            NativeOp::Multiply,
            vec![
                Value::String("a".to_string()),
                Value::String("b".to_string()),
            ],
        )
        .expect_err("strings do not multiply");
        assert_eq!(error.code, "RUNTIME_NATIVE_UNSUPPORTED");
        assert_eq!(NativeOp::from_token("L^"), Some(NativeOp::Intersect));
    }
}
