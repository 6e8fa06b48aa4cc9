use ink_core::{InkError, Path};

use crate::graph::NodeId;
use crate::pointer::Pointer;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlueKind {
    /// `<>`
    Bidirectional,
    /// `G<`
    Left,
    /// `G>`
    Right,
}

impl GlueKind {
    pub fn token(self) -> &'static str {
        match self {
            Self::Bidirectional => "<>",
            Self::Left => "G<",
            Self::Right => "G>",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<>" => Some(Self::Bidirectional),
            "G<" => Some(Self::Left),
            "G>" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn is_left(self) -> bool {
        self == Self::Left
    }

    pub fn is_right(self) -> bool {
        self == Self::Right
    }

    pub fn is_bidirectional(self) -> bool {
        self == Self::Bidirectional
    }
}

macro_rules! control_commands {
    ($($variant:ident => $token:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ControlCommand {
            $($variant,)*
        }

        impl ControlCommand {
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
        }
    };
}

control_commands! {
    EvalStart => "ev",
    EvalOutput => "out",
    EvalEnd => "/ev",
    Duplicate => "du",
    PopEvaluatedValue => "pop",
    PopFunction => "~ret",
    PopTunnel => "->->",
    BeginString => "str",
    EndString => "/str",
    NoOp => "nop",
    ChoiceCount => "choiceCnt",
    TurnsSince => "turns",
    ReadCount => "readc",
    Random => "rnd",
    SeedRandom => "srnd",
    VisitIndex => "visit",
    SequenceShuffleIndex => "seq",
    StartThread => "thread",
    Done => "done",
    End => "end",
    ListFromInt => "listInt",
    ListRange => "range",
    ListRandom => "lrnd",
    BeginTag => "#",
    EndTag => "/#",
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushPopType {
    Tunnel,
    Function,
    FunctionEvaluationFromGame,
}

impl PushPopType {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Tunnel => 0,
            Self::Function => 1,
            Self::FunctionEvaluationFromGame => 2,
        }
    }

    pub fn from_i32(raw: i32) -> Result<Self, InkError> {
        match raw {
            0 => Ok(Self::Tunnel),
            1 => Ok(Self::Function),
            2 => Ok(Self::FunctionEvaluationFromGame),
            other => Err(InkError::new(
                "SAVE_PUSH_TYPE",
                format!("Unknown call stack push type {}.", other),
            )),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tunnel => "tunnel",
            Self::Function => "function",
            Self::FunctionEvaluationFromGame => "function evaluation from game",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DivertKind {
    /// Fixed target; `pointer` is filled in when the graph is linked.
    Path {
        path: Path,
        pointer: Option<Pointer>,
    },
    /// Target read from a divert-target variable.
    Variable(String),
    External {
        name: String,
        args: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Divert {
    pub kind: DivertKind,
    pub is_conditional: bool,
    pub push_type: Option<PushPopType>,
}

impl Divert {
    pub fn target_path(&self) -> Option<&Path> {
        match &self.kind {
            DivertKind::Path { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePoint {
    /// As written; relative paths are resolved against the choice point.
    pub path_on_choice: Path,
    /// Target container, filled in when the graph is linked.
    pub target: Option<NodeId>,
    pub has_condition: bool,
    pub has_start_content: bool,
    pub has_choice_only_content: bool,
    pub is_invisible_default: bool,
    pub once_only: bool,
}

impl ChoicePoint {
    pub fn flags(&self) -> i32 {
        let mut flags = 0;
        if self.has_condition {
            flags |= 1;
        }
        if self.has_start_content {
            flags |= 2;
        }
        if self.has_choice_only_content {
            flags |= 4;
        }
        if self.is_invisible_default {
            flags |= 8;
        }
        if self.once_only {
            flags |= 16;
        }
        flags
    }

    pub fn from_flags(path_on_choice: Path, flags: i32) -> Self {
        Self {
            path_on_choice,
            target: None,
            has_condition: flags & 1 != 0,
            has_start_content: flags & 2 != 0,
            has_choice_only_content: flags & 4 != 0,
            is_invisible_default: flags & 8 != 0,
            once_only: flags & 16 != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableReference {
    Named(String),
    /// `CNT?`: read count of a container.
    ReadCount {
        path: Path,
        container: Option<NodeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableAssignment {
    pub name: String,
    pub is_new_declaration: bool,
    pub is_global: bool,
}

/// What lives on the output stream and the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Value(Value),
    Void,
    Glue(GlueKind),
    Command(ControlCommand),
    Tag(String),
}

impl Object {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Value(Value::String(text.into()))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_command(&self, command: ControlCommand) -> bool {
        matches!(self, Self::Command(found) if *found == command)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Value(value) => value.value_type().name(),
            Self::Void => "Void",
            Self::Glue(_) => "Glue",
            Self::Command(_) => "ControlCommand",
            Self::Tag(_) => "Tag",
        }
    }
}
