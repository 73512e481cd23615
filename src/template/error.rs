use crate::def_boxed_thiserror;
use super::value::ValueKind;

def_boxed_thiserror!(TemplateError, pub enum TemplateErrorKind {
    #[error("unclosed opening delimiter at {pos}")]
    UnclosedOpening { pos: usize },
    #[error("empty tag at {pos}")]
    EmptyTag { pos: usize },
    #[error("unknown tag {name:?} at {pos}")]
    UnknownTag { pos: usize, name: String },
    #[error("unknown variable {name:?} at {pos}")]
    UnknownVariable { pos: usize, name: String },
    #[error("unknown path {path:?} at {pos}")]
    UnknownPath { pos: usize, path: String },
    #[error("unknown filter {name:?} at {pos}")]
    UnknownFilter { pos: usize, name: String },
    #[error("tag {name:?} opened at {pos} is never closed")]
    UnclosedTag { pos: usize, name: String },
    #[error("stray {name:?} at {pos}")]
    StrayEnd { pos: usize, name: String },
    #[error("`else` outside of an `if` block at {pos}")]
    StrayElse { pos: usize },
    #[error("can't iterate over a {kind} at {pos}")]
    NonIterable { pos: usize, kind: ValueKind },
    #[error("template {name:?} not found at {pos}")]
    TemplateNotFound { pos: usize, name: String },
    #[error("filter {name:?} failed at {pos}: {message}")]
    FilterError { pos: usize, name: String, message: String },
    #[error("invalid assignment at {pos}: {message}")]
    InvalidAssignment { pos: usize, message: &'static str },
    #[error("tag {name:?} at {pos} is missing its {what} argument")]
    MissingArgument { pos: usize, name: String, what: &'static str },
    #[error("handler for tag {name:?} at {pos} did not advance")]
    NoProgress { pos: usize, name: String },
    #[error("templates nested deeper than {limit} levels at {pos}")]
    RecursionLimit { pos: usize, limit: usize },
    #[error("more than {limit} iterations at {pos}")]
    IterationLimit { pos: usize, limit: usize },
});

impl TemplateErrorKind {
    /// Stable name of the error condition.
    pub fn code(&self) -> &'static str {
        use TemplateErrorKind::*;
        match self {
            UnclosedOpening { .. } => "unclosed-opening",
            EmptyTag { .. } => "empty-tag",
            UnknownTag { .. } => "unknown-tag",
            UnknownVariable { .. } => "unknown-variable",
            UnknownPath { .. } => "unknown-path",
            UnknownFilter { .. } => "unknown-filter",
            UnclosedTag { .. } => "unclosed-tag",
            StrayEnd { .. } => "stray-end",
            StrayElse { .. } => "stray-else",
            NonIterable { .. } => "non-iterable",
            TemplateNotFound { .. } => "template-not-found",
            FilterError { .. } => "filter-error",
            InvalidAssignment { .. } => "invalid-assignment",
            MissingArgument { .. } => "missing-argument",
            NoProgress { .. } => "no-progress",
            RecursionLimit { .. } => "recursion-limit",
            IterationLimit { .. } => "iteration-limit",
        }
    }

    /// Byte offset into the source being rendered when the error
    /// was found.
    pub fn pos(&self) -> usize {
        use TemplateErrorKind::*;
        match self {
            UnclosedOpening { pos } => *pos,
            EmptyTag { pos } => *pos,
            UnknownTag { pos, .. } => *pos,
            UnknownVariable { pos, .. } => *pos,
            UnknownPath { pos, .. } => *pos,
            UnknownFilter { pos, .. } => *pos,
            UnclosedTag { pos, .. } => *pos,
            StrayEnd { pos, .. } => *pos,
            StrayElse { pos } => *pos,
            NonIterable { pos, .. } => *pos,
            TemplateNotFound { pos, .. } => *pos,
            FilterError { pos, .. } => *pos,
            InvalidAssignment { pos, .. } => *pos,
            MissingArgument { pos, .. } => *pos,
            NoProgress { pos, .. } => *pos,
            RecursionLimit { pos, .. } => *pos,
            IterationLimit { pos, .. } => *pos,
        }
    }
}
