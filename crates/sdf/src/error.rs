//! Error types for path parsing, layer access and list/map editing.

use thiserror::Error;

use crate::model::{ListOpType, NamespaceEdit};

/// Error while parsing a textual scene description path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("unexpected character {found:?} at offset {offset} in path {text:?}")]
    UnexpectedChar {
        text: String,
        offset: usize,
        found: char,
    },

    #[error("unexpected end of path {text:?} while reading {context}")]
    UnexpectedEnd { text: String, context: &'static str },

    #[error("'..' may only lead a relative path: {text:?}")]
    MisplacedParent { text: String },

    #[error("unbalanced brackets in path {text:?}")]
    UnbalancedBrackets { text: String },
}

/// Error raised by editors, proxies and the backing layer.
///
/// Editing failures are never fatal: the operation that fails leaves the
/// stored value untouched and reports one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("cannot edit {location}: the owning spec has expired")]
    Expired { location: String },

    #[error("proxy does not refer to any editor")]
    InvalidProxy,

    #[error("cannot {action} {location}: permission denied")]
    PermissionDenied {
        action: &'static str,
        location: String,
    },

    #[error("duplicate item {item} in {op} list of {location}")]
    DuplicateItem {
        op: ListOpType,
        item: String,
        location: String,
    },

    #[error("invalid value {item} for field '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        item: String,
        reason: String,
    },

    #[error("unknown field '{field}'")]
    UnknownField { field: &'static str },

    #[error("field '{field}' is read-only")]
    ReadOnlyField { field: &'static str },

    #[error("invalid {bound} index {index} for {op} list (size {size})")]
    IndexOutOfRange {
        op: ListOpType,
        bound: &'static str,
        index: usize,
        size: usize,
    },

    #[error("cannot switch {location} to {op} edits without clearing it first")]
    ModeSwitch { op: ListOpType, location: String },

    #[error("the {op} list of {location} is not editable in its current mode")]
    IrrelevantList { op: ListOpType, location: String },

    #[error("cannot {action} items of {location}: the list only supports ordering")]
    OrderedOnly {
        action: &'static str,
        location: String,
    },

    #[error("cannot {action} between list editors of different kinds ({lhs} and {rhs})")]
    EditorMismatch {
        action: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("cannot copy to {location}: duplicate key {key} after canonicalization")]
    DuplicateKey { key: String, location: String },

    #[error("no spec at <{path}>")]
    NoSuchSpec { path: String },

    #[error("a spec already exists at <{path}>")]
    SpecExists { path: String },

    #[error("invalid namespace edit: {reason}")]
    InvalidNamespaceEdit { reason: String },
}

/// Why an edit of a namespace batch cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply namespace edit {edit}: {reason}")]
pub struct NamespaceEditDetail {
    pub edit: NamespaceEdit,
    pub reason: String,
}

impl NamespaceEditDetail {
    pub fn new(edit: NamespaceEdit, reason: impl Into<String>) -> Self {
        Self {
            edit,
            reason: reason.into(),
        }
    }
}

impl From<NamespaceEditDetail> for EditError {
    fn from(detail: NamespaceEditDetail) -> Self {
        EditError::InvalidNamespaceEdit {
            reason: detail.to_string(),
        }
    }
}

impl EditError {
    /// Emits this error as a coding-error diagnostic and hands it back.
    pub(crate) fn report(self) -> Self {
        tracing::error!(error = %self, "coding error");
        self
    }
}
