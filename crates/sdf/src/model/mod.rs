//! Value types stored on specs.
//!
//! This module contains the data that editors operate on:
//! - List operations (explicit or incremental list edits)
//! - References to prims in other layers
//! - Namespace edits (rename, reparent, reorder, remove)
//! - Dynamically typed field values

pub mod list_op;
pub mod namespace_edit;
pub mod reference;
pub mod value;

pub use list_op::{ApplyCallback, ListOp, ListOpType};
pub use namespace_edit::{BatchNamespaceEdit, ChildIndex, NamespaceEdit};
pub use reference::Reference;
pub use value::{FieldValue, ListItem, Value};
