//! Field values stored on specs.
//!
//! Every field of a spec holds one [`Value`]. Editors read and write typed
//! views of it through [`FieldValue`]; list editors additionally go through
//! [`ListItem`], which ties an item type to its list-op and vector variants.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use crate::model::{ListOp, Reference};
use crate::path::Path;

/// A dynamically typed field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    Path(Path),
    Reference(Reference),
    PathListOp(ListOp<Path>),
    StringListOp(ListOp<String>),
    ReferenceListOp(ListOp<Reference>),
    PathVector(Vec<Path>),
    StringVector(Vec<String>),
    ReferenceVector(Vec<Reference>),
    RelocatesMap(BTreeMap<Path, Path>),
    StringMap(BTreeMap<String, String>),
}

impl Value {
    /// Short type name, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::Path(_) => "path",
            Value::Reference(_) => "reference",
            Value::PathListOp(_) => "path list op",
            Value::StringListOp(_) => "string list op",
            Value::ReferenceListOp(_) => "reference list op",
            Value::PathVector(_) => "path vector",
            Value::StringVector(_) => "string vector",
            Value::ReferenceVector(_) => "reference vector",
            Value::RelocatesMap(_) => "relocates map",
            Value::StringMap(_) => "string map",
        }
    }
}

/// A Rust type that can be stored in and read back from a [`Value`].
pub trait FieldValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
    fn into_value(self) -> Value;
}

macro_rules! field_value {
    ($ty:ty, $variant:ident) => {
        impl FieldValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

field_value!(bool, Bool);
field_value!(i64, Int);
field_value!(String, String);
field_value!(Path, Path);
field_value!(Reference, Reference);
field_value!(ListOp<Path>, PathListOp);
field_value!(ListOp<String>, StringListOp);
field_value!(ListOp<Reference>, ReferenceListOp);
field_value!(Vec<Path>, PathVector);
field_value!(Vec<String>, StringVector);
field_value!(Vec<Reference>, ReferenceVector);
field_value!(BTreeMap<Path, Path>, RelocatesMap);
field_value!(BTreeMap<String, String>, StringMap);

/// An item type that list editors can manage.
pub trait ListItem:
    FieldValue + Clone + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    fn list_op_from_value(value: &Value) -> Option<ListOp<Self>>;
    fn list_op_into_value(list_op: ListOp<Self>) -> Value;
    fn vector_from_value(value: &Value) -> Option<Vec<Self>>;
    fn vector_into_value(items: Vec<Self>) -> Value;

    /// The item as a path, for editors that keep child specs in sync with it.
    fn as_path(&self) -> Option<&Path> {
        None
    }
}

macro_rules! list_item {
    ($ty:ty, $list_op:ident, $vector:ident) => {
        fn list_op_from_value(value: &Value) -> Option<ListOp<$ty>> {
            match value {
                Value::$list_op(v) => Some(v.clone()),
                _ => None,
            }
        }

        fn list_op_into_value(list_op: ListOp<$ty>) -> Value {
            Value::$list_op(list_op)
        }

        fn vector_from_value(value: &Value) -> Option<Vec<$ty>> {
            match value {
                Value::$vector(v) => Some(v.clone()),
                _ => None,
            }
        }

        fn vector_into_value(items: Vec<$ty>) -> Value {
            Value::$vector(items)
        }
    };
}

impl ListItem for Path {
    list_item!(Path, PathListOp, PathVector);

    fn as_path(&self) -> Option<&Path> {
        Some(self)
    }
}

impl ListItem for String {
    list_item!(String, StringListOp, StringVector);
}

impl ListItem for Reference {
    list_item!(Reference, ReferenceListOp, ReferenceVector);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_roundtrip_rejects_other_variants() {
        let value = vec!["a".to_string()].into_value();
        assert_eq!(Vec::<String>::from_value(&value), Some(vec!["a".to_string()]));
        assert_eq!(Vec::<Path>::from_value(&value), None);
        assert_eq!(value.type_name(), "string vector");
    }

    #[test]
    fn test_list_item_variants() {
        let op = ListOp::create_explicit(vec![Path::parse("/A").unwrap()]);
        let value = Path::list_op_into_value(op.clone());
        assert_eq!(Path::list_op_from_value(&value), Some(op));
        assert_eq!(String::list_op_from_value(&value), None);
        assert!(String::new().as_path().is_none());
    }
}
