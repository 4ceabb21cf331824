//! Field schema and value validation.
//!
//! The schema knows which fields exist, which of them are read-only, and
//! which validators apply to the items of list-valued fields and to the
//! keys and values of map-valued fields. Editors consult it before writing.
//!
//! The schema is global and immutable; [`schema()`] returns it.

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;

use crate::error::EditError;
use crate::model::{Reference, Value};
use crate::path::{is_valid_identifier, is_valid_namespaced_identifier, Path};

/// Field names understood by the schema.
pub mod fields {
    pub const TARGET_PATHS: &str = "targetPaths";
    pub const CONNECTION_PATHS: &str = "connectionPaths";
    pub const INHERIT_PATHS: &str = "inheritPaths";
    pub const SPECIALIZES: &str = "specializes";
    pub const REFERENCES: &str = "references";
    pub const VARIANT_SET_NAMES: &str = "variantSetNames";
    pub const API_SCHEMAS: &str = "apiSchemas";
    pub const SUB_LAYERS: &str = "subLayers";
    pub const PRIM_ORDER: &str = "primOrder";
    pub const RELOCATES: &str = "relocates";
    pub const VARIANT_SELECTION: &str = "variantSelection";
    pub const CUSTOM_DATA: &str = "customData";
    pub const TYPE_NAME: &str = "typeName";
    pub const CUSTOM: &str = "custom";

    pub const PRIM_CHILDREN: &str = "primChildren";
    pub const PROPERTIES: &str = "properties";
    pub const TARGET_CHILDREN: &str = "targetChildren";
    pub const CONNECTION_CHILDREN: &str = "connectionChildren";
}

/// Checks a single value; the error is a short human-readable reason.
pub type Validator = fn(&Value) -> Result<(), &'static str>;

/// Static description of one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDefinition {
    pub name: &'static str,
    /// Read-only fields are maintained by the layer itself.
    pub read_only: bool,
    /// True for fields that list the names or targets of child specs.
    pub holds_children: bool,
    pub list_value_validator: Option<Validator>,
    pub map_key_validator: Option<Validator>,
    pub map_value_validator: Option<Validator>,
}

impl FieldDefinition {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            read_only: false,
            holds_children: false,
            list_value_validator: None,
            map_key_validator: None,
            map_value_validator: None,
        }
    }

    const fn children(name: &'static str) -> Self {
        let mut def = Self::new(name);
        def.read_only = true;
        def.holds_children = true;
        def
    }

    const fn list(name: &'static str, validator: Validator) -> Self {
        let mut def = Self::new(name);
        def.list_value_validator = Some(validator);
        def
    }

    const fn map(name: &'static str, key: Validator, value: Validator) -> Self {
        let mut def = Self::new(name);
        def.map_key_validator = Some(key);
        def.map_value_validator = Some(value);
        def
    }
}

/// The set of known fields.
#[derive(Debug)]
pub struct Schema {
    fields: FxHashMap<&'static str, FieldDefinition>,
}

lazy_static! {
    static ref SCHEMA: Schema = Schema::new();
}

/// Returns the global schema.
pub fn schema() -> &'static Schema {
    &SCHEMA
}

impl Schema {
    fn new() -> Self {
        let definitions = [
            FieldDefinition::list(fields::TARGET_PATHS, validate_relationship_target_path),
            FieldDefinition::list(fields::CONNECTION_PATHS, validate_attribute_connection_path),
            FieldDefinition::list(fields::INHERIT_PATHS, validate_inherit_path),
            FieldDefinition::list(fields::SPECIALIZES, validate_inherit_path),
            FieldDefinition::list(fields::REFERENCES, validate_reference),
            FieldDefinition::list(fields::VARIANT_SET_NAMES, validate_identifier),
            FieldDefinition::list(fields::API_SCHEMAS, validate_identifier),
            FieldDefinition::list(fields::SUB_LAYERS, validate_sublayer),
            FieldDefinition::list(fields::PRIM_ORDER, validate_identifier),
            FieldDefinition::map(fields::RELOCATES, validate_relocates_path, validate_relocates_path),
            FieldDefinition::map(
                fields::VARIANT_SELECTION,
                validate_identifier,
                validate_variant_selection,
            ),
            FieldDefinition::map(fields::CUSTOM_DATA, validate_non_empty_string, accept_any),
            FieldDefinition::new(fields::TYPE_NAME),
            FieldDefinition::new(fields::CUSTOM),
            FieldDefinition::children(fields::PRIM_CHILDREN),
            FieldDefinition::children(fields::PROPERTIES),
            FieldDefinition::children(fields::TARGET_CHILDREN),
            FieldDefinition::children(fields::CONNECTION_CHILDREN),
        ];
        Self {
            fields: definitions.into_iter().map(|def| (def.name, def)).collect(),
        }
    }

    pub fn field_definition(&self, field: &str) -> Option<&FieldDefinition> {
        self.fields.get(field)
    }

    /// Looks up a field, failing for unknown names.
    pub fn require_field(&self, field: &'static str) -> Result<&FieldDefinition, EditError> {
        self.fields
            .get(field)
            .ok_or(EditError::UnknownField { field })
    }

    pub fn is_read_only(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|def| def.read_only)
    }

    /// Validates one item of a list-valued field.
    pub fn is_valid_list_value(&self, field: &'static str, item: &Value) -> Result<(), EditError> {
        let def = self.require_field(field)?;
        run_validator(field, def.list_value_validator, item)
    }

    /// Validates one key of a map-valued field.
    pub fn is_valid_map_key(&self, field: &'static str, key: &Value) -> Result<(), EditError> {
        let def = self.require_field(field)?;
        run_validator(field, def.map_key_validator, key)
    }

    /// Validates one value of a map-valued field.
    pub fn is_valid_map_value(&self, field: &'static str, value: &Value) -> Result<(), EditError> {
        let def = self.require_field(field)?;
        run_validator(field, def.map_value_validator, value)
    }
}

fn run_validator(
    field: &'static str,
    validator: Option<Validator>,
    value: &Value,
) -> Result<(), EditError> {
    match validator {
        Some(validate) => validate(value).map_err(|reason| EditError::InvalidValue {
            field,
            item: display_value(value),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Path(path) => format!("<{path}>"),
        Value::Reference(reference) => reference.to_string(),
        Value::String(s) => format!("{s:?}"),
        other => format!("{other:?}"),
    }
}

fn as_path(value: &Value) -> Result<&Path, &'static str> {
    match value {
        Value::Path(path) => Ok(path),
        _ => Err("expected a path"),
    }
}

fn as_string(value: &Value) -> Result<&str, &'static str> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err("expected a string"),
    }
}

/// Relationship targets: absolute prim or property paths without variant selections.
pub fn validate_relationship_target_path(value: &Value) -> Result<(), &'static str> {
    let path = as_path(value)?;
    if path.contains_prim_variant_selection() {
        return Err("target paths cannot contain variant selections");
    }
    if !path.is_absolute() {
        return Err("target paths must be absolute");
    }
    if !(path.is_prim_path() || path.is_property_path()) {
        return Err("target paths must be prim or property paths");
    }
    Ok(())
}

/// Attribute connections: absolute prim or property paths without variant selections.
pub fn validate_attribute_connection_path(value: &Value) -> Result<(), &'static str> {
    let path = as_path(value)?;
    if path.contains_prim_variant_selection() {
        return Err("connection paths cannot contain variant selections");
    }
    if !path.is_absolute() {
        return Err("connection paths must be absolute");
    }
    if !(path.is_prim_path() || path.is_property_path()) {
        return Err("connection paths must be prim or property paths");
    }
    Ok(())
}

/// Inherits and specializes: absolute prim paths.
pub fn validate_inherit_path(value: &Value) -> Result<(), &'static str> {
    let path = as_path(value)?;
    if !(path.is_absolute() && path.is_prim_path()) {
        return Err("path must be an absolute prim path");
    }
    Ok(())
}

/// References: the prim path is empty or an absolute prim path.
pub fn validate_reference(value: &Value) -> Result<(), &'static str> {
    let Value::Reference(Reference { prim_path, .. }) = value else {
        return Err("expected a reference");
    };
    if !prim_path.is_empty() && !(prim_path.is_absolute() && prim_path.is_prim_path()) {
        return Err("reference prim path must be empty or an absolute prim path");
    }
    Ok(())
}

pub fn validate_identifier(value: &Value) -> Result<(), &'static str> {
    if !is_valid_identifier(as_string(value)?) {
        return Err("not a valid identifier");
    }
    Ok(())
}

pub fn validate_sublayer(value: &Value) -> Result<(), &'static str> {
    if as_string(value)?.is_empty() {
        return Err("sublayer paths cannot be empty");
    }
    Ok(())
}

/// Relocates sources and targets: prim paths other than the root.
pub fn validate_relocates_path(value: &Value) -> Result<(), &'static str> {
    let path = as_path(value)?;
    if path.is_absolute_root() {
        return Err("the root path cannot be relocated");
    }
    if !path.is_prim_path() {
        return Err("relocates paths must be prim paths");
    }
    Ok(())
}

/// Variant selections name a variant or are empty to clear the selection.
pub fn validate_variant_selection(value: &Value) -> Result<(), &'static str> {
    let selection = as_string(value)?;
    if !selection.is_empty() && !is_valid_namespaced_identifier(selection) {
        return Err("not a valid variant name");
    }
    Ok(())
}

fn validate_non_empty_string(value: &Value) -> Result<(), &'static str> {
    if as_string(value)?.is_empty() {
        return Err("key cannot be empty");
    }
    Ok(())
}

fn accept_any(_: &Value) -> Result<(), &'static str> {
    Ok(())
}
