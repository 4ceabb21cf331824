//! Editors: the validation and persistence engines behind proxies.
//!
//! A list editor is bound to one list-valued field of one spec. All proxy
//! mutations funnel into [`ListEditor::replace_edits`], which checks
//! permission, canonicalizes and validates the candidate value, and writes
//! it back as a single field write. Map fields go through [`MapEditor`].
//!
//! The set of list editor kinds is closed, so [`ListEditor`] is an enum and
//! operations that combine two editors (`copy_edits`, `apply_list`) match on
//! both kinds.

pub mod connection;
pub mod list_op;
pub mod map;
pub mod vector;

use std::sync::Arc;

use crate::error::EditError;
use crate::layer::Layer;
use crate::model::{FieldValue, ListItem, ListOpType};
use crate::policy::TypePolicy;
use crate::spec::{Spec, SpecType};
use crate::validate::{fields, schema};

pub use list_op::ListOpListEditor;
pub use map::MapEditor;
pub use vector::VectorListEditor;

/// A value cached from a layer together with the layer version it was read at.
#[derive(Debug)]
pub(crate) struct Cached<T> {
    version: u64,
    value: Option<Arc<T>>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self {
            version: 0,
            value: None,
        }
    }
}

impl<T> Cached<T> {
    /// Returns the cached value if it was read at `version`.
    pub(crate) fn get(&self, version: u64) -> Option<Arc<T>> {
        match &self.value {
            Some(value) if self.version == version => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub(crate) fn store(&mut self, version: u64, value: Arc<T>) {
        self.version = version;
        self.value = Some(value);
    }
}

/// The owner/field binding shared by all editors.
#[derive(Debug, Clone)]
pub(crate) struct EditorBase {
    owner: Spec,
    field: &'static str,
}

impl EditorBase {
    pub(crate) fn new(owner: Spec, field: &'static str) -> Self {
        Self { owner, field }
    }

    pub(crate) fn owner(&self) -> &Spec {
        &self.owner
    }

    pub(crate) fn field(&self) -> &'static str {
        self.field
    }

    pub(crate) fn location(&self) -> String {
        format!("'{}' on <{}>", self.field, self.owner.path())
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.owner.is_dormant()
    }

    pub(crate) fn live_layer(&self) -> Result<Arc<Layer>, EditError> {
        self.owner.live_layer().map_err(|_| EditError::Expired {
            location: self.location(),
        })
    }

    /// Checks that the field may be written, returning the owning layer.
    pub(crate) fn check_permission(&self, action: &'static str) -> Result<Arc<Layer>, EditError> {
        let layer = self.live_layer()?;
        if !layer.permission_to_edit() {
            return Err(EditError::PermissionDenied {
                action,
                location: self.location(),
            });
        }
        if schema().require_field(self.field)?.read_only {
            return Err(EditError::ReadOnlyField { field: self.field });
        }
        Ok(layer)
    }

    /// Rejects duplicate items and items the schema does not accept.
    pub(crate) fn validate_items<T: ListItem>(
        &self,
        op: ListOpType,
        items: &[T],
    ) -> Result<(), EditError> {
        // Lists are short; a pairwise scan beats hashing here.
        for (i, item) in items.iter().enumerate() {
            if items[i + 1..].contains(item) {
                return Err(EditError::DuplicateItem {
                    op,
                    item: item.to_string(),
                    location: self.location(),
                });
            }
        }
        let schema = schema();
        for item in items {
            schema.is_valid_list_value(self.field, &item.clone().into_value())?;
        }
        Ok(())
    }
}

/// Closure type accepted by `modify_item_edits`.
pub type ModifyCallback<'a, T> = dyn FnMut(&T) -> Option<T> + 'a;

/// A list editor of one of the four supported kinds.
pub enum ListEditor<P: TypePolicy> {
    /// A list-op field with no dependent specs.
    ListOp(ListOpListEditor<P>),
    /// A plain vector field; only supports ordering.
    Vector(VectorListEditor<P>),
    /// An attribute's connection paths, synced with connection specs.
    Connection(ListOpListEditor<P>),
    /// A relationship's target paths, synced with target specs.
    RelationshipTarget(ListOpListEditor<P>),
}

impl<P: TypePolicy> ListEditor<P> {
    pub fn list_op(owner: Spec, field: &'static str) -> Self {
        ListEditor::ListOp(ListOpListEditor::new(owner, field, None))
    }

    pub fn vector(owner: Spec, field: &'static str) -> Self {
        ListEditor::Vector(VectorListEditor::new(owner, field))
    }

    /// Editor for the connection paths of an attribute.
    pub fn attribute_connections(owner: Spec) -> Self {
        ListEditor::Connection(ListOpListEditor::new(
            owner,
            fields::CONNECTION_PATHS,
            Some(SpecType::Connection),
        ))
    }

    /// Editor for the target paths of a relationship.
    pub fn relationship_targets(owner: Spec) -> Self {
        ListEditor::RelationshipTarget(ListOpListEditor::new(
            owner,
            fields::TARGET_PATHS,
            Some(SpecType::RelationshipTarget),
        ))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ListEditor::ListOp(_) => "list op",
            ListEditor::Vector(_) => "vector",
            ListEditor::Connection(_) => "connection",
            ListEditor::RelationshipTarget(_) => "relationship target",
        }
    }

    fn base(&self) -> &EditorBase {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.base()
            }
            ListEditor::Vector(e) => e.base(),
        }
    }

    pub fn owner(&self) -> &Spec {
        self.base().owner()
    }

    pub fn field(&self) -> &'static str {
        self.base().field()
    }

    pub fn location(&self) -> String {
        self.base().location()
    }

    pub fn is_expired(&self) -> bool {
        self.base().is_expired()
    }

    pub(crate) fn live_layer(&self) -> Result<Arc<Layer>, EditError> {
        self.base().live_layer()
    }

    pub fn is_explicit(&self) -> bool {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.is_explicit()
            }
            ListEditor::Vector(_) => false,
        }
    }

    pub fn is_ordered_only(&self) -> bool {
        matches!(self, ListEditor::Vector(_))
    }

    pub fn has_keys(&self) -> bool {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.has_keys()
            }
            ListEditor::Vector(e) => e.has_keys(),
        }
    }

    /// Returns true if `op` names a list that takes part in the editor's
    /// current mode.
    pub fn is_relevant(&self, op: ListOpType) -> bool {
        if self.is_explicit() {
            op == ListOpType::Explicit
        } else if self.is_ordered_only() {
            op == ListOpType::Ordered
        } else {
            op != ListOpType::Explicit
        }
    }

    /// Runs `f` over the current items of the `op` list.
    pub fn with_items<R>(&self, op: ListOpType, f: impl FnOnce(&[P::Item]) -> R) -> R {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.with_items(op, f)
            }
            ListEditor::Vector(e) => e.with_items(op, f),
        }
    }

    /// A copy of the current items of the `op` list.
    pub fn get_items(&self, op: ListOpType) -> Vec<P::Item> {
        self.with_items(op, <[P::Item]>::to_vec)
    }

    /// Checks whether the `op` list may be edited.
    pub fn permission_to_edit(&self, op: ListOpType) -> Result<(), EditError> {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.permission_to_edit(op)
            }
            ListEditor::Vector(e) => e.permission_to_edit(op),
        }
        .map_err(EditError::report)
    }

    /// Replaces `n` items of the `op` list starting at `index` with `items`.
    pub fn replace_edits(
        &self,
        op: ListOpType,
        index: usize,
        n: usize,
        items: Vec<P::Item>,
    ) -> Result<(), EditError> {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.replace_edits(op, index, n, items)
            }
            ListEditor::Vector(e) => e.replace_edits(op, index, n, items),
        }
        .map_err(EditError::report)
    }

    /// Applies this editor's edits to `items`.
    pub fn apply_edits_to_list(
        &self,
        items: &mut Vec<P::Item>,
        callback: Option<&crate::model::ApplyCallback<'_, P::Item>>,
    ) {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.apply_edits_to_list(items, callback)
            }
            ListEditor::Vector(e) => e.apply_edits_to_list(items, callback),
        }
    }

    /// Replaces all edits with those of `rhs`, which must be the same kind.
    pub fn copy_edits(&self, rhs: &ListEditor<P>) -> Result<(), EditError> {
        match (self, rhs) {
            (ListEditor::ListOp(lhs), ListEditor::ListOp(rhs))
            | (ListEditor::Connection(lhs), ListEditor::Connection(rhs))
            | (ListEditor::RelationshipTarget(lhs), ListEditor::RelationshipTarget(rhs)) => {
                lhs.copy_edits(rhs)
            }
            (ListEditor::Vector(lhs), ListEditor::Vector(rhs)) => lhs.copy_edits(rhs),
            _ => Err(EditError::EditorMismatch {
                action: "copy edits",
                lhs: self.kind_name(),
                rhs: rhs.kind_name(),
            }),
        }
        .map_err(EditError::report)
    }

    /// Composes the `op` list of `rhs` over this editor's `op` list.
    pub fn apply_list(&self, op: ListOpType, rhs: &ListEditor<P>) -> Result<(), EditError> {
        match (self, rhs) {
            (ListEditor::ListOp(lhs), ListEditor::ListOp(rhs))
            | (ListEditor::Connection(lhs), ListEditor::Connection(rhs))
            | (ListEditor::RelationshipTarget(lhs), ListEditor::RelationshipTarget(rhs)) => {
                lhs.apply_list(op, rhs)
            }
            (ListEditor::Vector(lhs), ListEditor::Vector(rhs)) => lhs.apply_list(op, rhs),
            _ => Err(EditError::EditorMismatch {
                action: "apply list",
                lhs: self.kind_name(),
                rhs: rhs.kind_name(),
            }),
        }
        .map_err(EditError::report)
    }

    /// Removes every edit, leaving the editor in non-explicit mode.
    pub fn clear_edits(&self) -> Result<(), EditError> {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.clear_edits()
            }
            ListEditor::Vector(e) => e.clear_edits(),
        }
        .map_err(EditError::report)
    }

    /// Removes every edit and switches to explicit mode.
    pub fn clear_edits_and_make_explicit(&self) -> Result<(), EditError> {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.clear_edits_and_make_explicit()
            }
            ListEditor::Vector(e) => e.clear_edits_and_make_explicit(),
        }
        .map_err(EditError::report)
    }

    /// Rewrites every item of every list through `callback`; items mapped to
    /// `None` are removed.
    pub fn modify_item_edits(
        &self,
        callback: &mut ModifyCallback<'_, P::Item>,
    ) -> Result<(), EditError> {
        match self {
            ListEditor::ListOp(e) | ListEditor::Connection(e) | ListEditor::RelationshipTarget(e) => {
                e.modify_item_edits(callback)
            }
            ListEditor::Vector(e) => e.modify_item_edits(callback),
        }
        .map_err(EditError::report)
    }
}
