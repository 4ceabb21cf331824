//! Editor for plain vector fields, such as a layer's sublayer paths.
//!
//! The vector is exposed as the ordered list of a list op; every other list
//! is permanently empty and cannot be edited.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::editor::{Cached, EditorBase, ModifyCallback};
use crate::error::EditError;
use crate::model::{ApplyCallback, ListItem, ListOp, ListOpType};
use crate::policy::TypePolicy;
use crate::spec::Spec;

pub struct VectorListEditor<P: TypePolicy> {
    base: EditorBase,
    cache: Mutex<Cached<Vec<P::Item>>>,
    _policy: PhantomData<fn() -> P>,
}

impl<P: TypePolicy> VectorListEditor<P> {
    pub(crate) fn new(owner: Spec, field: &'static str) -> Self {
        Self {
            base: EditorBase::new(owner, field),
            cache: Mutex::new(Cached::default()),
            _policy: PhantomData,
        }
    }

    pub(crate) fn base(&self) -> &EditorBase {
        &self.base
    }

    /// The current vector; empty if it is unset or the owner has expired.
    pub fn items(&self) -> Arc<Vec<P::Item>> {
        let Ok(layer) = self.base.live_layer() else {
            return Arc::new(Vec::new());
        };
        let version = layer.version();
        let mut cache = self.cache.lock();
        if let Some(items) = cache.get(version) {
            return items;
        }
        let items = Arc::new(
            layer
                .get_field(&self.base.owner().path(), self.base.field())
                .and_then(|value| P::Item::vector_from_value(&value))
                .unwrap_or_default(),
        );
        cache.store(version, Arc::clone(&items));
        items
    }

    pub fn has_keys(&self) -> bool {
        !self.items().is_empty()
    }

    pub fn with_items<R>(&self, op: ListOpType, f: impl FnOnce(&[P::Item]) -> R) -> R {
        if op == ListOpType::Ordered {
            f(self.items().as_slice())
        } else {
            f(Default::default())
        }
    }

    pub fn permission_to_edit(&self, op: ListOpType) -> Result<(), EditError> {
        self.base.check_permission("edit")?;
        self.check_op(op)
    }

    pub fn replace_edits(
        &self,
        op: ListOpType,
        index: usize,
        n: usize,
        items: Vec<P::Item>,
    ) -> Result<(), EditError> {
        self.base.check_permission("edit")?;
        self.check_op(op)?;
        let mut vector = (*self.items()).clone();
        if index > vector.len() {
            return Err(EditError::IndexOutOfRange {
                op,
                bound: "start",
                index,
                size: vector.len(),
            });
        }
        let Some(end) = index.checked_add(n).filter(|end| *end <= vector.len()) else {
            return Err(EditError::IndexOutOfRange {
                op,
                bound: "end",
                index: index.saturating_add(n),
                size: vector.len(),
            });
        };
        let items = P::canonicalize_items(self.base.owner(), &items);
        vector.splice(index..end, items);
        self.update_vector(vector)
    }

    /// Reorders `items` to follow this vector.
    pub fn apply_edits_to_list(
        &self,
        items: &mut Vec<P::Item>,
        callback: Option<&ApplyCallback<'_, P::Item>>,
    ) {
        self.as_list_op().apply_operations(items, callback);
    }

    pub fn copy_edits(&self, rhs: &VectorListEditor<P>) -> Result<(), EditError> {
        self.update_vector((*rhs.items()).clone())
    }

    pub fn apply_list(&self, op: ListOpType, rhs: &VectorListEditor<P>) -> Result<(), EditError> {
        self.check_op(op)?;
        let mut list_op = self.as_list_op();
        list_op.compose_operations(&rhs.as_list_op(), op);
        self.update_vector(list_op.ordered_items().to_vec())
    }

    pub fn clear_edits(&self) -> Result<(), EditError> {
        self.update_vector(Vec::new())
    }

    pub fn clear_edits_and_make_explicit(&self) -> Result<(), EditError> {
        Err(EditError::ModeSwitch {
            op: ListOpType::Explicit,
            location: self.base.location(),
        })
    }

    pub fn modify_item_edits(
        &self,
        callback: &mut ModifyCallback<'_, P::Item>,
    ) -> Result<(), EditError> {
        self.base.check_permission("edit")?;
        let owner = self.base.owner();
        let mut list_op = self.as_list_op();
        if !list_op.modify_operations(|item| callback(item).map(|new| P::canonicalize(owner, &new))) {
            return Ok(());
        }
        self.update_vector(list_op.ordered_items().to_vec())
    }

    fn as_list_op(&self) -> ListOp<P::Item> {
        let mut list_op = ListOp::new();
        list_op.set_ordered_items((*self.items()).clone());
        list_op
    }

    fn check_op(&self, op: ListOpType) -> Result<(), EditError> {
        if op == ListOpType::Ordered {
            Ok(())
        } else {
            Err(EditError::IrrelevantList {
                op,
                location: self.base.location(),
            })
        }
    }

    fn update_vector(&self, new: Vec<P::Item>) -> Result<(), EditError> {
        let layer = self.base.check_permission("edit")?;
        let old = self.items();
        if *old == new {
            return Ok(());
        }
        self.base.validate_items(ListOpType::Ordered, &new)?;

        let _block = layer.change_block();
        let path = self.base.owner().path();
        if new.is_empty() {
            layer.clear_field(&path, self.base.field())?;
        } else {
            layer.set_field(&path, self.base.field(), P::Item::vector_into_value(new.clone()))?;
        }
        tracing::trace!(location = %self.base.location(), len = new.len(), "updated vector");
        self.cache.lock().store(layer.version(), Arc::new(new));
        Ok(())
    }
}
