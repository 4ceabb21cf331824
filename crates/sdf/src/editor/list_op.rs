//! Editor for list-op valued fields.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::editor::connection::sync_dependent_specs;
use crate::editor::{Cached, EditorBase, ModifyCallback};
use crate::error::EditError;
use crate::layer::Layer;
use crate::model::{ApplyCallback, ListItem, ListOp, ListOpType};
use crate::policy::TypePolicy;
use crate::spec::{Spec, SpecType};

/// Edits a field holding a [`ListOp`].
///
/// When `dependents` names a spec type, every path added to or removed from
/// the explicit or added list creates or deletes the matching child spec.
pub struct ListOpListEditor<P: TypePolicy> {
    base: EditorBase,
    dependents: Option<SpecType>,
    cache: Mutex<Cached<ListOp<P::Item>>>,
    _policy: PhantomData<fn() -> P>,
}

impl<P: TypePolicy> ListOpListEditor<P> {
    pub(crate) fn new(owner: Spec, field: &'static str, dependents: Option<SpecType>) -> Self {
        Self {
            base: EditorBase::new(owner, field),
            dependents,
            cache: Mutex::new(Cached::default()),
            _policy: PhantomData,
        }
    }

    pub(crate) fn base(&self) -> &EditorBase {
        &self.base
    }

    /// The current value of the field; empty if it is unset or the owner
    /// has expired.
    pub fn list_op(&self) -> Arc<ListOp<P::Item>> {
        let Ok(layer) = self.base.live_layer() else {
            return Arc::new(ListOp::default());
        };
        let version = layer.version();
        let mut cache = self.cache.lock();
        if let Some(list_op) = cache.get(version) {
            return list_op;
        }
        let list_op = Arc::new(
            layer
                .get_field(&self.base.owner().path(), self.base.field())
                .and_then(|value| P::Item::list_op_from_value(&value))
                .unwrap_or_default(),
        );
        cache.store(version, Arc::clone(&list_op));
        list_op
    }

    pub fn is_explicit(&self) -> bool {
        self.list_op().is_explicit()
    }

    pub fn has_keys(&self) -> bool {
        self.list_op().has_keys()
    }

    pub fn with_items<R>(&self, op: ListOpType, f: impl FnOnce(&[P::Item]) -> R) -> R {
        f(self.list_op().get_items(op))
    }

    pub fn permission_to_edit(&self, _op: ListOpType) -> Result<(), EditError> {
        self.base.check_permission("edit").map(|_| ())
    }

    pub fn replace_edits(
        &self,
        op: ListOpType,
        index: usize,
        n: usize,
        items: Vec<P::Item>,
    ) -> Result<(), EditError> {
        self.base.check_permission("edit")?;
        let items = P::canonicalize_items(self.base.owner(), &items);
        let mut list_op = (*self.list_op()).clone();
        list_op
            .replace_operations(op, index, n, items)
            .map_err(|err| match err {
                EditError::ModeSwitch { op, .. } => EditError::ModeSwitch {
                    op,
                    location: self.base.location(),
                },
                err => err,
            })?;
        self.update_list_op(list_op, Some(op))
    }

    pub fn apply_edits_to_list(
        &self,
        items: &mut Vec<P::Item>,
        callback: Option<&ApplyCallback<'_, P::Item>>,
    ) {
        self.list_op().apply_operations(items, callback);
    }

    pub fn copy_edits(&self, rhs: &ListOpListEditor<P>) -> Result<(), EditError> {
        self.update_list_op((*rhs.list_op()).clone(), None)
    }

    pub fn apply_list(&self, op: ListOpType, rhs: &ListOpListEditor<P>) -> Result<(), EditError> {
        let mut list_op = (*self.list_op()).clone();
        list_op.compose_operations(&rhs.list_op(), op);
        self.update_list_op(list_op, Some(op))
    }

    pub fn clear_edits(&self) -> Result<(), EditError> {
        self.update_list_op(ListOp::default(), None)
    }

    pub fn clear_edits_and_make_explicit(&self) -> Result<(), EditError> {
        self.update_list_op(ListOp::create_explicit(Vec::new()), None)
    }

    pub fn modify_item_edits(
        &self,
        callback: &mut ModifyCallback<'_, P::Item>,
    ) -> Result<(), EditError> {
        self.base.check_permission("edit")?;
        let owner = self.base.owner();
        let mut list_op = (*self.list_op()).clone();
        let changed =
            list_op.modify_operations(|item| callback(item).map(|new| P::canonicalize(owner, &new)));
        if !changed {
            return Ok(());
        }
        self.update_list_op(list_op, None)
    }

    /// Validates and stores `new`, then runs the per-op side effects.
    ///
    /// With a `hint`, only that op list is compared and validated unless the
    /// explicit flag changes. Nothing is written when the value is unchanged.
    fn update_list_op(
        &self,
        new: ListOp<P::Item>,
        hint: Option<ListOpType>,
    ) -> Result<(), EditError> {
        let layer = self.base.check_permission("edit")?;
        let old = self.list_op();

        let mode_changed = old.is_explicit() != new.is_explicit();
        let candidates: &[ListOpType] = match hint {
            Some(ref op) if !mode_changed => std::slice::from_ref(op),
            _ => &ListOpType::ALL,
        };

        let mut changed = Vec::new();
        for &op in candidates {
            if old.get_items(op) != new.get_items(op) {
                self.base.validate_items(op, new.get_items(op))?;
                changed.push(op);
            }
        }
        if changed.is_empty() && !mode_changed {
            return Ok(());
        }

        let _block = layer.change_block();
        let path = self.base.owner().path();
        if new.has_keys() {
            layer.set_field(&path, self.base.field(), P::Item::list_op_into_value(new.clone()))?;
        } else {
            layer.clear_field(&path, self.base.field())?;
        }
        tracing::trace!(location = %self.base.location(), ops = ?changed, "updated list op");

        let new = Arc::new(new);
        self.cache.lock().store(layer.version(), Arc::clone(&new));
        for op in changed {
            self.on_edit(&layer, op, &old, &new);
        }
        Ok(())
    }

    fn on_edit(
        &self,
        layer: &Layer,
        op: ListOpType,
        old: &ListOp<P::Item>,
        new: &ListOp<P::Item>,
    ) {
        if let Some(spec_type) = self.dependents {
            sync_dependent_specs(layer, &self.base.owner().path(), spec_type, op, old, new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reference;
    use crate::path::Path;
    use crate::policy::{NameTokenKeyPolicy, PathKeyPolicy, ReferenceTypePolicy};
    use crate::spec::TypedSpec;
    use crate::validate::fields;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn prim_editor<P: TypePolicy>(field: &'static str) -> (Arc<Layer>, ListOpListEditor<P>) {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let editor = ListOpListEditor::new(prim.as_spec().clone(), field, None);
        (layer, editor)
    }

    #[test]
    fn test_noop_edit_does_not_write() {
        let (layer, editor) = prim_editor::<NameTokenKeyPolicy>(fields::VARIANT_SET_NAMES);
        editor
            .replace_edits(ListOpType::Prepended, 0, 0, s(&["lod", "shading"]))
            .unwrap();
        let writes = layer.field_write_count();
        let batches = layer.change_batch_count();

        editor
            .replace_edits(ListOpType::Prepended, 0, 2, s(&["lod", "shading"]))
            .unwrap();
        editor.replace_edits(ListOpType::Appended, 0, 0, Vec::new()).unwrap();
        editor.copy_edits(&editor).unwrap();

        assert_eq!(layer.field_write_count(), writes);
        assert_eq!(layer.change_batch_count(), batches);
    }

    #[test]
    fn test_duplicates_rejected_without_write() {
        let (layer, editor) = prim_editor::<NameTokenKeyPolicy>(fields::VARIANT_SET_NAMES);
        editor
            .replace_edits(ListOpType::Appended, 0, 0, s(&["a"]))
            .unwrap();
        let before = layer.get_field(&p("/Prim"), fields::VARIANT_SET_NAMES);
        let writes = layer.field_write_count();

        let err = editor
            .replace_edits(ListOpType::Appended, 1, 0, s(&["b", "a"]))
            .unwrap_err();
        assert!(matches!(err, EditError::DuplicateItem { op: ListOpType::Appended, .. }));
        assert_eq!(layer.get_field(&p("/Prim"), fields::VARIANT_SET_NAMES), before);
        assert_eq!(layer.field_write_count(), writes);
    }

    #[test]
    fn test_items_are_canonicalized_and_validated() {
        let (layer, editor) = prim_editor::<PathKeyPolicy>(fields::INHERIT_PATHS);
        editor
            .replace_edits(ListOpType::Prepended, 0, 0, vec![p("Class")])
            .unwrap();
        assert_eq!(editor.list_op().prepended_items(), &[p("/Prim/Class")]);

        let err = editor
            .replace_edits(ListOpType::Prepended, 0, 0, vec![p("/A.attr")])
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidValue { field: fields::INHERIT_PATHS, .. }));
        assert_eq!(layer.field_write_count(), 1);
    }

    #[test]
    fn test_empty_result_clears_field() {
        let (layer, editor) = prim_editor::<ReferenceTypePolicy>(fields::REFERENCES);
        let reference = Reference::new("a.usd", p("/Model"));
        editor
            .replace_edits(ListOpType::Appended, 0, 0, vec![reference])
            .unwrap();
        assert!(layer.has_field(&p("/Prim"), fields::REFERENCES));
        editor.replace_edits(ListOpType::Appended, 0, 1, Vec::new()).unwrap();
        assert!(!layer.has_field(&p("/Prim"), fields::REFERENCES));

        // An explicit empty list is an opinion and is stored.
        editor.clear_edits_and_make_explicit().unwrap();
        assert!(layer.has_field(&p("/Prim"), fields::REFERENCES));
        assert!(editor.is_explicit());
        editor.clear_edits().unwrap();
        assert!(!layer.has_field(&p("/Prim"), fields::REFERENCES));
    }

    #[test]
    fn test_permission_and_expiry() {
        let (layer, editor) = prim_editor::<NameTokenKeyPolicy>(fields::API_SCHEMAS);
        layer.set_permission_to_edit(false);
        assert!(matches!(
            editor.replace_edits(ListOpType::Added, 0, 0, s(&["A"])),
            Err(EditError::PermissionDenied { action: "edit", .. })
        ));
        layer.set_permission_to_edit(true);
        layer.delete_spec(&p("/Prim")).unwrap();
        assert!(matches!(
            editor.replace_edits(ListOpType::Added, 0, 0, s(&["A"])),
            Err(EditError::Expired { .. })
        ));
        assert!(!editor.has_keys());
    }

    #[test]
    fn test_modify_item_edits_recanonicalizes() {
        let (_layer, editor) = prim_editor::<PathKeyPolicy>(fields::SPECIALIZES);
        editor
            .replace_edits(ListOpType::Appended, 0, 0, vec![p("/A"), p("/B")])
            .unwrap();
        editor
            .modify_item_edits(&mut |path: &Path| {
                if *path == p("/A") { Some(p("Renamed")) } else { None }
            })
            .unwrap();
        assert_eq!(editor.list_op().appended_items(), &[p("/Prim/Renamed")]);
    }

    #[test]
    fn test_apply_list_composes_one_op() {
        let (layer, editor) = prim_editor::<NameTokenKeyPolicy>(fields::API_SCHEMAS);
        let other_prim = layer.create_prim(&p("/Other")).unwrap();
        let other: ListOpListEditor<NameTokenKeyPolicy> =
            ListOpListEditor::new(other_prim.as_spec().clone(), fields::API_SCHEMAS, None);
        editor.replace_edits(ListOpType::Prepended, 0, 0, s(&["A", "B"])).unwrap();
        other.replace_edits(ListOpType::Prepended, 0, 0, s(&["C", "A"])).unwrap();
        other.replace_edits(ListOpType::Deleted, 0, 0, s(&["X"])).unwrap();

        editor.apply_list(ListOpType::Prepended, &other).unwrap();
        assert_eq!(editor.list_op().prepended_items(), s(&["C", "A", "B"]).as_slice());
        assert!(editor.list_op().deleted_items().is_empty());
    }
}
