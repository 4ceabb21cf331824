//! The full list-op editing surface of one field.

use std::fmt;
use std::sync::Arc;

use crate::editor::ListEditor;
use crate::error::EditError;
use crate::model::{ApplyCallback, ListOpType};
use crate::policy::TypePolicy;
use crate::proxy::ListProxy;

/// Edits a list-op field through its six op lists.
///
/// [`add`](Self::add), [`prepend`](Self::prepend), [`append`](Self::append),
/// [`remove`](Self::remove) and [`erase`](Self::erase) pick the list to edit
/// from the editor's mode. Operations that touch several lists run inside one
/// change block.
pub struct ListEditorProxy<P: TypePolicy> {
    editor: Option<Arc<ListEditor<P>>>,
}

impl<P: TypePolicy> ListEditorProxy<P> {
    pub fn new(editor: ListEditor<P>) -> Self {
        Self {
            editor: Some(Arc::new(editor)),
        }
    }

    pub fn editor(&self) -> Option<&Arc<ListEditor<P>>> {
        self.editor.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| !editor.is_expired())
    }

    pub fn is_expired(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| editor.is_expired())
    }

    pub fn is_explicit(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| editor.is_explicit())
    }

    pub fn is_ordered_only(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| editor.is_ordered_only())
    }

    pub fn has_keys(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| editor.has_keys())
    }

    pub fn explicit_items(&self) -> ListProxy<P> {
        self.get_items(ListOpType::Explicit)
    }

    pub fn added_items(&self) -> ListProxy<P> {
        self.get_items(ListOpType::Added)
    }

    pub fn prepended_items(&self) -> ListProxy<P> {
        self.get_items(ListOpType::Prepended)
    }

    pub fn appended_items(&self) -> ListProxy<P> {
        self.get_items(ListOpType::Appended)
    }

    pub fn deleted_items(&self) -> ListProxy<P> {
        self.get_items(ListOpType::Deleted)
    }

    pub fn ordered_items(&self) -> ListProxy<P> {
        self.get_items(ListOpType::Ordered)
    }

    /// A proxy for the `op` list.
    pub fn get_items(&self, op: ListOpType) -> ListProxy<P> {
        match &self.editor {
            Some(editor) => ListProxy::new(Arc::clone(editor), op),
            None => ListProxy::default(),
        }
    }

    /// The result of applying the edits to an empty list.
    pub fn applied_items(&self) -> Vec<P::Item> {
        let mut items = Vec::new();
        if let Some(editor) = &self.editor {
            editor.apply_edits_to_list(&mut items, None);
        }
        items
    }

    /// Returns true if `item` appears in any list. With `only_add_or_explicit`
    /// the deleted and ordered lists are ignored.
    pub fn contains_item_edit(&self, item: &P::Item, only_add_or_explicit: bool) -> bool {
        let mut ops = vec![
            ListOpType::Explicit,
            ListOpType::Added,
            ListOpType::Prepended,
            ListOpType::Appended,
        ];
        if !only_add_or_explicit {
            ops.extend([ListOpType::Deleted, ListOpType::Ordered]);
        }
        ops.into_iter()
            .any(|op| self.get_items(op).contains(item))
    }

    /// Replaces every edit with those of `other`.
    pub fn copy_items(&self, other: &ListEditorProxy<P>) -> Result<(), EditError> {
        let editor = self.live_editor()?;
        let rhs = other.live_editor()?;
        editor.copy_edits(rhs)
    }

    pub fn clear_edits(&self) -> Result<(), EditError> {
        self.live_editor()?.clear_edits()
    }

    pub fn clear_edits_and_make_explicit(&self) -> Result<(), EditError> {
        self.live_editor()?.clear_edits_and_make_explicit()
    }

    /// Rewrites every edited item through `callback`; items mapped to `None`
    /// are dropped.
    pub fn modify_item_edits(
        &self,
        mut callback: impl FnMut(&P::Item) -> Option<P::Item>,
    ) -> Result<(), EditError> {
        self.live_editor()?.modify_item_edits(&mut callback)
    }

    pub fn apply_edits_to_list(
        &self,
        items: &mut Vec<P::Item>,
        callback: Option<&ApplyCallback<'_, P::Item>>,
    ) {
        if let Some(editor) = &self.editor {
            editor.apply_edits_to_list(items, callback);
        }
    }

    /// Composes the `op` list of `rhs` over this proxy's `op` list.
    pub fn apply_list(&self, op: ListOpType, rhs: &ListEditorProxy<P>) -> Result<(), EditError> {
        let editor = self.live_editor()?;
        let rhs = rhs.live_editor()?;
        editor.apply_list(op, rhs)
    }

    /// Removes `item` from every list that is relevant in the current mode.
    pub fn remove_item_edits(&self, item: &P::Item) -> Result<(), EditError> {
        let editor = self.live_editor()?;
        let layer = editor.live_layer()?;
        let _block = layer.change_block();
        for op in ListOpType::ALL {
            if editor.is_relevant(op) {
                self.get_items(op).remove(item)?;
            }
        }
        Ok(())
    }

    /// Replaces `old` with `new` in every list that is relevant in the
    /// current mode.
    pub fn replace_item_edits(&self, old: &P::Item, new: &P::Item) -> Result<(), EditError> {
        let editor = self.live_editor()?;
        let layer = editor.live_layer()?;
        let _block = layer.change_block();
        for op in ListOpType::ALL {
            if editor.is_relevant(op) {
                self.get_items(op).replace(old, new.clone())?;
            }
        }
        Ok(())
    }

    /// Adds `item` to the explicit list or, in list-op mode, to the added
    /// list. An equal item already present is replaced in place.
    pub fn add(&self, item: P::Item) -> Result<(), EditError> {
        let editor = self.editable("add")?;
        let layer = editor.live_layer()?;
        let _block = layer.change_block();
        if editor.is_explicit() {
            self.add_or_replace(ListOpType::Explicit, item)
        } else {
            self.deleted_items().remove(&item)?;
            self.add_or_replace(ListOpType::Added, item)
        }
    }

    /// Moves or inserts `item` at the front of the explicit or prepended list.
    pub fn prepend(&self, item: P::Item) -> Result<(), EditError> {
        let editor = self.editable("prepend")?;
        let layer = editor.live_layer()?;
        let _block = layer.change_block();
        if editor.is_explicit() {
            self.move_to(ListOpType::Explicit, item, End::Front)
        } else {
            self.deleted_items().remove(&item)?;
            self.move_to(ListOpType::Prepended, item, End::Front)
        }
    }

    /// Moves or inserts `item` at the back of the explicit or appended list.
    pub fn append(&self, item: P::Item) -> Result<(), EditError> {
        let editor = self.editable("append")?;
        let layer = editor.live_layer()?;
        let _block = layer.change_block();
        if editor.is_explicit() {
            self.move_to(ListOpType::Explicit, item, End::Back)
        } else {
            self.deleted_items().remove(&item)?;
            self.move_to(ListOpType::Appended, item, End::Back)
        }
    }

    /// Removes `item`. In list-op mode this also records it as deleted, so it
    /// is removed from weaker opinions as well.
    pub fn remove(&self, item: &P::Item) -> Result<(), EditError> {
        let editor = self.editable("remove")?;
        if editor.is_explicit() {
            return self.explicit_items().remove(item);
        }
        let layer = editor.live_layer()?;
        let _block = layer.change_block();
        self.added_items().remove(item)?;
        self.prepended_items().remove(item)?;
        self.appended_items().remove(item)?;
        let deleted = self.deleted_items();
        if deleted.contains(item) {
            Ok(())
        } else {
            deleted.push(item.clone())
        }
    }

    /// Retracts this field's own contribution of `item` without recording a
    /// delete.
    pub fn erase(&self, item: &P::Item) -> Result<(), EditError> {
        let editor = self.editable("erase")?;
        if editor.is_explicit() {
            return self.explicit_items().remove(item);
        }
        let layer = editor.live_layer()?;
        let _block = layer.change_block();
        self.added_items().remove(item)?;
        self.prepended_items().remove(item)?;
        self.appended_items().remove(item)
    }

    fn add_or_replace(&self, op: ListOpType, item: P::Item) -> Result<(), EditError> {
        let list = self.get_items(op);
        match list.find(&item) {
            None => list.push(item),
            Some(index) if list.get(index).as_ref() != Some(&item) => list.set(index, item),
            Some(_) => Ok(()),
        }
    }

    fn move_to(&self, op: ListOpType, item: P::Item, end: End) -> Result<(), EditError> {
        let list = self.get_items(op);
        let mut items = list.items();
        let index = list.find(&item);
        let in_place = match end {
            End::Front => index == Some(0),
            End::Back => index.is_some() && index == items.len().checked_sub(1),
        };
        if in_place {
            return Ok(());
        }
        if let Some(index) = index {
            items.remove(index);
        }
        match end {
            End::Front => items.insert(0, item),
            End::Back => items.push(item),
        }
        list.assign(items)
    }

    fn live_editor(&self) -> Result<&Arc<ListEditor<P>>, EditError> {
        let editor = self
            .editor
            .as_ref()
            .ok_or_else(|| EditError::InvalidProxy.report())?;
        if editor.is_expired() {
            return Err(EditError::Expired {
                location: editor.location(),
            }
            .report());
        }
        Ok(editor)
    }

    /// The editor, if it supports list-op edits.
    fn editable(&self, action: &'static str) -> Result<&Arc<ListEditor<P>>, EditError> {
        let editor = self.live_editor()?;
        if editor.is_ordered_only() {
            return Err(EditError::OrderedOnly {
                action,
                location: editor.location(),
            }
            .report());
        }
        Ok(editor)
    }
}

#[derive(Clone, Copy)]
enum End {
    Front,
    Back,
}

impl<P: TypePolicy> Default for ListEditorProxy<P> {
    fn default() -> Self {
        Self { editor: None }
    }
}

impl<P: TypePolicy> Clone for ListEditorProxy<P> {
    fn clone(&self) -> Self {
        Self {
            editor: self.editor.clone(),
        }
    }
}

impl<P: TypePolicy> fmt::Debug for ListEditorProxy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListEditorProxy")
            .field("explicit", &self.is_explicit())
            .field("items", &self.applied_items())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::path::Path;
    use crate::policy::{PathKeyPolicy, SubLayerTypePolicy};
    use crate::spec::PrimSpec;
    use crate::validate::fields;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    fn paths(items: &[&str]) -> Vec<Path> {
        items.iter().map(|item| p(item)).collect()
    }

    fn prim() -> (Arc<Layer>, PrimSpec) {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        (layer, prim)
    }

    #[test]
    fn test_remove_relationship_target() {
        let (layer, prim) = prim();
        let rel = prim.create_relationship("rel").unwrap();
        let targets = rel.target_path_list();
        targets.clear_edits_and_make_explicit().unwrap();
        targets.explicit_items().assign(paths(&["/A", "/B"])).unwrap();
        assert!(layer.has_spec(&p("/Prim.rel[/A]")));

        targets.remove(&p("/A")).unwrap();
        assert_eq!(targets.explicit_items().items(), paths(&["/B"]));
        assert!(!layer.has_spec(&p("/Prim.rel[/A]")));
        assert!(layer.has_spec(&p("/Prim.rel[/B]")));

        let writes = layer.field_write_count();
        targets.remove(&p("/A")).unwrap();
        assert_eq!(layer.field_write_count(), writes);
    }

    #[test]
    fn test_add_undeletes() {
        let (_layer, prim) = prim();
        let inherits = prim.inherit_path_list();
        inherits.deleted_items().push(p("/A")).unwrap();
        inherits.add(p("/A")).unwrap();
        inherits.add(p("/A")).unwrap();
        assert!(inherits.deleted_items().is_empty());
        assert_eq!(inherits.added_items().items(), paths(&["/A"]));
    }

    #[test]
    fn test_prepend_and_append_move_existing_items() {
        let (_layer, prim) = prim();
        let inherits = prim.inherit_path_list();
        inherits.prepended_items().assign(paths(&["/A", "/B"])).unwrap();
        inherits.appended_items().assign(paths(&["/C", "/D"])).unwrap();

        inherits.prepend(p("/B")).unwrap();
        inherits.append(p("/C")).unwrap();
        inherits.append(p("/E")).unwrap();
        assert_eq!(inherits.prepended_items().items(), paths(&["/B", "/A"]));
        assert_eq!(inherits.appended_items().items(), paths(&["/D", "/C", "/E"]));
        assert_eq!(
            inherits.applied_items(),
            paths(&["/B", "/A", "/D", "/C", "/E"])
        );
    }

    #[test]
    fn test_remove_records_delete_and_erase_does_not() {
        let (_layer, prim) = prim();
        let inherits = prim.inherit_path_list();
        inherits.append(p("/A")).unwrap();
        inherits.prepend(p("/B")).unwrap();

        inherits.remove(&p("/A")).unwrap();
        assert!(inherits.appended_items().is_empty());
        assert_eq!(inherits.deleted_items().items(), paths(&["/A"]));

        inherits.erase(&p("/B")).unwrap();
        assert!(inherits.prepended_items().is_empty());
        assert_eq!(inherits.deleted_items().items(), paths(&["/A"]));
        assert!(inherits.contains_item_edit(&p("/A"), false));
        assert!(!inherits.contains_item_edit(&p("/A"), true));
    }

    #[test]
    fn test_explicit_mode_edits_explicit_list() {
        let (_layer, prim) = prim();
        let inherits = prim.inherit_path_list();
        inherits.clear_edits_and_make_explicit().unwrap();
        assert!(inherits.is_explicit());
        inherits.append(p("/A")).unwrap();
        inherits.prepend(p("/B")).unwrap();
        inherits.add(p("/C")).unwrap();
        assert_eq!(inherits.explicit_items().items(), paths(&["/B", "/A", "/C"]));

        inherits.remove(&p("/A")).unwrap();
        assert_eq!(inherits.explicit_items().items(), paths(&["/B", "/C"]));
        assert!(inherits.deleted_items().is_empty());

        inherits.clear_edits().unwrap();
        assert!(!inherits.is_explicit());
        assert!(!inherits.has_keys());
    }

    #[test]
    fn test_multi_list_edits_form_one_batch() {
        let (layer, prim) = prim();
        let inherits = prim.inherit_path_list();
        inherits.prepended_items().push(p("/A")).unwrap();
        inherits.deleted_items().push(p("/A")).unwrap();

        let batches = layer.change_batch_count();
        inherits.remove_item_edits(&p("/A")).unwrap();
        assert_eq!(layer.change_batch_count(), batches + 1);
        assert!(!inherits.contains_item_edit(&p("/A"), false));

        inherits.appended_items().push(p("/B")).unwrap();
        inherits.replace_item_edits(&p("/B"), &p("/C")).unwrap();
        assert_eq!(inherits.appended_items().items(), paths(&["/C"]));
    }

    #[test]
    fn test_copy_and_modify_items() {
        let (layer, prim) = prim();
        let other = layer.create_prim(&p("/Other")).unwrap();
        let source = prim.inherit_path_list();
        source.prepended_items().assign(paths(&["/A", "/B"])).unwrap();

        let target = other.inherit_path_list();
        target.copy_items(&source).unwrap();
        assert_eq!(target.prepended_items().items(), paths(&["/A", "/B"]));

        target
            .modify_item_edits(|item| (*item != p("/A")).then(|| item.clone()))
            .unwrap();
        assert_eq!(target.prepended_items().items(), paths(&["/B"]));
    }

    #[test]
    fn test_ordered_only_and_invalid_proxies() {
        let layer = Layer::create_anonymous();
        let root = layer.pseudo_root().unwrap();
        let sublayers: ListEditorProxy<SubLayerTypePolicy> = ListEditorProxy::new(
            ListEditor::vector(root, fields::SUB_LAYERS),
        );
        assert!(sublayers.is_ordered_only());
        assert!(matches!(
            sublayers.add("a.usd".to_string()),
            Err(EditError::OrderedOnly { action: "add", .. })
        ));
        sublayers.ordered_items().push("a.usd".to_string()).unwrap();
        sublayers.ordered_items().push("b.usd".to_string()).unwrap();
        assert_eq!(sublayers.ordered_items().len(), 2);
        let mut items = vec!["b.usd".to_string(), "a.usd".to_string()];
        sublayers.apply_edits_to_list(&mut items, None);
        assert_eq!(items, vec!["a.usd".to_string(), "b.usd".to_string()]);

        let invalid = ListEditorProxy::<PathKeyPolicy>::default();
        assert!(!invalid.is_valid());
        assert!(invalid.applied_items().is_empty());
        assert_eq!(invalid.clear_edits(), Err(EditError::InvalidProxy));
    }
}
