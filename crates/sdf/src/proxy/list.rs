//! A vector-like view of one list of a list editor.

use std::fmt;
use std::sync::Arc;

use crate::editor::ListEditor;
use crate::error::EditError;
use crate::model::{ApplyCallback, ListOpType};
use crate::policy::TypePolicy;

/// One op list of a [`ListEditor`], edited like a vector.
///
/// Every mutation is a single `replace_edits` call on the editor, so it is
/// validated and written as a whole. Reads go through the editor each time
/// and observe the current layer contents.
pub struct ListProxy<P: TypePolicy> {
    editor: Option<Arc<ListEditor<P>>>,
    op: ListOpType,
}

impl<P: TypePolicy> ListProxy<P> {
    pub fn new(editor: Arc<ListEditor<P>>, op: ListOpType) -> Self {
        Self {
            editor: Some(editor),
            op,
        }
    }

    pub fn op(&self) -> ListOpType {
        self.op
    }

    pub fn editor(&self) -> Option<&Arc<ListEditor<P>>> {
        self.editor.as_ref()
    }

    /// Returns true if the editor is alive and this list takes part in its
    /// current mode.
    pub fn is_valid(&self) -> bool {
        self.editor
            .as_ref()
            .is_some_and(|editor| !editor.is_expired() && editor.is_relevant(self.op))
    }

    pub fn is_expired(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| editor.is_expired())
    }

    /// A snapshot of the items.
    pub fn items(&self) -> Vec<P::Item> {
        match &self.editor {
            Some(editor) => editor.get_items(self.op),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.read(|items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<P::Item> {
        self.read(|items| items.get(index).cloned())
    }

    pub fn front(&self) -> Option<P::Item> {
        self.read(|items| items.first().cloned())
    }

    pub fn back(&self) -> Option<P::Item> {
        self.read(|items| items.last().cloned())
    }

    /// Iterates by index. Each step reads the current list, so an edit made
    /// while iterating shifts what later steps yield.
    pub fn iter(&self) -> Iter<'_, P> {
        Iter {
            proxy: self,
            index: 0,
        }
    }

    /// Index of the canonical form of `item`, if present.
    pub fn find(&self, item: &P::Item) -> Option<usize> {
        let editor = self.editor.as_ref()?;
        let item = P::canonicalize(editor.owner(), item);
        self.read(|items| items.iter().position(|i| *i == item))
    }

    pub fn count(&self, item: &P::Item) -> usize {
        let Some(editor) = &self.editor else {
            return 0;
        };
        let item = P::canonicalize(editor.owner(), item);
        self.read(|items| items.iter().filter(|i| **i == item).count())
    }

    pub fn contains(&self, item: &P::Item) -> bool {
        self.find(item).is_some()
    }

    pub fn push(&self, item: P::Item) -> Result<(), EditError> {
        self.edit(self.len(), 0, vec![item])
    }

    /// Inserts `item` before `index`; `None` appends.
    pub fn insert(&self, index: Option<usize>, item: P::Item) -> Result<(), EditError> {
        let index = index.unwrap_or_else(|| self.len());
        self.edit(index, 0, vec![item])
    }

    /// Removes `item` if present.
    pub fn remove(&self, item: &P::Item) -> Result<(), EditError> {
        match self.find(item) {
            Some(index) => self.erase(index),
            None => self.edit(self.len(), 0, Vec::new()),
        }
    }

    /// Replaces `old` with `new` if `old` is present.
    pub fn replace(&self, old: &P::Item, new: P::Item) -> Result<(), EditError> {
        match self.find(old) {
            Some(index) => self.set(index, new),
            None => self.edit(self.len(), 0, Vec::new()),
        }
    }

    pub fn erase(&self, index: usize) -> Result<(), EditError> {
        self.edit(index, 1, Vec::new())
    }

    pub fn erase_range(&self, start: usize, end: usize) -> Result<(), EditError> {
        self.edit(start, end.saturating_sub(start), Vec::new())
    }

    pub fn set(&self, index: usize, item: P::Item) -> Result<(), EditError> {
        self.edit(index, 1, vec![item])
    }

    /// Truncates to `len` items or pads with copies of `fill`.
    pub fn resize(&self, len: usize, fill: P::Item) -> Result<(), EditError> {
        let current = self.len();
        if len < current {
            self.edit(len, current - len, Vec::new())
        } else {
            self.edit(current, 0, vec![fill; len - current])
        }
    }

    pub fn clear(&self) -> Result<(), EditError> {
        self.edit(0, self.len(), Vec::new())
    }

    /// Replaces the whole list with `items`.
    pub fn assign(&self, items: Vec<P::Item>) -> Result<(), EditError> {
        self.edit(0, self.len(), items)
    }

    pub fn extend(&self, items: Vec<P::Item>) -> Result<(), EditError> {
        self.edit(self.len(), 0, items)
    }

    /// Applies the editor's edits to `items`.
    pub fn apply_edits_to_list(
        &self,
        items: &mut Vec<P::Item>,
        callback: Option<&ApplyCallback<'_, P::Item>>,
    ) {
        if let Some(editor) = &self.editor {
            editor.apply_edits_to_list(items, callback);
        }
    }

    fn read<R>(&self, f: impl FnOnce(&[P::Item]) -> R) -> R {
        match &self.editor {
            Some(editor) => editor.with_items(self.op, f),
            None => f(Default::default()),
        }
    }

    /// Replaces `n` items at `index` with `items`. An empty edit only checks
    /// that the list may be edited.
    ///
    /// A list that takes no part in the editor's current mode rejects every
    /// edit; switching modes goes through [`ListEditorProxy`](crate::ListEditorProxy).
    fn edit(&self, index: usize, n: usize, items: Vec<P::Item>) -> Result<(), EditError> {
        let editor = self
            .editor
            .as_ref()
            .ok_or_else(|| EditError::InvalidProxy.report())?;
        if !editor.is_expired() && !editor.is_relevant(self.op) {
            return Err(EditError::IrrelevantList {
                op: self.op,
                location: editor.location(),
            }
            .report());
        }
        if n == 0 && items.is_empty() {
            return editor.permission_to_edit(self.op);
        }
        editor.replace_edits(self.op, index, n, items)
    }
}

impl<P: TypePolicy> Default for ListProxy<P> {
    fn default() -> Self {
        Self {
            editor: None,
            op: ListOpType::Explicit,
        }
    }
}

impl<P: TypePolicy> Clone for ListProxy<P> {
    fn clone(&self) -> Self {
        Self {
            editor: self.editor.clone(),
            op: self.op,
        }
    }
}

impl<P: TypePolicy> PartialEq<[P::Item]> for ListProxy<P> {
    fn eq(&self, other: &[P::Item]) -> bool {
        self.read(|items| items == other)
    }
}

impl<P: TypePolicy> PartialEq<Vec<P::Item>> for ListProxy<P> {
    fn eq(&self, other: &Vec<P::Item>) -> bool {
        self == other.as_slice()
    }
}

impl<P: TypePolicy> fmt::Debug for ListProxy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items()).finish()
    }
}

/// Index-based iterator over a [`ListProxy`].
pub struct Iter<'a, P: TypePolicy> {
    proxy: &'a ListProxy<P>,
    index: usize,
}

impl<P: TypePolicy> Iterator for Iter<'_, P> {
    type Item = P::Item;

    fn next(&mut self) -> Option<P::Item> {
        let item = self.proxy.get(self.index)?;
        self.index += 1;
        Some(item)
    }
}

impl<'a, P: TypePolicy> IntoIterator for &'a ListProxy<P> {
    type Item = P::Item;
    type IntoIter = Iter<'a, P>;

    fn into_iter(self) -> Iter<'a, P> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::path::Path;
    use crate::policy::PathKeyPolicy;
    use crate::spec::{PrimSpec, TypedSpec};
    use crate::validate::fields;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    fn inherits(layer: &Layer, op: ListOpType) -> ListProxy<PathKeyPolicy> {
        let prim: PrimSpec = layer.get_typed_spec(&p("/Prim")).unwrap();
        let editor = ListEditor::list_op(prim.as_spec().clone(), fields::INHERIT_PATHS);
        ListProxy::new(Arc::new(editor), op)
    }

    #[test]
    fn test_vector_operations() {
        let layer = Layer::create_anonymous();
        layer.create_prim(&p("/Prim")).unwrap();
        let list = inherits(&layer, ListOpType::Prepended);

        list.push(p("/A")).unwrap();
        list.push(p("/C")).unwrap();
        list.insert(Some(1), p("/B")).unwrap();
        assert_eq!(list, vec![p("/A"), p("/B"), p("/C")]);

        list.set(0, p("/Z")).unwrap();
        list.erase(2).unwrap();
        assert_eq!(list.items(), vec![p("/Z"), p("/B")]);
        assert_eq!(list.front(), Some(p("/Z")));
        assert_eq!(list.back(), Some(p("/B")));

        list.replace(&p("/B"), p("/Y")).unwrap();
        list.remove(&p("/Z")).unwrap();
        assert_eq!(list.items(), vec![p("/Y")]);

        list.clear().unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_find_canonicalizes() {
        let layer = Layer::create_anonymous();
        layer.create_prim(&p("/Prim")).unwrap();
        let list = inherits(&layer, ListOpType::Appended);
        list.push(p("Base")).unwrap();
        assert_eq!(list.items(), vec![p("/Prim/Base")]);
        assert_eq!(list.find(&p("Base")), Some(0));
        assert_eq!(list.count(&p("/Prim/Base")), 1);
        assert_eq!(list.find(&p("/Other")), None);
    }

    #[test]
    fn test_rejected_edit_leaves_list_unchanged() {
        let layer = Layer::create_anonymous();
        layer.create_prim(&p("/Prim")).unwrap();
        let list = inherits(&layer, ListOpType::Prepended);
        list.push(p("/A")).unwrap();

        assert!(matches!(
            list.push(p("/A")),
            Err(EditError::DuplicateItem { .. })
        ));
        assert!(matches!(
            list.erase(5),
            Err(EditError::IndexOutOfRange { .. })
        ));
        assert_eq!(list.items(), vec![p("/A")]);
    }

    #[test]
    fn test_iteration_follows_current_data() {
        let layer = Layer::create_anonymous();
        layer.create_prim(&p("/Prim")).unwrap();
        let list = inherits(&layer, ListOpType::Prepended);
        list.assign(vec![p("/A"), p("/B"), p("/C")]).unwrap();

        let mut iter = list.iter();
        assert_eq!(iter.next(), Some(p("/A")));
        let other = inherits(&layer, ListOpType::Prepended);
        other.erase(0).unwrap();
        assert_eq!(iter.next(), Some(p("/C")));
        assert_eq!(iter.next(), None);
    }

    fn make_explicit(layer: &Layer) {
        let prim: PrimSpec = layer.get_typed_spec(&p("/Prim")).unwrap();
        prim.inherit_path_list().clear_edits_and_make_explicit().unwrap();
    }

    #[test]
    fn test_relevance_and_invalid_proxies() {
        let layer = Layer::create_anonymous();
        layer.create_prim(&p("/Prim")).unwrap();
        let explicit = inherits(&layer, ListOpType::Explicit);
        assert!(!explicit.is_valid());
        make_explicit(&layer);
        explicit.push(p("/A")).unwrap();

        let added = inherits(&layer, ListOpType::Added);
        assert!(explicit.is_valid());
        assert!(!added.is_valid());
        assert!(added.is_empty());

        let invalid = ListProxy::<PathKeyPolicy>::default();
        assert!(!invalid.is_valid());
        assert!(invalid.is_empty());
        assert_eq!(invalid.push(p("/A")), Err(EditError::InvalidProxy));
    }

    #[test]
    fn test_irrelevant_list_rejects_edits() {
        let layer = Layer::create_anonymous();
        layer.create_prim(&p("/Prim")).unwrap();
        make_explicit(&layer);
        let explicit = inherits(&layer, ListOpType::Explicit);
        explicit.assign(vec![p("/A"), p("/B")]).unwrap();
        let writes = layer.field_write_count();

        let added = inherits(&layer, ListOpType::Added);
        assert!(matches!(
            added.push(p("/C")),
            Err(EditError::IrrelevantList { op: ListOpType::Added, .. })
        ));
        assert!(matches!(
            added.clear(),
            Err(EditError::IrrelevantList { .. })
        ));
        assert_eq!(explicit.items(), vec![p("/A"), p("/B")]);
        assert!(explicit.is_valid());
        assert_eq!(layer.field_write_count(), writes);

        // In list-op mode the explicit list is the one left out.
        let prepended = inherits(&layer, ListOpType::Prepended);
        let prim: PrimSpec = layer.get_typed_spec(&p("/Prim")).unwrap();
        prim.inherit_path_list().clear_edits().unwrap();
        prepended.push(p("/D")).unwrap();
        assert!(matches!(
            explicit.push(p("/E")),
            Err(EditError::IrrelevantList { op: ListOpType::Explicit, .. })
        ));
        assert_eq!(prepended.items(), vec![p("/D")]);
    }

    #[test]
    fn test_permission_and_expiry() {
        let layer = Layer::create_anonymous();
        layer.create_prim(&p("/Prim")).unwrap();
        let list = inherits(&layer, ListOpType::Prepended);

        layer.set_permission_to_edit(false);
        assert!(matches!(
            list.remove(&p("/Missing")),
            Err(EditError::PermissionDenied { .. })
        ));
        layer.set_permission_to_edit(true);

        layer.delete_spec(&p("/Prim")).unwrap();
        assert!(list.is_expired());
        assert!(list.is_empty());
        assert!(matches!(list.push(p("/A")), Err(EditError::Expired { .. })));
    }
}
