//! A map-like view of a dictionary field.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use crate::editor::MapEditor;
use crate::error::EditError;
use crate::policy::MapValuePolicy;
use crate::spec::Spec;

type Map<P> = BTreeMap<<P as MapValuePolicy>::Key, <P as MapValuePolicy>::Mapped>;
type Entry<P> = (<P as MapValuePolicy>::Key, <P as MapValuePolicy>::Mapped);

/// Edits a dictionary field like a sorted map.
///
/// Keys and values pass through the policy's canonicalization before they
/// are stored or looked up.
pub struct MapEditProxy<P: MapValuePolicy> {
    editor: Option<Arc<MapEditor<P>>>,
}

impl<P: MapValuePolicy> MapEditProxy<P> {
    pub fn new(owner: Spec, field: &'static str) -> Self {
        Self {
            editor: Some(Arc::new(MapEditor::new(owner, field))),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| !editor.is_expired())
    }

    pub fn is_expired(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| editor.is_expired())
    }

    /// A snapshot of the whole map.
    pub fn data(&self) -> Arc<Map<P>> {
        self.snapshot().0
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn get(&self, key: &P::Key) -> Option<P::Mapped> {
        self.find(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &P::Key) -> bool {
        self.find(key).is_some()
    }

    pub fn count(&self, key: &P::Key) -> usize {
        usize::from(self.contains_key(key))
    }

    /// The stored entry for the canonical form of `key`.
    pub fn find(&self, key: &P::Key) -> Option<Entry<P>> {
        let editor = self.editor.as_ref()?;
        let key = P::canonicalize_key(editor.owner(), key);
        let data = self.data();
        let value = data.get(&key)?.clone();
        Some((key, value))
    }

    /// The first entry whose key is not less than `key`.
    pub fn lower_bound(&self, key: &P::Key) -> Option<Entry<P>> {
        self.first_in(key, |key| Bound::Included(key))
    }

    /// The first entry whose key is greater than `key`.
    pub fn upper_bound(&self, key: &P::Key) -> Option<Entry<P>> {
        self.first_in(key, |key| Bound::Excluded(key))
    }

    /// The entries matching `key`: at most one.
    pub fn equal_range(&self, key: &P::Key) -> Vec<Entry<P>> {
        self.find(key).into_iter().collect()
    }

    /// Iterates over the keys present when the iterator was created. If the
    /// map is written meanwhile, values are looked up again by key and keys
    /// that are gone are skipped.
    pub fn iter(&self) -> Iter<'_, P> {
        let (data, generation) = self.snapshot();
        Iter {
            proxy: self,
            keys: data.keys().cloned().collect(),
            data,
            generation,
            index: 0,
        }
    }

    /// Compares with `other` after canonicalizing it.
    pub fn eq_map(&self, other: &Map<P>) -> bool {
        let Some(editor) = &self.editor else {
            return false;
        };
        let canonical: Map<P> = other
            .iter()
            .map(|(key, value)| P::canonicalize_pair(editor.owner(), key, value))
            .collect();
        *self.data() == canonical
    }

    /// Inserts the entry unless its key is present. Returns whether it was
    /// inserted.
    pub fn insert(&self, key: P::Key, value: P::Mapped) -> Result<bool, EditError> {
        let editor = self.live_editor()?;
        let (key, value) = P::canonicalize_pair(editor.owner(), &key, &value);
        editor.insert(key, value).map_err(EditError::report)
    }

    /// Inserts every entry in one change batch; stops at the first failure.
    pub fn insert_all(
        &self,
        entries: impl IntoIterator<Item = Entry<P>>,
    ) -> Result<(), EditError> {
        let editor = self.live_editor()?;
        let layer = editor.owner().live_layer().map_err(EditError::report)?;
        let _block = layer.change_block();
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Sets the value for `key`, inserting it if absent.
    pub fn set(&self, key: P::Key, value: P::Mapped) -> Result<(), EditError> {
        let editor = self.live_editor()?;
        let (key, value) = P::canonicalize_pair(editor.owner(), &key, &value);
        editor.set(key, value).map_err(EditError::report)
    }

    /// Removes `key`. Returns whether it was present.
    pub fn erase(&self, key: &P::Key) -> Result<bool, EditError> {
        let editor = self.live_editor()?;
        let key = P::canonicalize_key(editor.owner(), key);
        editor.erase(&key).map_err(EditError::report)
    }

    pub fn clear(&self) -> Result<(), EditError> {
        self.live_editor()?
            .copy(BTreeMap::new())
            .map_err(EditError::report)
    }

    /// Replaces the map with `entries`.
    ///
    /// Fails without writing if two keys canonicalize to the same key.
    pub fn copy_from(&self, entries: impl IntoIterator<Item = Entry<P>>) -> Result<(), EditError> {
        let editor = self.live_editor()?;
        let mut canonical = BTreeMap::new();
        for (key, value) in entries {
            let (key, value) = P::canonicalize_pair(editor.owner(), &key, &value);
            if canonical.contains_key(&key) {
                return Err(EditError::DuplicateKey {
                    key: format!("{key:?}"),
                    location: editor.location(),
                }
                .report());
            }
            canonical.insert(key, value);
        }
        editor.copy(canonical).map_err(EditError::report)
    }

    fn snapshot(&self) -> (Arc<Map<P>>, u64) {
        match &self.editor {
            Some(editor) => editor.data(),
            None => (Arc::new(BTreeMap::new()), 0),
        }
    }

    fn first_in(
        &self,
        key: &P::Key,
        bound: impl FnOnce(&P::Key) -> Bound<&P::Key>,
    ) -> Option<Entry<P>> {
        let editor = self.editor.as_ref()?;
        let key = P::canonicalize_key(editor.owner(), key);
        let data = self.data();
        data.range((bound(&key), Bound::Unbounded))
            .next()
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    fn live_editor(&self) -> Result<&Arc<MapEditor<P>>, EditError> {
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
}

impl<P: MapValuePolicy> Default for MapEditProxy<P> {
    fn default() -> Self {
        Self { editor: None }
    }
}

impl<P: MapValuePolicy> Clone for MapEditProxy<P> {
    fn clone(&self) -> Self {
        Self {
            editor: self.editor.clone(),
        }
    }
}

impl<P: MapValuePolicy> fmt::Debug for MapEditProxy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.data().iter()).finish()
    }
}

/// Key-stable iterator over a [`MapEditProxy`].
pub struct Iter<'a, P: MapValuePolicy> {
    proxy: &'a MapEditProxy<P>,
    keys: Vec<P::Key>,
    data: Arc<Map<P>>,
    generation: u64,
    index: usize,
}

impl<P: MapValuePolicy> Iterator for Iter<'_, P> {
    type Item = Entry<P>;

    fn next(&mut self) -> Option<Entry<P>> {
        loop {
            let key = self.keys.get(self.index)?.clone();
            self.index += 1;
            let (current, generation) = self.proxy.snapshot();
            if generation != self.generation {
                self.data = current;
                self.generation = generation;
            }
            if let Some(value) = self.data.get(&key) {
                return Some((key, value.clone()));
            }
        }
    }
}

impl<'a, P: MapValuePolicy> IntoIterator for &'a MapEditProxy<P> {
    type Item = Entry<P>;
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

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_relocates_keys_are_made_absolute() {
        let layer = Layer::create_anonymous();
        let foo = layer.create_prim(&p("/Foo")).unwrap();
        let relocates = foo.relocates();

        assert!(relocates.insert(p("Bar"), p("Baz")).unwrap());
        assert_eq!(relocates.data().get(&p("/Foo/Bar")), Some(&p("/Foo/Baz")));
        assert_eq!(relocates.find(&p("Bar")), Some((p("/Foo/Bar"), p("/Foo/Baz"))));
        assert!(relocates.contains_key(&p("/Foo/Bar")));

        let mut expected = BTreeMap::new();
        expected.insert(p("Bar"), p("/Foo/Baz"));
        assert!(relocates.eq_map(&expected));
    }

    #[test]
    fn test_copy_rejects_colliding_keys() {
        let layer = Layer::create_anonymous();
        let foo = layer.create_prim(&p("/Foo")).unwrap();
        let relocates = foo.relocates();
        relocates.set(p("A"), p("B")).unwrap();
        let writes = layer.field_write_count();

        let err = relocates
            .copy_from(vec![(p("Bar"), p("X")), (p("/Foo/Bar"), p("Y"))])
            .unwrap_err();
        assert!(matches!(err, EditError::DuplicateKey { .. }));
        assert_eq!(layer.field_write_count(), writes);
        assert_eq!(relocates.len(), 1);

        relocates
            .copy_from(vec![(p("Bar"), p("X")), (p("Qux"), p("Y"))])
            .unwrap();
        assert_eq!(relocates.len(), 2);
        assert!(!relocates.contains_key(&p("A")));
    }

    #[test]
    fn test_iteration_looks_up_keys_again() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let data = prim.custom_data();
        data.insert_all(vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("c".to_string(), "3".to_string()),
        ])
        .unwrap();

        let mut iter = data.iter();
        assert_eq!(iter.next(), Some(("a".to_string(), "1".to_string())));
        let other = prim.custom_data();
        other.set("b".to_string(), "20".to_string()).unwrap();
        other.erase(&"c".to_string()).unwrap();
        assert_eq!(iter.next(), Some(("b".to_string(), "20".to_string())));
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_bounds() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let selections = prim.variant_selections();
        selections.set("lod".to_string(), "high".to_string()).unwrap();
        selections.set("shading".to_string(), "red".to_string()).unwrap();

        let key = |entry: Option<(String, String)>| entry.map(|(key, _)| key);
        assert_eq!(key(selections.lower_bound(&"lod".to_string())), Some("lod".to_string()));
        assert_eq!(
            key(selections.upper_bound(&"lod".to_string())),
            Some("shading".to_string())
        );
        assert_eq!(selections.equal_range(&"m".to_string()), Vec::new());
        assert_eq!(selections.count(&"shading".to_string()), 1);
    }

    #[test]
    fn test_permission_and_invalid_proxy() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let data = prim.custom_data();
        layer.set_permission_to_edit(false);
        assert!(matches!(
            data.insert("k".to_string(), "v".to_string()),
            Err(EditError::PermissionDenied { action: "insert", .. })
        ));
        assert!(matches!(
            data.erase(&"k".to_string()),
            Err(EditError::PermissionDenied { action: "erase", .. })
        ));

        let invalid = MapEditProxy::<crate::policy::RelocatesMapPolicy>::default();
        assert!(!invalid.is_valid());
        assert!(invalid.is_empty());
        assert_eq!(invalid.clear(), Err(EditError::InvalidProxy));
    }
}
