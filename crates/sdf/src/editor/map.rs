//! Editor for map-valued fields.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::editor::{Cached, EditorBase};
use crate::error::EditError;
use crate::model::FieldValue;
use crate::policy::MapValuePolicy;
use crate::spec::Spec;
use crate::validate::schema;

type Map<P> = BTreeMap<<P as MapValuePolicy>::Key, <P as MapValuePolicy>::Mapped>;

/// Reads and writes a dictionary field as a whole.
///
/// Keys and values are expected in canonical form; the proxy canonicalizes.
/// An empty map clears the field.
pub struct MapEditor<P: MapValuePolicy> {
    base: EditorBase,
    cache: Mutex<Cached<Map<P>>>,
    _policy: PhantomData<fn() -> P>,
}

impl<P: MapValuePolicy> MapEditor<P> {
    pub fn new(owner: Spec, field: &'static str) -> Self {
        Self {
            base: EditorBase::new(owner, field),
            cache: Mutex::new(Cached::default()),
            _policy: PhantomData,
        }
    }

    pub fn owner(&self) -> &Spec {
        self.base.owner()
    }

    pub fn location(&self) -> String {
        self.base.location()
    }

    pub fn is_expired(&self) -> bool {
        self.base.is_expired()
    }

    /// The current map and the layer version it was read at.
    ///
    /// The version identifies the data generation: it changes whenever the
    /// layer is written.
    pub fn data(&self) -> (Arc<Map<P>>, u64) {
        let Ok(layer) = self.base.live_layer() else {
            return (Arc::new(BTreeMap::new()), 0);
        };
        let version = layer.version();
        let mut cache = self.cache.lock();
        if let Some(map) = cache.get(version) {
            return (map, version);
        }
        let map = Arc::new(
            layer
                .get_field(&self.base.owner().path(), self.base.field())
                .and_then(|value| P::map_from_value(&value))
                .unwrap_or_default(),
        );
        cache.store(version, Arc::clone(&map));
        (map, version)
    }

    pub fn permission_to_edit(&self, action: &'static str) -> Result<(), EditError> {
        self.base.check_permission(action).map(|_| ())
    }

    pub fn validate_key(&self, key: &P::Key) -> Result<(), EditError> {
        schema().is_valid_map_key(self.base.field(), &key.clone().into_value())
    }

    pub fn validate_value(&self, value: &P::Mapped) -> Result<(), EditError> {
        schema().is_valid_map_value(self.base.field(), &value.clone().into_value())
    }

    /// Replaces the whole map.
    pub fn copy(&self, map: Map<P>) -> Result<(), EditError> {
        self.base.check_permission("copy")?;
        for (key, value) in &map {
            self.validate_key(key)?;
            self.validate_value(value)?;
        }
        self.write(map)
    }

    /// Sets `key` to `value`, inserting it if absent.
    pub fn set(&self, key: P::Key, value: P::Mapped) -> Result<(), EditError> {
        self.base.check_permission("set")?;
        self.validate_key(&key)?;
        self.validate_value(&value)?;
        let (current, _) = self.data();
        if current.get(&key) == Some(&value) {
            return Ok(());
        }
        let mut map = (*current).clone();
        map.insert(key, value);
        self.write(map)
    }

    /// Inserts `key` if absent. Returns false, writing nothing, if present.
    pub fn insert(&self, key: P::Key, value: P::Mapped) -> Result<bool, EditError> {
        self.base.check_permission("insert")?;
        self.validate_key(&key)?;
        self.validate_value(&value)?;
        let (current, _) = self.data();
        if current.contains_key(&key) {
            return Ok(false);
        }
        let mut map = (*current).clone();
        map.insert(key, value);
        self.write(map)?;
        Ok(true)
    }

    /// Removes `key`. Returns false if it was absent.
    pub fn erase(&self, key: &P::Key) -> Result<bool, EditError> {
        self.base.check_permission("erase")?;
        let (current, _) = self.data();
        if !current.contains_key(key) {
            return Ok(false);
        }
        let mut map = (*current).clone();
        map.remove(key);
        self.write(map)?;
        Ok(true)
    }

    fn write(&self, map: Map<P>) -> Result<(), EditError> {
        let layer = self.base.live_layer()?;
        let (current, _) = self.data();
        if *current == map {
            return Ok(());
        }
        let _block = layer.change_block();
        let path = self.base.owner().path();
        if map.is_empty() {
            layer.clear_field(&path, self.base.field())?;
        } else {
            layer.set_field(&path, self.base.field(), P::map_into_value(map.clone()))?;
        }
        tracing::trace!(location = %self.base.location(), len = map.len(), "updated map");
        self.cache.lock().store(layer.version(), Arc::new(map));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::path::Path;
    use crate::policy::{IdentityMapPolicy, RelocatesMapPolicy};
    use crate::validate::fields;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_insert_set_erase() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let editor: MapEditor<IdentityMapPolicy<String, String>> =
            MapEditor::new((*prim).clone(), fields::VARIANT_SELECTION);

        assert!(editor.insert("lod".into(), "high".into()).unwrap());
        assert!(!editor.insert("lod".into(), "low".into()).unwrap());
        editor.set("lod".into(), "low".into()).unwrap();
        assert_eq!(editor.data().0.get("lod"), Some(&"low".to_string()));

        let writes = layer.field_write_count();
        editor.set("lod".into(), "low".into()).unwrap();
        assert_eq!(layer.field_write_count(), writes);

        assert!(editor.erase(&"lod".to_string()).unwrap());
        assert!(!editor.erase(&"lod".to_string()).unwrap());
        assert!(!layer.has_field(&p("/Prim"), fields::VARIANT_SELECTION));
    }

    #[test]
    fn test_invalid_entries_are_rejected() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let editor: MapEditor<RelocatesMapPolicy> =
            MapEditor::new((*prim).clone(), fields::RELOCATES);
        assert!(matches!(
            editor.set(Path::absolute_root(), p("/Other")),
            Err(EditError::InvalidValue { field: fields::RELOCATES, .. })
        ));
        let mut map = BTreeMap::new();
        map.insert(p("/Prim/A"), p("/Prim/B"));
        map.insert(p("/Prim/C"), p("/Prim/C.attr"));
        assert!(editor.copy(map).is_err());
        assert_eq!(layer.field_write_count(), 0);
    }

    #[test]
    fn test_generation_changes_with_writes() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let editor: MapEditor<IdentityMapPolicy<String, String>> =
            MapEditor::new((*prim).clone(), fields::CUSTOM_DATA);
        let (_, before) = editor.data();
        editor.set("note".into(), "hello".into()).unwrap();
        let (map, after) = editor.data();
        assert_ne!(before, after);
        assert_eq!(map.len(), 1);
    }
}
