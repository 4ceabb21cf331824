//! In-memory backing store for specs and their fields.
//!
//! A [`Layer`] maps spec paths to typed field dictionaries. It owns the
//! identity registry for its paths and the change manager that batches
//! notifications. Every mutation bumps the layer version, which editors use
//! to decide when their cached field values are stale.
//!
//! Concurrent reads are safe. Concurrent mutation of one layer must be
//! serialized by the caller.

pub mod change;
pub mod identity;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::editor::ListEditor;
use crate::error::{EditError, NamespaceEditDetail};
use crate::model::{BatchNamespaceEdit, ChildIndex, FieldValue, ListOpType, NamespaceEdit, Value};
use crate::path::Path;
use crate::policy::SubLayerTypePolicy;
use crate::proxy::{AllChildren, ChildrenPermission, ChildrenProxy, ListProxy, PrimChildPolicy};
use crate::spec::{PrimSpec, Spec, SpecType, TypedSpec};
use crate::validate::fields;

pub use change::{Change, ChangeBatch, ChangeBlock, ChangeListener};
pub use identity::{Identity, IdentityRegistry};

use change::ChangeManager;

#[derive(Debug, Clone)]
struct SpecData {
    spec_type: SpecType,
    fields: BTreeMap<&'static str, Value>,
}

impl SpecData {
    fn new(spec_type: SpecType) -> Self {
        Self {
            spec_type,
            fields: BTreeMap::new(),
        }
    }
}

/// The key under which a spec is listed in its parent's children field.
enum ChildEntry {
    Name(String),
    Target(Path),
}

fn child_entry(path: &Path, spec_type: SpecType) -> Option<(&'static str, ChildEntry)> {
    let field = spec_type.children_field()?;
    let entry = match spec_type {
        SpecType::RelationshipTarget | SpecType::Connection => {
            ChildEntry::Target(path.target_path()?.clone())
        }
        _ => ChildEntry::Name(path.name().to_string()),
    };
    Some((field, entry))
}

/// A versioned, in-memory scene description layer.
pub struct Layer {
    identifier: String,
    specs: RwLock<FxHashMap<Path, SpecData>>,
    permission_to_edit: AtomicBool,
    version: AtomicU64,
    field_writes: AtomicU64,
    identities: IdentityRegistry,
    changes: ChangeManager,
    this: Weak<Layer>,
}

impl Layer {
    /// Creates an empty layer holding only the pseudo-root spec.
    pub fn new(identifier: impl Into<String>) -> Arc<Layer> {
        let identifier = identifier.into();
        let mut specs = FxHashMap::default();
        specs.insert(Path::absolute_root(), SpecData::new(SpecType::PseudoRoot));
        Arc::new_cyclic(|this| Layer {
            identifier,
            specs: RwLock::new(specs),
            permission_to_edit: AtomicBool::new(true),
            version: AtomicU64::new(0),
            field_writes: AtomicU64::new(0),
            identities: IdentityRegistry::new(),
            changes: ChangeManager::default(),
            this: this.clone(),
        })
    }

    /// Creates a layer with a unique `anon:` identifier.
    pub fn create_anonymous() -> Arc<Layer> {
        Self::new(format!("anon:{}", Uuid::new_v4()))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_anonymous(&self) -> bool {
        self.identifier.starts_with("anon:")
    }

    pub fn permission_to_edit(&self) -> bool {
        self.permission_to_edit.load(Ordering::Acquire)
    }

    pub fn set_permission_to_edit(&self, allow: bool) {
        self.permission_to_edit.store(allow, Ordering::Release);
    }

    /// Increases with every mutation of this layer.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Number of `set_field`/`clear_field` calls that actually wrote.
    pub fn field_write_count(&self) -> u64 {
        self.field_writes.load(Ordering::Acquire)
    }

    /// Number of change batches delivered so far.
    pub fn change_batch_count(&self) -> u64 {
        self.changes.batch_count()
    }

    /// Opens a change block; notifications are delivered when the outermost
    /// block is dropped.
    pub fn change_block(&self) -> ChangeBlock<'_> {
        ChangeBlock::new(&self.changes)
    }

    pub fn subscribe(&self, listener: impl Fn(&ChangeBatch) + Send + Sync + 'static) {
        self.changes.subscribe(Arc::new(listener));
    }

    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    pub fn has_spec(&self, path: &Path) -> bool {
        self.specs.read().contains_key(path)
    }

    pub fn spec_type(&self, path: &Path) -> Option<SpecType> {
        self.specs.read().get(path).map(|data| data.spec_type)
    }

    /// Returns a handle to the spec at `path`, if there is one.
    pub fn get_spec(&self, path: &Path) -> Option<Spec> {
        if !self.has_spec(path) {
            return None;
        }
        Some(Spec::new(self.this.clone(), self.identities.identify(path)))
    }

    pub fn get_typed_spec<T: TypedSpec>(&self, path: &Path) -> Option<T> {
        T::from_spec(self.get_spec(path)?)
    }

    pub fn pseudo_root(&self) -> Option<Spec> {
        self.get_spec(&Path::absolute_root())
    }

    /// The layer's sublayer asset paths, in strength order.
    pub fn sublayer_paths(&self) -> ListProxy<SubLayerTypePolicy> {
        match self.pseudo_root() {
            Some(root) => ListProxy::new(
                Arc::new(ListEditor::vector(root, fields::SUB_LAYERS)),
                ListOpType::Ordered,
            ),
            None => ListProxy::default(),
        }
    }

    /// The prims at the root of the layer.
    pub fn root_prims(&self) -> ChildrenProxy<PrimChildPolicy, AllChildren, PrimSpec> {
        match self.pseudo_root() {
            Some(root) => ChildrenProxy::new(root, ChildrenPermission::all()),
            None => ChildrenProxy::default(),
        }
    }

    /// Creates a prim at the absolute prim path `path`.
    pub fn create_prim(&self, path: &Path) -> Result<PrimSpec, EditError> {
        let spec = self.create_spec(path, SpecType::Prim)?;
        PrimSpec::from_spec(spec).ok_or_else(|| EditError::NoSuchSpec {
            path: path.to_string(),
        })
    }

    /// Creates a spec of `spec_type` at `path` and lists it in its parent.
    pub fn create_spec(&self, path: &Path, spec_type: SpecType) -> Result<Spec, EditError> {
        self.check_permission("create spec", path)?;
        if !spec_type.accepts_path(path) {
            return Err(EditError::InvalidNamespaceEdit {
                reason: format!("<{path}> is not a valid {spec_type} path"),
            });
        }
        {
            let mut specs = self.specs.write();
            if specs.contains_key(path) {
                return Err(EditError::SpecExists {
                    path: path.to_string(),
                });
            }
            let parent = path.parent_path();
            check_parent(&specs, &parent, spec_type)?;
            specs.insert(path.clone(), SpecData::new(spec_type));
            link_child(&mut specs, &parent, path, spec_type);
        }
        self.bump_version();
        self.changes.record(Change::SpecAdded { path: path.clone() });
        tracing::debug!(layer = %self.identifier, path = %path, spec_type = %spec_type, "created spec");
        self.get_spec(path).ok_or_else(|| EditError::NoSuchSpec {
            path: path.to_string(),
        })
    }

    /// Deletes the spec at `path` together with all specs below it.
    pub fn delete_spec(&self, path: &Path) -> Result<(), EditError> {
        self.check_permission("delete spec", path)?;
        {
            let mut specs = self.specs.write();
            let spec_type = match specs.get(path) {
                Some(data) if data.spec_type == SpecType::PseudoRoot => {
                    return Err(EditError::InvalidNamespaceEdit {
                        reason: "the pseudo-root cannot be deleted".to_string(),
                    });
                }
                Some(data) => data.spec_type,
                None => {
                    return Err(EditError::NoSuchSpec {
                        path: path.to_string(),
                    });
                }
            };
            specs.retain(|p, _| !p.has_prefix(path));
            unlink_child(&mut specs, &path.parent_path(), path, spec_type);
        }
        self.bump_version();
        self.changes.record(Change::SpecRemoved { path: path.clone() });
        tracing::debug!(layer = %self.identifier, path = %path, "deleted spec");
        Ok(())
    }

    /// Moves the spec at `old_path` and its subtree to `new_path`.
    ///
    /// Identities held for the moved specs follow them to their new paths.
    pub fn move_spec(&self, old_path: &Path, new_path: &Path) -> Result<(), EditError> {
        self.check_permission("move spec", old_path)?;
        if old_path == new_path {
            return Ok(());
        }
        if new_path.has_prefix(old_path) {
            return Err(EditError::InvalidNamespaceEdit {
                reason: format!("cannot move <{old_path}> below itself to <{new_path}>"),
            });
        }
        {
            let mut specs = self.specs.write();
            let spec_type = match specs.get(old_path) {
                Some(data) if data.spec_type != SpecType::PseudoRoot => data.spec_type,
                Some(_) => {
                    return Err(EditError::InvalidNamespaceEdit {
                        reason: "the pseudo-root cannot be moved".to_string(),
                    });
                }
                None => {
                    return Err(EditError::NoSuchSpec {
                        path: old_path.to_string(),
                    });
                }
            };
            if !spec_type.accepts_path(new_path) {
                return Err(EditError::InvalidNamespaceEdit {
                    reason: format!("<{new_path}> is not a valid {spec_type} path"),
                });
            }
            if specs.contains_key(new_path) {
                return Err(EditError::SpecExists {
                    path: new_path.to_string(),
                });
            }
            let new_parent = new_path.parent_path();
            check_parent(&specs, &new_parent, spec_type)?;

            let moving: Vec<Path> = specs
                .keys()
                .filter(|p| p.has_prefix(old_path))
                .cloned()
                .collect();
            for path in moving {
                if let Some(data) = specs.remove(&path) {
                    specs.insert(path.replace_prefix(old_path, new_path), data);
                }
            }
            unlink_child(&mut specs, &old_path.parent_path(), old_path, spec_type);
            link_child(&mut specs, &new_parent, new_path, spec_type);
        }
        self.identities.move_identity(old_path, new_path);
        self.bump_version();
        self.changes.record(Change::SpecMoved {
            old_path: old_path.clone(),
            new_path: new_path.clone(),
        });
        tracing::debug!(layer = %self.identifier, from = %old_path, to = %new_path, "moved spec");
        Ok(())
    }

    /// Checks every edit of `batch` against this layer, in order, without
    /// changing anything. Returns the edits that would change the layer.
    pub fn can_apply(
        &self,
        batch: &BatchNamespaceEdit,
    ) -> Result<Vec<NamespaceEdit>, NamespaceEditDetail> {
        if !self.permission_to_edit() {
            if let Some(edit) = batch.edits().first() {
                return Err(NamespaceEditDetail::new(edit.clone(), "layer is not editable"));
            }
        }
        batch.process(|path| self.has_spec(path), |edit| self.can_edit(edit))
    }

    /// Applies `batch` as one change batch. Nothing is changed unless the
    /// whole batch passes [`Layer::can_apply`].
    pub fn apply(&self, batch: &BatchNamespaceEdit) -> Result<(), EditError> {
        let edits = self.can_apply(batch)?;
        let _block = self.change_block();
        for edit in &edits {
            self.apply_namespace_edit(edit)?;
        }
        tracing::debug!(layer = %self.identifier, edits = edits.len(), "applied namespace edits");
        Ok(())
    }

    fn can_edit(&self, edit: &NamespaceEdit) -> Result<(), String> {
        let spec_type = self
            .spec_type(&edit.current_path)
            .ok_or_else(|| "object does not exist".to_string())?;
        let Some(new_path) = &edit.new_path else {
            return Ok(());
        };
        if !spec_type.accepts_path(new_path) {
            return Err(format!("<{new_path}> is not a valid {spec_type} path"));
        }
        let parent_type = self
            .spec_type(&new_path.parent_path())
            .ok_or_else(|| "new parent does not exist".to_string())?;
        if !spec_type.allowed_under(parent_type) {
            return Err(format!(
                "a {spec_type} spec cannot be a child of a {parent_type} spec"
            ));
        }
        Ok(())
    }

    fn apply_namespace_edit(&self, edit: &NamespaceEdit) -> Result<(), EditError> {
        let current = &edit.current_path;
        let Some(new_path) = &edit.new_path else {
            return self.delete_spec(current);
        };
        let position = self.child_position(current);
        let same_parent = current.parent_path() == new_path.parent_path();
        self.move_spec(current, new_path)?;
        let index = match edit.index {
            ChildIndex::Same if same_parent => position,
            ChildIndex::Same | ChildIndex::End => None,
            ChildIndex::At(index) => Some(index),
        };
        self.place_child(new_path, index)
    }

    /// The position of the prim or property at `path` among its siblings.
    fn child_position(&self, path: &Path) -> Option<usize> {
        let field = self.spec_type(path)?.children_field()?;
        let names: Vec<String> = self.get_field_as(&path.parent_path(), field)?;
        names.iter().position(|name| name == path.name())
    }

    /// Moves the prim or property at `path` to `index` among its siblings;
    /// `None` places it last.
    fn place_child(&self, path: &Path, index: Option<usize>) -> Result<(), EditError> {
        let Some(field) = self.spec_type(path).and_then(SpecType::children_field) else {
            return Ok(());
        };
        let parent = path.parent_path();
        let mut names: Vec<String> = self.get_field_as(&parent, field).unwrap_or_default();
        let Some(position) = names.iter().position(|name| name == path.name()) else {
            return Ok(());
        };
        let name = names.remove(position);
        let index = index.unwrap_or(names.len()).min(names.len());
        names.insert(index, name);
        self.reorder_children(&parent, field, names.into_value())
    }

    pub fn get_field(&self, path: &Path, field: &str) -> Option<Value> {
        self.specs.read().get(path)?.fields.get(field).cloned()
    }

    /// Reads a field as `T`; `None` if it is absent or holds another type.
    pub fn get_field_as<T: FieldValue>(&self, path: &Path, field: &str) -> Option<T> {
        let specs = self.specs.read();
        let value = specs.get(path)?.fields.get(field)?;
        T::from_value(value)
    }

    pub fn has_field(&self, path: &Path, field: &str) -> bool {
        self.specs
            .read()
            .get(path)
            .is_some_and(|data| data.fields.contains_key(field))
    }

    pub fn set_field(&self, path: &Path, field: &'static str, value: Value) -> Result<(), EditError> {
        self.check_permission("set field", path)?;
        {
            let mut specs = self.specs.write();
            let data = specs.get_mut(path).ok_or_else(|| EditError::NoSuchSpec {
                path: path.to_string(),
            })?;
            data.fields.insert(field, value);
        }
        self.record_field_write(path, field);
        Ok(())
    }

    /// Removes a field. Clearing an absent field does not count as a write.
    pub fn clear_field(&self, path: &Path, field: &'static str) -> Result<(), EditError> {
        self.check_permission("clear field", path)?;
        let removed = {
            let mut specs = self.specs.write();
            let data = specs.get_mut(path).ok_or_else(|| EditError::NoSuchSpec {
                path: path.to_string(),
            })?;
            data.fields.remove(field).is_some()
        };
        if removed {
            self.record_field_write(path, field);
        }
        Ok(())
    }

    /// Rewrites a children field with a permutation of its current entries.
    pub(crate) fn reorder_children(
        &self,
        parent: &Path,
        field: &'static str,
        value: Value,
    ) -> Result<(), EditError> {
        self.check_permission("reorder children", parent)?;
        {
            let mut specs = self.specs.write();
            let data = specs.get_mut(parent).ok_or_else(|| EditError::NoSuchSpec {
                path: parent.to_string(),
            })?;
            if data.fields.get(field) == Some(&value) {
                return Ok(());
            }
            data.fields.insert(field, value);
        }
        self.bump_version();
        self.changes.record(Change::FieldChanged {
            path: parent.clone(),
            field,
        });
        Ok(())
    }

    fn check_permission(&self, action: &'static str, path: &Path) -> Result<(), EditError> {
        if self.permission_to_edit() {
            Ok(())
        } else {
            Err(EditError::PermissionDenied {
                action,
                location: format!("<{path}> in layer {}", self.identifier),
            })
        }
    }

    fn record_field_write(&self, path: &Path, field: &'static str) {
        self.field_writes.fetch_add(1, Ordering::AcqRel);
        self.bump_version();
        self.changes.record(Change::FieldChanged {
            path: path.clone(),
            field,
        });
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("identifier", &self.identifier)
            .field("specs", &self.specs.read().len())
            .field("version", &self.version())
            .finish()
    }
}

fn check_parent(
    specs: &FxHashMap<Path, SpecData>,
    parent: &Path,
    spec_type: SpecType,
) -> Result<(), EditError> {
    let parent_type = specs
        .get(parent)
        .map(|data| data.spec_type)
        .ok_or_else(|| EditError::NoSuchSpec {
            path: parent.to_string(),
        })?;
    if !spec_type.allowed_under(parent_type) {
        return Err(EditError::InvalidNamespaceEdit {
            reason: format!("a {spec_type} spec cannot be a child of a {parent_type} spec"),
        });
    }
    Ok(())
}

fn link_child(
    specs: &mut FxHashMap<Path, SpecData>,
    parent: &Path,
    path: &Path,
    spec_type: SpecType,
) {
    let Some((field, entry)) = child_entry(path, spec_type) else {
        return;
    };
    let Some(data) = specs.get_mut(parent) else {
        return;
    };
    match entry {
        ChildEntry::Name(name) => {
            let mut names = data
                .fields
                .get(field)
                .and_then(Vec::<String>::from_value)
                .unwrap_or_default();
            if !names.contains(&name) {
                names.push(name);
            }
            data.fields.insert(field, names.into_value());
        }
        ChildEntry::Target(target) => {
            let mut targets = data
                .fields
                .get(field)
                .and_then(Vec::<Path>::from_value)
                .unwrap_or_default();
            if !targets.contains(&target) {
                targets.push(target);
            }
            data.fields.insert(field, targets.into_value());
        }
    }
}

fn unlink_child(
    specs: &mut FxHashMap<Path, SpecData>,
    parent: &Path,
    path: &Path,
    spec_type: SpecType,
) {
    let Some((field, entry)) = child_entry(path, spec_type) else {
        return;
    };
    let Some(data) = specs.get_mut(parent) else {
        return;
    };
    let remaining = match entry {
        ChildEntry::Name(name) => {
            let mut names = data
                .fields
                .get(field)
                .and_then(Vec::<String>::from_value)
                .unwrap_or_default();
            names.retain(|n| *n != name);
            (!names.is_empty()).then(|| names.into_value())
        }
        ChildEntry::Target(target) => {
            let mut targets = data
                .fields
                .get(field)
                .and_then(Vec::<Path>::from_value)
                .unwrap_or_default();
            targets.retain(|t| *t != target);
            (!targets.is_empty()).then(|| targets.into_value())
        }
    };
    match remaining {
        Some(value) => {
            data.fields.insert(field, value);
        }
        None => {
            data.fields.remove(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_anonymous_identifier() {
        let a = Layer::create_anonymous();
        let b = Layer::create_anonymous();
        assert!(a.is_anonymous());
        assert_ne!(a.identifier(), b.identifier());
        assert_eq!(a.spec_type(&Path::absolute_root()), Some(SpecType::PseudoRoot));
    }

    #[test]
    fn test_create_spec_lists_child() {
        let layer = Layer::create_anonymous();
        layer.create_spec(&p("/A"), SpecType::Prim).unwrap();
        layer.create_spec(&p("/A/B"), SpecType::Prim).unwrap();
        layer.create_spec(&p("/A.rel"), SpecType::Relationship).unwrap();
        layer
            .create_spec(&p("/A.rel[/Target]"), SpecType::RelationshipTarget)
            .unwrap();

        let root_children: Vec<String> = layer
            .get_field_as(&Path::absolute_root(), fields::PRIM_CHILDREN)
            .unwrap();
        assert_eq!(root_children, vec!["A".to_string()]);
        let properties: Vec<String> = layer.get_field_as(&p("/A"), fields::PROPERTIES).unwrap();
        assert_eq!(properties, vec!["rel".to_string()]);
        let targets: Vec<Path> = layer
            .get_field_as(&p("/A.rel"), fields::TARGET_CHILDREN)
            .unwrap();
        assert_eq!(targets, vec![p("/Target")]);

        assert!(matches!(
            layer.create_spec(&p("/A"), SpecType::Prim),
            Err(EditError::SpecExists { .. })
        ));
        assert!(matches!(
            layer.create_spec(&p("/Missing/B"), SpecType::Prim),
            Err(EditError::NoSuchSpec { .. })
        ));
        assert!(matches!(
            layer.create_spec(&p("/A.x"), SpecType::Prim),
            Err(EditError::InvalidNamespaceEdit { .. })
        ));
    }

    #[test]
    fn test_delete_spec_removes_subtree() {
        let layer = Layer::create_anonymous();
        layer.create_spec(&p("/A"), SpecType::Prim).unwrap();
        layer.create_spec(&p("/A/B"), SpecType::Prim).unwrap();
        layer.delete_spec(&p("/A")).unwrap();
        assert!(!layer.has_spec(&p("/A/B")));
        assert!(!layer.has_field(&Path::absolute_root(), fields::PRIM_CHILDREN));
        assert!(layer.delete_spec(&Path::absolute_root()).is_err());
    }

    #[test]
    fn test_move_spec_carries_identity() {
        let layer = Layer::create_anonymous();
        layer.create_spec(&p("/A"), SpecType::Prim).unwrap();
        let child = layer.create_spec(&p("/A/B"), SpecType::Prim).unwrap();
        layer.create_spec(&p("/C"), SpecType::Prim).unwrap();

        layer.move_spec(&p("/A"), &p("/C/A2")).unwrap();
        assert_eq!(child.path(), p("/C/A2/B"));
        assert!(!child.is_dormant());
        let names: Vec<String> = layer.get_field_as(&p("/C"), fields::PRIM_CHILDREN).unwrap();
        assert_eq!(names, vec!["A2".to_string()]);
        let names: Vec<String> = layer
            .get_field_as(&Path::absolute_root(), fields::PRIM_CHILDREN)
            .unwrap();
        assert_eq!(names, vec!["C".to_string()]);

        assert!(layer.move_spec(&p("/C"), &p("/C/A2/Inner")).is_err());
    }

    fn root_names(layer: &Layer) -> Vec<String> {
        layer
            .get_field_as(&Path::absolute_root(), fields::PRIM_CHILDREN)
            .unwrap_or_default()
    }

    #[test]
    fn test_apply_namespace_batch() {
        let layer = Layer::create_anonymous();
        let a = layer.create_spec(&p("/A"), SpecType::Prim).unwrap();
        layer.create_spec(&p("/B"), SpecType::Prim).unwrap();
        let c = layer.create_spec(&p("/C"), SpecType::Prim).unwrap();
        layer.create_spec(&p("/A/Child"), SpecType::Prim).unwrap();

        let batch = BatchNamespaceEdit::from(vec![
            NamespaceEdit::rename(p("/A"), "A2").unwrap(),
            NamespaceEdit::reparent(p("/C"), &p("/A2"), ChildIndex::End).unwrap(),
            NamespaceEdit::reorder(p("/B"), ChildIndex::At(0)),
            NamespaceEdit::remove(p("/A2/Child")),
        ]);
        assert_eq!(layer.can_apply(&batch).unwrap().len(), 4);
        assert!(layer.has_spec(&p("/A")));

        let batches = layer.change_batch_count();
        layer.apply(&batch).unwrap();
        assert_eq!(layer.change_batch_count(), batches + 1);

        assert_eq!(root_names(&layer), vec!["B".to_string(), "A2".to_string()]);
        let names: Vec<String> = layer.get_field_as(&p("/A2"), fields::PRIM_CHILDREN).unwrap();
        assert_eq!(names, vec!["C".to_string()]);
        assert!(!layer.has_spec(&p("/A2/Child")));
        assert_eq!(a.path(), p("/A2"));
        assert_eq!(c.path(), p("/A2/C"));
    }

    #[test]
    fn test_rename_keeps_position() {
        let layer = Layer::create_anonymous();
        for name in ["/A", "/B", "/C"] {
            layer.create_spec(&p(name), SpecType::Prim).unwrap();
        }
        let batch = BatchNamespaceEdit::from(vec![NamespaceEdit::rename(p("/A"), "Z").unwrap()]);
        layer.apply(&batch).unwrap();
        assert_eq!(
            root_names(&layer),
            vec!["Z".to_string(), "B".to_string(), "C".to_string()]
        );
    }

    #[test]
    fn test_invalid_batch_leaves_layer_untouched() {
        let layer = Layer::create_anonymous();
        layer.create_spec(&p("/A"), SpecType::Prim).unwrap();
        layer.create_spec(&p("/B"), SpecType::Prim).unwrap();
        let version = layer.version();

        let batch = BatchNamespaceEdit::from(vec![
            NamespaceEdit::rename(p("/A"), "X").unwrap(),
            NamespaceEdit::rename(p("/B"), "X").unwrap(),
        ]);
        let detail = layer.can_apply(&batch).unwrap_err();
        assert_eq!(detail.edit, batch.edits()[1]);
        assert_eq!(detail.reason, "object already exists");

        assert!(matches!(
            layer.apply(&batch),
            Err(EditError::InvalidNamespaceEdit { .. })
        ));
        assert!(layer.has_spec(&p("/A")));
        assert!(layer.has_spec(&p("/B")));
        assert!(!layer.has_spec(&p("/X")));
        assert_eq!(layer.version(), version);

        layer.set_permission_to_edit(false);
        let batch = BatchNamespaceEdit::from(vec![NamespaceEdit::remove(p("/A"))]);
        assert_eq!(layer.can_apply(&batch).unwrap_err().reason, "layer is not editable");
        assert!(layer.has_spec(&p("/A")));
    }

    #[test]
    fn test_field_writes_and_batches() {
        let layer = Layer::create_anonymous();
        let batches = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&batches);
        layer.subscribe(move |_| *counter.lock().unwrap() += 1);

        let root = Path::absolute_root();
        layer.clear_field(&root, fields::SUB_LAYERS).unwrap();
        assert_eq!(layer.field_write_count(), 0);

        {
            let _block = layer.change_block();
            layer
                .set_field(&root, fields::SUB_LAYERS, vec!["a.usd".to_string()].into_value())
                .unwrap();
            layer.clear_field(&root, fields::SUB_LAYERS).unwrap();
        }
        assert_eq!(layer.field_write_count(), 2);
        assert_eq!(*batches.lock().unwrap(), 1);
        assert_eq!(layer.change_batch_count(), 1);
    }

    #[test]
    fn test_permission_blocks_writes() {
        let layer = Layer::create_anonymous();
        layer.set_permission_to_edit(false);
        let err = layer
            .set_field(&Path::absolute_root(), fields::CUSTOM, Value::Bool(true))
            .unwrap_err();
        assert!(matches!(err, EditError::PermissionDenied { action: "set field", .. }));
        assert!(layer.create_spec(&p("/A"), SpecType::Prim).is_err());
    }
}
