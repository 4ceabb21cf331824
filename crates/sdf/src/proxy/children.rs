//! Views over the child specs of a spec.
//!
//! A parent lists its children in a children field (`primChildren`,
//! `properties`, `targetChildren`, `connectionChildren`). A [`ChildPolicy`]
//! says which field, how keys map to child paths and back, and how keys are
//! canonicalized. A [`ChildPredicate`] filters the children a view exposes,
//! e.g. only the attributes among a prim's properties.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::editor::ListEditor;
use crate::error::EditError;
use crate::layer::Layer;
use crate::model::{FieldValue, Value};
use crate::path::Path;
use crate::policy::PathKeyPolicy;
use crate::proxy::ListEditorProxy;
use crate::spec::{Spec, SpecType, TypedSpec};
use crate::validate::fields;

/// How children of one kind are keyed and stored.
pub trait ChildPolicy: Send + Sync + 'static {
    type Key: Clone + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// The children field on the parent.
    const FIELD: &'static str;

    fn child_path(parent: &Path, key: &Self::Key) -> Option<Path>;

    /// The key under which the spec at `path` would be listed.
    fn key_of(path: &Path) -> Option<Self::Key>;

    fn canonicalize_key(parent: &Path, key: &Self::Key) -> Self::Key;

    fn read_keys(value: &Value) -> Vec<Self::Key>;

    fn keys_into_value(keys: Vec<Self::Key>) -> Value;

    /// Drops `key` from whatever else on `parent` lists it, before its child
    /// spec is erased.
    fn retract(_parent: &Spec, _key: &Self::Key) -> Result<(), EditError> {
        Ok(())
    }
}

/// Name children of a prim or of the pseudo-root.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimChildPolicy;

impl ChildPolicy for PrimChildPolicy {
    type Key = String;

    const FIELD: &'static str = fields::PRIM_CHILDREN;

    fn child_path(parent: &Path, key: &String) -> Option<Path> {
        parent.append_child(key)
    }

    fn key_of(path: &Path) -> Option<String> {
        path.is_prim_path().then(|| path.name().to_string())
    }

    fn canonicalize_key(_: &Path, key: &String) -> String {
        key.clone()
    }

    fn read_keys(value: &Value) -> Vec<String> {
        Vec::from_value(value).unwrap_or_default()
    }

    fn keys_into_value(keys: Vec<String>) -> Value {
        keys.into_value()
    }
}

/// Properties of a prim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyChildPolicy;

impl ChildPolicy for PropertyChildPolicy {
    type Key = String;

    const FIELD: &'static str = fields::PROPERTIES;

    fn child_path(parent: &Path, key: &String) -> Option<Path> {
        parent.append_property(key)
    }

    fn key_of(path: &Path) -> Option<String> {
        path.is_property_path().then(|| path.name().to_string())
    }

    fn canonicalize_key(_: &Path, key: &String) -> String {
        key.clone()
    }

    fn read_keys(value: &Value) -> Vec<String> {
        Vec::from_value(value).unwrap_or_default()
    }

    fn keys_into_value(keys: Vec<String>) -> Value {
        keys.into_value()
    }
}

/// Target specs of a relationship, keyed by absolute target path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationshipTargetChildPolicy;

/// Connection specs of an attribute, keyed by absolute connection path.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeConnectionChildPolicy;

macro_rules! target_child_policy {
    ($name:ident, $field:expr, $editor:path) => {
        impl ChildPolicy for $name {
            type Key = Path;

            const FIELD: &'static str = $field;

            fn child_path(parent: &Path, key: &Path) -> Option<Path> {
                parent.append_target(&Self::canonicalize_key(parent, key))
            }

            fn key_of(path: &Path) -> Option<Path> {
                path.target_path().cloned()
            }

            fn canonicalize_key(parent: &Path, key: &Path) -> Path {
                key.make_absolute(&parent.prim_path())
                    .unwrap_or_else(|| key.clone())
            }

            fn read_keys(value: &Value) -> Vec<Path> {
                Vec::from_value(value).unwrap_or_default()
            }

            fn keys_into_value(keys: Vec<Path>) -> Value {
                keys.into_value()
            }

            fn retract(parent: &Spec, key: &Path) -> Result<(), EditError> {
                let key = Self::canonicalize_key(&parent.path(), key);
                ListEditorProxy::<PathKeyPolicy>::new($editor(parent.clone())).erase(&key)
            }
        }
    };
}

target_child_policy!(
    RelationshipTargetChildPolicy,
    fields::TARGET_CHILDREN,
    ListEditor::relationship_targets
);
target_child_policy!(
    AttributeConnectionChildPolicy,
    fields::CONNECTION_CHILDREN,
    ListEditor::attribute_connections
);

/// Filters the children a view exposes.
pub trait ChildPredicate: Send + Sync + 'static {
    fn accepts(spec: &Spec) -> bool;
}

/// Accepts every child.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllChildren;

impl ChildPredicate for AllChildren {
    fn accepts(_: &Spec) -> bool {
        true
    }
}

/// Accepts attribute specs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributePredicate;

impl ChildPredicate for AttributePredicate {
    fn accepts(spec: &Spec) -> bool {
        spec.spec_type() == Some(SpecType::Attribute)
    }
}

/// Accepts relationship specs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationshipPredicate;

impl ChildPredicate for RelationshipPredicate {
    fn accepts(spec: &Spec) -> bool {
        spec.spec_type() == Some(SpecType::Relationship)
    }
}

bitflags::bitflags! {
    /// Edits a [`ChildrenProxy`] allows.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChildrenPermission: u8 {
        const CAN_SET = 1 << 0;
        const CAN_INSERT = 1 << 1;
        const CAN_ERASE = 1 << 2;
    }
}

/// The children of one parent, as stored in the layer.
struct Children<C: ChildPolicy> {
    parent: Spec,
    _policy: PhantomData<fn() -> C>,
}

impl<C: ChildPolicy> Children<C> {
    fn new(parent: Spec) -> Self {
        Self {
            parent,
            _policy: PhantomData,
        }
    }

    fn location(&self) -> String {
        format!("'{}' on <{}>", C::FIELD, self.parent.path())
    }

    fn keys(&self) -> Vec<C::Key> {
        let Some(layer) = self.parent.layer() else {
            return Vec::new();
        };
        layer
            .get_field(&self.parent.path(), C::FIELD)
            .map(|value| C::read_keys(&value))
            .unwrap_or_default()
    }

    fn child(&self, key: &C::Key) -> Option<Spec> {
        let layer = self.parent.layer()?;
        layer.get_spec(&C::child_path(&self.parent.path(), key)?)
    }

    fn canonicalize(&self, key: &C::Key) -> C::Key {
        C::canonicalize_key(&self.parent.path(), key)
    }

    /// Makes `spec` a child listed at `index`, moving it from wherever it is.
    fn insert(&self, layer: &Layer, spec: &Spec, index: Option<usize>) -> Result<(), EditError> {
        let same_layer = spec
            .layer()
            .is_some_and(|owner| std::ptr::eq(Arc::as_ptr(&owner), layer));
        if !same_layer {
            return Err(EditError::InvalidNamespaceEdit {
                reason: format!("<{}> does not belong to this layer", spec.path()),
            });
        }
        let old_path = spec.path();
        let parent_path = self.parent.path();
        let key = C::key_of(&old_path).ok_or_else(|| EditError::InvalidNamespaceEdit {
            reason: format!("<{old_path}> cannot be listed in {}", self.location()),
        })?;
        let new_path =
            C::child_path(&parent_path, &key).ok_or_else(|| EditError::InvalidNamespaceEdit {
                reason: format!("no child path for {key} under <{parent_path}>"),
            })?;

        let _block = layer.change_block();
        layer.move_spec(&old_path, &new_path)?;

        let mut keys = self.keys();
        let Some(position) = keys.iter().position(|k| *k == key) else {
            return Ok(());
        };
        keys.remove(position);
        let index = index.unwrap_or(keys.len()).min(keys.len());
        keys.insert(index, key);
        layer.reorder_children(&parent_path, C::FIELD, C::keys_into_value(keys))
    }

    /// Deletes the child at `key`. Returns false if there is none.
    fn erase(&self, layer: &Layer, key: &C::Key) -> Result<bool, EditError> {
        let Some(path) = C::child_path(&self.parent.path(), &self.canonicalize(key)) else {
            return Ok(false);
        };
        if !layer.has_spec(&path) {
            return Ok(false);
        }
        let _block = layer.change_block();
        C::retract(&self.parent, key)?;
        if layer.has_spec(&path) {
            layer.delete_spec(&path)?;
        }
        Ok(true)
    }

    /// Replaces the children with `specs`, in that order.
    fn set(&self, layer: &Layer, specs: &[Spec]) -> Result<(), EditError> {
        let _block = layer.change_block();
        let parent_path = self.parent.path();
        let kept: Vec<C::Key> = specs
            .iter()
            .map(|spec| spec.path())
            .filter(|path| path.parent_path() == parent_path)
            .filter_map(|path| C::key_of(&path))
            .collect();
        for key in self.keys() {
            if !kept.contains(&key) {
                self.erase(layer, &key)?;
            }
        }
        for (index, spec) in specs.iter().enumerate() {
            self.insert(layer, spec, Some(index))?;
        }
        Ok(())
    }
}

/// A read-only view of the children of a spec that `F` accepts, presented
/// as `A`.
pub struct ChildrenView<C: ChildPolicy, F: ChildPredicate = AllChildren, A: TypedSpec = Spec> {
    children: Option<Children<C>>,
    _marker: PhantomData<fn() -> (F, A)>,
}

impl<C: ChildPolicy, F: ChildPredicate, A: TypedSpec> ChildrenView<C, F, A> {
    pub fn new(parent: Spec) -> Self {
        Self {
            children: Some(Children::new(parent)),
            _marker: PhantomData,
        }
    }

    pub fn parent(&self) -> Option<&Spec> {
        self.children.as_ref().map(|children| &children.parent)
    }

    pub fn is_valid(&self) -> bool {
        self.children
            .as_ref()
            .is_some_and(|children| !children.parent.is_dormant())
    }

    pub fn is_expired(&self) -> bool {
        self.children
            .as_ref()
            .is_some_and(|children| children.parent.is_dormant())
    }

    /// The keys of the visible children, in order.
    pub fn keys(&self) -> Vec<C::Key> {
        self.entries().into_iter().map(|(key, _)| key).collect()
    }

    /// The visible children, in order.
    pub fn values(&self) -> Vec<A> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    pub fn iter(&self) -> std::vec::IntoIter<A> {
        self.values().into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<A> {
        self.values().into_iter().nth(index)
    }

    /// The child at `key`, if it exists and this view exposes it.
    pub fn find(&self, key: &C::Key) -> Option<A> {
        let children = self.children.as_ref()?;
        let key = children.canonicalize(key);
        if !children.keys().contains(&key) {
            return None;
        }
        let spec = children.child(&key)?;
        if !F::accepts(&spec) {
            return None;
        }
        A::from_spec(spec)
    }

    pub fn contains_key(&self, key: &C::Key) -> bool {
        self.find(key).is_some()
    }

    pub fn count(&self, key: &C::Key) -> usize {
        usize::from(self.contains_key(key))
    }

    /// Position of `key` among the visible children.
    pub fn index_of(&self, key: &C::Key) -> Option<usize> {
        let children = self.children.as_ref()?;
        let key = children.canonicalize(key);
        self.keys().iter().position(|k| *k == key)
    }

    fn entries(&self) -> Vec<(C::Key, A)> {
        let Some(children) = &self.children else {
            return Vec::new();
        };
        children
            .keys()
            .into_iter()
            .filter_map(|key| {
                let spec = children.child(&key)?;
                if !F::accepts(&spec) {
                    return None;
                }
                Some((key, A::from_spec(spec)?))
            })
            .collect()
    }
}

impl<C: ChildPolicy, F: ChildPredicate, A: TypedSpec> Default for ChildrenView<C, F, A> {
    fn default() -> Self {
        Self {
            children: None,
            _marker: PhantomData,
        }
    }
}

impl<C: ChildPolicy, F: ChildPredicate, A: TypedSpec> fmt::Debug for ChildrenView<C, F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// A [`ChildrenView`] that can also add, remove and replace children.
pub struct ChildrenProxy<C: ChildPolicy, F: ChildPredicate = AllChildren, A: TypedSpec = Spec> {
    view: ChildrenView<C, F, A>,
    permission: ChildrenPermission,
}

impl<C: ChildPolicy, F: ChildPredicate, A: TypedSpec> ChildrenProxy<C, F, A> {
    pub fn new(parent: Spec, permission: ChildrenPermission) -> Self {
        Self {
            view: ChildrenView::new(parent),
            permission,
        }
    }

    pub fn view(&self) -> &ChildrenView<C, F, A> {
        &self.view
    }

    pub fn permission(&self) -> ChildrenPermission {
        self.permission
    }

    pub fn is_valid(&self) -> bool {
        self.view.is_valid()
    }

    pub fn is_expired(&self) -> bool {
        self.view.is_expired()
    }

    pub fn keys(&self) -> Vec<C::Key> {
        self.view.keys()
    }

    pub fn values(&self) -> Vec<A> {
        self.view.values()
    }

    pub fn iter(&self) -> std::vec::IntoIter<A> {
        self.view.iter()
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<A> {
        self.view.get(index)
    }

    pub fn find(&self, key: &C::Key) -> Option<A> {
        self.view.find(key)
    }

    pub fn contains_key(&self, key: &C::Key) -> bool {
        self.view.contains_key(key)
    }

    pub fn count(&self, key: &C::Key) -> usize {
        self.view.count(key)
    }

    /// Moves `child` under this parent at `index`; `None` appends. A child
    /// that is already listed is only reordered.
    pub fn insert(&self, child: &A, index: Option<usize>) -> Result<(), EditError> {
        let (children, layer) = self.check(ChildrenPermission::CAN_INSERT, "insert")?;
        children
            .insert(&layer, child.as_spec(), index)
            .map_err(EditError::report)
    }

    /// Deletes the child at `key` with its subtree. Returns false if there is
    /// no such child.
    pub fn erase(&self, key: &C::Key) -> Result<bool, EditError> {
        let (children, layer) = self.check(ChildrenPermission::CAN_ERASE, "erase")?;
        children.erase(&layer, key).map_err(EditError::report)
    }

    /// Replaces all children with `values`, in that order.
    pub fn set(&self, values: &[A]) -> Result<(), EditError> {
        let (children, layer) = self.check(ChildrenPermission::CAN_SET, "set")?;
        let specs: Vec<Spec> = values.iter().map(|value| value.as_spec().clone()).collect();
        children.set(&layer, &specs).map_err(EditError::report)
    }

    pub fn clear(&self) -> Result<(), EditError> {
        self.set(&[])
    }

    fn check(
        &self,
        required: ChildrenPermission,
        action: &'static str,
    ) -> Result<(&Children<C>, Arc<Layer>), EditError> {
        let children = self
            .view
            .children
            .as_ref()
            .ok_or_else(|| EditError::InvalidProxy.report())?;
        let layer = children.parent.live_layer().map_err(EditError::report)?;
        if !self.permission.contains(required) || !layer.permission_to_edit() {
            return Err(EditError::PermissionDenied {
                action,
                location: children.location(),
            }
            .report());
        }
        Ok((children, layer))
    }
}

impl<C: ChildPolicy, F: ChildPredicate, A: TypedSpec> Default for ChildrenProxy<C, F, A> {
    fn default() -> Self {
        Self {
            view: ChildrenView::default(),
            permission: ChildrenPermission::empty(),
        }
    }
}

impl<C: ChildPolicy, F: ChildPredicate, A: TypedSpec> fmt::Debug for ChildrenProxy<C, F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildrenProxy")
            .field("children", &self.view)
            .field("permission", &self.permission)
            .finish()
    }
}
