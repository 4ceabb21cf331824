//! Handles to specs within a layer.
//!
//! A [`Spec`] pairs a weak reference to its layer with the identity of its
//! path, so it keeps addressing the same object across renames and reports
//! itself dormant once the object (or the layer) is gone. The typed wrappers
//! [`PrimSpec`], [`RelationshipSpec`] and [`AttributeSpec`] expose the list,
//! map and children proxies for their fields.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Weak};

use crate::editor::ListEditor;
use crate::error::EditError;
use crate::layer::{Identity, Layer};
use crate::model::{BatchNamespaceEdit, FieldValue, ListOpType, NamespaceEdit, Value};
use crate::path::Path;
use crate::policy::{
    IdentityMapPolicy, NameTokenKeyPolicy, PathKeyPolicy, ReferenceTypePolicy, RelocatesMapPolicy,
};
use crate::proxy::{
    AllChildren, AttributeConnectionChildPolicy, AttributePredicate, ChildrenPermission,
    ChildrenProxy, ChildrenView, ListEditorProxy, ListProxy, MapEditProxy, PrimChildPolicy,
    PropertyChildPolicy, RelationshipPredicate, RelationshipTargetChildPolicy,
};
use crate::validate::fields;

/// The kind of object a spec describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecType {
    PseudoRoot,
    Prim,
    Attribute,
    Relationship,
    RelationshipTarget,
    Connection,
}

impl SpecType {
    pub fn name(self) -> &'static str {
        match self {
            SpecType::PseudoRoot => "pseudo-root",
            SpecType::Prim => "prim",
            SpecType::Attribute => "attribute",
            SpecType::Relationship => "relationship",
            SpecType::RelationshipTarget => "relationship target",
            SpecType::Connection => "connection",
        }
    }

    /// The field of the parent spec that lists specs of this type.
    pub fn children_field(self) -> Option<&'static str> {
        match self {
            SpecType::PseudoRoot => None,
            SpecType::Prim => Some(fields::PRIM_CHILDREN),
            SpecType::Attribute | SpecType::Relationship => Some(fields::PROPERTIES),
            SpecType::RelationshipTarget => Some(fields::TARGET_CHILDREN),
            SpecType::Connection => Some(fields::CONNECTION_CHILDREN),
        }
    }

    /// Returns true if a spec of this type may live at `path`.
    pub fn accepts_path(self, path: &Path) -> bool {
        match self {
            SpecType::PseudoRoot => path.is_absolute_root(),
            SpecType::Prim => path.is_absolute() && path.is_prim_path(),
            SpecType::Attribute | SpecType::Relationship => {
                path.is_absolute() && path.is_property_path()
            }
            SpecType::RelationshipTarget | SpecType::Connection => {
                path.is_absolute() && path.is_target_path()
            }
        }
    }

    /// Returns true if a spec of this type may be a child of a `parent` spec.
    pub fn allowed_under(self, parent: SpecType) -> bool {
        matches!(
            (parent, self),
            (SpecType::PseudoRoot | SpecType::Prim, SpecType::Prim)
                | (SpecType::Prim, SpecType::Attribute | SpecType::Relationship)
                | (SpecType::Relationship, SpecType::RelationshipTarget)
                | (SpecType::Attribute, SpecType::Connection)
        )
    }
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A handle to one spec of a layer.
#[derive(Clone)]
pub struct Spec {
    layer: Weak<Layer>,
    identity: Identity,
}

impl Spec {
    pub(crate) fn new(layer: Weak<Layer>, identity: Identity) -> Self {
        Self { layer, identity }
    }

    /// The owning layer, if it is still alive.
    pub fn layer(&self) -> Option<Arc<Layer>> {
        self.layer.upgrade()
    }

    /// The spec's current path; follows namespace edits.
    pub fn path(&self) -> Path {
        self.identity.path()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns true once the layer is gone or no spec exists at this
    /// handle's path any more.
    pub fn is_dormant(&self) -> bool {
        let path = self.path();
        match self.layer() {
            Some(layer) => path.is_empty() || !layer.has_spec(&path),
            None => true,
        }
    }

    pub fn spec_type(&self) -> Option<SpecType> {
        self.layer()?.spec_type(&self.path())
    }

    pub fn permission_to_edit(&self) -> bool {
        self.layer().is_some_and(|layer| layer.permission_to_edit())
    }

    /// The layer, or [`EditError::Expired`] if this spec is dormant.
    pub fn live_layer(&self) -> Result<Arc<Layer>, EditError> {
        let path = self.path();
        match self.layer() {
            Some(layer) if !path.is_empty() && layer.has_spec(&path) => Ok(layer),
            _ => Err(EditError::Expired {
                location: format!("<{path}>"),
            }),
        }
    }

    pub fn get_field(&self, field: &str) -> Option<Value> {
        self.layer()?.get_field(&self.path(), field)
    }

    pub fn get_field_as<T: FieldValue>(&self, field: &str) -> Option<T> {
        self.layer()?.get_field_as(&self.path(), field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.layer()
            .is_some_and(|layer| layer.has_field(&self.path(), field))
    }

    pub fn set_field(&self, field: &'static str, value: Value) -> Result<(), EditError> {
        self.live_layer()?.set_field(&self.path(), field, value)
    }

    pub fn clear_field(&self, field: &'static str) -> Result<(), EditError> {
        self.live_layer()?.clear_field(&self.path(), field)
    }
}

impl PartialEq for Spec {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.layer, &other.layer) && self.identity == other.identity
    }
}

impl Eq for Spec {}

impl Hash for Spec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spec({:?})", self.path())
    }
}

/// A spec handle narrowed to one spec type.
pub trait TypedSpec: Clone + Sized {
    /// Wraps `spec` if it has the right type.
    fn from_spec(spec: Spec) -> Option<Self>;

    fn as_spec(&self) -> &Spec;
}

impl TypedSpec for Spec {
    fn from_spec(spec: Spec) -> Option<Self> {
        Some(spec)
    }

    fn as_spec(&self) -> &Spec {
        self
    }
}

macro_rules! typed_spec {
    ($(#[$meta:meta])* $name:ident, $spec_type:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(Spec);

        impl TypedSpec for $name {
            fn from_spec(spec: Spec) -> Option<Self> {
                (spec.spec_type()? == $spec_type).then_some(Self(spec))
            }

            fn as_spec(&self) -> &Spec {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = Spec;

            fn deref(&self) -> &Spec {
                &self.0
            }
        }
    };
}

typed_spec!(
    /// A prim spec.
    PrimSpec,
    SpecType::Prim
);
typed_spec!(
    /// A relationship spec.
    RelationshipSpec,
    SpecType::Relationship
);
typed_spec!(
    /// An attribute spec.
    AttributeSpec,
    SpecType::Attribute
);

fn create_child<T: TypedSpec>(
    parent: &Spec,
    path: Option<Path>,
    name: &str,
    spec_type: SpecType,
) -> Result<T, EditError> {
    let path = path.ok_or_else(|| EditError::InvalidNamespaceEdit {
        reason: format!("{name:?} is not a valid {spec_type} name"),
    })?;
    let spec = parent.live_layer()?.create_spec(&path, spec_type)?;
    T::from_spec(spec).ok_or_else(|| EditError::NoSuchSpec {
        path: path.to_string(),
    })
}

impl PrimSpec {
    pub fn name(&self) -> String {
        self.path().name().to_string()
    }

    pub fn create_prim(&self, name: &str) -> Result<PrimSpec, EditError> {
        create_child(self, self.path().append_child(name), name, SpecType::Prim)
    }

    pub fn create_attribute(&self, name: &str) -> Result<AttributeSpec, EditError> {
        create_child(self, self.path().append_property(name), name, SpecType::Attribute)
    }

    pub fn create_relationship(&self, name: &str) -> Result<RelationshipSpec, EditError> {
        create_child(
            self,
            self.path().append_property(name),
            name,
            SpecType::Relationship,
        )
    }

    /// Renames this prim in place. Handles to it and to its descendants
    /// follow the rename.
    /// Renames this prim, keeping its position among its siblings.
    pub fn rename(&self, new_name: &str) -> Result<(), EditError> {
        let edit = NamespaceEdit::rename(self.path(), new_name).ok_or_else(|| {
            EditError::InvalidNamespaceEdit {
                reason: format!("{new_name:?} is not a valid prim name"),
            }
        })?;
        self.live_layer()?.apply(&BatchNamespaceEdit::from(vec![edit]))
    }

    pub fn type_name(&self) -> String {
        self.get_field_as(fields::TYPE_NAME).unwrap_or_default()
    }

    pub fn set_type_name(&self, type_name: &str) -> Result<(), EditError> {
        self.set_field(fields::TYPE_NAME, Value::String(type_name.to_string()))
    }

    pub fn name_children(&self) -> ChildrenProxy<PrimChildPolicy, AllChildren, PrimSpec> {
        ChildrenProxy::new(self.0.clone(), ChildrenPermission::all())
    }

    pub fn properties(&self) -> ChildrenProxy<PropertyChildPolicy> {
        ChildrenProxy::new(self.0.clone(), ChildrenPermission::all())
    }

    pub fn attributes(&self) -> ChildrenView<PropertyChildPolicy, AttributePredicate, AttributeSpec> {
        ChildrenView::new(self.0.clone())
    }

    pub fn relationships(
        &self,
    ) -> ChildrenView<PropertyChildPolicy, RelationshipPredicate, RelationshipSpec> {
        ChildrenView::new(self.0.clone())
    }

    pub fn inherit_path_list(&self) -> ListEditorProxy<PathKeyPolicy> {
        ListEditorProxy::new(ListEditor::list_op(self.0.clone(), fields::INHERIT_PATHS))
    }

    pub fn specializes_list(&self) -> ListEditorProxy<PathKeyPolicy> {
        ListEditorProxy::new(ListEditor::list_op(self.0.clone(), fields::SPECIALIZES))
    }

    pub fn reference_list(&self) -> ListEditorProxy<ReferenceTypePolicy> {
        ListEditorProxy::new(ListEditor::list_op(self.0.clone(), fields::REFERENCES))
    }

    pub fn variant_set_name_list(&self) -> ListEditorProxy<NameTokenKeyPolicy> {
        ListEditorProxy::new(ListEditor::list_op(self.0.clone(), fields::VARIANT_SET_NAMES))
    }

    pub fn api_schemas_list(&self) -> ListEditorProxy<NameTokenKeyPolicy> {
        ListEditorProxy::new(ListEditor::list_op(self.0.clone(), fields::API_SCHEMAS))
    }

    /// The authored ordering of this prim's children.
    pub fn name_children_order(&self) -> ListProxy<NameTokenKeyPolicy> {
        ListProxy::new(
            Arc::new(ListEditor::vector(self.0.clone(), fields::PRIM_ORDER)),
            ListOpType::Ordered,
        )
    }

    pub fn relocates(&self) -> MapEditProxy<RelocatesMapPolicy> {
        MapEditProxy::new(self.0.clone(), fields::RELOCATES)
    }

    pub fn variant_selections(&self) -> MapEditProxy<IdentityMapPolicy<String, String>> {
        MapEditProxy::new(self.0.clone(), fields::VARIANT_SELECTION)
    }

    pub fn custom_data(&self) -> MapEditProxy<IdentityMapPolicy<String, String>> {
        MapEditProxy::new(self.0.clone(), fields::CUSTOM_DATA)
    }
}

impl RelationshipSpec {
    /// The relationship's target paths. Targets added to or removed from
    /// the explicit or added lists keep the target specs in sync.
    pub fn target_path_list(&self) -> ListEditorProxy<PathKeyPolicy> {
        ListEditorProxy::new(ListEditor::relationship_targets(self.0.clone()))
    }

    pub fn target_specs(&self) -> ChildrenView<RelationshipTargetChildPolicy> {
        ChildrenView::new(self.0.clone())
    }

    pub fn custom_data(&self) -> MapEditProxy<IdentityMapPolicy<String, String>> {
        MapEditProxy::new(self.0.clone(), fields::CUSTOM_DATA)
    }
}

impl AttributeSpec {
    /// The attribute's connection paths, kept in sync with connection specs
    /// like relationship targets.
    pub fn connection_path_list(&self) -> ListEditorProxy<PathKeyPolicy> {
        ListEditorProxy::new(ListEditor::attribute_connections(self.0.clone()))
    }

    pub fn connection_specs(&self) -> ChildrenView<AttributeConnectionChildPolicy> {
        ChildrenView::new(self.0.clone())
    }

    pub fn custom_data(&self) -> MapEditProxy<IdentityMapPolicy<String, String>> {
        MapEditProxy::new(self.0.clone(), fields::CUSTOM_DATA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_typed_specs_check_type() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/World")).unwrap();
        let rel = prim.create_relationship("rel").unwrap();
        assert_eq!(rel.path(), p("/World.rel"));
        assert!(RelationshipSpec::from_spec(prim.as_spec().clone()).is_none());
        assert!(layer.get_typed_spec::<RelationshipSpec>(&p("/World.rel")).is_some());
        assert!(prim.create_prim("not valid").is_err());
    }

    #[test]
    fn test_rename_keeps_handles() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Old")).unwrap();
        let child = prim.create_prim("Child").unwrap();
        prim.rename("New").unwrap();
        assert_eq!(prim.path(), p("/New"));
        assert_eq!(child.path(), p("/New/Child"));
        assert!(!child.is_dormant());
        assert!(prim.rename("bad name").is_err());

        let other = layer.create_prim(&p("/Other")).unwrap();
        assert!(matches!(
            other.rename("New"),
            Err(EditError::InvalidNamespaceEdit { .. })
        ));
        assert_eq!(other.path(), p("/Other"));
    }

    #[test]
    fn test_dormant_after_delete_and_layer_drop() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/A")).unwrap();
        let other = layer.create_prim(&p("/B")).unwrap();
        layer.delete_spec(&p("/A")).unwrap();
        assert!(prim.is_dormant());
        assert!(matches!(prim.live_layer(), Err(EditError::Expired { .. })));
        drop(layer);
        assert!(other.is_dormant());
    }

    #[test]
    fn test_handles_to_same_spec_are_equal() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/A")).unwrap();
        let again = layer.get_typed_spec::<PrimSpec>(&p("/A")).unwrap();
        assert_eq!(prim, again);
        prim.set_type_name("Xform").unwrap();
        assert_eq!(again.type_name(), "Xform");
    }

    #[test]
    fn test_connections_and_child_order() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Shader")).unwrap();
        let attr = prim.create_attribute("color").unwrap();
        attr.connection_path_list()
            .add(p("/Texture.out"))
            .unwrap();
        assert_eq!(
            attr.connection_specs().keys(),
            vec![p("/Texture.out")]
        );

        prim.create_prim("B").unwrap();
        prim.create_prim("A").unwrap();
        let order = prim.name_children_order();
        order.assign(vec!["A".to_string(), "B".to_string()]).unwrap();
        let mut names = prim.name_children().keys();
        order.apply_edits_to_list(&mut names, None);
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
        assert!(matches!(
            order.editor().unwrap().replace_edits(ListOpType::Added, 0, 0, vec!["C".to_string()]),
            Err(EditError::IrrelevantList { .. })
        ));
    }
}
