//! Container-like proxies over spec fields.
//!
//! Proxies are cheap handles that hold no data of their own: every read
//! goes to the layer and every write goes through an editor. A
//! default-constructed proxy refers to nothing; reads on it are empty and
//! edits fail with [`EditError::InvalidProxy`](crate::error::EditError::InvalidProxy).

pub mod children;
pub mod list;
pub mod list_editor;
pub mod map;

pub use children::{
    AllChildren, AttributeConnectionChildPolicy, AttributePredicate, ChildPolicy, ChildPredicate,
    ChildrenPermission, ChildrenProxy, ChildrenView, PrimChildPolicy, PropertyChildPolicy,
    RelationshipPredicate, RelationshipTargetChildPolicy,
};
pub use list::ListProxy;
pub use list_editor::ListEditorProxy;
pub use map::MapEditProxy;
