//! Scene description layers with list-op composition and edit proxies.
//!
//! This crate provides the editing core of a layered scene description:
//! list-valued fields expressed as list ops, editors that validate and write
//! them, and container-like proxies for list, map and children fields.
//!
//! # Overview
//!
//! A [`Layer`] stores specs (prims, properties, relationship targets and
//! attribute connections) at [`Path`]s, each with a dictionary of typed
//! fields. Fields that hold lists of paths, names or references are
//! [`ListOp`]s: either an explicit list, or a set of edits (prepend, append,
//! delete, ...) that are applied over the same list from weaker layers.
//!
//! Specs are edited through proxies:
//! - [`ListProxy`]: one op list, used like a vector
//! - [`ListEditorProxy`]: all op lists of a field, with add/remove semantics
//! - [`MapEditProxy`]: a dictionary field, used like a sorted map
//! - [`ChildrenView`] / [`ChildrenProxy`]: the child specs of a spec
//!
//! # Quick Start
//!
//! ```rust
//! use sdf::{Layer, Path};
//!
//! let layer = Layer::create_anonymous();
//! let prim = layer.create_prim(&Path::parse("/World").unwrap()).unwrap();
//! let rel = prim.create_relationship("lights").unwrap();
//!
//! let targets = rel.target_path_list();
//! targets.add(Path::parse("/World/Key").unwrap()).unwrap();
//! targets.add(Path::parse("Fill").unwrap()).unwrap();
//!
//! assert_eq!(
//!     targets.applied_items(),
//!     vec![Path::parse("/World/Key").unwrap(), Path::parse("/World/Fill").unwrap()],
//! );
//! assert_eq!(rel.target_specs().len(), 2);
//! ```
//!
//! # Modules
//!
//! - [`model`]: Value types ([`ListOp`], [`Reference`], [`Value`], [`NamespaceEdit`])
//! - [`path`]: Scene description paths
//! - [`layer`]: In-memory layer, identities and change batching
//! - [`spec`]: Spec handles and typed specs
//! - [`editor`]: Editors that validate and persist field edits
//! - [`proxy`]: Container-like proxies
//! - [`policy`]: Canonicalization of list items and map entries
//! - [`validate`]: Field schema and value validators
//! - [`error`]: Error types
//!
//! # Concurrency
//!
//! A layer may be read from several threads at once. Mutations of one layer
//! must be serialized by the caller. The identity registry is internally
//! locked and safe to use from any thread.

pub mod editor;
pub mod error;
pub mod layer;
pub mod model;
pub mod path;
pub mod policy;
pub mod proxy;
pub mod spec;
pub mod validate;

// Re-export commonly used types at crate root
pub use editor::{ListEditor, ListOpListEditor, MapEditor, VectorListEditor};
pub use error::{EditError, NamespaceEditDetail, PathParseError};
pub use layer::{Change, ChangeBatch, ChangeBlock, Identity, IdentityRegistry, Layer};
pub use model::{
    BatchNamespaceEdit, ChildIndex, ListItem, ListOp, ListOpType, NamespaceEdit, Reference, Value,
};
pub use path::Path;
pub use policy::{
    IdentityMapPolicy, MapValuePolicy, NameTokenKeyPolicy, PathKeyPolicy, ReferenceTypePolicy,
    RelocatesMapPolicy, SubLayerTypePolicy, TypePolicy,
};
pub use proxy::{
    ChildrenPermission, ChildrenProxy, ChildrenView, ListEditorProxy, ListProxy, MapEditProxy,
};
pub use spec::{AttributeSpec, PrimSpec, RelationshipSpec, Spec, SpecType, TypedSpec};
pub use validate::{fields, schema};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
