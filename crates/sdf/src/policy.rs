//! Canonicalization policies for list and map proxies.
//!
//! A [`TypePolicy`] fixes the item type of a list field and maps every item
//! to its canonical form before it is stored or compared; a
//! [`MapValuePolicy`] does the same for the keys and values of a map field.
//! Canonical forms may depend on the owning spec, e.g. relative paths are
//! made absolute against the owner's prim path.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::model::{FieldValue, ListItem, Reference, Value};
use crate::path::Path;
use crate::spec::Spec;

/// Item type and canonicalization for a list field.
pub trait TypePolicy: Send + Sync + 'static {
    type Item: ListItem;

    fn canonicalize(owner: &Spec, item: &Self::Item) -> Self::Item;

    fn canonicalize_items(owner: &Spec, items: &[Self::Item]) -> Vec<Self::Item> {
        items
            .iter()
            .map(|item| Self::canonicalize(owner, item))
            .collect()
    }
}

/// Paths, made absolute against the owner's prim path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathKeyPolicy;

impl TypePolicy for PathKeyPolicy {
    type Item = Path;

    fn canonicalize(owner: &Spec, item: &Path) -> Path {
        absolute_against_owner(owner, item)
    }
}

/// Name tokens; stored as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameTokenKeyPolicy;

impl TypePolicy for NameTokenKeyPolicy {
    type Item = String;

    fn canonicalize(_: &Spec, item: &String) -> String {
        item.clone()
    }
}

/// References; stored as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceTypePolicy;

impl TypePolicy for ReferenceTypePolicy {
    type Item = Reference;

    fn canonicalize(_: &Spec, item: &Reference) -> Reference {
        item.clone()
    }
}

/// Sublayer asset paths; stored as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubLayerTypePolicy;

impl TypePolicy for SubLayerTypePolicy {
    type Item = String;

    fn canonicalize(_: &Spec, item: &String) -> String {
        item.clone()
    }
}

/// Key/value types and canonicalization for a map field.
pub trait MapValuePolicy: Send + Sync + 'static {
    type Key: FieldValue + Clone + Ord + fmt::Debug + Send + Sync + 'static;
    type Mapped: FieldValue + Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    fn canonicalize_key(owner: &Spec, key: &Self::Key) -> Self::Key;

    fn canonicalize_value(owner: &Spec, value: &Self::Mapped) -> Self::Mapped;

    fn canonicalize_pair(
        owner: &Spec,
        key: &Self::Key,
        value: &Self::Mapped,
    ) -> (Self::Key, Self::Mapped) {
        (
            Self::canonicalize_key(owner, key),
            Self::canonicalize_value(owner, value),
        )
    }

    fn map_from_value(value: &Value) -> Option<BTreeMap<Self::Key, Self::Mapped>>;

    fn map_into_value(map: BTreeMap<Self::Key, Self::Mapped>) -> Value;
}

/// Stores keys and values as given.
pub struct IdentityMapPolicy<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> MapValuePolicy for IdentityMapPolicy<K, V>
where
    K: FieldValue + Clone + Ord + fmt::Debug + Send + Sync + 'static,
    V: FieldValue + Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    BTreeMap<K, V>: FieldValue,
{
    type Key = K;
    type Mapped = V;

    fn canonicalize_key(_: &Spec, key: &K) -> K {
        key.clone()
    }

    fn canonicalize_value(_: &Spec, value: &V) -> V {
        value.clone()
    }

    fn map_from_value(value: &Value) -> Option<BTreeMap<K, V>> {
        BTreeMap::from_value(value)
    }

    fn map_into_value(map: BTreeMap<K, V>) -> Value {
        map.into_value()
    }
}

/// Relocation sources and targets, made absolute against the owner's prim
/// path. Empty paths stay empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelocatesMapPolicy;

impl MapValuePolicy for RelocatesMapPolicy {
    type Key = Path;
    type Mapped = Path;

    fn canonicalize_key(owner: &Spec, key: &Path) -> Path {
        absolute_against_owner(owner, key)
    }

    fn canonicalize_value(owner: &Spec, value: &Path) -> Path {
        absolute_against_owner(owner, value)
    }

    fn map_from_value(value: &Value) -> Option<BTreeMap<Path, Path>> {
        BTreeMap::from_value(value)
    }

    fn map_into_value(map: BTreeMap<Path, Path>) -> Value {
        map.into_value()
    }
}

fn absolute_against_owner(owner: &Spec, path: &Path) -> Path {
    if path.is_empty() {
        return Path::empty();
    }
    let anchor = owner.path().prim_path();
    path.make_absolute(&anchor)
        .unwrap_or_else(|| path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_path_policy_uses_owner_prim_path() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Foo")).unwrap();
        let rel = prim.create_relationship("rel").unwrap();

        assert_eq!(PathKeyPolicy::canonicalize(&rel, &p("Bar")), p("/Foo/Bar"));
        assert_eq!(PathKeyPolicy::canonicalize(&rel, &p("../Baz")), p("/Baz"));
        assert_eq!(PathKeyPolicy::canonicalize(&rel, &p("/Abs")), p("/Abs"));
        assert_eq!(
            RelocatesMapPolicy::canonicalize_value(&prim, &Path::empty()),
            Path::empty()
        );
    }

    #[test]
    fn test_unresolvable_paths_are_kept() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Foo")).unwrap();
        assert_eq!(PathKeyPolicy::canonicalize(&prim, &p("../../X")), p("../../X"));
    }
}
