//! Dependent spec maintenance for attribute connections and relationship
//! targets.
//!
//! Each path in the explicit or added list of a connection or target list
//! has a child spec at `<owner>[<path>]`. Prepends, appends, deletes and
//! reorders only express opinions about ordering or upstream items, so they
//! leave the child specs alone.

use crate::layer::Layer;
use crate::model::{ListItem, ListOp, ListOpType};
use crate::path::Path;
use crate::spec::SpecType;

/// Creates and deletes `spec_type` children of `owner_path` so they match
/// the change of the `op` list from `old` to `new`.
///
/// Failures are logged and the remaining items are still processed.
pub(crate) fn sync_dependent_specs<T: ListItem>(
    layer: &Layer,
    owner_path: &Path,
    spec_type: SpecType,
    op: ListOpType,
    old: &ListOp<T>,
    new: &ListOp<T>,
) {
    if !matches!(op, ListOpType::Explicit | ListOpType::Added) {
        return;
    }
    let old_items = old.get_items(op);
    let new_items = new.get_items(op);
    let still_listed =
        |item: &T| new.explicit_items().contains(item) || new.added_items().contains(item);

    for item in old_items.iter().filter(|item| !new_items.contains(item)) {
        if still_listed(item) {
            continue;
        }
        let Some(spec_path) = dependent_path(owner_path, item) else {
            continue;
        };
        if !layer.has_spec(&spec_path) {
            continue;
        }
        match layer.delete_spec(&spec_path) {
            Ok(()) => tracing::debug!(path = %spec_path, "removed {spec_type} spec"),
            Err(e) => tracing::warn!(path = %spec_path, error = %e, "failed to remove {spec_type} spec"),
        }
    }

    for item in new_items.iter().filter(|item| !old_items.contains(item)) {
        let Some(spec_path) = dependent_path(owner_path, item) else {
            tracing::warn!(owner = %owner_path, item = %item, "no {spec_type} spec path for item");
            continue;
        };
        if layer.has_spec(&spec_path) {
            continue;
        }
        if let Err(e) = layer.create_spec(&spec_path, spec_type) {
            tracing::warn!(path = %spec_path, error = %e, "failed to create {spec_type} spec");
        }
    }
}

fn dependent_path<T: ListItem>(owner_path: &Path, item: &T) -> Option<Path> {
    owner_path.append_target(item.as_path()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::ListEditor;
    use crate::policy::PathKeyPolicy;
    use crate::spec::TypedSpec;
    use crate::validate::fields;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_added_targets_create_and_remove_specs() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let rel = prim.create_relationship("rel").unwrap();
        let editor: ListEditor<PathKeyPolicy> =
            ListEditor::relationship_targets(rel.as_spec().clone());

        editor
            .replace_edits(ListOpType::Added, 0, 0, vec![p("/A"), p("B")])
            .unwrap();
        assert!(layer.has_spec(&p("/Prim.rel[/A]")));
        assert!(layer.has_spec(&p("/Prim.rel[/Prim/B]")));

        editor.replace_edits(ListOpType::Added, 0, 1, Vec::new()).unwrap();
        assert!(!layer.has_spec(&p("/Prim.rel[/A]")));
        assert!(layer.has_spec(&p("/Prim.rel[/Prim/B]")));
    }

    #[test]
    fn test_prepends_do_not_touch_specs() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let attr = prim.create_attribute("size").unwrap();
        let editor: ListEditor<PathKeyPolicy> =
            ListEditor::attribute_connections(attr.as_spec().clone());

        editor
            .replace_edits(ListOpType::Prepended, 0, 0, vec![p("/Src.out")])
            .unwrap();
        assert!(!layer.has_spec(&p("/Prim.size[/Src.out]")));
        assert!(layer.has_field(&p("/Prim.size"), fields::CONNECTION_PATHS));
    }

    #[test]
    fn test_mode_switch_keeps_still_listed_specs() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let rel = prim.create_relationship("rel").unwrap();
        let owner = rel.path();

        let old = ListOp::create_explicit(vec![p("/A")]);
        sync_dependent_specs(
            &layer,
            &owner,
            SpecType::RelationshipTarget,
            ListOpType::Explicit,
            &ListOp::new(),
            &old,
        );
        assert!(layer.has_spec(&p("/Prim.rel[/A]")));

        let mut new = ListOp::new();
        new.set_added_items(vec![p("/A")]);
        sync_dependent_specs(
            &layer,
            &owner,
            SpecType::RelationshipTarget,
            ListOpType::Explicit,
            &old,
            &new,
        );
        assert!(layer.has_spec(&p("/Prim.rel[/A]")));
    }

    #[test]
    fn test_failures_do_not_stop_processing() {
        let layer = Layer::create_anonymous();
        let prim = layer.create_prim(&p("/Prim")).unwrap();
        let rel = prim.create_relationship("rel").unwrap();
        let owner = rel.path();

        let new = ListOp::create_explicit(vec![Path::empty(), p("/B")]);
        sync_dependent_specs(
            &layer,
            &owner,
            SpecType::RelationshipTarget,
            ListOpType::Explicit,
            &ListOp::new(),
            &new,
        );
        assert!(layer.has_spec(&p("/Prim.rel[/B]")));
    }
}
