//! List operations: explicit or incremental edits to an ordered collection.
//!
//! A list op either replaces a list outright (explicit mode) or describes
//! incremental edits: items to delete, add, prepend, append and reorder.
//!
//! Application order for incremental list ops:
//! 1. deleted
//! 2. added (legacy)
//! 3. prepended
//! 4. appended
//! 5. ordered

use std::fmt;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::EditError;

/// Names one of the six item vectors of a [`ListOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListOpType {
    Explicit,
    Added,
    Deleted,
    Ordered,
    Prepended,
    Appended,
}

impl ListOpType {
    /// All op types, in the order editors visit them.
    pub const ALL: [ListOpType; 6] = [
        ListOpType::Explicit,
        ListOpType::Added,
        ListOpType::Prepended,
        ListOpType::Appended,
        ListOpType::Deleted,
        ListOpType::Ordered,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ListOpType::Explicit => "explicit",
            ListOpType::Added => "added",
            ListOpType::Deleted => "deleted",
            ListOpType::Ordered => "ordered",
            ListOpType::Prepended => "prepended",
            ListOpType::Appended => "appended",
        }
    }
}

impl fmt::Display for ListOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback used to translate items while applying a list op.
///
/// Returning `None` drops the item instead of applying it.
pub type ApplyCallback<'a, T> = dyn Fn(ListOpType, &T) -> Option<T> + 'a;

/// An edit operation on an ordered list of `T`.
///
/// Duplicates within a single vector are tolerated here; editors reject them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListOp<T> {
    is_explicit: bool,
    explicit_items: Vec<T>,
    added_items: Vec<T>,
    prepended_items: Vec<T>,
    appended_items: Vec<T>,
    deleted_items: Vec<T>,
    ordered_items: Vec<T>,
}

impl<T> Default for ListOp<T> {
    fn default() -> Self {
        Self {
            is_explicit: false,
            explicit_items: Vec::new(),
            added_items: Vec::new(),
            prepended_items: Vec::new(),
            appended_items: Vec::new(),
            deleted_items: Vec::new(),
            ordered_items: Vec::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> ListOp<T> {
    /// Creates an empty, non-explicit list op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an explicit list op holding `items`.
    pub fn create_explicit(items: Vec<T>) -> Self {
        Self {
            is_explicit: true,
            explicit_items: items,
            ..Self::default()
        }
    }

    /// Creates an incremental list op from prepended, appended and deleted items.
    pub fn create(prepended: Vec<T>, appended: Vec<T>, deleted: Vec<T>) -> Self {
        Self {
            prepended_items: prepended,
            appended_items: appended,
            deleted_items: deleted,
            ..Self::default()
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.is_explicit
    }

    /// Returns true if this list op would change anything when applied.
    ///
    /// An explicit list op always has keys, even when its list is empty.
    pub fn has_keys(&self) -> bool {
        self.is_explicit
            || !self.added_items.is_empty()
            || !self.prepended_items.is_empty()
            || !self.appended_items.is_empty()
            || !self.deleted_items.is_empty()
            || !self.ordered_items.is_empty()
    }

    /// Returns true if `item` appears in any of the relevant lists.
    pub fn has_item(&self, item: &T) -> bool {
        if self.is_explicit {
            return self.explicit_items.contains(item);
        }
        self.added_items.contains(item)
            || self.prepended_items.contains(item)
            || self.appended_items.contains(item)
            || self.deleted_items.contains(item)
            || self.ordered_items.contains(item)
    }

    pub fn explicit_items(&self) -> &[T] {
        &self.explicit_items
    }

    pub fn added_items(&self) -> &[T] {
        &self.added_items
    }

    pub fn prepended_items(&self) -> &[T] {
        &self.prepended_items
    }

    pub fn appended_items(&self) -> &[T] {
        &self.appended_items
    }

    pub fn deleted_items(&self) -> &[T] {
        &self.deleted_items
    }

    pub fn ordered_items(&self) -> &[T] {
        &self.ordered_items
    }

    /// Returns the vector for `op`, regardless of the explicit flag.
    ///
    /// Callers check [`is_explicit`](Self::is_explicit) first when the mode matters.
    pub fn get_items(&self, op: ListOpType) -> &[T] {
        match op {
            ListOpType::Explicit => &self.explicit_items,
            ListOpType::Added => &self.added_items,
            ListOpType::Deleted => &self.deleted_items,
            ListOpType::Ordered => &self.ordered_items,
            ListOpType::Prepended => &self.prepended_items,
            ListOpType::Appended => &self.appended_items,
        }
    }

    /// Returns the items this list op would contribute to an empty list.
    pub fn applied_items(&self) -> Vec<T> {
        let mut items = Vec::new();
        self.apply_operations(&mut items, None);
        items
    }

    pub fn set_explicit_items(&mut self, items: Vec<T>) {
        self.set_explicit(true);
        self.explicit_items = items;
    }

    pub fn set_added_items(&mut self, items: Vec<T>) {
        self.set_explicit(false);
        self.added_items = items;
    }

    pub fn set_prepended_items(&mut self, items: Vec<T>) {
        self.set_explicit(false);
        self.prepended_items = items;
    }

    pub fn set_appended_items(&mut self, items: Vec<T>) {
        self.set_explicit(false);
        self.appended_items = items;
    }

    pub fn set_deleted_items(&mut self, items: Vec<T>) {
        self.set_explicit(false);
        self.deleted_items = items;
    }

    pub fn set_ordered_items(&mut self, items: Vec<T>) {
        self.set_explicit(false);
        self.ordered_items = items;
    }

    /// Sets the vector for `op`, switching mode (and clearing every other
    /// vector) when `op` does not match the current mode.
    pub fn set_items(&mut self, items: Vec<T>, op: ListOpType) {
        match op {
            ListOpType::Explicit => self.set_explicit_items(items),
            ListOpType::Added => self.set_added_items(items),
            ListOpType::Deleted => self.set_deleted_items(items),
            ListOpType::Ordered => self.set_ordered_items(items),
            ListOpType::Prepended => self.set_prepended_items(items),
            ListOpType::Appended => self.set_appended_items(items),
        }
    }

    /// Removes all items and leaves the list op non-explicit.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Removes all items and leaves the list op explicit.
    pub fn clear_and_make_explicit(&mut self) {
        *self = Self::create_explicit(Vec::new());
    }

    fn set_explicit(&mut self, is_explicit: bool) {
        if is_explicit != self.is_explicit {
            *self = Self {
                is_explicit,
                ..Self::default()
            };
        }
    }

    fn items_mut(&mut self, op: ListOpType) -> &mut Vec<T> {
        match op {
            ListOpType::Explicit => &mut self.explicit_items,
            ListOpType::Added => &mut self.added_items,
            ListOpType::Deleted => &mut self.deleted_items,
            ListOpType::Ordered => &mut self.ordered_items,
            ListOpType::Prepended => &mut self.prepended_items,
            ListOpType::Appended => &mut self.appended_items,
        }
    }

    /// Replaces `n` items starting at `index` in the `op` vector with `new_items`.
    ///
    /// Editing a vector of the other mode is only allowed as a pure insertion
    /// into it, which switches the mode of this list op.
    pub fn replace_operations(
        &mut self,
        op: ListOpType,
        index: usize,
        n: usize,
        new_items: Vec<T>,
    ) -> Result<(), EditError> {
        let needs_mode_switch = self.is_explicit != (op == ListOpType::Explicit);
        if needs_mode_switch && (n > 0 || new_items.is_empty()) {
            return Err(EditError::ModeSwitch {
                op,
                location: "list op".to_string(),
            });
        }

        let mut items = self.get_items(op).to_vec();
        if index > items.len() {
            return Err(EditError::IndexOutOfRange {
                op,
                bound: "start",
                index,
                size: items.len(),
            });
        }
        let Some(end) = index.checked_add(n).filter(|end| *end <= items.len()) else {
            return Err(EditError::IndexOutOfRange {
                op,
                bound: "end",
                index: index.saturating_add(n),
                size: items.len(),
            });
        };
        items.splice(index..end, new_items);
        self.set_items(items, op);
        Ok(())
    }

    /// Applies this list op to `items`.
    ///
    /// When `callback` is given, every item of this list op is passed through
    /// it before being compared or inserted; items it maps to `None` are skipped.
    pub fn apply_operations(&self, items: &mut Vec<T>, callback: Option<&ApplyCallback<'_, T>>) {
        let map = |op: ListOpType, item: &T| match callback {
            Some(cb) => cb(op, item),
            None => Some(item.clone()),
        };

        if self.is_explicit {
            let mut result = Vec::with_capacity(self.explicit_items.len());
            let mut seen = FxHashSet::default();
            for item in &self.explicit_items {
                if let Some(mapped) = map(ListOpType::Explicit, item) {
                    if seen.insert(mapped.clone()) {
                        result.push(mapped);
                    }
                }
            }
            *items = result;
            return;
        }

        // deleted
        let deleted: FxHashSet<T> = self
            .deleted_items
            .iter()
            .filter_map(|item| map(ListOpType::Deleted, item))
            .collect();
        if !deleted.is_empty() {
            items.retain(|item| !deleted.contains(item));
        }

        // added
        for item in &self.added_items {
            if let Some(mapped) = map(ListOpType::Added, item) {
                if !items.contains(&mapped) {
                    items.push(mapped);
                }
            }
        }

        // prepended, visited back to front so the list keeps its order
        for item in self.prepended_items.iter().rev() {
            if let Some(mapped) = map(ListOpType::Prepended, item) {
                if let Some(pos) = items.iter().position(|x| *x == mapped) {
                    items.remove(pos);
                }
                items.insert(0, mapped);
            }
        }

        // appended
        for item in &self.appended_items {
            if let Some(mapped) = map(ListOpType::Appended, item) {
                if let Some(pos) = items.iter().position(|x| *x == mapped) {
                    items.remove(pos);
                }
                items.push(mapped);
            }
        }

        // ordered
        let order: Vec<T> = self
            .ordered_items
            .iter()
            .filter_map(|item| map(ListOpType::Ordered, item))
            .collect();
        reorder(&order, items);
    }

    /// Composes this list op over `inner`, so that applying the result once
    /// is equivalent to applying `inner` and then `self`.
    ///
    /// Returns `None` when either list op uses ordered or added items, since
    /// those do not compose.
    ///
    /// Where both list ops prepend (or append) the same item, this list op's
    /// position for it wins.
    pub fn apply_operations_to(&self, inner: &ListOp<T>) -> Option<ListOp<T>> {
        if self.is_explicit {
            return Some(self.clone());
        }
        if inner.is_explicit {
            let mut items = inner.explicit_items.clone();
            self.apply_operations(&mut items, None);
            return Some(ListOp::create_explicit(items));
        }
        if !self.ordered_items.is_empty()
            || !self.added_items.is_empty()
            || !inner.ordered_items.is_empty()
            || !inner.added_items.is_empty()
        {
            return None;
        }

        let outer_mentions: FxHashSet<&T> = self
            .deleted_items
            .iter()
            .chain(&self.prepended_items)
            .chain(&self.appended_items)
            .collect();
        let outer_adds: FxHashSet<&T> = self
            .prepended_items
            .iter()
            .chain(&self.appended_items)
            .collect();

        let mut prepended = self.prepended_items.clone();
        prepended.extend(
            inner
                .prepended_items
                .iter()
                .filter(|item| !outer_mentions.contains(item))
                .cloned(),
        );

        let mut appended: Vec<T> = inner
            .appended_items
            .iter()
            .filter(|item| !outer_mentions.contains(item))
            .cloned()
            .collect();
        appended.extend(self.appended_items.iter().cloned());

        let mut deleted = Vec::new();
        let mut seen = FxHashSet::default();
        for item in inner
            .deleted_items
            .iter()
            .filter(|item| !outer_adds.contains(item))
            .chain(&self.deleted_items)
        {
            if seen.insert(item) {
                deleted.push(item.clone());
            }
        }

        Some(ListOp::create(prepended, appended, deleted))
    }

    /// Composes the `op` vector of `stronger` over the same vector of this list op.
    pub fn compose_operations(&mut self, stronger: &ListOp<T>, op: ListOpType) {
        if op == ListOpType::Explicit {
            self.set_items(stronger.explicit_items.clone(), op);
            return;
        }

        let mut items = self.get_items(op).to_vec();
        let stronger_items = stronger.get_items(op);
        match op {
            ListOpType::Added | ListOpType::Deleted | ListOpType::Ordered => {
                for item in stronger_items {
                    if !items.contains(item) {
                        items.push(item.clone());
                    }
                }
                if op == ListOpType::Ordered {
                    reorder(stronger_items, &mut items);
                }
            }
            ListOpType::Prepended => {
                for item in stronger_items.iter().rev() {
                    if let Some(pos) = items.iter().position(|x| x == item) {
                        items.remove(pos);
                    }
                    items.insert(0, item.clone());
                }
            }
            ListOpType::Appended => {
                for item in stronger_items {
                    if let Some(pos) = items.iter().position(|x| x == item) {
                        items.remove(pos);
                    }
                    items.push(item.clone());
                }
            }
            ListOpType::Explicit => {}
        }
        self.set_items(items, op);
    }

    /// Rewrites every item of every vector through `callback`.
    ///
    /// Items mapped to `None` are removed; items that collapse onto an
    /// earlier item of the same vector are dropped. Returns true if anything
    /// changed.
    pub fn modify_operations(&mut self, mut callback: impl FnMut(&T) -> Option<T>) -> bool {
        let mut modified = false;
        for op in ListOpType::ALL {
            let items = self.items_mut(op);
            let mut seen = FxHashSet::default();
            let mut changed = false;
            let mut rewritten = Vec::with_capacity(items.len());
            for item in items.iter() {
                match callback(item) {
                    Some(new_item) if seen.insert(new_item.clone()) => {
                        if new_item != *item {
                            changed = true;
                        }
                        rewritten.push(new_item);
                    }
                    _ => changed = true,
                }
            }
            if changed {
                *items = rewritten;
                modified = true;
            }
        }
        modified
    }
}

/// Moves the items named by `order` into that relative order.
///
/// Each ordered item drags along the unordered items that follow it; unordered
/// items that precede every ordered item stay at the front.
fn reorder<T: Clone + Eq + Hash>(order: &[T], items: &mut Vec<T>) {
    let mut unique_order = Vec::with_capacity(order.len());
    let mut order_set = FxHashSet::default();
    for item in order {
        if order_set.insert(item) {
            unique_order.push(item);
        }
    }
    if unique_order.is_empty() {
        return;
    }

    let scratch = std::mem::take(items);
    let mut index: FxHashMap<&T, usize> = FxHashMap::default();
    for (i, item) in scratch.iter().enumerate() {
        index.entry(item).or_insert(i);
    }

    let mut taken = vec![false; scratch.len()];
    let mut result = Vec::with_capacity(scratch.len());
    for item in unique_order {
        let Some(&start) = index.get(item) else {
            continue;
        };
        let mut end = start + 1;
        while end < scratch.len() && !order_set.contains(&scratch[end]) {
            end += 1;
        }
        for i in start..end {
            if !taken[i] {
                taken[i] = true;
                result.push(scratch[i].clone());
            }
        }
    }

    let mut leading: Vec<T> = scratch
        .iter()
        .zip(&taken)
        .filter(|(_, taken)| !**taken)
        .map(|(item, _)| item.clone())
        .collect();
    leading.extend(result);
    *items = leading;
}

impl<T: fmt::Display> fmt::Display for ListOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_list<T: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            label: &str,
            items: &[T],
            first: &mut bool,
        ) -> fmt::Result {
            if items.is_empty() {
                return Ok(());
            }
            if !*first {
                f.write_str(", ")?;
            }
            *first = false;
            write!(f, "{label}: [")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str("]")
        }

        f.write_str("ListOp(")?;
        let mut first = true;
        if self.is_explicit {
            write!(f, "Explicit Items: [")?;
            for (i, item) in self.explicit_items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str("]")?;
        } else {
            write_list(f, "Deleted Items", &self.deleted_items, &mut first)?;
            write_list(f, "Added Items", &self.added_items, &mut first)?;
            write_list(f, "Prepended Items", &self.prepended_items, &mut first)?;
            write_list(f, "Appended Items", &self.appended_items, &mut first)?;
            write_list(f, "Ordered Items", &self.ordered_items, &mut first)?;
        }
        f.write_str(")")
    }
}
