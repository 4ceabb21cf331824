//! Namespace edits: renaming, reparenting, reordering and removing specs.
//!
//! A [`BatchNamespaceEdit`] is an ordered list of [`NamespaceEdit`]s. The
//! paths of each edit are in the namespace left behind by the edits before
//! it, so a batch is checked by replaying it over a simulated namespace
//! before anything is applied.

use std::fmt;

use crate::error::NamespaceEditDetail;
use crate::path::Path;

/// Where an edited spec lands among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildIndex {
    /// Keep the current position. A reparented spec goes last.
    #[default]
    Same,
    End,
    At(usize),
}

impl fmt::Display for ChildIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildIndex::Same => f.write_str("same"),
            ChildIndex::End => f.write_str("end"),
            ChildIndex::At(index) => write!(f, "{index}"),
        }
    }
}

/// Moves the prim or property at `current_path` to `new_path`, or removes it
/// when `new_path` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEdit {
    pub current_path: Path,
    pub new_path: Option<Path>,
    pub index: ChildIndex,
}

impl NamespaceEdit {
    pub fn new(current_path: Path, new_path: Option<Path>, index: ChildIndex) -> Self {
        Self {
            current_path,
            new_path,
            index,
        }
    }

    pub fn remove(current_path: Path) -> Self {
        Self::new(current_path, None, ChildIndex::Same)
    }

    /// Renames the object in place. `None` if `name` is not a valid name for it.
    pub fn rename(current_path: Path, name: &str) -> Option<Self> {
        let parent = current_path.parent_path();
        let new_path = sibling_path(&current_path, &parent, name)?;
        Some(Self::new(current_path, Some(new_path), ChildIndex::Same))
    }

    /// Moves the object to `index` among its current siblings.
    pub fn reorder(current_path: Path, index: ChildIndex) -> Self {
        let new_path = current_path.clone();
        Self::new(current_path, Some(new_path), index)
    }

    /// Moves the object under `new_parent`, keeping its name.
    pub fn reparent(current_path: Path, new_parent: &Path, index: ChildIndex) -> Option<Self> {
        let name = current_path.name().to_string();
        Self::reparent_and_rename(current_path, new_parent, &name, index)
    }

    pub fn reparent_and_rename(
        current_path: Path,
        new_parent: &Path,
        name: &str,
        index: ChildIndex,
    ) -> Option<Self> {
        let new_path = sibling_path(&current_path, new_parent, name)?;
        Some(Self::new(current_path, Some(new_path), index))
    }

    pub fn is_removal(&self) -> bool {
        self.new_path.is_none()
    }
}

fn sibling_path(current: &Path, parent: &Path, name: &str) -> Option<Path> {
    if current.is_property_path() {
        parent.append_property(name)
    } else {
        parent.append_child(name)
    }
}

impl fmt::Display for NamespaceEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.new_path {
            Some(new_path) => write!(f, "(<{}>, <{new_path}>, {})", self.current_path, self.index),
            None => write!(f, "(<{}>, removed)", self.current_path),
        }
    }
}

/// An ordered sequence of namespace edits, checked and applied as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchNamespaceEdit {
    edits: Vec<NamespaceEdit>,
}

impl BatchNamespaceEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edits(edits: Vec<NamespaceEdit>) -> Self {
        Self { edits }
    }

    pub fn add(&mut self, edit: NamespaceEdit) {
        self.edits.push(edit);
    }

    pub fn edits(&self) -> &[NamespaceEdit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Replays the batch over a simulated namespace.
    ///
    /// `has_object` answers for paths of the unedited namespace. `can_edit`
    /// gets each edit translated back to the unedited namespace and returns
    /// the reason it is not allowed. On success, returns the edits that
    /// change anything: no-op moves and removals of already removed objects
    /// are dropped. On failure, names the first edit that cannot be applied.
    pub fn process(
        &self,
        has_object: impl Fn(&Path) -> bool,
        can_edit: impl Fn(&NamespaceEdit) -> Result<(), String>,
    ) -> Result<Vec<NamespaceEdit>, NamespaceEditDetail> {
        let mut namespace = SimulatedNamespace::default();
        let mut processed = Vec::with_capacity(self.edits.len());

        for edit in &self.edits {
            let fail = |reason: &str| NamespaceEditDetail::new(edit.clone(), reason);
            let current = &edit.current_path;

            let is_prim = current.is_absolute() && current.is_prim_path();
            let is_property = current.is_absolute() && current.is_property_path();
            if !is_prim && !is_property {
                return Err(fail("unsupported object type"));
            }
            if let Some(new_path) = &edit.new_path {
                let matches = new_path.is_absolute()
                    && if is_prim {
                        new_path.is_prim_path()
                    } else {
                        new_path.is_property_path()
                    };
                if !matches {
                    return Err(fail("path type mismatch"));
                }
            }

            let from = match namespace.origin(current) {
                Origin::At(path) => path,
                Origin::Removed if edit.is_removal() => continue,
                Origin::Removed => return Err(fail("object was removed")),
                Origin::Vacated => return Err(fail("object does not exist")),
            };
            if !has_object(&from) {
                return Err(fail("object does not exist"));
            }

            let to = match &edit.new_path {
                None => None,
                Some(new_path) => {
                    if new_path == current && edit.index == ChildIndex::Same {
                        continue;
                    }
                    let new_parent = new_path.parent_path();
                    let to_parent = match namespace.origin(&new_parent) {
                        Origin::At(path) => path,
                        Origin::Removed => return Err(fail("new parent was removed")),
                        Origin::Vacated => return Err(fail("new parent does not exist")),
                    };
                    if !has_object(&to_parent) {
                        return Err(fail("new parent does not exist"));
                    }
                    if new_path != current {
                        if current.has_prefix(new_path) {
                            return Err(fail("object cannot be an ancestor of itself"));
                        }
                        if new_path.has_prefix(current) {
                            return Err(fail("object cannot be a descendant of itself"));
                        }
                        if let Origin::At(existing) = namespace.origin(new_path) {
                            if has_object(&existing) {
                                return Err(fail("object already exists"));
                            }
                        }
                    }
                    Some(new_path.replace_prefix(&new_parent, &to_parent))
                }
            };

            can_edit(&NamespaceEdit::new(from, to, edit.index)).map_err(|reason| fail(&reason))?;
            namespace.record(current, edit.new_path.as_ref());
            processed.push(edit.clone());
        }
        Ok(processed)
    }
}

impl From<Vec<NamespaceEdit>> for BatchNamespaceEdit {
    fn from(edits: Vec<NamespaceEdit>) -> Self {
        Self::from_edits(edits)
    }
}

enum Origin {
    /// The object now at the path was at this path before the batch.
    At(Path),
    Removed,
    /// The object that was here has moved away.
    Vacated,
}

/// The moves and removals replayed so far, oldest first.
#[derive(Default)]
struct SimulatedNamespace {
    moves: Vec<(Path, Option<Path>)>,
}

impl SimulatedNamespace {
    fn origin(&self, path: &Path) -> Origin {
        let mut path = path.clone();
        for (old, new) in self.moves.iter().rev() {
            match new {
                Some(new) if path.has_prefix(new) => path = path.replace_prefix(new, old),
                Some(_) if path.has_prefix(old) => return Origin::Vacated,
                None if path.has_prefix(old) => return Origin::Removed,
                _ => {}
            }
        }
        Origin::At(path)
    }

    fn record(&mut self, from: &Path, to: Option<&Path>) {
        if to != Some(from) {
            self.moves.push((from.clone(), to.cloned()));
        }
    }
}
