//! Stable identities for spec paths.
//!
//! An [`Identity`] tracks a spec across namespace edits: when the layer moves
//! a spec, every identity for it (and for its descendants) follows the move.
//! All live identities for the same path share one registry slot, so two
//! handles for the same spec compare equal. When the last handle for a slot
//! is dropped the slot is recycled with a new generation, so stale handles
//! can never alias a later spec.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::path::Path;

#[derive(Debug, Default)]
struct Slot {
    path: Path,
    generation: u64,
    refs: usize,
}

#[derive(Debug, Default)]
struct Registry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    by_path: FxHashMap<Path, usize>,
}

impl Registry {
    fn release(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        slot.refs -= 1;
        if slot.refs > 0 {
            return;
        }
        let path = std::mem::take(&mut slot.path);
        slot.generation += 1;
        if self.by_path.get(&path) == Some(&index) {
            self.by_path.remove(&path);
        }
        self.free.push(index);
    }
}

/// Hands out one shared identity per live path of a layer.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity for `path`, creating it if no live handle exists.
    pub fn identify(&self, path: &Path) -> Identity {
        let mut registry = self.inner.lock();
        let index = match registry.by_path.get(path) {
            Some(&index) => {
                registry.slots[index].refs += 1;
                index
            }
            None => {
                let index = match registry.free.pop() {
                    Some(index) => index,
                    None => {
                        registry.slots.push(Slot::default());
                        registry.slots.len() - 1
                    }
                };
                let slot = &mut registry.slots[index];
                slot.path = path.clone();
                slot.refs = 1;
                registry.by_path.insert(path.clone(), index);
                index
            }
        };
        Identity {
            registry: Arc::clone(&self.inner),
            index,
            generation: registry.slots[index].generation,
        }
    }

    /// Moves the identity at `old` and every identity below it to the
    /// corresponding paths under `new`.
    ///
    /// Identities already registered at a destination path are detached:
    /// their path becomes empty.
    pub fn move_identity(&self, old: &Path, new: &Path) {
        if old == new {
            return;
        }
        let mut registry = self.inner.lock();
        let moving: Vec<(Path, usize)> = registry
            .by_path
            .iter()
            .filter(|(path, _)| path.has_prefix(old))
            .map(|(path, &index)| (path.clone(), index))
            .collect();
        for (path, _) in &moving {
            registry.by_path.remove(path);
        }
        for (path, index) in moving {
            let moved = path.replace_prefix(old, new);
            if let Some(displaced) = registry.by_path.insert(moved.clone(), index) {
                registry.slots[displaced].path = Path::empty();
            }
            registry.slots[index].path = moved;
        }
    }

    /// Number of paths with at least one live identity.
    pub fn live_count(&self) -> usize {
        self.inner.lock().by_path.len()
    }
}

/// A handle to the identity of one spec path.
pub struct Identity {
    registry: Arc<Mutex<Registry>>,
    index: usize,
    generation: u64,
}

impl Identity {
    /// The current path of this identity; empty once it has been displaced.
    pub fn path(&self) -> Path {
        self.registry.lock().slots[self.index].path.clone()
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        self.registry.lock().slots[self.index].refs += 1;
        Self {
            registry: Arc::clone(&self.registry),
            index: self.index,
            generation: self.generation,
        }
    }
}

impl Drop for Identity {
    fn drop(&mut self) {
        self.registry.lock().release(self.index);
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
            && self.index == other.index
            && self.generation == other.generation
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("path", &self.path())
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn p(text: &str) -> Path {
        Path::parse(text).unwrap()
    }

    #[test]
    fn test_same_path_shares_identity() {
        let registry = IdentityRegistry::new();
        let a = registry.identify(&p("/A"));
        let b = registry.identify(&p("/A"));
        let c = registry.identify(&p("/C"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_new_identity_after_last_drop() {
        let registry = IdentityRegistry::new();
        let first = registry.identify(&p("/A"));
        let copy = first.clone();
        drop(first);
        assert_eq!(registry.live_count(), 1);
        let generation = copy.generation;
        drop(copy);
        assert_eq!(registry.live_count(), 0);

        let second = registry.identify(&p("/A"));
        assert_eq!(second.index, 0);
        assert_ne!(second.generation, generation);
    }

    #[test]
    fn test_move_follows_subtree_and_displaces() {
        let registry = IdentityRegistry::new();
        let parent = registry.identify(&p("/A"));
        let child = registry.identify(&p("/A/B.rel[/A/C]"));
        let occupant = registry.identify(&p("/X"));

        registry.move_identity(&p("/A"), &p("/X"));
        assert_eq!(parent.path(), p("/X"));
        assert_eq!(child.path(), p("/X/B.rel[/X/C]"));
        assert!(occupant.path().is_empty());
        assert_eq!(registry.identify(&p("/X")), parent);

        // The displaced slot must not clobber the moved one when dropped.
        drop(occupant);
        assert_eq!(registry.identify(&p("/X")), parent);
    }

    #[test]
    fn test_concurrent_identify_is_unique() {
        let registry = IdentityRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..100)
                        .map(|i| registry.identify(&p(&format!("/P{}", i % 10))))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let identities: Vec<Vec<Identity>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        for path_index in 0..10 {
            let expected = &identities[0][path_index];
            for per_thread in &identities {
                assert_eq!(&per_thread[path_index], expected);
            }
        }
        assert_eq!(registry.live_count(), 10);
    }
}
