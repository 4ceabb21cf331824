//! Change notification and change blocks.
//!
//! Every mutation of a layer records a [`Change`]. Outside of a change block
//! each change is delivered to listeners as its own [`ChangeBatch`]; inside
//! one, changes accumulate until the outermost block is dropped and are then
//! delivered together.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::path::Path;

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    FieldChanged { path: Path, field: &'static str },
    SpecAdded { path: Path },
    SpecRemoved { path: Path },
    SpecMoved { old_path: Path, new_path: Path },
}

/// The changes delivered to listeners in one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub changes: Vec<Change>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns true if the batch changed `field` on the spec at `path`.
    pub fn touches_field(&self, path: &Path, field: &str) -> bool {
        self.changes.iter().any(|change| {
            matches!(change, Change::FieldChanged { path: p, field: f } if p == path && *f == field)
        })
    }
}

pub type ChangeListener = Arc<dyn Fn(&ChangeBatch) + Send + Sync>;

#[derive(Debug, Default)]
struct BlockState {
    depth: usize,
    pending: Vec<Change>,
}

/// Collects changes and delivers them to subscribed listeners.
#[derive(Default)]
pub(crate) struct ChangeManager {
    state: Mutex<BlockState>,
    listeners: RwLock<Vec<ChangeListener>>,
    batches: AtomicU64,
}

impl ChangeManager {
    pub(crate) fn subscribe(&self, listener: ChangeListener) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn record(&self, change: Change) {
        let mut state = self.state.lock();
        if state.depth > 0 {
            state.pending.push(change);
            return;
        }
        drop(state);
        self.dispatch(ChangeBatch {
            changes: vec![change],
        });
    }

    pub(crate) fn open(&self) {
        self.state.lock().depth += 1;
    }

    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.depth -= 1;
        if state.depth > 0 || state.pending.is_empty() {
            return;
        }
        let changes = std::mem::take(&mut state.pending);
        drop(state);
        self.dispatch(ChangeBatch { changes });
    }

    pub(crate) fn batch_count(&self) -> u64 {
        self.batches.load(Ordering::Acquire)
    }

    fn dispatch(&self, batch: ChangeBatch) {
        self.batches.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(changes = batch.changes.len(), "delivering change batch");
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(&batch);
        }
    }
}

/// Groups layer mutations into a single notification until dropped.
///
/// Blocks nest; only the outermost one delivers.
#[must_use = "changes are delivered when the block is dropped"]
pub struct ChangeBlock<'a> {
    manager: &'a ChangeManager,
}

impl<'a> ChangeBlock<'a> {
    pub(crate) fn new(manager: &'a ChangeManager) -> Self {
        manager.open();
        Self { manager }
    }
}

impl Drop for ChangeBlock<'_> {
    fn drop(&mut self) {
        self.manager.close();
    }
}
