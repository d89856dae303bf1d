//! The slice registry.
//!
//! Slices are keyed by stable element identity, not by object reference,
//! so a remounting DOM node replaces its slice instead of leaving a
//! dangling association.

use crate::executor::SliceFrame;
use common::{ElementId, Rect};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A slice's render callback, invoked with the scissor and viewport
/// already applied. Slices must set any GPU state they depend on; nothing
/// survives between calls.
pub type RenderSlice = Box<dyn FnMut(&mut SliceFrame<'_, '_>) + Send>;

pub(crate) struct SliceEntry {
    pub(crate) token: u64,
    pub(crate) rect: Rect,
    /// Explicit draw order; slices with equal z draw in registration
    /// order.
    pub(crate) z: i32,
    pub(crate) seq: u64,
    pub(crate) render: RenderSlice,
}

pub(crate) struct RegistryInner {
    pub(crate) entries: IndexMap<ElementId, SliceEntry>,
    next_token: u64,
}

/// Registry of every slice sharing the canvas.
#[derive(Clone)]
pub struct SliceRegistry {
    pub(crate) inner: Arc<Mutex<RegistryInner>>,
}

impl SliceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                entries: IndexMap::new(),
                next_token: 0,
            })),
        }
    }

    /// Register a slice for an element. Registering an element that
    /// already has a slice replaces it (idempotent re-registration).
    pub fn register(&self, element: ElementId, rect: Rect, z: i32, render: RenderSlice) -> SliceGuard {
        let mut inner = self.inner.lock();
        let token = inner.next_token;
        inner.next_token += 1;
        let seq = token;

        if inner.entries.contains_key(&element) {
            debug!(?element, "re-registering slice, replacing prior entry");
        }
        inner.entries.insert(
            element,
            SliceEntry {
                token,
                rect,
                z,
                seq,
                render,
            },
        );

        SliceGuard {
            inner: Arc::clone(&self.inner),
            element,
            token,
        }
    }

    /// Remove a slice. No-op when absent.
    pub fn unregister(&self, element: ElementId) {
        let mut inner = self.inner.lock();
        if inner.entries.shift_remove(&element).is_some() {
            debug!(?element, "unregistered slice");
        }
    }

    /// Update a slice's screen rectangle from the latest measurement.
    /// Called each frame for slices whose element moved.
    pub fn set_rect(&self, element: ElementId, rect: Rect) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&element) {
            entry.rect = rect;
        }
    }

    /// Elements with a registered slice, in registration order.
    pub fn elements(&self) -> Vec<ElementId> {
        self.inner.lock().entries.keys().copied().collect()
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.inner.lock().entries.contains_key(&element)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drop every slice. Context-loss recovery and teardown both go
    /// through here: recovery is a full re-registration, never a partial
    /// patch.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl Default for SliceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposer for a slice registration. Idempotent; a stale guard never
/// removes its replacement.
pub struct SliceGuard {
    inner: Arc<Mutex<RegistryInner>>,
    element: ElementId,
    token: u64,
}

impl SliceGuard {
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if inner
            .entries
            .get(&self.element)
            .is_some_and(|entry| entry.token == self.token)
        {
            inner.entries.shift_remove(&self.element);
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }
}
