//! Cooperative cancellation tokens.
//!
//! A [`Trapdoor`] identifies one node (or any other blocking caller). Every
//! blocking [`RingBuffer`](crate::RingBuffer) call takes the caller's trapdoor
//! and returns [`Bail`](crate::Bail) once that trapdoor has been opened on the
//! buffer, so a parked thread can be released without a fictitious write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a trapdoor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrapdoorId(u64);

impl TrapdoorId {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Cancellation token shared between a node and its thread.
///
/// Cloning shares the same identity and flag.
#[derive(Debug, Clone)]
pub struct Trapdoor {
    id: TrapdoorId,
    open: Arc<AtomicBool>,
}

impl Default for Trapdoor {
    fn default() -> Self {
        Self::new()
    }
}

impl Trapdoor {
    /// Creates a closed trapdoor with a fresh identity.
    pub fn new() -> Self {
        Self {
            id: TrapdoorId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// This trapdoor's identity.
    #[inline]
    pub fn id(&self) -> TrapdoorId {
        self.id
    }

    /// Marks the token open. Buffers must be told separately via
    /// [`RingBuffer::open_trapdoor`](crate::RingBuffer::open_trapdoor) so
    /// their waiters are woken.
    pub fn set_open(&self) {
        self.open.store(true, Ordering::Release);
    }

    /// Marks the token closed again.
    pub fn set_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Returns true once opened; polled by waits that do not sleep on a
    /// ring buffer condition variable.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_clones_share_state() {
        let a = Trapdoor::new();
        let b = Trapdoor::new();
        assert_ne!(a.id(), b.id());

        let a2 = a.clone();
        assert_eq!(a.id(), a2.id());
        a.set_open();
        assert!(a2.is_open());
        a2.set_closed();
        assert!(!a.is_open());
    }
}
