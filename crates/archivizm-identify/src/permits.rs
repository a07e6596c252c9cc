//! Counting semaphore bounding concurrent tool processes.

use crossbeam_channel::{Receiver, Sender, bounded};

/// Fixed pool of permits; each running tool process holds one.
#[derive(Debug, Clone)]
pub struct ToolPermits {
    tx: Sender<()>,
    rx: Receiver<()>,
    capacity: usize,
}

impl ToolPermits {
    /// Create a pool with `capacity` permits (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        for _ in 0..capacity {
            // Cannot fail: the channel has exactly `capacity` free slots.
            let _ = tx.send(());
        }
        Self { tx, rx, capacity }
    }

    /// Block until a permit is free.
    pub fn acquire(&self) -> Permit<'_> {
        // We hold a sender, so the channel never disconnects.
        let _ = self.rx.recv();
        Permit { tx: &self.tx }
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        self.rx.try_recv().ok().map(|()| Permit { tx: &self.tx })
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    /// Total number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A held permit. Returned to the pool on drop.
#[derive(Debug)]
pub struct Permit<'a> {
    tx: &'a Sender<()>,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.tx.send(());
    }
}
