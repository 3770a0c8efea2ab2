use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free rotation over a fixed list of candidates.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { cursor: AtomicUsize::new(0) }
    }

    /// Next index in `0..len`. Returns 0 for an empty list.
    pub fn next(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.cursor
            .fetch_add(1, Ordering::Relaxed)
            .checked_rem(len)
            .unwrap_or(0)
    }

    /// Next candidate, or `None` when `items` is empty.
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        items.get(self.next(items.len()))
    }
}
