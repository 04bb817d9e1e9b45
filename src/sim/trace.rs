/// Diagnostic trace ring: fixed capacity, oldest entry overwritten first.
///
/// Writes never block and never grow memory. The game loop keeps one of
/// these and dumps it to the debug log when it exits.

use std::fmt;

use crate::domain::action::Action;

pub struct TraceRing<T> {
    entries: Vec<T>,
    capacity: usize,
    /// Slot the next push writes to once the ring is full.
    next: usize,
}

impl<T> TraceRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        TraceRing { entries: Vec::with_capacity(capacity), capacity, next: 0 }
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            self.entries[self.next] = entry;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let split = if self.entries.len() < self.capacity { 0 } else { self.next };
        let (newer, older) = self.entries.split_at(split);
        older.iter().chain(newer.iter())
    }

    pub fn latest(&self) -> Option<&T> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = (self.next + self.capacity - 1) % self.capacity;
        self.entries.get(idx)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraceKind {
    Enter,
    KeyState,
    Action,
    Exit,
}

/// One game loop record: input flags, runner position and the action.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TraceEntry {
    pub kind: TraceKind,
    pub key_pressed: bool,
    pub key_processed: bool,
    pub x: i32,
    pub y: i32,
    pub action: Action,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<8} pressed={} processed={} pos=({},{}) {:?}",
            format!("{:?}", self.kind),
            u8::from(self.key_pressed),
            u8::from(self.key_processed),
            self.x,
            self.y,
            self.action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn partially_filled_ring_keeps_insertion_order() {
        let mut ring = TraceRing::new(4);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(ring.latest(), Some(&2));
    }

    #[test]
    fn full_ring_overwrites_oldest() {
        let mut ring = TraceRing::new(3);
        for i in 0..5 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(ring.latest(), Some(&4));
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let mut ring = TraceRing::new(0);
        ring.push('a');
        ring.push('b');
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec!['b']);
    }

    #[test]
    fn empty_ring() {
        let ring: TraceRing<u8> = TraceRing::new(2);
        assert!(ring.is_empty());
        assert_eq!(ring.latest(), None);
        assert_eq!(ring.iter().count(), 0);
    }

    proptest! {
        #[test]
        fn holds_most_recent_in_order(cap in 1usize..40, n in 0usize..200) {
            let mut ring = TraceRing::new(cap);
            for i in 0..n {
                ring.push(i);
            }
            let expected: Vec<usize> = (n.saturating_sub(cap)..n).collect();
            prop_assert_eq!(ring.iter().copied().collect::<Vec<_>>(), expected);
        }
    }
}
