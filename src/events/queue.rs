//! Date-ordered event queue
//!
//! A min-heap keyed by `(trigger_date, sequence)`. The sequence number is
//! assigned on insertion, so events sharing a trigger date pop in the order
//! they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use super::Event;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub sequence: u64,
    pub event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.event.trigger_date == other.event.trigger_date && self.sequence == other.sequence
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .event
            .trigger_date
            .cmp(&self.event.trigger_date)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedEvent { sequence, event });
    }

    pub fn peek(&self) -> Option<&Event> {
        self.heap.peek().map(|queued| &queued.event)
    }

    pub fn peek_date(&self) -> Option<i64> {
        self.peek().map(|event| event.trigger_date)
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|queued| queued.event)
    }

    /// Pops the next event when it is due on or before `date`.
    pub fn pop_due(&mut self, date: i64) -> Option<Event> {
        if self.peek_date().is_some_and(|trigger| trigger <= date) {
            self.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Queued events in pop order.
    pub fn entries(&self) -> Vec<QueuedEvent> {
        let mut entries: Vec<QueuedEvent> = self.heap.iter().cloned().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }

    /// Rebuilds a queue from persisted entries, keeping their sequence numbers.
    pub fn restore(entries: Vec<QueuedEvent>, next_sequence: u64) -> Self {
        let floor = entries
            .iter()
            .map(|queued| queued.sequence + 1)
            .max()
            .unwrap_or(0);
        Self {
            heap: entries.into_iter().collect(),
            next_sequence: next_sequence.max(floor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::EventKind, group::GroupId, terrain::CellPos};

    fn update(date: i64, group: u64) -> Event {
        Event::new(EventKind::Update, date, GroupId::new(group), CellPos::new(1, 1))
    }

    #[test]
    fn pops_by_date_then_insertion_order() {
        let mut queue = EventQueue::new();
        queue.push(update(100, 1));
        queue.push(update(50, 2));
        queue.push(update(50, 3));

        let order: Vec<(i64, u64)> = std::iter::from_fn(|| queue.pop())
            .map(|e| (e.trigger_date, e.group.raw()))
            .collect();
        assert_eq!(order, vec![(50, 2), (50, 3), (100, 1)]);
    }

    #[test]
    fn pop_due_respects_date() {
        let mut queue = EventQueue::new();
        queue.push(update(100, 1));
        assert!(queue.pop_due(99).is_none());
        assert!(queue.pop_due(100).is_some());
        assert!(queue.is_empty());
    }

    #[test]
    fn restore_preserves_tie_order() {
        let mut queue = EventQueue::new();
        for group in 1..=5 {
            queue.push(update(10, group));
        }
        queue.pop();

        let json = serde_json::to_string(&queue.entries()).expect("serialize");
        let entries: Vec<QueuedEvent> = serde_json::from_str(&json).expect("deserialize");
        let mut restored = EventQueue::restore(entries, queue.next_sequence());
        assert_eq!(restored.next_sequence(), 5);

        restored.push(update(10, 9));
        let order: Vec<u64> = std::iter::from_fn(|| restored.pop())
            .map(|e| e.group.raw())
            .collect();
        assert_eq!(order, vec![2, 3, 4, 5, 9]);
    }
}
