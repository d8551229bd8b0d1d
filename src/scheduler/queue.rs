//! Ready-to-run ordering structure.
//!
//! Holds lightweight handles, never the task records themselves; the
//! scheduler's table stays the single source of truth. Ordering is priority
//! value ascending, then due-time ascending, then insertion sequence, so
//! ordering among otherwise-equal tasks is deterministic FIFO.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::task::{TaskPriority, TaskRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    priority: TaskPriority,
    /// Due-time in epoch ms; tasks without one sort first (0)
    due_ms: i64,
    /// Insertion sequence, the final tiebreak
    seq: u64,
    id: String,
}

impl QueueEntry {
    fn key(&self) -> (u8, i64, u64) {
        (self.priority.value(), self.due_ms, self.seq)
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest key on top.
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of pending task ids.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: BinaryHeap<QueueEntry>,
    queued: HashSet<String>,
    next_seq: u64,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pending task's handle.
    ///
    /// Idempotent against duplicates: returns false if an entry for this id
    /// is already live.
    pub fn enqueue(&mut self, task: &TaskRecord) -> bool {
        if !self.queued.insert(task.id.clone()) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry {
            priority: task.priority,
            due_ms: task.due_at.map(|t| t.timestamp_millis()).unwrap_or(0),
            seq,
            id: task.id.clone(),
        });
        true
    }

    /// Pop the highest-priority, earliest-due task id.
    pub fn pop(&mut self) -> Option<String> {
        let entry = self.heap.pop()?;
        self.queued.remove(&entry.id);
        Some(entry.id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.queued.contains(id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::NewTask;
    use chrono::{Duration, Utc};

    fn task(caption: &str, priority: TaskPriority) -> TaskRecord {
        TaskRecord::new(NewTask::new("tiktok", format!("{caption}.mp4"), caption).with_priority(priority))
    }

    #[test]
    fn test_pop_empty() {
        let mut queue = ReadyQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_priority_order() {
        let mut queue = ReadyQueue::new();
        let low = task("low", TaskPriority::Low);
        let urgent = task("urgent", TaskPriority::Urgent);
        let normal = task("normal", TaskPriority::Normal);
        let high = task("high", TaskPriority::High);

        // Enqueue in scrambled order
        queue.enqueue(&low);
        queue.enqueue(&normal);
        queue.enqueue(&urgent);
        queue.enqueue(&high);

        assert_eq!(queue.pop(), Some(urgent.id));
        assert_eq!(queue.pop(), Some(high.id));
        assert_eq!(queue.pop(), Some(normal.id));
        assert_eq!(queue.pop(), Some(low.id));
    }

    #[test]
    fn test_due_time_breaks_priority_ties() {
        let mut queue = ReadyQueue::new();
        let now = Utc::now();

        let mut later = task("later", TaskPriority::Normal);
        later.due_at = Some(now + Duration::minutes(10));
        let mut sooner = task("sooner", TaskPriority::Normal);
        sooner.due_at = Some(now + Duration::minutes(1));

        queue.enqueue(&later);
        queue.enqueue(&sooner);

        assert_eq!(queue.pop(), Some(sooner.id));
        assert_eq!(queue.pop(), Some(later.id));
    }

    #[test]
    fn test_fifo_when_fully_tied() {
        let mut queue = ReadyQueue::new();
        let first = task("first", TaskPriority::Normal);
        let second = task("second", TaskPriority::Normal);
        let third = task("third", TaskPriority::Normal);

        queue.enqueue(&first);
        queue.enqueue(&second);
        queue.enqueue(&third);

        assert_eq!(queue.pop(), Some(first.id));
        assert_eq!(queue.pop(), Some(second.id));
        assert_eq!(queue.pop(), Some(third.id));
    }

    #[test]
    fn test_duplicate_enqueue_is_noop() {
        let mut queue = ReadyQueue::new();
        let record = task("only", TaskPriority::Normal);

        assert!(queue.enqueue(&record));
        assert!(!queue.enqueue(&record));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.pop(), Some(record.id.clone()));
        assert!(queue.pop().is_none());

        // After a pop, the id may be enqueued again (retry path)
        assert!(queue.enqueue(&record));
    }

    #[test]
    fn test_contains_tracks_live_entries() {
        let mut queue = ReadyQueue::new();
        let record = task("tracked", TaskPriority::High);

        assert!(!queue.contains(&record.id));
        queue.enqueue(&record);
        assert!(queue.contains(&record.id));
        queue.pop();
        assert!(!queue.contains(&record.id));
    }

    #[test]
    fn test_undated_sorts_before_dated_at_equal_priority() {
        let mut queue = ReadyQueue::new();
        let mut dated = task("dated", TaskPriority::Normal);
        dated.due_at = Some(Utc::now());
        let undated = task("undated", TaskPriority::Normal);

        queue.enqueue(&dated);
        queue.enqueue(&undated);

        assert_eq!(queue.pop(), Some(undated.id));
    }
}
