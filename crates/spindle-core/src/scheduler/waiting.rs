//! Priority-ordered waiting collection.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::domain::Task;

/// Heap entry. Ordered so that `BinaryHeap::pop` yields the highest
/// priority first and, among equal priorities, the lowest arrival sequence.
struct Waiting {
    priority: i64,
    seq: u64,
    task: Task,
}

impl PartialEq for Waiting {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Waiting {}

impl PartialOrd for Waiting {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiting {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse on seq: earlier arrivals win ties.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Tasks waiting for admission.
///
/// The arrival sequence is assigned by `push` itself, so callers that
/// serialize access (the scheduler's state mutex) get FIFO tie-breaking in
/// exactly the order their pushes were applied.
#[derive(Default)]
pub(crate) struct WaitingQueue {
    heap: BinaryHeap<Waiting>,
    next_seq: u64,
}

impl WaitingQueue {
    pub(crate) fn push(&mut self, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Waiting {
            priority: task.priority(),
            seq,
            task,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<Task> {
        self.heap.pop().map(|entry| entry.task)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executable::from_fn;

    fn task(title: &str, priority: i64) -> Task {
        Task::new(title, priority, from_fn(title.to_string(), || async { Ok(()) }))
    }

    fn drain(queue: &mut WaitingQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop())
            .map(|t| t.record().title().to_string())
            .collect()
    }

    #[test]
    fn pops_highest_priority_first() {
        let mut queue = WaitingQueue::default();
        for (title, priority) in [("low", 1), ("high", 10), ("mid", 5), ("negative", -3)] {
            queue.push(task(title, priority));
        }

        assert_eq!(queue.len(), 4);
        assert_eq!(drain(&mut queue), ["high", "mid", "low", "negative"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_priorities_pop_in_arrival_order() {
        let mut queue = WaitingQueue::default();
        for title in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            queue.push(task(title, 5));
        }

        assert_eq!(drain(&mut queue), ["a", "b", "c", "d", "e", "f", "g", "h"]);
    }

    #[test]
    fn mixed_priorities_keep_fifo_within_each_level() {
        let mut queue = WaitingQueue::default();
        queue.push(task("a1", 1));
        queue.push(task("b5", 5));
        queue.push(task("c1", 1));
        queue.push(task("d5", 5));
        assert_eq!(queue.pop().map(|t| t.record().title().to_string()).as_deref(), Some("b5"));

        queue.push(task("e5", 5));
        assert_eq!(drain(&mut queue), ["d5", "e5", "a1", "c1"]);
    }
}
