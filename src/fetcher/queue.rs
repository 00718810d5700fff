//! Identifier queues feeding the batched update jobs.
//!
//! A `PrioritizedSet` holds the item numbers awaiting a refresh for one
//! repository and one domain (pull requests, issues, or milestones). Batches
//! drain the priority side first and top up from the regular side; a batch
//! below the requested minimum is not emitted at all, so that the dispatch
//! loop can amortize query cost across as many identifiers as possible.

use std::collections::HashSet;

/// An unordered set of item numbers.
#[derive(Debug, Default, Clone)]
pub struct ItemSet {
    numbers: HashSet<u64>,
}

impl ItemSet {
    pub fn new() -> Self {
        ItemSet::default()
    }

    pub fn add(&mut self, number: u64) {
        self.numbers.insert(number);
    }

    pub fn remove(&mut self, number: u64) {
        self.numbers.remove(&number);
    }

    pub fn contains(&self, number: u64) -> bool {
        self.numbers.contains(&number)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// Appends up to `max - list.len()` members to `list`, in arbitrary
    /// order, without removing them from the set.
    fn fill_up_to(&self, list: &mut Vec<u64>, max: usize) {
        for number in &self.numbers {
            if list.len() >= max {
                break;
            }
            list.push(*number);
        }
    }
}

/// A pair of item-number sets drained priority-first into batches.
///
/// The priority bit is carried at enqueue time only: a number enqueued with
/// both priorities stays in both sets until dequeued.
#[derive(Debug, Default, Clone)]
pub struct PrioritizedSet {
    priority: ItemSet,
    regular: ItemSet,
}

impl PrioritizedSet {
    pub fn new() -> Self {
        PrioritizedSet::default()
    }

    pub fn enqueue_priority(&mut self, numbers: &[u64]) {
        for number in numbers {
            self.priority.add(*number);
        }
    }

    pub fn enqueue_regular(&mut self, numbers: &[u64]) {
        for number in numbers {
            self.regular.add(*number);
        }
    }

    pub fn priority_len(&self) -> usize {
        self.priority.len()
    }

    pub fn regular_len(&self) -> usize {
        self.regular.len()
    }

    /// Collects a batch of `min_batch_size ..= max_batch_size` numbers,
    /// priority members first, or `None` if not enough numbers are queued.
    ///
    /// The returned numbers are NOT removed; the caller dequeues them once
    /// the update job that carries them has run.
    pub fn get_batch(&self, min_batch_size: usize, max_batch_size: usize) -> Option<Vec<u64>> {
        let mut items = Vec::new();
        self.priority.fill_up_to(&mut items, max_batch_size);

        // batch already full of priority items
        if items.len() >= max_batch_size {
            return Some(items);
        }

        self.regular.fill_up_to(&mut items, max_batch_size);

        if items.len() >= min_batch_size {
            return Some(items);
        }

        None
    }

    /// Removes each number from both sets; unknown numbers are ignored.
    pub fn dequeue(&mut self, numbers: &[u64]) {
        for number in numbers {
            self.priority.remove(*number);
            self.regular.remove(*number);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_set_yields_no_batch() {
        let set = PrioritizedSet::new();
        assert!(set.get_batch(1, 10).is_none());
    }

    #[test]
    fn batch_below_minimum_is_withheld() {
        let mut set = PrioritizedSet::new();
        set.enqueue_regular(&[1, 2, 3]);
        assert!(set.get_batch(10, 20).is_none());
        assert_eq!(set.get_batch(1, 20).unwrap().len(), 3);
    }

    #[test]
    fn priority_items_come_first() {
        let mut set = PrioritizedSet::new();
        set.enqueue_priority(&[1, 2, 3]);
        set.enqueue_regular(&[10, 11, 12]);

        let batch = set.get_batch(1, 3).unwrap();
        assert_eq!(batch.len(), 3);
        for number in batch {
            assert!(number <= 3, "expected a priority item, got {number}");
        }
    }

    #[test]
    fn batch_tops_up_from_regular() {
        let mut set = PrioritizedSet::new();
        set.enqueue_priority(&[1]);
        set.enqueue_regular(&[10, 11]);

        let mut batch = set.get_batch(3, 5).unwrap();
        batch.sort_unstable();
        assert_eq!(batch, vec![1, 10, 11]);
    }

    #[test]
    fn get_batch_does_not_consume() {
        let mut set = PrioritizedSet::new();
        set.enqueue_regular(&[1, 2, 3]);
        set.get_batch(1, 10).unwrap();
        assert_eq!(set.regular_len(), 3);
    }

    #[test]
    fn dequeue_removes_from_both_sets() {
        let mut set = PrioritizedSet::new();
        set.enqueue_priority(&[1, 2]);
        set.enqueue_regular(&[2, 3]);

        set.dequeue(&[2, 99]);

        assert_eq!(set.priority_len(), 1);
        assert_eq!(set.regular_len(), 1);
    }

    #[test]
    fn double_enqueue_keeps_number_in_both_sets() {
        let mut set = PrioritizedSet::new();
        set.enqueue_priority(&[5]);
        set.enqueue_regular(&[5]);

        assert_eq!(set.priority_len(), 1);
        assert_eq!(set.regular_len(), 1);

        set.dequeue(&[5]);
        assert_eq!(set.priority_len(), 0);
        assert_eq!(set.regular_len(), 0);
    }

    // ─── Property tests ───

    proptest! {
        /// A batch is either withheld or its length is within [min, max].
        #[test]
        fn prop_batch_length_bounds(
            priority in proptest::collection::hash_set(1u64..500, 0..40),
            regular in proptest::collection::hash_set(1u64..500, 0..40),
            min in 1usize..15,
            max in 15usize..60,
        ) {
            let mut set = PrioritizedSet::new();
            set.enqueue_priority(&priority.iter().copied().collect::<Vec<_>>());
            set.enqueue_regular(&regular.iter().copied().collect::<Vec<_>>());

            match set.get_batch(min, max) {
                Some(batch) => {
                    prop_assert!(batch.len() >= min);
                    prop_assert!(batch.len() <= max);
                }
                None => {
                    // only withheld when even priority+regular cannot reach min
                    prop_assert!(priority.len() + regular.len() < min);
                }
            }
        }

        /// A non-empty priority set always yields a batch with min = 1.
        #[test]
        fn prop_priority_always_drains(
            priority in proptest::collection::hash_set(1u64..500, 1..40),
        ) {
            let mut set = PrioritizedSet::new();
            set.enqueue_priority(&priority.iter().copied().collect::<Vec<_>>());

            let batch = set.get_batch(1, 25);
            prop_assert!(batch.is_some_and(|b| !b.is_empty()));
        }

        /// After dequeue, none of the numbers remain in either set.
        #[test]
        fn prop_dequeue_is_complete(
            priority in proptest::collection::hash_set(1u64..500, 0..40),
            regular in proptest::collection::hash_set(1u64..500, 0..40),
        ) {
            let mut set = PrioritizedSet::new();
            let priority: Vec<u64> = priority.into_iter().collect();
            let regular: Vec<u64> = regular.into_iter().collect();
            set.enqueue_priority(&priority);
            set.enqueue_regular(&regular);

            let all: Vec<u64> = priority.iter().chain(regular.iter()).copied().collect();
            set.dequeue(&all);

            prop_assert_eq!(set.priority_len(), 0);
            prop_assert_eq!(set.regular_len(), 0);
        }

        /// Batches never invent numbers that were not enqueued.
        #[test]
        fn prop_batch_is_subset(
            priority in proptest::collection::hash_set(1u64..500, 0..40),
            regular in proptest::collection::hash_set(1u64..500, 0..40),
        ) {
            let mut set = PrioritizedSet::new();
            set.enqueue_priority(&priority.iter().copied().collect::<Vec<_>>());
            set.enqueue_regular(&regular.iter().copied().collect::<Vec<_>>());

            if let Some(batch) = set.get_batch(1, 30) {
                for number in batch {
                    prop_assert!(priority.contains(&number) || regular.contains(&number));
                }
            }
        }
    }
}
