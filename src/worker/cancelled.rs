//! Recently cancelled task IDs
//!
//! Not an authoritative task table: entries only let a start that arrives
//! after its cancel skip the runtime. Oldest entries are evicted first.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::types::TaskId;

/// Default number of remembered cancellations
pub const DEFAULT_CANCELLED_CAPACITY: usize = 1024;

/// Bounded FIFO set of task IDs
pub struct CancelledSet {
    inner: Mutex<Inner>,
    capacity: usize,
}

#[derive(Default)]
struct Inner {
    order: VecDeque<TaskId>,
    members: HashSet<TaskId>,
}

impl CancelledSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Remember `id`, evicting the oldest entry when full
    pub fn insert(&self, id: TaskId) {
        let mut inner = self.inner.lock();
        if !inner.members.insert(id) {
            return;
        }
        inner.order.push_back(id);
        if inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.members.remove(&evicted);
            }
        }
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.inner.lock().members.contains(id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }
}

impl Default for CancelledSet {
    fn default() -> Self {
        Self::new(DEFAULT_CANCELLED_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let set = CancelledSet::default();
        let id = TaskId::new();
        assert!(!set.contains(&id));
        set.insert(id);
        set.insert(id);
        assert!(set.contains(&id));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let set = CancelledSet::new(2);
        let ids: Vec<TaskId> = (0..3).map(|_| TaskId::new()).collect();
        for id in &ids {
            set.insert(*id);
        }
        assert!(!set.contains(&ids[0]));
        assert!(set.contains(&ids[1]));
        assert!(set.contains(&ids[2]));
        assert_eq!(set.len(), 2);
    }
}
