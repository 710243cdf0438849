//! Per-client limits on outstanding secure resources.
//!
//! Every shared memory region and every secure socket a client holds open
//! is counted against the owning task. Callers bracket a resource's
//! lifetime with [`ClientLimitRegistry::inc_id_cntr`] and
//! [`ClientLimitRegistry::dec_id_cntr`]; the admission check itself is
//! supplied by the caller, the registry only does the bookkeeping.
//!
//! The whole table sits behind one mutex. Lookup, insert and update run
//! as a single critical section, so concurrent callers observe either all
//! of an update or none of it.

use alloc::vec::Vec;

use spin::Mutex;

use crate::error::TzError;
use crate::task::TaskRef;

/// Categories of secure resources whose outstanding count is capped
/// per client task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    /// Memory regions shared with the secure world.
    SharedMem = 0,
    /// Secure socket endpoints.
    Socket = 1,
}

pub const LIMIT_TYPE_NUM: usize = 2;

const LIMITS_HASH_BITS: u32 = 6;
const LIMITS_BUCKETS: usize = 1 << LIMITS_HASH_BITS;

/// One task's outstanding usage. Exists only while the aggregate counter
/// is nonzero (or after a rejected first increment, see `inc_id_cntr`).
struct ClientLimits<T> {
    /// Strong reference: the task cannot be reaped while tracked.
    task: T,
    /// Aggregate across all limit types.
    cntr: u64,
    limits: [u32; LIMIT_TYPE_NUM],
}

/// Registry of per-task resource counters, keyed by task identity in a
/// fixed-bucket hash table.
pub struct ClientLimitRegistry<T: TaskRef> {
    buckets: Mutex<[Vec<ClientLimits<T>>; LIMITS_BUCKETS]>,
}

impl<T: TaskRef> ClientLimitRegistry<T> {
    pub const fn new() -> Self {
        Self {
            buckets: Mutex::new([const { Vec::new() }; LIMITS_BUCKETS]),
        }
    }

    fn bucket_of(id: u64) -> usize {
        // Fibonacci hash folded down to the bucket index.
        (id.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> (64 - LIMITS_HASH_BITS)) as usize
    }

    /// Charge one more `limit_type` resource to `task`.
    ///
    /// An unseen task gets a fresh entry (taking a task reference) before
    /// the check runs. `check_limit` receives the prospective new count
    /// and decides whether it is admissible; on rejection nothing is
    /// charged and [`TzError::LimitExceeded`] is returned. A fresh entry
    /// created by a rejected call is left in place with all counters
    /// zero, matching the next increment re-finding it.
    pub fn inc_id_cntr<F>(
        &self,
        limit_type: LimitType,
        task: &T,
        mut check_limit: F,
    ) -> Result<(), TzError>
    where
        F: FnMut(u32) -> bool,
    {
        let mut buckets = self.buckets.lock();
        let bucket = &mut buckets[Self::bucket_of(task.id())];

        let idx = match bucket.iter().position(|e| e.task.id() == task.id()) {
            Some(idx) => idx,
            None => {
                bucket.try_reserve(1).map_err(|_| TzError::OutOfMemory)?;
                bucket.push(ClientLimits {
                    task: task.clone(),
                    cntr: 0,
                    limits: [0; LIMIT_TYPE_NUM],
                });
                bucket.len() - 1
            }
        };
        let entry = &mut bucket[idx];

        if !check_limit(entry.limits[limit_type as usize] + 1) {
            return Err(TzError::LimitExceeded);
        }

        entry.limits[limit_type as usize] += 1;
        entry.cntr += 1;

        Ok(())
    }

    /// Release one `limit_type` resource held by `task`.
    ///
    /// When the aggregate count drops to zero the entry is removed and
    /// the task reference released.
    ///
    /// # Panics
    ///
    /// Decrementing an untracked task or a zero counter means an
    /// increment/decrement pair was lost somewhere in the driver; that is
    /// not recoverable and panics.
    pub fn dec_id_cntr(&self, limit_type: LimitType, task: &T) {
        let mut buckets = self.buckets.lock();
        let bucket = &mut buckets[Self::bucket_of(task.id())];

        let Some(idx) = bucket.iter().position(|e| e.task.id() == task.id()) else {
            panic!("dec_id_cntr: no limits entry for task {}", task.id());
        };
        let entry = &mut bucket[idx];

        assert!(
            entry.limits[limit_type as usize] != 0,
            "dec_id_cntr: {:?} counter of task {} already zero",
            limit_type,
            task.id()
        );
        assert!(entry.cntr != 0, "dec_id_cntr: aggregate counter already zero");

        entry.limits[limit_type as usize] -= 1;
        entry.cntr -= 1;

        if entry.cntr == 0 {
            // Drops the entry and with it the task reference.
            bucket.swap_remove(idx);
        }
    }

    /// Current count of `limit_type` resources charged to `task`, or
    /// `None` if the task is not tracked.
    pub fn id_cntr(&self, limit_type: LimitType, task: &T) -> Option<u32> {
        let buckets = self.buckets.lock();
        buckets[Self::bucket_of(task.id())]
            .iter()
            .find(|e| e.task.id() == task.id())
            .map(|e| e.limits[limit_type as usize])
    }
}

impl<T: TaskRef> Default for ClientLimitRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::mock::MockTask;
    use std::sync::Arc;

    #[test]
    fn counts_up_to_limit_then_rejects() {
        let registry = ClientLimitRegistry::new();
        let t1 = MockTask::process(100);

        for expected in 1..=4u32 {
            registry
                .inc_id_cntr(LimitType::SharedMem, &t1, |n| n <= 4)
                .unwrap();
            assert_eq!(registry.id_cntr(LimitType::SharedMem, &t1), Some(expected));
        }

        let err = registry
            .inc_id_cntr(LimitType::SharedMem, &t1, |n| n <= 4)
            .unwrap_err();
        assert_eq!(err, TzError::LimitExceeded);
        assert_eq!(registry.id_cntr(LimitType::SharedMem, &t1), Some(4));
    }

    #[test]
    fn entry_lives_until_every_type_drained() {
        let registry = ClientLimitRegistry::new();
        let t = MockTask::process(7);

        registry
            .inc_id_cntr(LimitType::SharedMem, &t, |_| true)
            .unwrap();
        registry
            .inc_id_cntr(LimitType::SharedMem, &t, |_| true)
            .unwrap();
        registry.inc_id_cntr(LimitType::Socket, &t, |_| true).unwrap();

        registry.dec_id_cntr(LimitType::SharedMem, &t);
        registry.dec_id_cntr(LimitType::SharedMem, &t);

        // Socket still held, entry must survive with SharedMem at zero.
        assert_eq!(registry.id_cntr(LimitType::SharedMem, &t), Some(0));
        assert_eq!(registry.id_cntr(LimitType::Socket, &t), Some(1));

        registry.dec_id_cntr(LimitType::Socket, &t);
        assert_eq!(registry.id_cntr(LimitType::Socket, &t), None);

        // A later increment starts from a fresh entry, not stale state.
        registry.inc_id_cntr(LimitType::Socket, &t, |_| true).unwrap();
        assert_eq!(registry.id_cntr(LimitType::Socket, &t), Some(1));
        assert_eq!(registry.id_cntr(LimitType::SharedMem, &t), Some(0));
    }

    #[test]
    fn rejection_charges_nothing() {
        let registry = ClientLimitRegistry::new();
        let t = MockTask::process(8);

        registry
            .inc_id_cntr(LimitType::Socket, &t, |_| true)
            .unwrap();
        let err = registry
            .inc_id_cntr(LimitType::Socket, &t, |_| false)
            .unwrap_err();
        assert_eq!(err, TzError::LimitExceeded);
        assert_eq!(registry.id_cntr(LimitType::Socket, &t), Some(1));
    }

    #[test]
    fn rejected_first_increment_leaves_empty_entry() {
        let registry = ClientLimitRegistry::new();
        let t = MockTask::process(9);

        let err = registry
            .inc_id_cntr(LimitType::SharedMem, &t, |_| false)
            .unwrap_err();
        assert_eq!(err, TzError::LimitExceeded);
        // The entry allocated before the check is not rolled back.
        assert_eq!(registry.id_cntr(LimitType::SharedMem, &t), Some(0));
    }

    #[test]
    fn task_reference_held_while_tracked() {
        let registry = ClientLimitRegistry::new();
        let t = MockTask::process(10);
        let base = t.refcount();

        registry
            .inc_id_cntr(LimitType::SharedMem, &t, |_| true)
            .unwrap();
        assert_eq!(t.refcount(), base + 1);

        registry.dec_id_cntr(LimitType::SharedMem, &t);
        assert_eq!(t.refcount(), base);
    }

    #[test]
    #[should_panic(expected = "no limits entry")]
    fn decrement_of_untracked_task_is_fatal() {
        let registry = ClientLimitRegistry::new();
        let t = MockTask::process(11);
        registry.dec_id_cntr(LimitType::SharedMem, &t);
    }

    #[test]
    #[should_panic(expected = "already zero")]
    fn decrement_of_zero_counter_is_fatal() {
        let registry = ClientLimitRegistry::new();
        let t = MockTask::process(12);
        registry.inc_id_cntr(LimitType::Socket, &t, |_| true).unwrap();
        registry.dec_id_cntr(LimitType::SharedMem, &t);
    }

    #[test]
    fn concurrent_increments_are_serialized() {
        let registry = Arc::new(ClientLimitRegistry::new());
        let t2 = MockTask::process(200);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let task = t2.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        registry
                            .inc_id_cntr(LimitType::Socket, &task, |_| true)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.id_cntr(LimitType::Socket, &t2), Some(2000));
    }
}
