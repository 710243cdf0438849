//! Client task identity.
//!
//! Secure resource quotas are charged to the owning process, not to the
//! kernel-visible thread that happens to issue a request. [`client_task`]
//! performs that mapping; [`TaskRef`] is the host's task handle.

/// Strong reference to a schedulable task.
///
/// `Clone` takes an additional reference and `Drop` releases it, so a
/// held `TaskRef` keeps the task from being reaped (it may still exit).
/// `id` must stay stable and unique for the task's whole lifetime; it is
/// the registry key.
pub trait TaskRef: Clone {
    /// Stable identity of the task.
    fn id(&self) -> u64;

    /// Whether the task owns a userspace address space. Kernel threads
    /// do not.
    fn has_mm(&self) -> bool;

    /// Whether the task is its thread-group leader.
    fn is_group_leader(&self) -> bool;

    /// The task's real parent.
    fn parent(&self) -> Self;
}

/// Resolve the logical client for the calling context.
///
/// A process (thread-group leader) is charged directly. A thread of a
/// single-threaded parent is charged to that parent. Kernel threads are
/// charged to their parent.
///
/// # Panics
///
/// A threaded child of a multi-threaded process cannot reach the secure
/// resource paths; hitting that case means the calling convention was
/// broken, and this function panics rather than misattribute the charge.
pub fn client_task<T: TaskRef>(current: &T) -> T {
    if current.has_mm() {
        if current.is_group_leader() {
            current.clone()
        } else if current.parent().is_group_leader() {
            current.parent()
        } else {
            panic!("secure resource request from a non-leader thread");
        }
    } else {
        current.parent()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::TaskRef;
    use std::sync::Arc;

    #[derive(Clone)]
    pub(crate) struct MockTask {
        inner: Arc<Inner>,
    }

    struct Inner {
        id: u64,
        has_mm: bool,
        leader: bool,
        parent: Option<MockTask>,
    }

    impl MockTask {
        pub(crate) fn process(id: u64) -> Self {
            Self {
                inner: Arc::new(Inner {
                    id,
                    has_mm: true,
                    leader: true,
                    parent: None,
                }),
            }
        }

        pub(crate) fn thread_of(id: u64, parent: &MockTask) -> Self {
            Self {
                inner: Arc::new(Inner {
                    id,
                    has_mm: true,
                    leader: false,
                    parent: Some(parent.clone()),
                }),
            }
        }

        pub(crate) fn kthread(id: u64, parent: &MockTask) -> Self {
            Self {
                inner: Arc::new(Inner {
                    id,
                    has_mm: false,
                    leader: true,
                    parent: Some(parent.clone()),
                }),
            }
        }

        pub(crate) fn refcount(&self) -> usize {
            Arc::strong_count(&self.inner)
        }
    }

    impl TaskRef for MockTask {
        fn id(&self) -> u64 {
            self.inner.id
        }

        fn has_mm(&self) -> bool {
            self.inner.has_mm
        }

        fn is_group_leader(&self) -> bool {
            self.inner.leader
        }

        fn parent(&self) -> Self {
            self.inner.parent.clone().expect("mock task has no parent")
        }
    }
}
