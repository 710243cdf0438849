//! Error taxonomy of the tzdev core.
//!
//! Everything here is recoverable and propagated to the immediate caller.
//! Contract violations (refused reclaim, decrement of a zero counter)
//! are not errors: they panic, because they mean the secure and
//! non-secure views of shared state have diverged.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TzError {
    /// Allocation failed while creating tracking state.
    OutOfMemory,
    /// The admission predicate rejected the prospective resource count.
    LimitExceeded,
    /// The secure partition was not found on the partition bus.
    EndpointNotFound,
    /// A direct message failed with a non-busy status.
    TransportFailure(i32),
    /// Building the scatter-gather description of a page list failed.
    ScatterGatherAllocFailed,
    /// The memory-share primitive refused the grant.
    ShareFailed(i32),
    /// A channel already carries its maximum number of share handles.
    TooManyReservations,
    /// The generic channel layer failed to set up its per-CPU channels
    /// over a freshly shared region.
    ChannelsInitFailed(i32),
}

impl fmt::Display for TzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TzError::OutOfMemory => write!(f, "out of memory"),
            TzError::LimitExceeded => write!(f, "client resource limit exceeded"),
            TzError::EndpointNotFound => write!(f, "secure partition not found on bus"),
            TzError::TransportFailure(code) => write!(f, "direct message failed, error={}", code),
            TzError::ScatterGatherAllocFailed => write!(f, "failed to build pages table"),
            TzError::ShareFailed(code) => write!(f, "failed to share memory, error={}", code),
            TzError::TooManyReservations => write!(f, "channel handle table full"),
            TzError::ChannelsInitFailed(code) => {
                write!(f, "per-cpu channel setup failed, error={}", code)
            }
        }
    }
}
