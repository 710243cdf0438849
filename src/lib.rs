//! Non-secure world core of the tzdev TEE driver.
//!
//! Three pieces, leaf first:
//! - [`id_limits`]: per-client accounting of outstanding secure resources
//!   (shared memory regions, secure sockets), bounded by caller-supplied
//!   admission checks.
//! - [`ffa`]: the FF-A transport to the secure partition, covering
//!   endpoint discovery, magic-tagged direct messages with busy retry,
//!   and memory share/reclaim.
//! - [`channel`]: lifecycle of growable shared-memory channels built on
//!   the transport.
//!
//! The platform primitives this core rides on (the partition bus, the
//! SMC trampoline behind it, page pinning, task references) are injected
//! through the traits in [`ffa::device`] and [`task`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod channel;
pub mod error;
pub mod ffa;
pub mod id_limits;
pub mod task;

pub use error::TzError;
