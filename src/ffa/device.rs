//! Platform boundary: the FF-A partition bus and per-endpoint operations.
//!
//! These traits stand in for the host's FF-A driver stack. The host binds
//! them to its real bus enumeration and SMC trampoline; tests bind them
//! to mocks. Everything above this file treats the implementations as
//! already correct.

use alloc::vec::Vec;

use bitflags::bitflags;

use super::sglist::SgTable;
use super::{FfaHandle, SmcData};

/// Failure of a synchronous direct-message exchange as reported by the
/// underlying driver. Busy is its own variant because the wrapper
/// retries it rather than surfacing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Busy,
    Failed(i32),
}

bitflags! {
    /// Access permissions granted to the receiver of a share.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemAccessPerm: u8 {
        const RO      = 1 << 0;
        const RW      = 2 << 0;
        const NO_EXEC = 1 << 2;
        const EXEC    = 2 << 2;
    }
}

bitflags! {
    /// Memory region attributes of a share (type, cacheability,
    /// shareability).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemRegionAttr: u8 {
        const OUTER_SHARED = 2 << 0;
        const INNER_SHARED = 3 << 0;
        const NON_CACHE    = 1 << 2;
        const WRITE_BACK   = 3 << 2;
        const DEVICE_MEM   = 1 << 4;
        const NORMAL_MEM   = 2 << 4;
        const NON_SECURE   = 1 << 6;
    }
}

/// Per-receiver access description for one share operation.
#[derive(Debug, Clone, Copy)]
pub struct MemRegionAttributes {
    /// Receiver endpoint id.
    pub receiver: u16,
    pub perms: MemAccessPerm,
}

/// Arguments to the platform memory-share primitive.
pub struct MemOpArgs<'a> {
    pub use_txbuf: bool,
    pub attrs: &'a [MemRegionAttributes],
    pub region_attr: MemRegionAttr,
    pub flags: u32,
    pub tag: u64,
    pub sg: &'a SgTable,
}

/// One secure partition endpoint on the bus.
pub trait FfaEndpoint {
    /// 16-bit partition id of the endpoint.
    fn id(&self) -> u16;

    /// Bind the driver's namespace UUID to this endpoint.
    fn bind_uuid(&self, uuid: &[u8; 16]);

    /// Synchronous direct message. On success the reply words have been
    /// written into `data`; a busy partition reports
    /// [`TransportStatus::Busy`] and leaves `data` untouched.
    fn sync_send_receive(&self, data: &mut SmcData) -> Result<(), TransportStatus>;

    /// Grant the described pages to the receivers in `args`. Returns the
    /// handle redeemable for reclaim.
    fn memory_share(&self, args: &MemOpArgs<'_>) -> Result<FfaHandle, i32>;

    /// Revoke a previous grant.
    fn memory_reclaim(&self, handle: FfaHandle, flags: u32) -> Result<(), i32>;
}

/// Enumerable bus of secure partitions.
pub trait PartitionBus {
    type Endpoint: FfaEndpoint;

    /// Partitions currently present on the bus.
    fn partitions(&self) -> Vec<Self::Endpoint>;
}
