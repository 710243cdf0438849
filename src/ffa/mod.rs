//! FF-A transport to the tzdev secure partition.
//!
//! Wraps the platform's FF-A primitives (partition bus, direct message,
//! memory share/reclaim) behind [`driver::FfaDriver`]. The wrapper owns
//! the protocol details: locating the partition once at init, tagging
//! outbound messages with the protocol magic, retrying busy answers, and
//! building the scatter-gather description for every share.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub mod device;
pub mod driver;
pub mod sglist;

pub use device::{FfaEndpoint, PartitionBus, TransportStatus};
pub use driver::FfaDriver;

/// Well-known partition id of the tzdev secure partition.
pub const TZDEV_SP_ID: u16 = 0x8001;

/// Namespace UUID bound to the secure endpoint at registration time.
pub const TZDEV_FFA_UUID: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01];

/// Protocol tag ORed into word 0 of every outbound direct message. The
/// secure side drops messages without it.
pub const TZDEV_SMC_MAGIC: u64 = 0x8300_0000;

/// Argument words carried by one direct message.
pub const NR_SMC_ARGS: usize = 5;

/// Reply words written back by the secure side.
pub const NR_SMC_RET_ARGS: usize = 4;

/// Logical CPU ids the secure world schedules on. One metadata page is
/// shared per id for the per-CPU channel region.
pub const NR_SW_CPU_IDS: usize = 8;

pub const PAGE_SIZE: usize = 4096;

/// Opaque token for a grant of physical pages to the secure side,
/// redeemable for reclaim.
#[derive(
    FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy, Default, PartialEq, Eq,
)]
#[repr(transparent)]
pub struct FfaHandle(pub u64);

impl FfaHandle {
    /// No grant. Never returned by a successful share.
    pub const INVALID: FfaHandle = FfaHandle(u64::MAX);
}

/// One pinned physical page, identified by its frame number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page(pub u64);

impl Page {
    /// Physical address of the page.
    pub fn phys(self) -> u64 {
        self.0 * PAGE_SIZE as u64
    }
}

/// Argument block for one secure-partition round trip. Inputs go out in
/// `args[0..5]`; on success the reply overwrites `args[0..4]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmcData {
    pub args: [u64; NR_SMC_ARGS],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handle_is_distinguished() {
        assert_ne!(FfaHandle::INVALID, FfaHandle::default());
        assert_ne!(FfaHandle::INVALID, FfaHandle(0));
    }

    #[test]
    fn page_phys_is_frame_times_page_size() {
        assert_eq!(Page(3).phys(), 0x3000);
    }
}
