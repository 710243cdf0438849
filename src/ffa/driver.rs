//! Wrapper around the platform FF-A driver for the tzdev partition.
//!
//! Discovery happens exactly once: [`FfaDriver::probe`] scans the
//! partition bus for the well-known partition id, binds the driver UUID
//! and caches the endpoint. All later traffic reuses the cached endpoint.

use log::{debug, error};

use crate::error::TzError;

use super::device::{
    FfaEndpoint, MemAccessPerm, MemOpArgs, MemRegionAttr, MemRegionAttributes, PartitionBus,
    TransportStatus,
};
use super::sglist::SgTable;
use super::{FfaHandle, Page, SmcData, NR_SMC_RET_ARGS, TZDEV_FFA_UUID, TZDEV_SMC_MAGIC, TZDEV_SP_ID};

/// Cached connection to the tzdev secure partition.
pub struct FfaDriver<E: FfaEndpoint> {
    dev: E,
}

impl<E: FfaEndpoint> FfaDriver<E> {
    /// Locate the tzdev partition on the bus and bind to it.
    pub fn probe<B: PartitionBus<Endpoint = E>>(bus: &B) -> Result<Self, TzError> {
        let Some(dev) = bus
            .partitions()
            .into_iter()
            .find(|dev| dev.id() == TZDEV_SP_ID)
        else {
            error!("tzdev ffa device not found");
            return Err(TzError::EndpointNotFound);
        };

        dev.bind_uuid(&TZDEV_FFA_UUID);

        Ok(Self { dev })
    }

    /// One direct-message round trip with the secure partition.
    ///
    /// Word 0 is tagged with the protocol magic on the way out. A busy
    /// partition is retried until it accepts the message; there is no
    /// retry bound because the secure side always drains eventually and
    /// giving up would leave the exchange half done. Any other failure
    /// propagates. On success the reply words overwrite `data.args[0..4]`
    /// and `args[4]` keeps its input value.
    pub fn direct_msg(&self, data: &mut SmcData) -> Result<(), TzError> {
        let mut msg = *data;
        msg.args[0] |= TZDEV_SMC_MAGIC;

        loop {
            match self.dev.sync_send_receive(&mut msg) {
                Ok(()) => break,
                Err(TransportStatus::Busy) => {
                    debug!("tzdev ffa command retry...");
                }
                Err(TransportStatus::Failed(code)) => {
                    error!("tzdev ffa command failed, error={}", code);
                    return Err(TzError::TransportFailure(code));
                }
            }
        }

        data.args[..NR_SMC_RET_ARGS].copy_from_slice(&msg.args[..NR_SMC_RET_ARGS]);

        Ok(())
    }

    /// Grant `pages` to the secure partition with read-write access.
    ///
    /// The pages belong to the secure side until the returned handle is
    /// reclaimed; the caller must not repurpose them before that.
    pub fn mem_share(&self, pages: &[Page]) -> Result<FfaHandle, TzError> {
        let sgt = match SgTable::from_pages(pages) {
            Ok(sgt) => sgt,
            Err(err) => {
                error!("failed to build pages table for {} page(s)", pages.len());
                return Err(err);
            }
        };

        let attrs = [MemRegionAttributes {
            receiver: self.dev.id(),
            perms: MemAccessPerm::RW,
        }];

        let args = MemOpArgs {
            use_txbuf: true,
            attrs: &attrs,
            region_attr: MemRegionAttr::NORMAL_MEM
                | MemRegionAttr::WRITE_BACK
                | MemRegionAttr::INNER_SHARED,
            flags: 0,
            tag: 0,
            sg: &sgt,
        };

        match self.dev.memory_share(&args) {
            Ok(handle) => Ok(handle),
            Err(code) => {
                error!("failed to share memory, error={}", code);
                Err(TzError::ShareFailed(code))
            }
        }
        // sgt dropped here, on both paths.
    }

    /// Revoke a previous grant.
    ///
    /// # Panics
    ///
    /// A refused reclaim means the secure and non-secure views of the
    /// grant have diverged; no local action can repair that, so this
    /// panics instead of returning an error a caller might ignore.
    pub fn mem_reclaim(&self, handle: FfaHandle) {
        let ret = self.dev.memory_reclaim(handle, 0);
        assert!(
            ret.is_ok(),
            "ffa reclaim refused for handle {:#x}",
            handle.0
        );
    }
}
