//! FF-A backing for the channel operations.

use zerocopy::{FromBytes, IntoBytes};

use crate::error::TzError;
use crate::ffa::device::FfaEndpoint;
use crate::ffa::{FfaDriver, FfaHandle, Page, NR_SW_CPU_IDS, PAGE_SIZE};

use super::{ChannelBackend, ChannelMetadata, ChannelsInit, CHANNEL_MAX_HANDLES};

/// The backend-private blob is exactly one share handle wide: the base
/// grant, recorded at init and consulted only by deinit. It is kept
/// outside the shared metadata so a misbehaving secure side cannot
/// redirect the teardown.
pub const IMPL_DATA_SIZE: usize = core::mem::size_of::<FfaHandle>();

/// Channel backend over the FF-A share/reclaim primitives.
pub struct FfaChannel<'d, E: FfaEndpoint> {
    drv: &'d FfaDriver<E>,
}

impl<'d, E: FfaEndpoint> FfaChannel<'d, E> {
    pub fn new(drv: &'d FfaDriver<E>) -> Self {
        Self { drv }
    }
}

impl<E: FfaEndpoint> ChannelBackend for FfaChannel<'_, E> {
    fn data_size(&self) -> usize {
        IMPL_DATA_SIZE
    }

    fn init(
        &self,
        metadata: &mut ChannelMetadata,
        pages: &[Page],
        impl_data: &mut [u8],
    ) -> Result<(), TzError> {
        let handle = self.drv.mem_share(pages)?;

        metadata.pfns_count = pages.len() as u32;
        metadata.num_handles = 1;
        metadata.handle[0] = handle.0;

        impl_data[..IMPL_DATA_SIZE].copy_from_slice(handle.as_bytes());

        Ok(())
    }

    fn init_swd(&self, meta_pages: &[Page], channels_init: ChannelsInit<'_>) -> Result<(), TzError> {
        let handle = self.drv.mem_share(&meta_pages[..NR_SW_CPU_IDS])?;

        if let Err(code) = channels_init(handle.0, NR_SW_CPU_IDS, PAGE_SIZE) {
            // Do not leak the grant on a half-finished setup.
            self.drv.mem_reclaim(handle);
            return Err(TzError::ChannelsInitFailed(code));
        }

        Ok(())
    }

    fn deinit(&self, impl_data: &[u8]) -> Result<(), TzError> {
        let handle = FfaHandle::read_from_bytes(&impl_data[..IMPL_DATA_SIZE])
            .expect("impl_data holds exactly one share handle");
        self.drv.mem_reclaim(handle);
        Ok(())
    }

    fn acquire(&self, metadata: &mut ChannelMetadata) {
        metadata.write_offset = 0;
        metadata.pfns_count = 0;
    }

    fn reserve(
        &self,
        metadata: &mut ChannelMetadata,
        pages: &[Page],
        old_pages_count: usize,
        new_pages_count: usize,
        _impl_data: &mut [u8],
    ) -> Result<(), TzError> {
        if metadata.num_handles as usize == CHANNEL_MAX_HANDLES {
            return Err(TzError::TooManyReservations);
        }

        let handle = self
            .drv
            .mem_share(&pages[old_pages_count..new_pages_count])?;

        metadata.handle[metadata.num_handles as usize] = handle.0;
        metadata.num_handles += 1;
        metadata.pfns_count += (new_pages_count - old_pages_count) as u32;

        Ok(())
    }

    fn release(&self, metadata: &mut ChannelMetadata, _impl_data: &mut [u8]) -> Result<(), TzError> {
        for i in 1..metadata.num_handles as usize {
            self.drv.mem_reclaim(FfaHandle(metadata.handle[i]));
        }

        metadata.pfns_count = 0;
        metadata.num_handles = 1;

        Ok(())
    }

    fn set_write_offset(&self, metadata: &mut ChannelMetadata, value: u32) {
        // Single opaque store; the secure side reads this concurrently.
        unsafe { core::ptr::write_volatile(core::ptr::addr_of_mut!(metadata.write_offset), value) }
    }

    fn get_write_offset(&self, metadata: &ChannelMetadata) -> u32 {
        unsafe { core::ptr::read_volatile(core::ptr::addr_of!(metadata.write_offset)) }
    }
}
