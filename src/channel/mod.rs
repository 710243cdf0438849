//! Growable shared-memory channels.
//!
//! A channel is a region of pages shared with the secure side, described
//! by a [`ChannelMetadata`] block that itself lives inside the shared
//! region. The generic channel-protocol layer drives the lifecycle
//! through a [`ChannelBackend`]; the FF-A backing lives in [`ffa`].

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::TzError;
use crate::ffa::Page;

pub mod ffa;

pub use self::ffa::{FfaChannel, IMPL_DATA_SIZE};

/// Upper bound on discrete share handles one channel may carry: the base
/// grant plus one per growth event.
pub const CHANNEL_MAX_HANDLES: usize = 16;

/// Per-channel bookkeeping living in memory shared with the secure side.
///
/// The secure side reads every field, so the layout is part of the wire
/// contract. Nothing here is trusted for teardown of the base grant;
/// that handle is mirrored into the backend-private `impl_data` blob at
/// init time.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone)]
#[repr(C)]
pub struct ChannelMetadata {
    /// Producer cursor into the channel's data area.
    write_offset: u32,
    /// Pages currently accounted to the in-flight round of use.
    pfns_count: u32,
    /// Grants registered so far; index 0 is the base allocation.
    num_handles: u32,
    reserved: u32,
    handle: [u64; CHANNEL_MAX_HANDLES],
}

impl ChannelMetadata {
    pub const fn new() -> Self {
        Self {
            write_offset: 0,
            pfns_count: 0,
            num_handles: 0,
            reserved: 0,
            handle: [0; CHANNEL_MAX_HANDLES],
        }
    }

    pub fn pfns_count(&self) -> u32 {
        self.pfns_count
    }

    pub fn num_handles(&self) -> u32 {
        self.num_handles
    }

    /// The registered grant handles, base first.
    pub fn handles(&self) -> &[u64] {
        &self.handle[..self.num_handles as usize]
    }
}

impl Default for ChannelMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback into the generic channel layer: set up its per-CPU channel
/// array over a freshly shared region (handle, channel count, page size
/// per channel). A nonzero status is reported by the layer's own codes.
pub type ChannelsInit<'a> = &'a mut dyn FnMut(u64, usize, usize) -> Result<(), i32>;

/// Transport-specific channel operations, pluggable under the generic
/// channel-protocol layer.
///
/// The backend keeps no per-channel state of its own; everything lives
/// either in the shared `ChannelMetadata` or in the caller-allocated
/// `impl_data` blob of [`ChannelBackend::data_size`] bytes. Callers must
/// serialize init/reserve/release/acquire per channel; only the
/// write-offset accessors are safe against a concurrently reading secure
/// side.
pub trait ChannelBackend {
    /// Size of the opaque per-channel blob the caller must allocate.
    fn data_size(&self) -> usize;

    /// Share the channel's initial page range and record the base grant.
    /// On failure nothing is recorded.
    fn init(
        &self,
        metadata: &mut ChannelMetadata,
        pages: &[Page],
        impl_data: &mut [u8],
    ) -> Result<(), TzError>;

    /// Share one metadata page per logical CPU id in a single grant and
    /// hand the region to the generic layer. Share-once: this path has
    /// no reserve/release counterpart.
    fn init_swd(&self, meta_pages: &[Page], channels_init: ChannelsInit<'_>) -> Result<(), TzError>;

    /// Reclaim the base grant recorded at init time. The only path that
    /// frees handle 0.
    fn deinit(&self, impl_data: &[u8]) -> Result<(), TzError>;

    /// Reset the producer cursor and page accounting for a new round of
    /// use. Grants persist across acquires.
    fn acquire(&self, metadata: &mut ChannelMetadata);

    /// Share the newly grown page range `pages[old_pages_count..
    /// new_pages_count]` and append its grant. The caller's page list
    /// must be consistent with its prior calls; `old_pages_count` is
    /// trusted as the prior high-water mark.
    fn reserve(
        &self,
        metadata: &mut ChannelMetadata,
        pages: &[Page],
        old_pages_count: usize,
        new_pages_count: usize,
        impl_data: &mut [u8],
    ) -> Result<(), TzError>;

    /// Reclaim every grant made by `reserve` and return the channel to
    /// its post-init state. Never touches the base grant. Idempotent.
    fn release(&self, metadata: &mut ChannelMetadata, impl_data: &mut [u8]) -> Result<(), TzError>;

    /// Store the producer cursor. A single opaque store: the secure side
    /// may be reading concurrently.
    fn set_write_offset(&self, metadata: &mut ChannelMetadata, value: u32);

    /// Load the producer cursor. A single opaque load.
    fn get_write_offset(&self, metadata: &ChannelMetadata) -> u32;
}
