//! Transient scatter-gather tables for share operations.
//!
//! A share call hands the platform a description of the exact pages being
//! granted. The table is built fresh for every call and dropped before
//! the call returns, success or not.

use alloc::vec::Vec;

use crate::error::TzError;

use super::Page;

/// Widest page list one share may carry: the constituent regions of the
/// transaction descriptor must fit in the transmit window.
pub const MAX_SHARE_PAGES: usize = 4032;

/// One physically contiguous run of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgEntry {
    /// Physical address of the first page in the run.
    pub address: u64,
    /// Number of pages in the run.
    pub page_count: u32,
}

/// Scatter-gather description of a page list, with adjacent frames
/// coalesced into single runs.
#[derive(Debug)]
pub struct SgTable {
    entries: Vec<SgEntry>,
    total_pages: usize,
}

impl SgTable {
    pub fn from_pages(pages: &[Page]) -> Result<SgTable, TzError> {
        if pages.is_empty() || pages.len() > MAX_SHARE_PAGES {
            return Err(TzError::ScatterGatherAllocFailed);
        }

        let mut entries = Vec::new();
        entries
            .try_reserve(pages.len())
            .map_err(|_| TzError::ScatterGatherAllocFailed)?;

        for &page in pages {
            match entries.last_mut() {
                Some(SgEntry {
                    address,
                    page_count,
                }) if *address + *page_count as u64 * super::PAGE_SIZE as u64 == page.phys() => {
                    *page_count += 1;
                }
                _ => entries.push(SgEntry {
                    address: page.phys(),
                    page_count: 1,
                }),
            }
        }

        Ok(SgTable {
            entries,
            total_pages: pages.len(),
        })
    }

    pub fn entries(&self) -> &[SgEntry] {
        &self.entries
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Total length of the described memory in bytes.
    pub fn total_len(&self) -> usize {
        self.total_pages * super::PAGE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_frames_coalesce() {
        let pages = [Page(1), Page(2), Page(3), Page(7), Page(8)];
        let sgt = SgTable::from_pages(&pages).unwrap();
        assert_eq!(
            sgt.entries(),
            &[
                SgEntry {
                    address: 0x1000,
                    page_count: 3
                },
                SgEntry {
                    address: 0x7000,
                    page_count: 2
                },
            ]
        );
        assert_eq!(sgt.total_pages(), 5);
        assert_eq!(sgt.total_len(), 5 * 4096);
    }

    #[test]
    fn single_page() {
        let sgt = SgTable::from_pages(&[Page(42)]).unwrap();
        assert_eq!(sgt.entries().len(), 1);
        assert_eq!(sgt.entries()[0].address, 42 * 4096);
    }

    #[test]
    fn empty_page_list_is_rejected() {
        assert_eq!(
            SgTable::from_pages(&[]).unwrap_err(),
            TzError::ScatterGatherAllocFailed
        );
    }
}
