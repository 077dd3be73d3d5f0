//! REE memory layout

use bitflags::bitflags;

use crate::config::regions;

bitflags! {
    /// Access the secure world may perform on a normal-world region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// Services may read caller data from the region.
        const READ = 1 << 0;
        /// Services may write results into the region.
        const WRITE = 1 << 1;
    }
}

/// A contiguous normal-world address window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegion {
    pub start: usize,
    pub end: usize,
    pub access: Access,
}

impl MemRegion {
    pub const fn new(start: usize, end: usize, access: Access) -> Self {
        Self { start, end, access }
    }

    /// Returns true if `addr` lies inside the window.
    #[inline]
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Returns true if `[start, end)` lies inside the window and the window
    /// grants `required`.
    #[inline]
    pub fn covers(&self, start: usize, end: usize, required: Access) -> bool {
        self.contains(start) && end <= self.end && self.access.contains(required)
    }
}

const DEFAULT_REGIONS: [MemRegion; 3] = [
    MemRegion::new(
        regions::NS_IDRAM_START,
        regions::NS_IDRAM_END,
        Access::READ.union(Access::WRITE),
    ),
    MemRegion::new(regions::NS_DROM_START, regions::S_MMU_RESV_START, Access::READ),
    MemRegion::new(
        regions::RTC_DATA_LOW,
        regions::RTC_DATA_HIGH,
        Access::READ.union(Access::WRITE),
    ),
];

/// The set of windows the normal world owns.
#[derive(Debug, Clone, Copy)]
pub struct ReeLayout<'a> {
    regions: &'a [MemRegion],
}

impl ReeLayout<'static> {
    /// Normal-world SRAM, flash data mapping and RTC data memory.
    pub const DEFAULT: Self = Self {
        regions: &DEFAULT_REGIONS,
    };
}

impl<'a> ReeLayout<'a> {
    pub const fn new(regions: &'a [MemRegion]) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &'a [MemRegion] {
        self.regions
    }

    /// Find the region holding `addr`.
    pub fn region_of(&self, addr: usize) -> Option<&'a MemRegion> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    /// Returns true if a single region covers `[start, end)` with `required`.
    pub fn covers(&self, start: usize, end: usize, required: Access) -> bool {
        self.regions.iter().any(|r| r.covers(start, end, required))
    }
}

impl Default for ReeLayout<'static> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_windows() {
        let layout = ReeLayout::DEFAULT;
        assert_eq!(layout.regions().len(), 3);

        let sram = layout.region_of(regions::NS_IDRAM_START).unwrap();
        assert!(sram.access.contains(Access::READ | Access::WRITE));

        let drom = layout.region_of(regions::NS_DROM_START + 0x100).unwrap();
        assert_eq!(drom.access, Access::READ);

        // Secure SRAM sits right below the normal-world window
        assert!(layout.region_of(regions::NS_IDRAM_START - 1).is_none());
        assert!(layout.region_of(regions::S_MMU_RESV_START).is_none());
    }

    #[test]
    fn test_covers_requires_single_region() {
        let layout = ReeLayout::DEFAULT;
        let end = regions::NS_IDRAM_END;
        assert!(layout.covers(end - 8, end, Access::WRITE));
        assert!(!layout.covers(end - 8, end + 8, Access::READ));
        assert!(!layout.covers(regions::NS_DROM_START, regions::NS_DROM_START + 4, Access::WRITE));
    }
}
