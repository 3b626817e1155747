//! # Available memory regions
//!
//! ## Overview
//!
//! The SoC memory map lists every physical RAM region. Parts of those
//! regions are already in use before the heap is set up: static data and
//! `.bss`, code copied to IRAM, and ranges other crates claimed with
//! [reserve_memory_region!](crate::reserve_memory_region). This module
//! subtracts those reservations from the memory map, producing the regions
//! which can be handed to the heap.
//!
//! Reservations are widened to word boundaries, sorted and checked for
//! overlaps first. Overlapping reservations are a link-time configuration
//! error: [MemoryLayout::available_regions] panics on them, while
//! [MemoryLayout::try_available_regions] reports them as [Error::Overlap].
//!
//! ## Example
//!
//! ```rust
//! use esp_hw_support::memory_layout::{MemoryLayout, MemoryRegion, ReservedRegion};
//!
//! let regions = [MemoryRegion::new(0x3fc8_0000, 0x6_0000)];
//! let layout = MemoryLayout::new(
//!     &regions,
//!     ReservedRegion::new(0x3fc8_0000, 0x3fc9_2345),
//!     ReservedRegion::new(0, 0),
//! );
//!
//! let mut available = [MemoryRegion::new(0, 0); 4];
//! let count = layout.available_regions(&mut available);
//!
//! assert_eq!(count, 1);
//! assert_eq!(available[0].start, 0x3fc9_2348);
//! ```

use crate::fmt::AddrRange;

const MAX_RESERVED_REGIONS: usize =
    esp_config::esp_config_int!(usize, "ESP_HW_SUPPORT_CONFIG_MAX_RESERVED_REGIONS");

const MIN_REGION_SIZE: usize =
    esp_config::esp_config_int!(usize, "ESP_HW_SUPPORT_CONFIG_MIN_REGION_SIZE");

/// Errors which can be returned while resolving the memory layout.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, strum::Display)]
pub enum Error {
    /// A reserved region ends before it starts.
    InvertedRange,

    /// Two reserved regions start at the same address.
    DuplicateStart,

    /// Two reserved regions overlap.
    Overlap,

    /// There are more reserved regions than the configured maximum.
    TooManyReservedRegions,

    /// The output buffer can't hold all available regions.
    OutputTooSmall,
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self)
    }
}

/// A physical memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryRegion {
    /// Start address.
    pub start: usize,
    /// Size in bytes.
    pub size: usize,
    /// Index into the chip's memory type table.
    pub kind: usize,
    /// The same memory seen from the instruction bus, if it is mapped there.
    pub iram_address: Option<usize>,
    /// Whether the region holds the startup stack.
    pub startup_stack: bool,
}

impl MemoryRegion {
    /// A region of `size` bytes starting at `start`.
    pub const fn new(start: usize, size: usize) -> Self {
        Self {
            start,
            size,
            kind: 0,
            iram_address: None,
            startup_stack: false,
        }
    }

    /// Sets the memory type index.
    pub const fn with_kind(mut self, kind: usize) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the instruction bus alias of `start`.
    pub const fn with_iram_address(mut self, iram_address: usize) -> Self {
        self.iram_address = Some(iram_address);
        self
    }

    /// Marks the region as holding the startup stack.
    pub const fn with_startup_stack(mut self, startup_stack: bool) -> Self {
        self.startup_stack = startup_stack;
        self
    }

    /// The first address past the region.
    pub const fn end(&self) -> usize {
        self.start + self.size
    }

    // Moves the start up to `start`, keeping the end.
    fn trim_start(&mut self, start: usize) {
        let delta = start - self.start;
        self.start = start;
        self.size -= delta;
        self.iram_address = self.iram_address.map(|addr| addr + delta);
    }

    // Moves the end down to `end`, keeping the start.
    fn trim_end(&mut self, end: usize) {
        self.size = end - self.start;
    }
}

/// An address range excluded from the available memory.
///
/// The layout matches the records placed in the `.reserved_memory_address`
/// section by [reserve_memory_region!](crate::reserve_memory_region).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct ReservedRegion {
    /// Start address.
    pub start: usize,
    /// The first address past the reservation.
    pub end: usize,
}

impl ReservedRegion {
    /// Reserves `start..end`.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether the reservation covers no memory.
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    const fn word_aligned(self) -> Self {
        Self {
            start: self.start & !3,
            end: self.end.saturating_add(3) & !3,
        }
    }
}

/// Maps an IRAM range onto the data bus on chips where the same SRAM is
/// visible at two addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiramMapping {
    /// First instruction bus address of the shared SRAM.
    pub iram_low: usize,
    /// The first instruction bus address past the shared SRAM.
    pub iram_high: usize,
    /// Data bus address of `iram_low`.
    pub dram_low: usize,
}

impl DiramMapping {
    /// ESP32-S2
    pub const ESP32S2: Self = Self {
        iram_low: 0x4002_0000,
        iram_high: 0x4007_0000,
        dram_low: 0x3FFB_0000,
    };

    /// ESP32-S3
    pub const ESP32S3: Self = Self {
        iram_low: 0x4037_8000,
        iram_high: 0x403E_0000,
        dram_low: 0x3FC8_8000,
    };

    /// ESP32-C3
    pub const ESP32C3: Self = Self {
        iram_low: 0x4038_0000,
        iram_high: 0x403E_0000,
        dram_low: 0x3FC8_0000,
    };

    /// Translates an instruction bus address to the data bus. Addresses
    /// outside the shared SRAM are returned unchanged.
    pub const fn iram_to_dram(&self, addr: usize) -> usize {
        if addr >= self.iram_low && addr <= self.iram_high {
            self.dram_low + (addr - self.iram_low)
        } else {
            addr
        }
    }
}

/// The memory map of a chip together with everything reserved in it.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLayout<'a> {
    regions: &'a [MemoryRegion],
    reserved: &'a [ReservedRegion],
    static_data: ReservedRegion,
    iram_text: ReservedRegion,
    diram: Option<DiramMapping>,
    min_region_size: usize,
}

impl<'a> MemoryLayout<'a> {
    /// Creates a layout from the chip's memory regions, the range used by
    /// static data (`_data_start` to `_heap_start`) and the range of code
    /// in IRAM (`_iram_start` to `_iram_end`).
    pub const fn new(
        regions: &'a [MemoryRegion],
        static_data: ReservedRegion,
        iram_text: ReservedRegion,
    ) -> Self {
        Self {
            regions,
            reserved: &[],
            static_data,
            iram_text,
            diram: None,
            min_region_size: MIN_REGION_SIZE,
        }
    }

    /// Adds explicit reservations, usually [linker_reserved_regions].
    pub const fn with_reserved(mut self, reserved: &'a [ReservedRegion]) -> Self {
        self.reserved = reserved;
        self
    }

    /// Translates the IRAM code range to the data bus before subtracting it.
    pub const fn with_diram_mapping(mut self, diram: DiramMapping) -> Self {
        self.diram = Some(diram);
        self
    }

    /// Drops available regions not larger than `size` bytes.
    ///
    /// Defaults to the `min-region-size` option, which is 0: only empty
    /// regions are dropped and every other region is reported in full.
    pub const fn with_min_region_size(mut self, size: usize) -> Self {
        self.min_region_size = size;
        self
    }

    /// Upper bound of the number of available regions: every reservation
    /// can split one region in two.
    pub const fn available_region_max_count(&self) -> usize {
        self.regions.len() + self.reserved.len() + 2
    }

    /// All reservations, including static data and IRAM code, widened to
    /// word boundaries and sorted by start address.
    ///
    /// Empty reservations are left out.
    pub fn reserved_regions(
        &self,
    ) -> Result<heapless::Vec<ReservedRegion, MAX_RESERVED_REGIONS>, Error> {
        let iram_text = match self.diram {
            Some(diram) => ReservedRegion::new(
                diram.iram_to_dram(self.iram_text.start),
                diram.iram_to_dram(self.iram_text.end),
            ),
            None => self.iram_text,
        };

        let mut reserved = heapless::Vec::<ReservedRegion, MAX_RESERVED_REGIONS>::new();

        for region in [self.static_data, iram_text].iter().chain(self.reserved) {
            if region.start > region.end {
                error!(
                    "Reserved memory region {} ends before it starts",
                    AddrRange(region.start, region.end)
                );
                return Err(Error::InvertedRange);
            }

            if region.is_empty() {
                trace!("Ignoring empty reserved region at {:#x}", region.start);
                continue;
            }

            reserved
                .push(region.word_aligned())
                .map_err(|_| Error::TooManyReservedRegions)?;
        }

        reserved.sort_unstable_by_key(|region| region.start);

        for pair in reserved.windows(2) {
            let (current, next) = (pair[0], pair[1]);

            if current.start == next.start {
                error!(
                    "Reserved memory regions {} and {} start at the same address",
                    AddrRange(current.start, current.end),
                    AddrRange(next.start, next.end)
                );
                return Err(Error::DuplicateStart);
            }

            if current.end > next.start {
                error!(
                    "Reserved memory region {} overlaps with {}",
                    AddrRange(current.start, current.end),
                    AddrRange(next.start, next.end)
                );
                return Err(Error::Overlap);
            }
        }

        for (i, region) in reserved.iter().enumerate() {
            debug!("Reserved {}: {}", i, AddrRange(region.start, region.end));
        }

        Ok(reserved)
    }

    /// Writes the available memory regions into `out` and returns how many
    /// were written.
    ///
    /// Regions are emitted in the order of the memory map. A region split by
    /// a reservation yields both parts before the next region is examined.
    pub fn try_available_regions(&self, out: &mut [MemoryRegion]) -> Result<usize, Error> {
        let reserved = self.reserved_regions()?;
        let mut count = 0;

        debug!("Building list of available memory regions");

        for region in self.regions {
            let mut pending = Some(*region);

            while let Some(mut candidate) = pending.take() {
                let mut keep = true;

                for r in reserved.iter() {
                    let (start, end) = (candidate.start, candidate.end());

                    if r.end <= start {
                        continue;
                    }
                    if r.start >= end {
                        break;
                    }

                    if r.start <= start && r.end >= end {
                        trace!(
                            "Region {} inside of reserved {}",
                            AddrRange(start, end),
                            AddrRange(r.start, r.end)
                        );
                        keep = false;
                        break;
                    } else if start < r.start && end > r.end {
                        trace!(
                            "Region {} contains reserved {}",
                            AddrRange(start, end),
                            AddrRange(r.start, r.end)
                        );
                        let mut rest = candidate;
                        rest.trim_start(r.end);
                        pending = Some(rest);

                        candidate.trim_end(r.start);
                        break;
                    } else if r.start <= start {
                        trace!(
                            "Start of region {} overlaps reserved {}",
                            AddrRange(start, end),
                            AddrRange(r.start, r.end)
                        );
                        candidate.trim_start(r.end);
                    } else {
                        trace!(
                            "End of region {} overlaps reserved {}",
                            AddrRange(start, end),
                            AddrRange(r.start, r.end)
                        );
                        candidate.trim_end(r.start);
                    }
                }

                if candidate.size <= self.min_region_size {
                    keep = false;
                }

                if keep {
                    let slot = out.get_mut(count).ok_or(Error::OutputTooSmall)?;
                    *slot = candidate;
                    count += 1;

                    debug!(
                        "Available memory region {}",
                        AddrRange(candidate.start, candidate.end())
                    );
                }
            }
        }

        Ok(count)
    }

    /// Writes the available memory regions into `out` and returns how many
    /// were written.
    ///
    /// Size `out` with [MemoryLayout::available_region_max_count].
    ///
    /// # Panics
    ///
    /// If the reservations are invalid (e.g. overlapping) or `out` is too
    /// small.
    pub fn available_regions(&self, out: &mut [MemoryRegion]) -> usize {
        match self.try_available_regions(out) {
            Ok(count) => count,
            Err(e) => panic!("Unable to compute available memory regions: {}", e),
        }
    }
}

/// Reserves a range of memory so it is never reported as available.
///
/// The reservation is placed in the `.reserved_memory_address` link section,
/// which the linker script brackets with `_reserved_memory_start` and
/// `_reserved_memory_end`.
///
/// ```rust,ignore
/// esp_hw_support::reserve_memory_region!(TRACE_BUFFER, 0x3fcd_0000, 0x3fcd_4000);
/// ```
#[macro_export]
macro_rules! reserve_memory_region {
    ($name:ident, $start:expr, $end:expr) => {
        #[unsafe(link_section = ".reserved_memory_address")]
        #[used]
        static $name: $crate::memory_layout::ReservedRegion =
            $crate::memory_layout::ReservedRegion::new($start, $end);
    };
}

/// The reservations collected by the linker from
/// [reserve_memory_region!](crate::reserve_memory_region).
#[cfg(target_os = "none")]
pub fn linker_reserved_regions() -> &'static [ReservedRegion] {
    extern "C" {
        static _reserved_memory_start: ReservedRegion;
        static _reserved_memory_end: ReservedRegion;
    }

    unsafe {
        let start = &raw const _reserved_memory_start;
        let end = &raw const _reserved_memory_end;

        core::slice::from_raw_parts(start, end.offset_from(start) as usize)
    }
}
