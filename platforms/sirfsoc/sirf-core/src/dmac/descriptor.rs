//! Transfer descriptors and their geometry.
//!
//! The SiRF DMA engines are "2D": a transfer is `ylen + 1` rows of `xlen`
//! words, with consecutive rows starting `width` words apart. All three
//! lengths are in 32-bit words, and `ylen` is stored as "rows minus one".
//! Linear transfers are expressed by finding a row length that evenly divides
//! the transfer.
//!
//! The Atlas7 v2 engine can also walk a [`ChainTable`] of packed
//! [`ChainEntry`]s on its own, which is how scatter-gather lists are
//! performed on that controller.
// Most of the geometry types here are self-explanatory.
#![allow(missing_docs)]
use alloc::boxed::Box;
use core::fmt;

use mycelium_bitfield::bitfield;

use super::{cookie::Cookie, error::InvalidTransfer, regs::HwDirection};

/// Bytes per hardware word. `xlen`, `ylen` and `width` are all in words.
pub const WORD: u32 = 4;

/// Longest row a legacy channel can transfer, in words (exclusive).
pub const MAX_ROW_WORDS: u32 = 0x800;

/// Most rows a legacy channel can transfer in one descriptor.
pub const MAX_ROWS: u32 = 0x800;

/// Number of entries in a v2 chain table, including the end sentinel.
pub const CHAIN_TABLE_LEN: usize = 256;

/// Candidate row widths (in words) for cyclic transfers, largest first.
const CYCLIC_WIDTHS: [u32; 7] = [1024, 512, 256, 128, 64, 32, 16];

/// A completion callback.
///
/// Callbacks are run from the completion tasklet, never while a channel lock
/// is held, so they may freely call back into the driver.
pub type Callback = Box<dyn FnMut() + Send>;

/// Direction of a transfer, as requested by a consumer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    MemToMem,
    MemToDev,
    DevToMem,
    DevToDev,
}

/// Flow-control flag of a [`ChainEntry`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ChainFlag {
    /// Transfer this entry and continue with the next one.
    Normal = 0x01,
    /// Transfer this entry, then pause the engine.
    Pause = 0x02,
    /// Transfer this entry, then restart at the top of the table.
    Loop = 0x03,
    /// Stop; this entry carries no data.
    End = 0x04,
}

bitfield! {
    /// One entry of an Atlas7 v2 hardware chain table.
    #[derive(PartialEq, Eq)]
    pub struct ChainEntry<u64> {
        /// Number of words to transfer.
        pub const WORDS = 25;

        /// A [`ChainFlag`].
        pub const FLAG = 3;

        const _RESERVED_0 = 4;

        /// Physical address of the data.
        pub const ADDR = 32;
    }
}

/// A hardware chain table, laid out the way the v2 engine reads it.
#[derive(Clone)]
#[repr(C, align(8))]
pub struct ChainTable([ChainEntry; CHAIN_TABLE_LEN]);

/// The 2D shape of a transfer, in words.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Geometry {
    pub xlen: u32,
    pub ylen: u32,
    pub width: u32,
}

/// A transfer descriptor.
///
/// Descriptors are owned by their channel's pool and are only ever recycled,
/// never freed, while the channel's resources are allocated.
pub(crate) struct Descriptor {
    pub(crate) geometry: Geometry,
    pub(crate) dir: HwDirection,
    pub(crate) cyclic: bool,
    pub(crate) chain: bool,
    /// Transfer address, or the physical address of `chain_table` when
    /// `chain` is set.
    pub(crate) addr: u32,
    /// Total bytes moved by this descriptor.
    pub(crate) len: u32,
    /// Number of data entries in `chain_table`.
    pub(crate) segments: usize,
    pub(crate) cookie: Option<Cookie>,
    pub(crate) callback: Option<Callback>,
    pub(crate) chain_table: ChainTable,
}

// === impl Direction ===

impl Direction {
    /// Returns the hardware encoding of this direction, if the controller
    /// supports it.
    pub(crate) fn hw(self) -> Result<HwDirection, InvalidTransfer> {
        match self {
            Direction::MemToDev => Ok(HwDirection::Write),
            Direction::DevToMem => Ok(HwDirection::Read),
            dir => Err(InvalidTransfer::Direction(dir)),
        }
    }
}

// === impl ChainEntry ===

impl ChainEntry {
    /// Returns an entry moving `words` words at physical address `addr`.
    #[must_use]
    pub fn data(words: u32, addr: u32) -> Self {
        Self::new()
            .with(Self::WORDS, words as u64)
            .with(Self::FLAG, ChainFlag::Normal as u64)
            .with(Self::ADDR, addr as u64)
    }

    /// Returns the sentinel that terminates a chain table.
    #[must_use]
    pub fn end() -> Self {
        Self::new().with(Self::FLAG, ChainFlag::End as u64)
    }

    #[must_use]
    pub fn flag(&self) -> u64 {
        self.get(Self::FLAG)
    }

    #[must_use]
    pub fn words(&self) -> u32 {
        self.get(Self::WORDS) as u32
    }

    #[must_use]
    pub fn addr(&self) -> u32 {
        self.get(Self::ADDR) as u32
    }
}

// === impl ChainTable ===

impl ChainTable {
    /// Most data entries a table can carry; the last slot is reserved for the
    /// end sentinel.
    pub const MAX_SEGMENTS: usize = CHAIN_TABLE_LEN - 1;

    #[must_use]
    pub const fn new() -> Self {
        Self([ChainEntry::new(); CHAIN_TABLE_LEN])
    }

    #[must_use]
    pub fn entries(&self) -> &[ChainEntry; CHAIN_TABLE_LEN] {
        &self.0
    }

    pub(crate) fn set(&mut self, idx: usize, entry: ChainEntry) {
        self.0[idx] = entry;
    }

    pub(crate) fn as_bytes_ptr(&self) -> *const u8 {
        self.0.as_ptr().cast()
    }

    pub(crate) const fn size_bytes() -> usize {
        core::mem::size_of::<Self>()
    }
}

impl Default for ChainTable {
    fn default() -> Self {
        Self::new()
    }
}

// === impl Descriptor ===

impl Descriptor {
    pub(crate) fn new() -> Self {
        Self {
            geometry: Geometry::default(),
            dir: HwDirection::Read,
            cyclic: false,
            chain: false,
            addr: 0,
            len: 0,
            segments: 0,
            cookie: None,
            callback: None,
            chain_table: ChainTable::new(),
        }
    }

    /// Clears everything left over from this descriptor's previous use,
    /// except for the chain table, which is only ever read up to its end
    /// sentinel.
    pub(crate) fn reset(&mut self) {
        self.geometry = Geometry::default();
        self.dir = HwDirection::Read;
        self.cyclic = false;
        self.chain = false;
        self.addr = 0;
        self.len = 0;
        self.segments = 0;
        self.cookie = None;
        self.callback = None;
    }

    /// Bytes not yet transferred, given the engine's current data address.
    pub(crate) fn residue(&self, pos: u32) -> u32 {
        let Geometry { xlen, ylen, width } = self.geometry;
        let done = pos.wrapping_sub(self.addr);
        if self.cyclic {
            let total = (xlen + 1)
                .wrapping_mul(ylen.wrapping_add(1))
                .wrapping_mul(width * WORD);
            return total.saturating_sub(done);
        }

        if self.chain {
            return self.chain_residue(pos);
        }

        let span = ylen.wrapping_mul(width).wrapping_add(xlen).wrapping_mul(WORD);
        span.saturating_sub(done)
    }

    /// In chain mode the engine reports the address of the data it is
    /// working on, not an offset into the table, so find the segment
    /// containing it.
    fn chain_residue(&self, pos: u32) -> u32 {
        let entries = &self.chain_table.entries()[..self.segments];
        let mut remaining = None;
        for entry in entries {
            let start = entry.addr();
            let bytes = entry.words() * WORD;
            match remaining {
                Some(ref mut remaining) => *remaining += bytes,
                None if pos >= start && pos - start < bytes => {
                    remaining = Some(start + bytes - pos);
                }
                None => {}
            }
        }
        remaining.unwrap_or(self.len)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("geometry", &self.geometry)
            .field("dir", &self.dir)
            .field("cyclic", &self.cyclic)
            .field("chain", &self.chain)
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("len", &self.len)
            .field("cookie", &self.cookie)
            .field("callback", &self.callback.as_ref().map(|_| format_args!("..")))
            .finish_non_exhaustive()
    }
}

// === geometry ===

/// Geometry of one interleaved frame of `numf` rows of `size` bytes, with
/// `icg` bytes skipped between rows.
pub(crate) fn interleaved_geometry(
    size: u32,
    icg: u32,
    numf: u32,
) -> Result<Geometry, InvalidTransfer> {
    let stride = size
        .checked_add(icg)
        .ok_or(InvalidTransfer::Stride { size, icg })?;
    Ok(Geometry {
        xlen: size / WORD,
        width: stride / WORD,
        ylen: numf - 1,
    })
}

/// Geometry of one scatter-gather segment on a legacy controller.
///
/// A segment shorter than a maximal row is sent as a single row. Longer
/// segments are split into the longest rows that evenly divide them and
/// still fit in [`MAX_ROWS`] rows.
pub(crate) fn segment_geometry(len: u32) -> Result<Geometry, InvalidTransfer> {
    let words = len / WORD;
    if words < MAX_ROW_WORDS {
        return Ok(Geometry {
            xlen: words,
            ylen: 0,
            width: words,
        });
    }

    (1..MAX_ROW_WORDS)
        .rev()
        .find(|&xlen| words % xlen == 0 && words / xlen <= MAX_ROWS)
        .map(|xlen| Geometry {
            xlen,
            ylen: words / xlen - 1,
            width: xlen,
        })
        .ok_or(InvalidTransfer::Geometry { len })
}

/// Geometry of a two-period cyclic buffer.
///
/// The loop buffer is `ylen + 1` rows of `width` words, and the engine
/// interrupts at the end of each half. `width` is the largest candidate row
/// width dividing the period. When none does, `width` is left at zero and
/// the descriptor is still built; the engine's division by zero yields zero,
/// so `ylen` wraps to `u32::MAX`.
pub(crate) fn cyclic_geometry(buf_len: u32, period_len: u32) -> Geometry {
    let period_words = period_len / WORD;
    let width = CYCLIC_WIDTHS
        .into_iter()
        .find(|width| period_words % width == 0)
        .unwrap_or(0);
    let ylen = buf_len
        .checked_div(width * WORD)
        .unwrap_or(0)
        .wrapping_sub(1);
    Geometry {
        xlen: 0,
        ylen,
        width,
    }
}

#[cfg(test)]
mod tests {
    use proptest::{prop_assert, prop_assert_eq, proptest};

    use super::*;

    #[test]
    fn chain_entry_is_valid() {
        ChainEntry::assert_valid();
    }

    #[test]
    fn chain_end_sentinel() {
        assert_eq!(ChainEntry::end().bits(), 0x04 << 25);
    }

    #[test]
    fn small_segments_are_one_row() {
        let geometry = segment_geometry(64).unwrap();
        assert_eq!(
            geometry,
            Geometry {
                xlen: 16,
                ylen: 0,
                width: 16
            }
        );
    }

    #[test]
    fn unsplittable_segment_is_rejected() {
        // a prime number of words larger than the longest row can only be
        // split into single-word rows, and there are too many of those.
        let words = 4099;
        assert_eq!(
            segment_geometry(words * WORD),
            Err(InvalidTransfer::Geometry { len: words * WORD })
        );
    }

    #[test]
    fn interleaved_geometry_of_a_tile() {
        let geometry = interleaved_geometry(64, 16, 4).unwrap();
        assert_eq!(geometry.xlen, 16);
        assert_eq!(geometry.width, 20);
        assert_eq!(geometry.ylen, 3);
    }

    #[test]
    fn interleaved_stride_must_fit() {
        assert_eq!(
            interleaved_geometry(u32::MAX - 3, 8, 1),
            Err(InvalidTransfer::Stride {
                size: u32::MAX - 3,
                icg: 8
            })
        );
        assert_eq!(interleaved_geometry(u32::MAX - 7, 4, 1).unwrap().width, u32::MAX / WORD);
    }

    #[test]
    fn cyclic_example_geometry() {
        let geometry = cyclic_geometry(8192, 4096);
        assert_eq!(geometry.width, 1024);
        assert_eq!(geometry.ylen, 8192 / (geometry.width * WORD) - 1);
        assert_eq!(geometry.xlen, 0);
    }

    #[test]
    fn cyclic_picks_largest_power_of_two() {
        // 96 words: 32 is the largest candidate dividing it.
        assert_eq!(cyclic_geometry(768, 384).width, 32);
    }

    // Reproduces the degenerate geometry of a period no candidate divides:
    // the descriptor is still built with a zero width. Programming it into
    // the hardware is a hazard the consumer has to avoid.
    #[test]
    fn cyclic_without_divisor_keeps_zero_width() {
        let geometry = cyclic_geometry(2 * 20, 20);
        assert_eq!(geometry.width, 0);
        assert_eq!(geometry.ylen, u32::MAX);
    }

    #[test]
    fn residue_of_cyclic_buffer() {
        let mut desc = Descriptor::new();
        desc.cyclic = true;
        desc.addr = 0x1000;
        desc.geometry = cyclic_geometry(8192, 4096);
        assert_eq!(desc.residue(0x1000), 8192);
        assert_eq!(desc.residue(0x1000 + 4096), 4096);
    }

    #[test]
    fn residue_of_chain() {
        let mut desc = Descriptor::new();
        desc.chain = true;
        desc.chain_table.set(0, ChainEntry::data(16, 0x2000));
        desc.chain_table.set(1, ChainEntry::data(8, 0x8000));
        desc.chain_table.set(2, ChainEntry::end());
        desc.segments = 2;
        desc.len = 96;

        assert_eq!(desc.residue(0x2000), 96);
        assert_eq!(desc.residue(0x2010), 80);
        assert_eq!(desc.residue(0x8010), 16);
        // not in any segment: nothing is known to have been transferred.
        assert_eq!(desc.residue(0x4000), 96);
    }

    proptest! {
        #[test]
        fn segment_geometry_covers_segment(words in 1u32..(1 << 22)) {
            match segment_geometry(words * WORD) {
                Ok(Geometry { xlen, ylen, width }) => {
                    prop_assert_eq!(xlen * (ylen + 1), words);
                    prop_assert!(xlen < MAX_ROW_WORDS);
                    prop_assert!(ylen < MAX_ROWS);
                    prop_assert_eq!(width, xlen);
                    if words < MAX_ROW_WORDS {
                        prop_assert_eq!(ylen, 0);
                        prop_assert_eq!(xlen, words);
                    }
                }
                Err(_) => {
                    prop_assert!(words >= MAX_ROW_WORDS);
                    let splittable = (1..MAX_ROW_WORDS)
                        .any(|xlen| words % xlen == 0 && words / xlen <= MAX_ROWS);
                    prop_assert!(!splittable);
                }
            }
        }

        #[test]
        fn pack_chain_entry(words in 0u32..(1 << 25), addr: u32) {
            let manual = words as u64 | (0x01 << 25) | ((addr as u64) << 32);
            let entry = ChainEntry::data(words, addr);
            prop_assert_eq!(manual, entry.bits(), "\n{:064b} (expected), vs:\n{}", manual, entry);
            prop_assert_eq!(entry.words(), words);
            prop_assert_eq!(entry.addr(), addr);
        }
    }
}
