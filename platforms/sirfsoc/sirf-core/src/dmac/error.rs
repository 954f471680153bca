//! Errors returned by the DMA controller driver.
use core::fmt;

use super::descriptor::{ChainTable, Direction};
use crate::clk::ClockError;

/// Errors returned when preparing or configuring a transfer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DmaError {
    /// No descriptor could be allocated for the channel.
    NoMemory,
    /// The channel has no free descriptor, even after reclaiming completed
    /// ones. Retry after a completion.
    NoDescriptor,
    /// The channel has fewer free descriptors than the scatter-gather list
    /// has segments. Retry after a completion.
    Busy,
    /// The controller's clock could not be ungated.
    Clock(ClockError),
    /// The transfer cannot be performed by this controller.
    Invalid(InvalidTransfer),
}

/// Reasons a transfer description was rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum InvalidTransfer {
    /// The controller only moves data between memory and a device.
    Direction(Direction),
    /// An interleaved frame had a number of chunks other than one.
    FrameSize(usize),
    /// An interleaved template had no rows.
    NoRows,
    /// A segment's address or length is not a whole number of words.
    Misaligned { addr: u32, len: u32 },
    /// A segment cannot be split into rows the engine can transfer.
    Geometry { len: u32 },
    /// A scatter-gather list has more segments than a chain table can hold.
    TooManySegments(usize),
    /// Cyclic buffers must consist of exactly two periods.
    Periods { buf_len: u32, period_len: u32 },
    /// Both address widths of a slave configuration must be 4 bytes.
    BusWidth { src: u32, dst: u32 },
    /// A scatter-gather list was empty.
    EmptyList,
    /// An interleaved row and its gap don't fit in the engine's stride.
    Stride { size: u32, icg: u32 },
}

/// Errors returned by [`Dmac::probe`](super::Dmac::probe).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProbeError {
    /// `#dma-channels` was zero or larger than the hardware supports.
    ChannelCount(u8),
    /// No interrupt line was configured.
    NoIrq,
}

// === impl DmaError ===

impl From<InvalidTransfer> for DmaError {
    fn from(error: InvalidTransfer) -> Self {
        Self::Invalid(error)
    }
}

impl From<ClockError> for DmaError {
    fn from(error: ClockError) -> Self {
        Self::Clock(error)
    }
}

impl fmt::Display for DmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmaError::NoMemory => f.write_str("could not allocate any DMA descriptors"),
            DmaError::NoDescriptor => f.write_str("no free DMA descriptor"),
            DmaError::Busy => f.write_str("not enough free DMA descriptors, channel is busy"),
            DmaError::Clock(error) => write!(f, "could not enable DMA controller clock: {error}"),
            DmaError::Invalid(error) => fmt::Display::fmt(error, f),
        }
    }
}

// === impl InvalidTransfer ===

impl fmt::Display for InvalidTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidTransfer::Direction(dir) => {
                write!(f, "unsupported transfer direction {dir:?}")
            }
            InvalidTransfer::FrameSize(size) => {
                write!(f, "interleaved frames must have exactly 1 chunk, not {size}")
            }
            InvalidTransfer::NoRows => f.write_str("interleaved template has no rows"),
            InvalidTransfer::Misaligned { addr, len } => write!(
                f,
                "segment at {addr:#x} ({len} bytes) is not word aligned"
            ),
            InvalidTransfer::Geometry { len } => write!(
                f,
                "a {len}-byte segment cannot be split into transferable rows"
            ),
            InvalidTransfer::TooManySegments(segments) => write!(
                f,
                "{segments} segments do not fit in a chain table (max {})",
                ChainTable::MAX_SEGMENTS
            ),
            InvalidTransfer::Periods {
                buf_len,
                period_len,
            } => write!(
                f,
                "cyclic buffer of {buf_len} bytes is not two {period_len}-byte periods"
            ),
            InvalidTransfer::BusWidth { src, dst } => write!(
                f,
                "bus widths must be 4 bytes (source: {src}, destination: {dst})"
            ),
            InvalidTransfer::EmptyList => f.write_str("scatter-gather list is empty"),
            InvalidTransfer::Stride { size, icg } => {
                write!(f, "row of {size} bytes with a gap of {icg} bytes overflows the stride")
            }
        }
    }
}

// === impl ProbeError ===

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::ChannelCount(channels) => write!(
                f,
                "#dma-channels must be between 1 and {}, not {channels}",
                super::CHANNEL_COUNT,
            ),
            ProbeError::NoIrq => f.write_str("no interrupt line configured"),
        }
    }
}
