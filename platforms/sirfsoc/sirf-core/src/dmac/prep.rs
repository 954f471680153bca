//! Transfer preparation.
//!
//! Each `prep_*` method validates its transfer, takes descriptors from the
//! channel's free list, fills them in and moves them to `prepared`. If the
//! channel has run out of descriptors, completed transfers are reclaimed
//! (running their callbacks) and the caller is asked to try again.
use alloc::vec::Vec;

use maitake_sync::spin::MutexGuard;

use super::{
    channel::{ChanState, List},
    descriptor::{self, ChainEntry, ChainTable, Direction, Geometry, WORD},
    Chan, DmaError, DmaMemory, InvalidTransfer, Tx, Version,
};
use crate::{clk::Clock, mmio::Mmio};

/// Largest word count a chain entry can describe (exclusive).
const MAX_CHAIN_WORDS: u32 = 1 << 25;

/// A 2D transfer: `numf` rows, each described by the single chunk in `sgl`.
#[derive(Copy, Clone, Debug)]
pub struct Interleaved<'a> {
    /// Which way data moves.
    pub dir: Direction,
    /// Address of the first row, for memory-to-device transfers.
    pub src_start: u32,
    /// Address of the first row, for device-to-memory transfers.
    pub dst_start: u32,
    /// Number of rows.
    pub numf: u32,
    /// The chunks making up each row. Exactly one chunk is supported.
    pub sgl: &'a [Chunk],
}

/// One chunk of an interleaved frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Chunk {
    /// Bytes transferred per row.
    pub size: u32,
    /// Bytes skipped between rows.
    pub icg: u32,
}

/// One segment of a scatter-gather list.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SgEntry {
    /// Bus address of the segment.
    pub addr: u32,
    /// Length of the segment in bytes.
    pub len: u32,
}

impl<'dmac, R, C, M> Chan<'dmac, R, C, M>
where
    R: Mmio,
    C: Clock,
    M: DmaMemory,
{
    /// Prepares a 2D transfer of `xt.numf` rows.
    pub fn prep_interleaved(&self, xt: &Interleaved<'_>) -> Result<Tx<'dmac>, DmaError> {
        let mut state = self.lock_free(1, DmaError::NoDescriptor)?;

        let dir = xt.dir.hw().map_err(reject)?;
        let chunk = match xt.sgl {
            [chunk] => chunk,
            sgl => return Err(reject(InvalidTransfer::FrameSize(sgl.len()))),
        };
        if xt.numf == 0 {
            return Err(reject(InvalidTransfer::NoRows));
        }

        let geometry =
            descriptor::interleaved_geometry(chunk.size, chunk.icg, xt.numf).map_err(reject)?;
        let addr = match xt.dir {
            Direction::MemToDev => xt.src_start,
            _ => xt.dst_start,
        };

        let id = state.prepare_free().ok_or(DmaError::NoDescriptor)?;
        let desc = state.desc_mut(id);
        desc.geometry = geometry;
        desc.dir = dir;
        desc.addr = addr;
        desc.len = chunk.size.wrapping_mul(xt.numf);
        tracing::debug!(cid = self.cid, desc = id, ?geometry, "prepared interleaved transfer");

        Ok(self.single_tx(&state, id))
    }

    /// Prepares a scatter-gather transfer to or from a peripheral.
    ///
    /// On Atlas7 v2 the whole list becomes a single descriptor, which the
    /// engine walks through a hardware chain table. Otherwise each segment
    /// occupies its own descriptor, so the channel needs a free descriptor
    /// per segment; if it doesn't have enough, [`DmaError::Busy`] is
    /// returned.
    pub fn prep_slave_sg(
        &self,
        sgl: &[SgEntry],
        dir: Direction,
    ) -> Result<Tx<'dmac>, DmaError> {
        if sgl.is_empty() {
            return Err(reject(InvalidTransfer::EmptyList));
        }
        let hw_dir = dir.hw().map_err(reject)?;

        match self.dmac.version() {
            Version::A7V2 => self.prep_chain(sgl, hw_dir),
            Version::A6 | Version::A7V1 => self.prep_segments(sgl, hw_dir),
        }
    }

    /// Prepares a cyclic transfer over a buffer of two `period_len`-byte
    /// periods. The callback runs each time a period completes.
    pub fn prep_cyclic(
        &self,
        buf: u32,
        buf_len: u32,
        period_len: u32,
        dir: Direction,
    ) -> Result<Tx<'dmac>, DmaError> {
        if period_len == 0 || period_len.checked_mul(2) != Some(buf_len) {
            return Err(reject(InvalidTransfer::Periods {
                buf_len,
                period_len,
            }));
        }
        let hw_dir = dir.hw().map_err(reject)?;

        let geometry = descriptor::cyclic_geometry(buf_len, period_len);
        if geometry.width == 0 {
            tracing::warn!(
                cid = self.cid,
                period_len,
                "no row width divides the period; the transfer will have a zero width",
            );
        }

        let mut state = self.lock_free(1, DmaError::NoDescriptor)?;
        let id = state.prepare_free().ok_or(DmaError::NoDescriptor)?;
        let desc = state.desc_mut(id);
        desc.geometry = geometry;
        desc.dir = hw_dir;
        desc.cyclic = true;
        desc.addr = buf;
        desc.len = buf_len;
        tracing::debug!(cid = self.cid, desc = id, ?geometry, "prepared cyclic transfer");

        Ok(self.single_tx(&state, id))
    }

    /// One descriptor per segment, each shaped into rows the engine can
    /// transfer.
    fn prep_segments(
        &self,
        sgl: &[SgEntry],
        dir: super::regs::HwDirection,
    ) -> Result<Tx<'dmac>, DmaError> {
        let geometries = sgl
            .iter()
            .map(|sg| {
                check_aligned(sg)?;
                descriptor::segment_geometry(sg.len)
            })
            .collect::<Result<Vec<Geometry>, _>>()
            .map_err(reject)?;

        let mut state = self.lock_free(sgl.len(), DmaError::Busy)?;
        let mut ids = Vec::with_capacity(sgl.len());
        for (sg, geometry) in sgl.iter().zip(geometries) {
            let id = state.prepare_free().ok_or(DmaError::Busy)?;
            let desc = state.desc_mut(id);
            desc.geometry = geometry;
            desc.dir = dir;
            desc.addr = sg.addr;
            desc.len = sg.len;
            ids.push(id);
        }
        tracing::debug!(cid = self.cid, descs = ?ids, "prepared scatter-gather transfer");

        Ok(self.tx(&state, ids))
    }

    /// A single descriptor whose chain table lists every segment.
    fn prep_chain(
        &self,
        sgl: &[SgEntry],
        dir: super::regs::HwDirection,
    ) -> Result<Tx<'dmac>, DmaError> {
        if sgl.len() > ChainTable::MAX_SEGMENTS {
            return Err(reject(InvalidTransfer::TooManySegments(sgl.len())));
        }
        for sg in sgl {
            check_aligned(sg).map_err(reject)?;
            if sg.len / WORD >= MAX_CHAIN_WORDS {
                return Err(reject(InvalidTransfer::Geometry { len: sg.len }));
            }
        }

        let mut state = self.lock_free(1, DmaError::Busy)?;
        let id = state.prepare_free().ok_or(DmaError::Busy)?;
        let desc = state.desc_mut(id);
        let mut len = 0u32;
        for (i, sg) in sgl.iter().enumerate() {
            desc.chain_table.set(i, ChainEntry::data(sg.len / WORD, sg.addr));
            len = len.wrapping_add(sg.len);
        }
        desc.chain_table.set(sgl.len(), ChainEntry::end());
        desc.segments = sgl.len();
        desc.len = len;
        desc.dir = dir;
        desc.chain = true;

        let table = desc.chain_table.as_bytes_ptr();
        self.dmac.memory.flush(table, ChainTable::size_bytes());
        desc.addr = self.dmac.memory.virt_to_phys(table);
        tracing::debug!(
            cid = self.cid,
            desc = id,
            segments = sgl.len(),
            table = ?format_args!("{:#x}", desc.addr),
            "prepared chained transfer",
        );

        Ok(self.single_tx(&state, id))
    }

    /// Locks the channel if it has at least `needed` free descriptors.
    /// Otherwise, completed transfers are reclaimed and `exhausted` is
    /// returned.
    fn lock_free(
        &self,
        needed: usize,
        exhausted: DmaError,
    ) -> Result<MutexGuard<'dmac, ChanState>, DmaError> {
        let state = self.state();
        let free = state.lists.len(List::Free);
        if free >= needed {
            return Ok(state);
        }
        drop(state);

        tracing::debug!(cid = self.cid, free, needed, "out of descriptors, reclaiming");
        self.dmac.process_completed();
        Err(exhausted)
    }
}

fn check_aligned(sg: &SgEntry) -> Result<(), InvalidTransfer> {
    if sg.addr % WORD != 0 || sg.len == 0 || sg.len % WORD != 0 {
        return Err(InvalidTransfer::Misaligned {
            addr: sg.addr,
            len: sg.len,
        });
    }
    Ok(())
}

fn reject(error: InvalidTransfer) -> DmaError {
    tracing::error!(%error, "rejected DMA transfer");
    DmaError::Invalid(error)
}
