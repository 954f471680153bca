//! Driver for the SiRF DMA controllers (DMAC).
//!
//! A [`Dmac`] owns one controller instance: 16 channels, each with a pool of
//! [`DESCRIPTORS`] transfer descriptors. Consumers obtain a [`Chan`] through
//! [`Dmac::xlate`] (device-tree style lookup by request line) or
//! [`Dmac::request_channel`], prepare transfers with
//! [`Chan::prep_interleaved`], [`Chan::prep_slave_sg`] or
//! [`Chan::prep_cyclic`], [`submit`](Chan::submit) them and then
//! [`issue_pending`](Chan::issue_pending) to start the oldest one.
//!
//! Each descriptor moves through a channel's lists as its transfer
//! progresses:
//!
//! ```text
//! free -> prepared -> queued -> active -> completed -> free
//! ```
//!
//! Cyclic transfers stay `active` until they are terminated.
//!
//! [`Dmac::handle_interrupt`] must be called from the controller's interrupt
//! handler. It retires finished transfers, starts the next queued transfer
//! right away, and schedules the completion tasklet, which runs completion
//! callbacks. The tasklet is either driven by spawning [`Dmac::tasklet`] on
//! an async executor, or by calling [`Dmac::run_tasklet`] directly.
#![warn(missing_docs)]
use alloc::{vec, vec::Vec};
use core::{
    fmt, mem,
    sync::atomic::{fence, Ordering},
};

use maitake_sync::{
    spin::{Mutex, MutexGuard},
    WaitCell,
};
use mycelium_bitfield::bitfield;
use portable_atomic::{AtomicBool, AtomicU16};

use self::{
    channel::ChanState,
    descriptor::Descriptor,
    hw::Backend,
    pm::PmState,
};
pub use self::{
    channel::{List, ListLens, DESCRIPTORS},
    cookie::{Cookie, Status},
    descriptor::{Callback, Direction},
    error::{DmaError, InvalidTransfer, ProbeError},
    hw::Version,
    prep::{Chunk, Interleaved, SgEntry},
    regs::Owner,
};
use crate::{clk::Clock, config::DmacConfig, mmio::Mmio};

mod channel;
mod cookie;
pub mod descriptor;
mod error;
mod hw;
mod irq;
mod pm;
mod prep;
mod regs;

/// The number of channels on a SiRF DMA controller.
pub const CHANNEL_COUNT: u8 = 16;

/// Address translation and cache maintenance for memory the DMA engine reads
/// on its own, such as Atlas7 v2 chain tables.
pub trait DmaMemory: Sync {
    /// Returns the bus address of `ptr`.
    fn virt_to_phys(&self, ptr: *const u8) -> u32;

    /// Writes back any cached data in `len` bytes starting at `ptr`, so the
    /// DMA engine observes it.
    fn flush(&self, ptr: *const u8, len: usize);
}

/// A [`DmaMemory`] for memory mapped at a fixed offset from its bus address,
/// with no data cache to maintain.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LinearMap {
    virt_offset: usize,
}

/// A handle to a SiRF DMA controller.
///
/// Everything is accessed through `&self`: the controller is shared between
/// the interrupt handler, the completion tasklet and consumer drivers, and
/// each channel's state is guarded by its own spinlock.
pub struct Dmac<R, C, M = LinearMap> {
    regs: R,
    clock: C,
    memory: M,
    backend: &'static dyn Backend,
    channels: [Mutex<ChanState>; CHANNEL_COUNT as usize],
    channel_count: u8,
    irq: u32,
    cell_index: u32,
    /// Channels handed out by `xlate` or `request_channel`.
    claimed: AtomicU16,
    /// Channels whose ownership has been taken from the KAS core (A7V1).
    owned: AtomicU16,
    tasklet_pending: AtomicBool,
    tasklet_wait: WaitCell,
    pm: Mutex<PmState>,
}

/// A claimed DMA channel.
///
/// Returned by [`Dmac::xlate`] and [`Dmac::request_channel`], with its
/// descriptors already allocated. Use [`Chan::release`] to free them and give
/// the channel back.
///
/// Dropping a `Chan` also gives the channel back. Any queued or active
/// transfers are terminated first, and completion callbacks that haven't run
/// yet are dropped.
pub struct Chan<'dmac, R, C, M = LinearMap>
where
    R: Mmio,
    C: Clock,
    M: DmaMemory,
{
    dmac: &'dmac Dmac<R, C, M>,
    cid: u8,
}

/// A prepared transfer, returned by the `prep_*` methods of [`Chan`].
///
/// A transfer does nothing until it is [submitted](Chan::submit). Its
/// descriptors stay `prepared` until then, and go back to `free` if it is
/// dropped instead.
#[must_use = "a prepared transfer does nothing until it is submitted"]
pub struct Tx<'dmac> {
    state: &'dmac Mutex<ChanState>,
    cid: u8,
    /// Generation of the channel's descriptor arena the descriptors belong to.
    generation: u32,
    descs: Vec<u8>,
    callback: Option<Callback>,
}

/// Channel control operations, performed by [`Chan::control`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DmaCtrl {
    /// Stop a cyclic transfer's loop buffer from wrapping.
    Pause,
    /// Resume a paused cyclic transfer.
    Resume,
    /// Cancel every queued and active transfer, without running callbacks.
    TerminateAll,
    /// Configure the channel for a peripheral.
    SlaveConfig(SlaveConfig),
}

/// Peripheral-side configuration of a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SlaveConfig {
    /// Width of the source's data register.
    pub src_addr_width: BusWidth,
    /// Width of the destination's data register.
    pub dst_addr_width: BusWidth,
    /// Words per source burst. Burst mode is used when this is 4.
    pub src_maxburst: u32,
    /// Words per destination burst.
    pub dst_maxburst: u32,
}

/// Width of a peripheral's data register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum BusWidth {
    #[allow(missing_docs)]
    Undefined = 0,
    #[allow(missing_docs)]
    Bytes1 = 1,
    #[allow(missing_docs)]
    Bytes2 = 2,
    #[allow(missing_docs)]
    Bytes4 = 4,
    #[allow(missing_docs)]
    Bytes8 = 8,
}

bitfield! {
    /// Transfer types a controller advertises.
    #[derive(PartialEq, Eq)]
    pub struct Caps<u32> {
        /// Peripheral transfers (`prep_slave_sg`).
        pub const SLAVE: bool;
        /// Cyclic transfers (`prep_cyclic`).
        pub const CYCLIC: bool;
        /// 2D transfers (`prep_interleaved`).
        pub const INTERLEAVE: bool;
        /// Channels are only handed out by explicit request.
        pub const PRIVATE: bool;
    }
}

/// How precisely a channel reports residue.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResidueGranularity {
    /// Residue is not reported.
    Descriptor,
    /// Residue is updated after each segment.
    Segment,
    /// Residue is updated after each burst.
    Burst,
}

/// What a channel can do, as returned by [`Chan::slave_caps`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SlaveCaps {
    /// Supported transfer types.
    pub caps: Caps,
    /// Supported source register widths.
    pub src_addr_widths: &'static [BusWidth],
    /// Supported destination register widths.
    pub dst_addr_widths: &'static [BusWidth],
    /// Supported directions.
    pub directions: &'static [Direction],
    /// Whether [`DmaCtrl::Pause`] is supported.
    pub cmd_pause: bool,
    /// Whether [`DmaCtrl::TerminateAll`] is supported.
    pub cmd_terminate: bool,
    /// How precisely residue is reported.
    pub residue_granularity: ResidueGranularity,
}

/// The state of a transfer, as returned by [`Chan::tx_status`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TxStatus {
    /// Whether the transfer has completed.
    pub status: Status,
    /// Bytes the channel's active transfer has yet to move.
    pub residue: u32,
}

const BUS_WIDTHS: &[BusWidth] = &[
    BusWidth::Undefined,
    BusWidth::Bytes1,
    BusWidth::Bytes2,
    BusWidth::Bytes4,
    BusWidth::Bytes8,
];

// === impl LinearMap ===

impl LinearMap {
    /// Virtual addresses are bus addresses.
    pub const IDENTITY: Self = Self::new(0);

    /// Memory whose virtual addresses are `virt_offset` above its bus
    /// addresses.
    #[must_use]
    pub const fn new(virt_offset: usize) -> Self {
        Self { virt_offset }
    }
}

impl DmaMemory for LinearMap {
    fn virt_to_phys(&self, ptr: *const u8) -> u32 {
        (ptr as usize).wrapping_sub(self.virt_offset) as u32
    }

    fn flush(&self, _ptr: *const u8, _len: usize) {
        fence(Ordering::SeqCst);
    }
}

impl<D: DmaMemory + ?Sized> DmaMemory for &'_ D {
    #[inline]
    fn virt_to_phys(&self, ptr: *const u8) -> u32 {
        D::virt_to_phys(self, ptr)
    }

    #[inline]
    fn flush(&self, ptr: *const u8, len: usize) {
        D::flush(self, ptr, len)
    }
}

// === impl Dmac ===

impl<R, C, M> Dmac<R, C, M>
where
    R: Mmio,
    C: Clock,
    M: DmaMemory,
{
    /// The total number of DMA channels on a controller.
    pub const CHANNEL_COUNT: u8 = CHANNEL_COUNT;

    /// Sets up the controller described by `config`.
    ///
    /// The controller starts runtime-suspended, with its clock gated; the
    /// clock is ungated when the first channel's resources are allocated.
    #[tracing::instrument(
        name = "Dmac::probe",
        level = "info",
        skip_all,
        fields(compatible = %config.compatible),
        err(Display),
    )]
    pub fn probe(config: &DmacConfig, regs: R, clock: C, memory: M) -> Result<Self, ProbeError> {
        let channel_count = config.dma_channels;
        if channel_count == 0 || channel_count > CHANNEL_COUNT {
            return Err(ProbeError::ChannelCount(channel_count));
        }
        let irq = config.irq.ok_or(ProbeError::NoIrq)?;
        let backend = hw::backend_for(config.compatible);

        tracing::info!(
            version = %backend.version(),
            channels = channel_count,
            irq,
            cell_index = config.cell_index,
            "SiRF DMA controller probed",
        );

        Ok(Self {
            regs,
            clock,
            memory,
            backend,
            channels: core::array::from_fn(|_| Mutex::new(ChanState::new())),
            channel_count,
            irq,
            cell_index: config.cell_index,
            claimed: AtomicU16::new(0),
            owned: AtomicU16::new(0),
            tasklet_pending: AtomicBool::new(false),
            tasklet_wait: WaitCell::new(),
            pm: Mutex::new(PmState::new()),
        })
    }

    /// Tears the controller down.
    ///
    /// The completion tasklet is stopped, and the clock is gated unless the
    /// controller is already runtime-suspended.
    pub fn remove(&self) {
        self.tasklet_wait.close();
        let mut pm = self.pm.lock();
        if !pm.runtime_suspended {
            self.runtime_suspend();
            pm.runtime_suspended = true;
        }
        tracing::info!(version = %self.version(), "SiRF DMA controller removed");
    }

    /// Looks up a channel by device-tree request line, claiming it and
    /// allocating its descriptors.
    ///
    /// Returns `None` if there is no such channel, it is already claimed, or
    /// its descriptors could not be allocated.
    pub fn xlate(&self, request: u32) -> Option<Chan<'_, R, C, M>> {
        if request >= CHANNEL_COUNT as u32 {
            tracing::debug!(request, "no such DMA channel");
            return None;
        }
        self.request_channel(request as u8)
    }

    /// Claims channel `cid` and allocates its descriptors.
    pub fn request_channel(&self, cid: u8) -> Option<Chan<'_, R, C, M>> {
        if cid >= self.channel_count {
            return None;
        }

        let bit = 1 << cid;
        if self.claimed.fetch_or(bit, Ordering::AcqRel) & bit != 0 {
            tracing::debug!(cid, "DMA channel already claimed");
            return None;
        }

        // dropping the channel on failure gives the claim back.
        let chan = Chan { dmac: self, cid };
        match chan.alloc_chan_resources() {
            Ok(_) => Some(chan),
            Err(error) => {
                tracing::error!(cid, %error, "failed to allocate DMA channel resources");
                None
            }
        }
    }

    /// Returns the controller's hardware version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.backend.version()
    }

    /// Returns the controller's interrupt line.
    #[must_use]
    pub fn irq(&self) -> u32 {
        self.irq
    }

    /// Returns the controller's `cell-index`.
    #[must_use]
    pub fn cell_index(&self) -> u32 {
        self.cell_index
    }

    /// Returns the number of usable channels.
    #[must_use]
    pub fn channel_count(&self) -> u8 {
        self.channel_count
    }

    /// Returns the controller's register block.
    #[must_use]
    pub fn regs(&self) -> &R {
        &self.regs
    }

    #[inline]
    fn mmio(&self) -> &dyn Mmio {
        &self.regs
    }

    #[inline]
    fn state(&self, cid: u8) -> MutexGuard<'_, ChanState> {
        self.channels[cid as usize].lock()
    }

    /// Moves the head of `cid`'s queue to `active` and starts it.
    fn execute(&self, state: &mut ChanState, cid: u8) {
        let Some(id) = state.lists.move_front(List::Queued, List::Active) else {
            return;
        };
        let hw_cid = self.backend.hw_channel(cid);
        let desc = &state.descs[id as usize];
        tracing::trace!(cid, hw_cid, desc = id, ?desc, "execute");
        self.backend.execute(self.mmio(), desc, hw_cid, state.burst);

        let cyclic = desc.cyclic;
        if cyclic {
            state.happened_cyclic = 0;
            state.completed_cyclic = 0;
            state.epoch = state.epoch.wrapping_add(1);
        }
    }
}

impl<R, C, M> fmt::Debug for Dmac<R, C, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dmac")
            .field("version", &self.backend.version())
            .field("channels", &self.channel_count)
            .field("irq", &self.irq)
            .field("cell_index", &self.cell_index)
            .field(
                "claimed",
                &format_args!("{:#018b}", self.claimed.load(Ordering::Relaxed)),
            )
            .finish_non_exhaustive()
    }
}

// === impl Chan ===

impl<'dmac, R, C, M> Chan<'dmac, R, C, M>
where
    R: Mmio,
    C: Clock,
    M: DmaMemory,
{
    /// Returns this channel's index.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u8 {
        self.cid
    }

    #[inline]
    fn state(&self) -> MutexGuard<'dmac, ChanState> {
        self.dmac.state(self.cid)
    }

    #[inline]
    fn hw_cid(&self) -> u8 {
        self.dmac.backend.hw_channel(self.cid)
    }

    /// Allocates this channel's descriptors.
    ///
    /// This ungates the controller clock if this is the first channel in
    /// use, and on Atlas7 v1 takes the channel over from the KAS core.
    /// Allocation failures part of the way through are tolerated; the number
    /// of usable descriptors is returned.
    pub fn alloc_chan_resources(&self) -> Result<usize, DmaError> {
        let allocated = self.state().descs.len();
        if allocated > 0 {
            return Ok(allocated);
        }

        self.dmac.pm_get()?;
        self.dmac.claim_ownership(self.cid);

        let mut state = self.state();

        // chain tables are handed to the engine by address, so the arena
        // must not move once descriptors are in use.
        let mut allocated = 0;
        for _ in 0..DESCRIPTORS {
            if state.descs.try_reserve_exact(1).is_err() {
                break;
            }
            state.descs.push(Descriptor::new());
            state.lists.push_new();
            allocated += 1;
        }
        drop(state);

        if allocated == 0 {
            self.dmac.release_ownership(self.cid);
            self.dmac.pm_put();
            return Err(DmaError::NoMemory);
        }

        if allocated < DESCRIPTORS {
            tracing::warn!(
                cid = self.cid,
                allocated,
                "only allocated some of the channel's descriptors",
            );
        }
        tracing::debug!(cid = self.cid, allocated, "allocated channel resources");
        Ok(allocated)
    }

    /// Frees this channel's descriptors.
    ///
    /// Completed transfers whose callbacks haven't run yet are dropped along
    /// with their callbacks. Calling this from a completion callback is
    /// allowed.
    ///
    /// # Panics
    ///
    /// If a transfer is still prepared, queued or active: every transfer
    /// must have been submitted and have completed or been terminated.
    pub fn free_chan_resources(&self) {
        let mut state = self.state();
        assert!(
            state.is_idle(),
            "freed DMA channel {} while it was still in use: {:?}",
            self.cid,
            state.lists.lens(),
        );
        let completed = state.lists.len(List::Completed);
        let freed = state.teardown();
        drop(state);

        self.dmac.release_ownership(self.cid);
        self.dmac.pm_put();
        if completed > 0 {
            tracing::debug!(cid = self.cid, completed, "dropped unreclaimed completions");
        }
        tracing::debug!(cid = self.cid, freed, "freed channel resources");
    }

    /// Frees this channel's resources and gives the channel back to the
    /// controller.
    ///
    /// # Panics
    ///
    /// As [`Chan::free_chan_resources`].
    pub fn release(self) {
        self.free_chan_resources();
    }

    /// Queues a prepared transfer, returning its cookie.
    ///
    /// # Panics
    ///
    /// If `tx` was prepared on another channel, or before this channel's
    /// resources were last freed.
    pub fn submit(&self, mut tx: Tx<'dmac>) -> Cookie {
        assert_eq!(
            tx.cid, self.cid,
            "transfer prepared on channel {} was submitted to channel {}",
            tx.cid, self.cid
        );
        let descs = mem::take(&mut tx.descs);
        let callback = tx.callback.take();

        let mut state = self.state();
        assert_eq!(
            tx.generation, state.generation,
            "transfer was prepared before DMA channel {} was freed",
            self.cid
        );
        for &id in &descs {
            state.lists.move_to(id, List::Prepared, List::Queued);
        }
        let cookie = state.cookies.assign();
        if let Some(&last) = descs.last() {
            let desc = state.desc_mut(last);
            desc.cookie = Some(cookie);
            desc.callback = callback;
        }
        tracing::debug!(cid = self.cid, %cookie, descs = descs.len(), "submitted");
        cookie
    }

    /// Starts the oldest queued transfer, unless one is already active.
    pub fn issue_pending(&self) {
        let mut state = self.state();
        if state.lists.is_empty(List::Active) && !state.lists.is_empty(List::Queued) {
            self.dmac.execute(&mut state, self.cid);
        }
    }

    /// Performs a control operation.
    pub fn control(&self, ctrl: DmaCtrl) -> Result<(), DmaError> {
        match ctrl {
            DmaCtrl::Pause => self.pause(),
            DmaCtrl::Resume => self.resume(),
            DmaCtrl::TerminateAll => self.terminate_all(),
            DmaCtrl::SlaveConfig(config) => return self.slave_config(config),
        }
        Ok(())
    }

    /// Stops this channel's loop buffer from wrapping.
    pub fn pause(&self) {
        let mut state = self.state();
        self.dmac.backend.pause(self.dmac.mmio(), self.hw_cid());
        state.paused = true;
        tracing::debug!(cid = self.cid, "paused");
    }

    /// Resumes a paused loop buffer.
    pub fn resume(&self) {
        let mut state = self.state();
        self.dmac.backend.resume(self.dmac.mmio(), self.hw_cid());
        state.paused = false;
        tracing::debug!(cid = self.cid, "resumed");
    }

    /// Cancels every queued and active transfer. Their descriptors go
    /// straight back to `free`, and no callbacks are run.
    pub fn terminate_all(&self) {
        let mut state = self.state();
        self.dmac.backend.terminate(self.dmac.mmio(), self.hw_cid());
        let active = state.lists.splice(List::Active, List::Free);
        let queued = state.lists.splice(List::Queued, List::Free);
        state.paused = false;
        state.epoch = state.epoch.wrapping_add(1);
        tracing::debug!(cid = self.cid, active, queued, "terminated all transfers");
    }

    /// Configures this channel for a peripheral.
    pub fn slave_config(&self, config: SlaveConfig) -> Result<(), DmaError> {
        if config.src_addr_width != BusWidth::Bytes4 || config.dst_addr_width != BusWidth::Bytes4 {
            return Err(InvalidTransfer::BusWidth {
                src: config.src_addr_width as u32,
                dst: config.dst_addr_width as u32,
            }
            .into());
        }

        let mut state = self.state();
        state.burst = config.src_maxburst == 4;
        tracing::debug!(cid = self.cid, burst = state.burst, "slave config");
        Ok(())
    }

    /// Returns the status of the transfer identified by `cookie`, and the
    /// residue of this channel's active transfer.
    #[must_use]
    pub fn tx_status(&self, cookie: Cookie) -> TxStatus {
        let state = self.state();
        let status = if state.cookies.is_complete(cookie) {
            Status::Complete
        } else if state.paused {
            Status::Paused
        } else {
            Status::InProgress
        };

        let residue = match state.active() {
            Some(desc) => {
                let pos = self.dmac.backend.position(self.dmac.mmio(), self.hw_cid());
                desc.residue(pos)
            }
            None => 0,
        };

        TxStatus { status, residue }
    }

    /// Returns what this channel can do.
    #[must_use]
    pub fn slave_caps(&self) -> SlaveCaps {
        SlaveCaps {
            caps: Caps::new()
                .with(Caps::SLAVE, true)
                .with(Caps::CYCLIC, true)
                .with(Caps::INTERLEAVE, true)
                .with(Caps::PRIVATE, true),
            src_addr_widths: BUS_WIDTHS,
            dst_addr_widths: BUS_WIDTHS,
            directions: &[Direction::DevToMem, Direction::MemToDev],
            cmd_pause: true,
            cmd_terminate: true,
            residue_granularity: ResidueGranularity::Burst,
        }
    }

    /// Returns the number of descriptors in each of this channel's lists.
    #[must_use]
    pub fn lens(&self) -> ListLens {
        self.state().lists.lens()
    }

    /// Returns the number of loop-buffer halves completed by the active
    /// cyclic transfer, and the number whose callbacks have run.
    #[must_use]
    pub fn cyclic_counts(&self) -> (u32, u32) {
        let state = self.state();
        (state.happened_cyclic, state.completed_cyclic)
    }

    /// Returns a new transfer made of `descs`.
    ///
    /// Takes the channel's state so the generation is read under the same
    /// lock that moved `descs` to `prepared`.
    fn tx(&self, state: &ChanState, descs: Vec<u8>) -> Tx<'dmac> {
        Tx {
            state: &self.dmac.channels[self.cid as usize],
            cid: self.cid,
            generation: state.generation,
            descs,
            callback: None,
        }
    }

    fn single_tx(&self, state: &ChanState, id: u8) -> Tx<'dmac> {
        self.tx(state, vec![id])
    }
}

impl<R, C, M> Drop for Chan<'_, R, C, M>
where
    R: Mmio,
    C: Clock,
    M: DmaMemory,
{
    fn drop(&mut self) {
        let allocated = !self.state().descs.is_empty();
        if allocated {
            self.terminate_all();
            let dropped = self.state().teardown();
            self.dmac.release_ownership(self.cid);
            self.dmac.pm_put();
            tracing::debug!(cid = self.cid, dropped, "dropped channel with resources allocated");
        }
        self.dmac
            .claimed
            .fetch_and(!(1 << self.cid), Ordering::AcqRel);
    }
}

impl<R, C, M> fmt::Debug for Chan<'_, R, C, M>
where
    R: Mmio,
    C: Clock,
    M: DmaMemory,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chan")
            .field("cid", &self.cid)
            .field("dmac", &self.dmac)
            .finish()
    }
}

// === impl Tx ===

impl Tx<'_> {
    /// Sets the function called when this transfer completes (or, for cyclic
    /// transfers, each time half of the buffer has been transferred).
    pub fn with_callback(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.callback = Some(alloc::boxed::Box::new(callback));
        self
    }

    /// Returns the channel this transfer was prepared on.
    #[must_use]
    pub fn channel(&self) -> u8 {
        self.cid
    }

    /// Returns the number of descriptors this transfer occupies.
    #[must_use]
    pub fn descriptors(&self) -> usize {
        self.descs.len()
    }
}

impl Drop for Tx<'_> {
    fn drop(&mut self) {
        if self.descs.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        // the channel was freed, and its descriptors with it.
        if state.generation != self.generation {
            return;
        }
        for &id in &self.descs {
            state.lists.move_to(id, List::Prepared, List::Free);
        }
        tracing::debug!(cid = self.cid, descs = self.descs.len(), "dropped unsubmitted transfer");
    }
}

impl fmt::Debug for Tx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("cid", &self.cid)
            .field("generation", &self.generation)
            .field("descs", &self.descs)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
