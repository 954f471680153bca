//! Power management and channel ownership.
//!
//! The controller's clock is gated whenever no channel has its resources
//! allocated ("runtime suspend"). Across system sleep the controller loses
//! its register contents, so the channels with an active transfer are saved
//! before the clock is gated and reprogrammed on resume.
//!
//! On Atlas7 v1 the DMA channels are shared with the Kalimba audio
//! co-processor (KAS). A channel belongs to KAS unless this driver has
//! claimed it for the CPU by allocating its resources.
use core::sync::atomic::Ordering;

use super::{
    channel::List,
    hw::Version,
    regs::{self, Owner},
    Dmac, DmaMemory, CHANNEL_COUNT,
};
use crate::{
    clk::{Clock, ClockError},
    mmio::Mmio,
};

#[derive(Debug)]
pub(crate) struct PmState {
    /// Runtime PM usage count: the number of channels with resources.
    usage: u32,
    /// Runtime PM status. This is what the PM core believes, and it is not
    /// changed by system sleep, which gates and ungates the clock directly.
    pub(crate) runtime_suspended: bool,
    saved: Option<SleepSnapshot>,
}

/// Registers lost across system sleep.
#[derive(Clone, Debug, Default)]
struct SleepSnapshot {
    ctrl: [u32; CHANNEL_COUNT as usize],
    int_en: u32,
    owners: [u32; 2],
}

impl PmState {
    pub(crate) const fn new() -> Self {
        Self {
            usage: 0,
            runtime_suspended: true,
            saved: None,
        }
    }
}

impl<R, C, M> Dmac<R, C, M>
where
    R: Mmio,
    C: Clock,
    M: DmaMemory,
{
    /// Gates the controller clock.
    pub fn runtime_suspend(&self) {
        self.clock.disable();
        tracing::trace!("DMAC clock gated");
    }

    /// Ungates the controller clock.
    pub fn runtime_resume(&self) -> Result<(), ClockError> {
        self.clock.enable()?;
        tracing::trace!("DMAC clock ungated");
        Ok(())
    }

    /// Returns `true` if no channel is in use and the clock is gated.
    #[must_use]
    pub fn is_runtime_suspended(&self) -> bool {
        self.pm.lock().runtime_suspended
    }

    /// Takes a runtime PM reference, resuming the controller if this is the
    /// first one.
    pub(crate) fn pm_get(&self) -> Result<(), ClockError> {
        let mut pm = self.pm.lock();
        if pm.usage == 0 && pm.runtime_suspended {
            self.runtime_resume()?;
            pm.runtime_suspended = false;
        }
        pm.usage += 1;
        Ok(())
    }

    /// Drops a runtime PM reference, suspending the controller if it was the
    /// last one.
    pub(crate) fn pm_put(&self) {
        let mut pm = self.pm.lock();
        let Some(usage) = pm.usage.checked_sub(1) else {
            tracing::warn!("unbalanced DMAC runtime PM put");
            return;
        };
        pm.usage = usage;
        // a removed controller is already suspended.
        if usage == 0 && !pm.runtime_suspended {
            self.runtime_suspend();
            pm.runtime_suspended = true;
        }
    }

    /// Saves the state of every channel with an active transfer and gates
    /// the clock, for system sleep.
    pub fn suspend_noirq(&self) -> Result<(), ClockError> {
        let mut pm = self.pm.lock();
        if pm.runtime_suspended {
            self.runtime_resume()?;
        }

        let regs = self.mmio();
        let mut saved = SleepSnapshot::default();
        for cid in 0..self.backend.sleep_channels() {
            if self.state(cid).lists.is_empty(List::Active) {
                continue;
            }
            saved.ctrl[cid as usize] = regs.read(regs::ch(cid, regs::CH_CTRL));
        }
        saved.int_en = regs.read(self.backend.int_en());
        if self.version() == Version::A7V1 {
            saved.owners = [regs.read(regs::CH_OWNER_0), regs.read(regs::CH_OWNER_1)];
        }
        tracing::debug!(?saved, "DMAC suspended");
        pm.saved = Some(saved);

        self.runtime_suspend();
        Ok(())
    }

    /// Restores the registers saved by [`suspend_noirq`](Self::suspend_noirq)
    /// and, unless the controller was runtime-suspended before sleeping,
    /// leaves the clock running.
    pub fn resume_noirq(&self) -> Result<(), ClockError> {
        let mut pm = self.pm.lock();
        self.runtime_resume()?;

        let regs = self.mmio();
        let saved = pm.saved.take().unwrap_or_else(|| {
            tracing::warn!("DMAC resumed without being suspended");
            SleepSnapshot::default()
        });
        regs.write_relaxed(self.backend.int_en(), saved.int_en);
        if self.version() == Version::A7V1 {
            regs.write_relaxed(regs::CH_OWNER_0, saved.owners[0]);
            regs.write_relaxed(regs::CH_OWNER_1, saved.owners[1]);
        }

        for cid in 0..self.backend.sleep_channels() {
            let state = self.state(cid);
            let Some(desc) = state.active() else {
                continue;
            };
            let geometry = desc.geometry;
            regs.write_relaxed(self.backend.width_reg(cid), geometry.width);
            regs.write_relaxed(regs::ch(cid, regs::CH_XLEN), geometry.xlen);
            regs.write_relaxed(regs::ch(cid, regs::CH_YLEN), geometry.ylen);
            regs.write_relaxed(regs::ch(cid, regs::CH_CTRL), saved.ctrl[cid as usize]);
            regs.write_relaxed(regs::ch(cid, regs::CH_ADDR), self.backend.encode_addr(desc.addr));
            tracing::trace!(cid, "restored channel");
        }

        if pm.runtime_suspended {
            self.runtime_suspend();
        }
        tracing::debug!("DMAC resumed");
        Ok(())
    }

    /// Hibernation: identical to [`suspend_noirq`](Self::suspend_noirq).
    pub fn freeze_noirq(&self) -> Result<(), ClockError> {
        self.suspend_noirq()
    }

    /// Hibernation: identical to [`resume_noirq`](Self::resume_noirq).
    pub fn thaw_noirq(&self) -> Result<(), ClockError> {
        self.resume_noirq()
    }

    /// Hibernation: identical to [`suspend_noirq`](Self::suspend_noirq).
    pub fn poweroff_noirq(&self) -> Result<(), ClockError> {
        self.suspend_noirq()
    }

    /// Hibernation: identical to [`resume_noirq`](Self::resume_noirq).
    pub fn restore_noirq(&self) -> Result<(), ClockError> {
        self.resume_noirq()
    }

    /// Returns the channels this driver has claimed from KAS (Atlas7 v1).
    #[must_use]
    pub fn owned_channels(&self) -> u16 {
        self.owned.load(Ordering::Acquire)
    }

    /// Returns the current owner of channel `cid` (Atlas7 v1).
    #[must_use]
    pub fn owner(&self, cid: u8) -> Option<Owner> {
        if self.version() != Version::A7V1 || cid >= CHANNEL_COUNT {
            return None;
        }
        let (reg, shift) = regs::owner_field(cid);
        match (self.mmio().read(reg) >> shift) & Owner::MASK {
            0 => Some(Owner::Cpu),
            1 => Some(Owner::Kas),
            _ => None,
        }
    }

    pub(crate) fn claim_ownership(&self, cid: u8) {
        if self.version() == Version::A7V1 {
            self.set_owner(cid, Owner::Cpu);
            self.owned.fetch_or(1 << cid, Ordering::AcqRel);
        }
    }

    pub(crate) fn release_ownership(&self, cid: u8) {
        if self.version() == Version::A7V1 {
            self.owned.fetch_and(!(1 << cid), Ordering::AcqRel);
            self.set_owner(cid, Owner::Kas);
        }
    }

    fn set_owner(&self, cid: u8, owner: Owner) {
        let regs = self.mmio();
        let (reg, shift) = regs::owner_field(cid);
        let value = regs.read(reg) & !(Owner::MASK << shift);
        regs.write(reg, value | ((owner as u32) << shift));
        tracing::debug!(cid, ?owner, "DMA channel ownership");
    }
}
