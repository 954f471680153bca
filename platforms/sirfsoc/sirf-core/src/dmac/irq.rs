//! Interrupt handling and the completion tasklet.
use alloc::vec::Vec;
use core::sync::atomic::Ordering;

use super::{
    channel::{ChanState, List},
    hw::Version,
    regs::{self, V2Int},
    Dmac, DmaMemory,
};
use crate::{clk::Clock, mmio::Mmio};

/// Interrupt status bits that correspond to channels.
const CHANNEL_MASK: u32 = (1 << super::CHANNEL_COUNT) - 1;

impl<R, C, M> Dmac<R, C, M>
where
    R: Mmio,
    C: Clock,
    M: DmaMemory,
{
    /// Handles a DMAC interrupt.
    ///
    /// Finished transfers are moved to `completed` and the next queued
    /// transfer on their channel is started immediately. Callbacks are left
    /// to the completion tasklet, which is always scheduled.
    pub fn handle_interrupt(&self) {
        match self.backend.version() {
            Version::A6 | Version::A7V1 => self.legacy_interrupt(),
            Version::A7V2 => self.v2_interrupt(),
        }
        self.schedule_tasklet();
    }

    fn legacy_interrupt(&self) {
        let regs = self.mmio();
        let mut status = regs.read(regs::CH_INT) & CHANNEL_MASK;
        if self.backend.version() == Version::A7V1 {
            status &= u32::from(self.owned.load(Ordering::Acquire));
        }
        tracing::trace!(ch_int = ?format_args!("{status:#018b}"), "DMAC interrupt");

        // highest channel first
        while status != 0 {
            let cid = (31 - status.leading_zeros()) as u8;
            status &= !(1 << cid);
            regs.write_relaxed(regs::CH_INT, 1 << cid);

            let mut state = self.state(cid);
            let cyclic = state.active().map(|desc| desc.cyclic);
            match cyclic {
                Some(false) => self.complete_active(&mut state, cid),
                Some(true) => state.happened_cyclic = state.happened_cyclic.wrapping_add(1),
                None => tracing::warn!(cid, "interrupt for a DMA channel with nothing active"),
            }
        }
    }

    /// The v2 engine performs every channel's transfers, and only channel
    /// 0's active descriptor tells us what the interrupt means.
    fn v2_interrupt(&self) {
        let regs = self.mmio();
        let status = V2Int::from_bits(regs.read(regs::INT_ATLAS7));
        regs.write_relaxed(regs::INT_ATLAS7, V2Int::ALL);
        tracing::trace!(%status, "DMAC interrupt");

        let mut state = self.state(0);
        let Some((cyclic, chain)) = state.active().map(|desc| (desc.cyclic, desc.chain)) else {
            tracing::warn!(%status, "DMAC interrupt with nothing active");
            return;
        };

        if cyclic {
            if status.get(V2Int::LOOP) {
                state.happened_cyclic = state.happened_cyclic.wrapping_add(1);
            }
            return;
        }

        let done = if chain {
            status.get(V2Int::END)
        } else {
            status.get(V2Int::FINISH)
        };
        if done {
            self.complete_active(&mut state, 0);
        }
    }

    /// Retires the active transfer and starts the next queued one.
    fn complete_active(&self, state: &mut ChanState, cid: u8) {
        let cookie = state.active().and_then(|desc| desc.cookie);
        state.lists.splice(List::Active, List::Completed);
        if let Some(cookie) = cookie {
            state.cookies.complete(cookie);
        }
        tracing::trace!(cid, ?cookie, "transfer complete");

        if !state.lists.is_empty(List::Queued) {
            self.execute(state, cid);
        }
    }

    fn schedule_tasklet(&self) {
        self.tasklet_pending.store(true, Ordering::Release);
        self.tasklet_wait.wake();
    }

    /// Runs the completion tasklet, if it has been scheduled.
    pub fn run_tasklet(&self) {
        if self.tasklet_pending.swap(false, Ordering::AcqRel) {
            self.process_completed();
        }
    }

    /// Runs the completion tasklet each time it is scheduled, until the
    /// controller is [removed](Self::remove).
    pub async fn tasklet(&self) {
        loop {
            // subscribe before checking for work, so that a wakeup between
            // the check and the wait is not lost.
            let wait = self.tasklet_wait.subscribe().await;
            if self.tasklet_pending.swap(false, Ordering::AcqRel) {
                self.process_completed();
                continue;
            }

            if wait.await.is_err() {
                tracing::debug!("DMAC tasklet stopped");
                return;
            }
        }
    }

    /// Runs the callbacks of every completed transfer and returns their
    /// descriptors to `free`, then catches up on the callbacks of active
    /// cyclic transfers.
    ///
    /// Channel locks are never held while a callback runs. Completed
    /// descriptors stay in `completed` until their callbacks have returned,
    /// and a callback may release its own channel.
    pub(crate) fn process_completed(&self) {
        for cid in 0..self.channel_count {
            let mut state = self.state(cid);
            if state.reclaiming {
                // another pass is running this channel's callbacks.
                continue;
            }
            if !state.lists.is_empty(List::Completed) {
                let done = state.lists.members(List::Completed);
                let mut callbacks = Vec::with_capacity(done.len());
                let mut last_cookie = None;
                for &id in &done {
                    let desc = state.desc_mut(id);
                    callbacks.extend(desc.callback.take());
                    last_cookie = desc.cookie.or(last_cookie);
                }
                let generation = state.generation;
                state.reclaiming = true;
                drop(state);

                for mut callback in callbacks {
                    callback();
                }

                let mut state = self.state(cid);
                state.reclaiming = false;
                if state.generation != generation {
                    tracing::debug!(cid, "channel freed by a completion callback");
                    continue;
                }
                for &id in &done {
                    state.lists.move_to(id, List::Completed, List::Free);
                }
                if let Some(cookie) = last_cookie {
                    state.cookies.complete(cookie);
                }
                tracing::trace!(cid, reclaimed = done.len(), "reclaimed completed descriptors");
                continue;
            }

            let Some(id) = state.lists.front(List::Active) else {
                continue;
            };
            let pending = state.happened_cyclic.wrapping_sub(state.completed_cyclic);
            if !state.desc(id).cyclic || pending == 0 {
                continue;
            }

            let happened = state.happened_cyclic;
            let epoch = state.epoch;
            let Some(mut callback) = state.desc_mut(id).callback.take() else {
                state.completed_cyclic = happened;
                continue;
            };
            drop(state);

            for _ in 0..pending {
                callback();
            }

            let mut state = self.state(cid);
            // the transfer may have been terminated (and its descriptor
            // reused) while the callbacks ran.
            if state.epoch == epoch {
                state.completed_cyclic = happened;
                state.desc_mut(id).callback = Some(callback);
            }
            tracing::trace!(cid, pending, "ran cyclic callbacks");
        }
    }
}
