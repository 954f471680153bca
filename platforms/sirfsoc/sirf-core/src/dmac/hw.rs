//! Version-specific register sequences.
//!
//! The three controller versions share a programming model but disagree on
//! nearly every register: where the width lives, how addresses are encoded,
//! how interrupts and loop buffers are enabled and how a channel is torn
//! down. Each version gets a [`Backend`] implementation, selected once at
//! probe time by [`backend_for`].
use core::fmt;

use super::{
    descriptor::Descriptor,
    regs::{self, LegacyCtrl, V2Ctrl, V2Int},
};
use crate::{
    config::Compatible,
    mmio::{clear_bits, set_bits, Mmio},
};

/// Controller hardware versions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Version {
    /// Prima2 and Atlas6.
    A6,
    /// The Atlas7 controller in legacy (per-channel) mode.
    A7V1,
    /// The Atlas7 "v2" controller: one engine, hardware chaining.
    A7V2,
}

/// The register sequences that differ between controller versions.
///
/// `cid` is always a hardware channel, as returned by
/// [`Backend::hw_channel`].
pub(crate) trait Backend: Sync {
    fn version(&self) -> Version;

    /// Programs and starts `desc`. The start address is written last, and
    /// with [`Mmio::write`], since the engine starts on that write.
    fn execute(&self, regs: &dyn Mmio, desc: &Descriptor, cid: u8, burst: bool);

    /// Disables `cid`'s interrupts and loop buffer and invalidates it.
    fn terminate(&self, regs: &dyn Mmio, cid: u8);

    /// Stops `cid`'s loop buffer from wrapping.
    fn pause(&self, regs: &dyn Mmio, cid: u8);

    /// Re-enables `cid`'s loop buffer.
    fn resume(&self, regs: &dyn Mmio, cid: u8);

    /// The byte address the engine is currently transferring.
    fn position(&self, regs: &dyn Mmio, cid: u8) -> u32;

    /// Offset of the interrupt-enable register saved across system sleep.
    fn int_en(&self) -> usize;

    /// Offset of `cid`'s width register.
    fn width_reg(&self, cid: u8) -> usize;

    /// The hardware channel a logical channel is performed on.
    fn hw_channel(&self, cid: u8) -> u8 {
        cid
    }

    /// Encodes a descriptor's address for the `CH_ADDR` register.
    fn encode_addr(&self, addr: u32) -> u32 {
        addr >> 2
    }

    /// Number of hardware channels whose state is saved across system sleep.
    fn sleep_channels(&self) -> u8 {
        super::CHANNEL_COUNT
    }
}

/// Prima2/Atlas6 back-end.
pub(crate) struct A6;

/// Atlas7 legacy back-end.
pub(crate) struct Atlas7V1;

/// Atlas7 v2 back-end.
pub(crate) struct Atlas7V2;

/// Returns the back-end matching a device-tree compatible string.
pub(crate) fn backend_for(compatible: Compatible) -> &'static dyn Backend {
    match compatible {
        Compatible::Prima2 => &A6,
        Compatible::Atlas7 => &Atlas7V1,
        Compatible::Atlas7V2 => &Atlas7V2,
    }
}

fn legacy_ctrl(desc: &Descriptor, cid: u8, burst: bool) -> u32 {
    LegacyCtrl::new()
        .with(LegacyCtrl::CID, cid as u32)
        .with(LegacyCtrl::BURST, burst)
        .with(LegacyCtrl::DIR, desc.dir)
        .bits()
}

/// Writes the geometry and control registers shared by both legacy
/// back-ends.
fn legacy_program(regs: &dyn Mmio, desc: &Descriptor, cid: u8, burst: bool) {
    regs.write_relaxed(regs::width(regs::WIDTH_0, cid), desc.geometry.width);
    regs.write_relaxed(regs::ch(cid, regs::CH_CTRL), legacy_ctrl(desc, cid, burst));
    regs.write_relaxed(regs::ch(cid, regs::CH_XLEN), desc.geometry.xlen);
    regs.write_relaxed(regs::ch(cid, regs::CH_YLEN), desc.geometry.ylen);
    set_bits(regs, regs::INT_EN, 1 << cid);
}

// === impl A6 ===

impl Backend for A6 {
    fn version(&self) -> Version {
        Version::A6
    }

    fn execute(&self, regs: &dyn Mmio, desc: &Descriptor, cid: u8, burst: bool) {
        legacy_program(regs, desc, cid, burst);
        regs.write(regs::ch(cid, regs::CH_ADDR), self.encode_addr(desc.addr));

        if desc.cyclic {
            set_bits(regs, regs::CH_LOOP_CTRL, regs::loop_bits(cid));
        }
    }

    fn terminate(&self, regs: &dyn Mmio, cid: u8) {
        clear_bits(regs, regs::INT_EN, 1 << cid);
        clear_bits(regs, regs::CH_LOOP_CTRL, regs::loop_bits(cid));
        regs.write_relaxed(regs::CH_VALID, 1 << cid);
    }

    fn pause(&self, regs: &dyn Mmio, cid: u8) {
        clear_bits(regs, regs::CH_LOOP_CTRL, regs::loop_bits(cid));
    }

    fn resume(&self, regs: &dyn Mmio, cid: u8) {
        set_bits(regs, regs::CH_LOOP_CTRL, regs::loop_bits(cid));
    }

    fn position(&self, regs: &dyn Mmio, cid: u8) -> u32 {
        regs.read(regs::ch(cid, regs::CH_ADDR)) << 2
    }

    fn int_en(&self) -> usize {
        regs::INT_EN
    }

    fn width_reg(&self, cid: u8) -> usize {
        regs::width(regs::WIDTH_0, cid)
    }
}

// === impl Atlas7V1 ===

impl Backend for Atlas7V1 {
    fn version(&self) -> Version {
        Version::A7V1
    }

    fn execute(&self, regs: &dyn Mmio, desc: &Descriptor, cid: u8, burst: bool) {
        regs.write_relaxed(regs::IOBG_SCMD_EN, 1);
        regs.write_relaxed(regs::EARLY_RESP_SET, 1 << cid);
        legacy_program(regs, desc, cid, burst);
        regs.write(regs::ch(cid, regs::CH_ADDR), self.encode_addr(desc.addr));

        if desc.cyclic {
            set_bits(regs, regs::CH_LOOP_CTRL_ATLAS7, regs::loop_bits(cid));
        }
    }

    fn terminate(&self, regs: &dyn Mmio, cid: u8) {
        regs.write_relaxed(regs::INT_EN_CLR, 1 << cid);
        regs.write_relaxed(regs::CH_INT, 1 << cid);
        regs.write_relaxed(regs::CH_LOOP_CTRL_CLR_ATLAS7, regs::loop_bits(cid));
        regs.write_relaxed(regs::CH_VALID, 1 << cid);
    }

    fn pause(&self, regs: &dyn Mmio, cid: u8) {
        regs.write_relaxed(regs::CH_LOOP_CTRL_CLR_ATLAS7, regs::loop_bits(cid));
    }

    fn resume(&self, regs: &dyn Mmio, cid: u8) {
        regs.write_relaxed(regs::CH_LOOP_CTRL_ATLAS7, regs::loop_bits(cid));
    }

    fn position(&self, regs: &dyn Mmio, cid: u8) -> u32 {
        regs.read(regs::ch(cid, regs::CH_ADDR)) << 2
    }

    fn int_en(&self) -> usize {
        regs::INT_EN
    }

    fn width_reg(&self, cid: u8) -> usize {
        regs::width(regs::WIDTH_0, cid)
    }
}

// === impl Atlas7V2 ===

impl Atlas7V2 {
    fn ctrl(desc: &Descriptor) -> V2Ctrl {
        let ctrl = V2Ctrl::new()
            .with(V2Ctrl::START, 0b11)
            .with(V2Ctrl::CHAIN, desc.chain)
            .with(V2Ctrl::DIR, desc.dir);
        if desc.chain {
            ctrl.with(V2Ctrl::TABLE_NUM, regs::CHAIN_TABLE_NUM)
        } else {
            ctrl
        }
    }
}

impl Backend for Atlas7V2 {
    fn version(&self) -> Version {
        Version::A7V2
    }

    fn execute(&self, regs: &dyn Mmio, desc: &Descriptor, cid: u8, _burst: bool) {
        let ctrl = regs::ch(cid, regs::CH_CTRL);
        if desc.chain {
            regs.write_relaxed(ctrl, Self::ctrl(desc).bits());
        } else {
            let geometry = desc.geometry;
            regs.write_relaxed(regs::ch(cid, regs::CH_XLEN), geometry.xlen);
            regs.write_relaxed(regs::ch(cid, regs::CH_YLEN), geometry.ylen);
            regs.write_relaxed(regs::WIDTH_ATLAS7, geometry.width);
            let mul = geometry
                .width
                .wrapping_mul(geometry.ylen.wrapping_add(1) >> 1);
            regs.write_relaxed(regs::MUL_ATLAS7, mul);
            regs.write_relaxed(ctrl, Self::ctrl(desc).bits());
        }

        let int_en = if desc.chain {
            V2Int::new().with(V2Int::END, true)
        } else {
            V2Int::new()
                .with(V2Int::FINISH, true)
                .with(V2Int::LOOP, true)
        };
        regs.write_relaxed(regs::INT_EN_ATLAS7, int_en.bits());
        regs.write(regs::ch(cid, regs::CH_ADDR), self.encode_addr(desc.addr));

        if desc.cyclic {
            regs.write(regs::LOOP_CTRL_ATLAS7, regs::LOOP_ENABLE_ATLAS7);
        }
    }

    fn terminate(&self, regs: &dyn Mmio, _cid: u8) {
        regs.write_relaxed(regs::INT_EN_ATLAS7, 0);
        regs.write_relaxed(regs::INT_ATLAS7, V2Int::ALL);
        regs.write_relaxed(regs::LOOP_CTRL_ATLAS7, 0);
        regs.write_relaxed(regs::VALID_ATLAS7, 0);
    }

    fn pause(&self, regs: &dyn Mmio, _cid: u8) {
        regs.write_relaxed(regs::LOOP_CTRL_ATLAS7, 0);
    }

    fn resume(&self, regs: &dyn Mmio, _cid: u8) {
        regs.write_relaxed(regs::LOOP_CTRL_ATLAS7, regs::LOOP_ENABLE_ATLAS7);
    }

    fn position(&self, regs: &dyn Mmio, _cid: u8) -> u32 {
        regs.read(regs::CUR_DATA_ADDR)
    }

    fn int_en(&self) -> usize {
        regs::INT_EN_ATLAS7
    }

    fn width_reg(&self, _cid: u8) -> usize {
        regs::WIDTH_ATLAS7
    }

    fn hw_channel(&self, _cid: u8) -> u8 {
        0
    }

    fn encode_addr(&self, addr: u32) -> u32 {
        addr
    }

    fn sleep_channels(&self) -> u8 {
        1
    }
}

impl fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.version()).finish()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Version::A6 => "A6",
            Version::A7V1 => "A7V1",
            Version::A7V2 => "A7V2",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmac::regs::HwDirection;

    #[test]
    fn every_compatible_has_a_backend() {
        for compatible in Compatible::ALL {
            let backend = backend_for(compatible);
            let expected = match compatible {
                Compatible::Prima2 => Version::A6,
                Compatible::Atlas7 => Version::A7V1,
                Compatible::Atlas7V2 => Version::A7V2,
            };
            assert_eq!(backend.version(), expected, "{compatible}");
        }
    }

    #[test]
    fn v2_chain_ctrl() {
        let mut desc = Descriptor::new();
        desc.chain = true;
        desc.dir = HwDirection::Write;
        let manual = (1 << 4) | (1 << 3) | (0x8 << 7) | 0x3;
        assert_eq!(Atlas7V2::ctrl(&desc).bits(), manual);

        desc.chain = false;
        assert_eq!(Atlas7V2::ctrl(&desc).bits(), (1 << 4) | 0x3);
    }
}
