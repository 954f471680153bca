//! Register map of the SiRF DMA controllers.
//!
//! The legacy controllers (Prima2/Atlas6 and Atlas7 v1) have one 16-byte
//! register window per channel plus a shared block of control registers. The
//! Atlas7 v2 controller has a single engine, so its geometry and control
//! registers are controller-wide.

use mycelium_bitfield::{bitfield, enum_from_bits};

// === per-channel window (legacy), controller-wide on v2 ===

pub(crate) const CH_ADDR: usize = 0x00;
pub(crate) const CH_XLEN: usize = 0x04;
pub(crate) const CH_YLEN: usize = 0x08;
pub(crate) const CH_CTRL: usize = 0x0C;

/// Size of a legacy controller's per-channel register window.
pub(crate) const CH_STRIDE: usize = 0x10;

// === legacy shared registers ===

pub(crate) const WIDTH_0: usize = 0x100;
pub(crate) const CH_VALID: usize = 0x140;
pub(crate) const CH_INT: usize = 0x144;
pub(crate) const INT_EN: usize = 0x148;
pub(crate) const INT_EN_CLR: usize = 0x14C;
pub(crate) const CH_LOOP_CTRL: usize = 0x150;
pub(crate) const CH_LOOP_CTRL_ATLAS7: usize = 0x158;
pub(crate) const CH_LOOP_CTRL_CLR_ATLAS7: usize = 0x15C;
pub(crate) const CH_OWNER_0: usize = 0x160;
pub(crate) const CH_OWNER_1: usize = 0x164;
pub(crate) const IOBG_SCMD_EN: usize = 0x800;
pub(crate) const EARLY_RESP_SET: usize = 0x818;

// === atlas7 v2 registers ===

pub(crate) const WIDTH_ATLAS7: usize = 0x10;
pub(crate) const VALID_ATLAS7: usize = 0x14;
pub(crate) const INT_ATLAS7: usize = 0x18;
pub(crate) const INT_EN_ATLAS7: usize = 0x1C;
pub(crate) const LOOP_CTRL_ATLAS7: usize = 0x20;
pub(crate) const CUR_DATA_ADDR: usize = 0x34;
pub(crate) const MUL_ATLAS7: usize = 0x38;

/// Value written to `LOOP_CTRL_ATLAS7` to enable both loop buffers.
pub(crate) const LOOP_ENABLE_ATLAS7: u32 = 0x1_0001;

/// Table-number field programmed for hardware chain transfers.
pub(crate) const CHAIN_TABLE_NUM: u32 = 0x8;

/// Channels per ownership register.
pub(crate) const OWNERS_PER_REG: u8 = 10;

/// Returns the offset of channel `cid`'s register window.
#[inline]
#[must_use]
pub(crate) const fn ch(cid: u8, reg: usize) -> usize {
    cid as usize * CH_STRIDE + reg
}

/// Returns the offset of channel `cid`'s width register, given the base of
/// the width register bank.
#[inline]
#[must_use]
pub(crate) const fn width(base: usize, cid: u8) -> usize {
    base + cid as usize * 4
}

/// Loop-control bits for a legacy channel: one for each half of the loop
/// buffer.
#[inline]
#[must_use]
pub(crate) const fn loop_bits(cid: u8) -> u32 {
    (1 << cid) | (1 << (cid + 16))
}

/// Returns the ownership register and bit offset of channel `cid`'s owner
/// field.
#[inline]
#[must_use]
pub(crate) const fn owner_field(cid: u8) -> (usize, u32) {
    let reg = if cid < OWNERS_PER_REG {
        CH_OWNER_0
    } else {
        CH_OWNER_1
    };
    (reg, (cid % OWNERS_PER_REG) as u32 * 3)
}

enum_from_bits! {
    /// Which way data moves, as encoded in the control registers.
    #[derive(Debug, Eq, PartialEq)]
    pub enum HwDirection<u8> {
        /// Device to memory.
        Read = 0,
        /// Memory to device.
        Write = 1,
    }
}

/// The processor that may program a channel (Atlas7 v1 only).
///
/// Each channel has a 3-bit owner field; see [`owner_field`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Owner {
    /// The application processor running this driver.
    Cpu = 0b000,
    /// The Kalimba audio co-processor.
    Kas = 0b001,
}

impl Owner {
    pub(crate) const MASK: u32 = 0b111;
}

bitfield! {
    /// A legacy channel's `CH_CTRL` register.
    pub struct LegacyCtrl<u32> {
        /// The channel ID the window belongs to.
        pub const CID = 4;

        /// Burst (4-word) mode.
        pub const BURST: bool;

        /// Transfer direction.
        pub const DIR: HwDirection;
    }
}

bitfield! {
    /// The Atlas7 v2 controller's `CH_CTRL` register.
    pub struct V2Ctrl<u32> {
        /// Channel start; always written as `0b11`.
        pub const START = 2;

        /// Burst mode.
        pub const BURST: bool;

        /// Hardware chain mode.
        pub const CHAIN: bool;

        /// Transfer direction.
        pub const DIR: HwDirection;

        const _RESERVED_0 = 2;

        /// Which chain table slot the engine starts from.
        pub const TABLE_NUM = 8;
    }
}

bitfield! {
    /// The Atlas7 v2 controller's interrupt status and enable registers.
    pub struct V2Int<u32> {
        /// A legacy (unchained) transfer finished.
        pub const FINISH: bool;

        /// Counter interrupt.
        pub const COUNT: bool;

        /// A chain entry flagged `Pause` was reached.
        pub const PAUSE: bool;

        /// One half of a loop buffer completed.
        pub const LOOP: bool;

        /// Invalid chain entry.
        pub const INVALID: bool;

        /// A chain entry flagged `End` was reached.
        pub const END: bool;
    }
}

impl V2Int {
    /// Every interrupt source, used to acknowledge all of them at once.
    pub const ALL: u32 = 0x3F;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitfields_are_valid() {
        LegacyCtrl::assert_valid();
        V2Ctrl::assert_valid();
        V2Int::assert_valid();
    }

    #[test]
    fn v2_ctrl_matches_manual_packing() {
        // dir << 4 | chain << 3 | table << 7 | 0b11
        let manual = (1 << 4) | (1 << 3) | (CHAIN_TABLE_NUM << 7) | 0b11;
        let ctrl = V2Ctrl::new()
            .with(V2Ctrl::START, 0b11)
            .with(V2Ctrl::CHAIN, true)
            .with(V2Ctrl::DIR, HwDirection::Write)
            .with(V2Ctrl::TABLE_NUM, CHAIN_TABLE_NUM);
        assert_eq!(ctrl.bits(), manual, "\n{ctrl}");
    }

    #[test]
    fn legacy_ctrl_matches_manual_packing() {
        for cid in 0..16u8 {
            let manual = cid as u32 | (1 << 4) | (1 << 5);
            let ctrl = LegacyCtrl::new()
                .with(LegacyCtrl::CID, cid as u32)
                .with(LegacyCtrl::BURST, true)
                .with(LegacyCtrl::DIR, HwDirection::Write);
            assert_eq!(ctrl.bits(), manual, "\n{ctrl}");
        }
    }

    #[test]
    fn v2_int_all_covers_every_source() {
        let all = V2Int::new()
            .with(V2Int::FINISH, true)
            .with(V2Int::COUNT, true)
            .with(V2Int::PAUSE, true)
            .with(V2Int::LOOP, true)
            .with(V2Int::INVALID, true)
            .with(V2Int::END, true);
        assert_eq!(all.bits(), V2Int::ALL);
    }

    #[test]
    fn owner_fields() {
        assert_eq!(owner_field(0), (CH_OWNER_0, 0));
        assert_eq!(owner_field(9), (CH_OWNER_0, 27));
        assert_eq!(owner_field(10), (CH_OWNER_1, 0));
        assert_eq!(owner_field(15), (CH_OWNER_1, 15));
    }
}
