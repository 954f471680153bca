//! A hardware abstraction library for the CSR SiRF SoC DMA controllers.
//!
//! The interesting part of this crate is the [`dmac`] module, which drives
//! the descriptor-based DMA controllers found on Prima2/Atlas6 (`A6`), the
//! Atlas7 legacy controller (`A7V1`) and the Atlas7 "v2" controller (`A7V2`).
//! Everything the driver needs from the surrounding system is expressed as a
//! trait: register access is [`mmio::Mmio`], clock gating is [`clk::Clock`],
//! and address translation and cache maintenance for hardware chain tables is
//! [`dmac::DmaMemory`].
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod clk;
pub mod dmac;
pub mod mmio;

#[cfg(test)]
pub(crate) mod test_util;

pub use sirf_config as config;
