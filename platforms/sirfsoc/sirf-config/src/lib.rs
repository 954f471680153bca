//! Board configuration for CSR SiRF SoCs.
//!
//! These types describe the same information the device tree carries for the
//! DMA controllers: which silicon revision a controller is (its `compatible`
//! string), how many channels it exposes (`#dma-channels`), which instance it
//! is (`cell-index`) and which interrupt line it raises.
#![cfg_attr(not(test), no_std)]

use core::fmt;

use serde::{Deserialize, Serialize};

/// Configuration for every DMA controller on a board.
///
/// Atlas7 parts carry both a legacy controller and a separate "v2" controller;
/// Prima2 and Atlas6 parts only have the legacy one.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub dmac: DmacConfig,
    #[serde(default)]
    pub dmac_v2: Option<DmacConfig>,
}

/// Configuration for a single DMA controller instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmacConfig {
    pub compatible: Compatible,
    #[serde(rename = "#dma-channels", default = "DmacConfig::default_channels")]
    pub dma_channels: u8,
    #[serde(rename = "cell-index", default)]
    pub cell_index: u32,
    /// The controller's interrupt line. A missing interrupt makes the
    /// controller impossible to probe.
    #[serde(default)]
    pub irq: Option<u32>,
}

/// Device tree `compatible` strings understood by the DMA driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compatible {
    #[serde(rename = "sirf,prima2-dmac")]
    Prima2,
    #[serde(rename = "sirf,atlas7-dmac")]
    Atlas7,
    #[serde(rename = "sirf,atlas7-dmac-v2")]
    Atlas7V2,
}

impl DmacConfig {
    pub const DEFAULT_CHANNELS: u8 = 16;

    const fn default_channels() -> u8 {
        Self::DEFAULT_CHANNELS
    }

    #[must_use]
    pub const fn new(compatible: Compatible, irq: u32) -> Self {
        Self {
            compatible,
            dma_channels: Self::DEFAULT_CHANNELS,
            cell_index: 0,
            irq: Some(irq),
        }
    }
}

impl Compatible {
    pub const ALL: [Self; 3] = [Self::Prima2, Self::Atlas7, Self::Atlas7V2];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prima2 => "sirf,prima2-dmac",
            Self::Atlas7 => "sirf,atlas7-dmac",
            Self::Atlas7V2 => "sirf,atlas7-dmac-v2",
        }
    }

    /// Looks up a `compatible` string, returning `None` for anything this
    /// driver does not bind to.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Compatible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatible_strings_round_trip() {
        for compat in Compatible::ALL {
            assert_eq!(Compatible::from_str(compat.as_str()), Some(compat));
        }
        assert_eq!(Compatible::from_str("sirf,marco-dmac"), None);
    }

    #[test]
    fn defaults_apply() {
        let cfg: DmacConfig = toml::from_str(
            r#"
            compatible = "sirf,atlas7-dmac"
            irq = 49
            "#,
        )
        .expect("config should parse");
        assert_eq!(cfg, DmacConfig::new(Compatible::Atlas7, 49));
    }

    #[test]
    fn device_tree_property_names() {
        let cfg: PlatformConfig = toml::from_str(
            r##"
            [dmac]
            compatible = "sirf,atlas7-dmac"
            "#dma-channels" = 12
            "cell-index" = 1
            irq = 49

            [dmac_v2]
            compatible = "sirf,atlas7-dmac-v2"
            "##,
        )
        .expect("config should parse");

        assert_eq!(cfg.dmac.dma_channels, 12);
        assert_eq!(cfg.dmac.cell_index, 1);
        let v2 = cfg.dmac_v2.expect("v2 controller should be configured");
        assert_eq!(v2.compatible, Compatible::Atlas7V2);
        assert_eq!(v2.irq, None);
    }
}
