use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::{
    clk::{Clock, ClockError},
    mmio::Mmio,
};

/// A register block that remembers every write.
///
/// Registers hold whatever was last written to them, except for the
/// write-1-to-clear status registers passed to [`FakeMmio::with_w1c`], where
/// writes clear the written bits instead. Hardware events are simulated with
/// [`FakeMmio::raise`].
#[derive(Debug, Default)]
pub(crate) struct FakeMmio {
    regs: Mutex<BTreeMap<usize, u32>>,
    writes: Mutex<Vec<(usize, u32)>>,
    w1c: BTreeSet<usize>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeClock {
    enabled: AtomicBool,
    enables: AtomicUsize,
    disables: AtomicUsize,
}

// === impl FakeMmio ===

impl FakeMmio {
    pub(crate) fn with_w1c(w1c: impl IntoIterator<Item = usize>) -> Self {
        Self {
            w1c: w1c.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Sets `bits` in the register at `offset`, as the hardware would.
    pub(crate) fn raise(&self, offset: usize, bits: u32) {
        *self.regs.lock().unwrap().entry(offset).or_default() |= bits;
    }

    /// Sets the register at `offset`, without recording a write.
    pub(crate) fn poke(&self, offset: usize, value: u32) {
        self.regs.lock().unwrap().insert(offset, value);
    }

    pub(crate) fn get(&self, offset: usize) -> u32 {
        self.regs
            .lock()
            .unwrap()
            .get(&offset)
            .copied()
            .unwrap_or_default()
    }

    /// Returns and forgets every write so far.
    pub(crate) fn take_writes(&self) -> Vec<(usize, u32)> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }

    /// Returns every value written to `offset` so far.
    pub(crate) fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|&&(o, _)| o == offset)
            .map(|&(_, value)| value)
            .collect()
    }
}

impl Mmio for FakeMmio {
    fn read(&self, offset: usize) -> u32 {
        self.get(offset)
    }

    fn write_relaxed(&self, offset: usize, value: u32) {
        tracing::trace!(offset = ?format_args!("{offset:#x}"), value = ?format_args!("{value:#x}"), "write");
        self.writes.lock().unwrap().push((offset, value));
        let mut regs = self.regs.lock().unwrap();
        let reg = regs.entry(offset).or_default();
        if self.w1c.contains(&offset) {
            *reg &= !value;
        } else {
            *reg = value;
        }
    }
}

// === impl FakeClock ===

impl FakeClock {
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn enables(&self) -> usize {
        self.enables.load(Ordering::SeqCst)
    }

    pub(crate) fn disables(&self) -> usize {
        self.disables.load(Ordering::SeqCst)
    }
}

impl Clock for FakeClock {
    fn enable(&self) -> Result<(), ClockError> {
        self.enabled.store(true, Ordering::SeqCst);
        self.enables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.disables.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn trace_init() {
    use tracing_subscriber::{
        filter::{EnvFilter, LevelFilter},
        prelude::*,
    };
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into());
    let filter = if env.is_empty() {
        builder.parse("sirf_core=debug").unwrap()
    } else {
        builder.parse_lossy(env)
    };

    let _res = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_thread_names(true)
        .without_time()
        .finish()
        .try_init();
}
