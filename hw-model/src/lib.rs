// Licensed under the Apache-2.0 license

use std::error::Error;
use std::sync::Arc;

use hwcrypto_drivers::{
    CipherContext, CipherMode, EngineConfig, EngineRegistry, HashAlgorithm, HashContext,
};
use hwcrypto_emu_bus::testing::Log;
use hwcrypto_emu_periph::{EngineControl, SystemMemory};

mod bus_logger;
mod clock;
mod dma;
pub mod mmio;
mod model_emulated;

pub use bus_logger::BusLogger;
pub use clock::FakeClock;
pub use dma::EmuDmaMapper;
pub use hwcrypto_emu_periph::FIFO_DEPTH;
pub use model_emulated::ModelEmulated;

pub struct InitParams {
    /// Number of engines registered with the driver.
    pub engines: usize,

    pub config: EngineConfig,

    /// Record every register access in [`HwModel::bus_log`].
    pub trace_bus: bool,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            engines: 1,
            config: EngineConfig::default(),
            trace_bus: false,
        }
    }
}

/// Represents an emulation of the crypto engine hardware together with the
/// driver stack bound to it, to be used from tests.
pub trait HwModel {
    fn init(params: InitParams) -> Result<Self, Box<dyn Error>>
    where
        Self: Sized;

    fn registry(&self) -> &Arc<EngineRegistry>;

    /// Memory the engines reach by DMA.
    fn memory(&self) -> &SystemMemory;

    /// The clock the driver waits on.
    fn clock(&self) -> &FakeClock;

    /// Fault and timing knobs of the engine registered at `index`.
    fn engine_control(&self, index: usize) -> Option<&EngineControl>;

    /// Descriptor, start and completion events of every engine, in order.
    fn event_log(&self) -> &Log;

    /// Register accesses, when enabled through [`InitParams::trace_bus`].
    fn bus_log(&self) -> Option<&Log>;

    /// Registers one more engine and returns its index.
    fn add_engine(&mut self) -> usize;

    fn cipher(&self, mode: CipherMode) -> CipherContext {
        CipherContext::new(self.registry(), mode)
    }

    fn hash(&self, alg: HashAlgorithm) -> HashContext {
        HashContext::new(self.registry(), alg)
    }

    fn hmac(&self, alg: HashAlgorithm) -> HashContext {
        HashContext::new_hmac(self.registry(), alg)
    }
}
