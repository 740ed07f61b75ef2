// Licensed under the Apache-2.0 license

use std::error::Error;
use std::sync::Arc;

use hwcrypto_drivers::EngineRegistry;
use hwcrypto_emu_bus::testing::Log;
use hwcrypto_emu_periph::{CryptoEngine, EngineControl, SystemMemory};

use crate::bus_logger::BusLogger;
use crate::mmio::BusMmio;
use crate::{EmuDmaMapper, FakeClock, HwModel, InitParams};

/// Crypto engines emulated in software behind a real [`EngineRegistry`].
pub struct ModelEmulated {
    registry: Arc<EngineRegistry>,
    memory: SystemMemory,
    clock: Arc<FakeClock>,
    controls: Vec<EngineControl>,
    event_log: Log,
    bus_log: Option<Log>,
}

impl ModelEmulated {
    fn attach_engine(&mut self) -> usize {
        let id = self.controls.len();
        let control = EngineControl::default();
        let engine =
            CryptoEngine::new(self.memory.clone(), control.clone(), self.event_log.clone());
        let mut bus = BusLogger::new(format!("eng{id}"), engine);
        bus.log = self.bus_log.clone();
        self.controls.push(control);
        self.registry.add_engine(Arc::new(BusMmio::new(bus)))
    }
}

impl HwModel for ModelEmulated {
    fn init(params: InitParams) -> Result<Self, Box<dyn Error>>
    where
        Self: Sized,
    {
        if params.engines == 0 {
            return Err("an emulated model needs at least one engine".into());
        }
        let memory = SystemMemory::new();
        let clock = Arc::new(FakeClock::new());
        let registry = EngineRegistry::new(
            params.config,
            clock.clone(),
            Arc::new(EmuDmaMapper::new(memory.clone())),
        );
        let mut model = Self {
            registry,
            memory,
            clock,
            controls: Vec::new(),
            event_log: Log::new(),
            bus_log: params.trace_bus.then(Log::new),
        };
        for _ in 0..params.engines {
            model.attach_engine();
        }
        Ok(model)
    }

    fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    fn memory(&self) -> &SystemMemory {
        &self.memory
    }

    fn clock(&self) -> &FakeClock {
        &self.clock
    }

    fn engine_control(&self, index: usize) -> Option<&EngineControl> {
        self.controls.get(index)
    }

    fn event_log(&self) -> &Log {
        &self.event_log
    }

    fn bus_log(&self) -> Option<&Log> {
        self.bus_log.as_ref()
    }

    fn add_engine(&mut self) -> usize {
        self.attach_engine()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        let model = ModelEmulated::init(InitParams {
            engines: 2,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(model.registry().engine_count(), 2);
        assert!(model.engine_control(1).is_some());
        assert!(model.engine_control(2).is_none());
        assert!(model.bus_log().is_none());

        assert!(ModelEmulated::init(InitParams {
            engines: 0,
            ..Default::default()
        })
        .is_err());
    }
}
