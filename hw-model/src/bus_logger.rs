// Licensed under the Apache-2.0 license

use std::fmt::Write;

use hwcrypto_emu_bus::testing::Log;
use hwcrypto_emu_bus::{Bus, BusError, RvAddr, RvData, RvSize};

/// Forwards every access to `bus` and records it in `log`.
pub struct BusLogger<TBus: Bus> {
    pub bus: TBus,
    pub log: Option<Log>,
    name: String,
}

impl<TBus: Bus> BusLogger<TBus> {
    pub fn new(name: impl Into<String>, bus: TBus) -> Self {
        Self {
            bus,
            log: None,
            name: name.into(),
        }
    }

    pub fn log_read(&mut self, size: RvSize, addr: RvAddr, result: Result<RvData, BusError>) {
        if let Some(log) = &self.log {
            let size = size as usize;
            let name = &self.name;
            let _ = match result {
                Ok(val) => writeln!(log.w(), "{name}  read{size} *0x{addr:04x} -> 0x{val:x}"),
                Err(e) => writeln!(log.w(), "{name}  read{size} *0x{addr:04x} ***FAULT {e:?}"),
            };
        }
    }

    pub fn log_write(
        &mut self,
        size: RvSize,
        addr: RvAddr,
        val: RvData,
        result: Result<(), BusError>,
    ) {
        if let Some(log) = &self.log {
            let size = size as usize;
            let name = &self.name;
            let _ = match result {
                Ok(()) => writeln!(log.w(), "{name} write{size} *0x{addr:04x} <- 0x{val:x}"),
                Err(e) => writeln!(
                    log.w(),
                    "{name} write{size} *0x{addr:04x} <- 0x{val:x} ***FAULT {e:?}"
                ),
            };
        }
    }
}

impl<TBus: Bus> Bus for BusLogger<TBus> {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        let result = self.bus.read(size, addr);
        self.log_read(size, addr, result);
        result
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        let result = self.bus.write(size, addr, val);
        self.log_write(size, addr, val, result);
        result
    }
}
