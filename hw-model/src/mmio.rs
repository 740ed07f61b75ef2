// Licensed under the Apache-2.0 license

use std::sync::{Mutex, MutexGuard, PoisonError};

use hwcrypto_emu_bus::{Bus, RvSize};

/// Value a faulting register read returns, as an aborted bus read would.
const BUS_FAULT_READ: u32 = 0xffff_ffff;

/// An MMIO implementation that reads and writes to a `hwcrypto_emu_bus::Bus`.
pub struct BusMmio<TBus: Bus> {
    bus: Mutex<TBus>,
}

impl<TBus: Bus> BusMmio<TBus> {
    pub fn new(bus: TBus) -> Self {
        Self {
            bus: Mutex::new(bus),
        }
    }

    pub fn into_inner(self) -> TBus {
        self.bus.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn bus(&self) -> MutexGuard<'_, TBus> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<TBus: Bus + Send> hwcrypto_registers::Mmio for BusMmio<TBus> {
    /// Loads the register at `offset`. A bus fault reads as all ones.
    fn read32(&self, offset: u32) -> u32 {
        match self.bus().read(RvSize::Word, offset) {
            Ok(val) => val,
            Err(e) => {
                log::warn!("read *{offset:#06x} faulted: {e:?}");
                BUS_FAULT_READ
            }
        }
    }

    /// Stores `val` to the register at `offset`. A bus fault drops the write.
    fn write32(&self, offset: u32, val: u32) {
        if let Err(e) = self.bus().write(RvSize::Word, offset, val) {
            log::warn!("write *{offset:#06x} <- {val:#x} faulted: {e:?}");
        }
    }
}
