// Licensed under the Apache-2.0 license

use hwcrypto_drivers::{DmaAddr, DmaDirection, DmaMapper, HwCryptoError, HwCryptoResult};
use hwcrypto_emu_periph::SystemMemory;

/// Maps host buffers into the emulated system memory.
#[derive(Clone)]
pub struct EmuDmaMapper {
    memory: SystemMemory,
}

impl EmuDmaMapper {
    pub fn new(memory: SystemMemory) -> Self {
        Self { memory }
    }
}

impl DmaMapper for EmuDmaMapper {
    fn map(&self, buf: &[u8], dir: DmaDirection) -> HwCryptoResult<DmaAddr> {
        let addr = self
            .memory
            .alloc(buf.len())
            .ok_or(HwCryptoError::DRIVER_DMA_BUFFER_ALLOCATION_FAILED)?;
        if dir != DmaDirection::FromDevice {
            self.memory.write(addr, buf);
        }
        Ok(DmaAddr(addr))
    }

    fn unmap(&self, addr: DmaAddr, buf: &mut [u8], dir: DmaDirection) {
        let Some(contents) = self.memory.free(addr.0) else {
            log::warn!("unmap of unknown region {:#010x}", addr.0);
            return;
        };
        if dir != DmaDirection::ToDevice {
            let len = buf.len().min(contents.len());
            buf[..len].copy_from_slice(&contents[..len]);
        }
    }
}
