/*++

Licensed under the Apache-2.0 license.

File Name:

    fake_regs.rs

Abstract:

    File contains a fake register file implementing the Bus trait, used to
    exercise the MMIO plumbing without a full engine behind it.

--*/
use crate::{testing::Log, Bus, BusError, RvAddr, RvData, RvSize};
use std::collections::BTreeMap;
use std::fmt::Write;

/// A sparse 32-bit register file. Writes are stored and read back; registers
/// never written read as zero. Individual offsets can be made to fault.
///
/// # Example
///
/// ```
/// use hwcrypto_emu_bus::{Bus, BusError, RvSize, testing::FakeRegs};
///
/// let mut regs = FakeRegs::new();
/// regs.write(RvSize::Word, 0x04, 0x1).unwrap();
/// assert_eq!(regs.read(RvSize::Word, 0x04), Ok(0x1));
/// regs.fault_read(0x10, BusError::LoadAccessFault);
/// assert_eq!(regs.read(RvSize::Word, 0x10), Err(BusError::LoadAccessFault));
/// assert_eq!("w 0x0004 = 0x1\nr 0x0004\nr 0x0010 fault\n", regs.log.take());
/// ```
#[derive(Default)]
pub struct FakeRegs {
    pub log: Log,
    regs: BTreeMap<RvAddr, RvData>,
    read_faults: BTreeMap<RvAddr, BusError>,
    write_faults: BTreeMap<RvAddr, BusError>,
}

impl FakeRegs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets a register without logging an access.
    pub fn preset(&mut self, addr: RvAddr, val: RvData) {
        self.regs.insert(addr, val);
    }

    /// Current contents of the register at `addr`.
    pub fn peek(&self, addr: RvAddr) -> RvData {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    pub fn fault_read(&mut self, addr: RvAddr, err: BusError) {
        self.read_faults.insert(addr, err);
    }

    pub fn fault_write(&mut self, addr: RvAddr, err: BusError) {
        self.write_faults.insert(addr, err);
    }

    fn check_word(size: RvSize, addr: RvAddr, misaligned: BusError) -> Result<(), BusError> {
        if size != RvSize::Word || addr % 4 != 0 {
            return Err(misaligned);
        }
        Ok(())
    }
}

impl Bus for FakeRegs {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        let result = Self::check_word(size, addr, BusError::LoadAddrMisaligned).and_then(|()| {
            match self.read_faults.get(&addr) {
                Some(err) => Err(*err),
                None => Ok(self.peek(addr)),
            }
        });
        let suffix = if result.is_err() { " fault" } else { "" };
        let _ = writeln!(self.log.w(), "r {addr:#06x}{suffix}");
        result
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        let result = Self::check_word(size, addr, BusError::StoreAddrMisaligned).and_then(|()| {
            match self.write_faults.get(&addr) {
                Some(err) => Err(*err),
                None => {
                    self.regs.insert(addr, val);
                    Ok(())
                }
            }
        });
        let suffix = if result.is_err() { " fault" } else { "" };
        let _ = writeln!(self.log.w(), "w {addr:#06x} = {val:#x}{suffix}");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_hold_written_values() {
        let mut regs = FakeRegs::new();
        assert_eq!(regs.read(RvSize::Word, 0x1c), Ok(0));
        regs.write(RvSize::Word, 0x1c, 0xabcd).unwrap();
        regs.preset(0x20, 0x7);
        assert_eq!(regs.read(RvSize::Word, 0x1c), Ok(0xabcd));
        assert_eq!(regs.read(RvSize::Word, 0x20), Ok(0x7));
        assert_eq!(
            "r 0x001c\nw 0x001c = 0xabcd\nr 0x001c\nr 0x0020\n",
            regs.log.take()
        );
    }

    #[test]
    fn test_faults_leave_registers_untouched() {
        let mut regs = FakeRegs::new();
        regs.preset(0x08, 0x5);
        regs.fault_write(0x08, BusError::StoreAccessFault);
        assert_eq!(
            regs.write(RvSize::Word, 0x08, 0x9),
            Err(BusError::StoreAccessFault)
        );
        assert_eq!(regs.peek(0x08), 0x5);

        assert_eq!(
            regs.read(RvSize::Byte, 0x08),
            Err(BusError::LoadAddrMisaligned)
        );
        assert_eq!(
            regs.write(RvSize::Word, 0x0a, 0x1),
            Err(BusError::StoreAddrMisaligned)
        );
        assert_eq!(
            "w 0x0008 = 0x9 fault\nr 0x0008 fault\nw 0x000a = 0x1 fault\n",
            regs.log.take()
        );
    }
}
