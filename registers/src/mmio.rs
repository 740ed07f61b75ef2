// Licensed under the Apache-2.0 license

use crate::offsets;
use crate::regs::{CtrlStatus, DebugArb, ErrStatus, FifoStatus, OtpKeyCtrl, SwapCfg};

/// Access to a 32-bit register window.
///
/// Implementations must be safe to share between threads; serialization of
/// whole operations is the caller's job.
pub trait Mmio: Send + Sync {
    /// Loads the register at byte offset `offset`.
    fn read32(&self, offset: u32) -> u32;

    /// Stores `val` to the register at byte offset `offset`.
    fn write32(&self, offset: u32, val: u32);
}

/// An MMIO implementation backed by a memory-mapped register window.
pub struct RealMmio {
    base: *mut u32,
}

impl RealMmio {
    /// # Safety
    ///
    /// `base` must point at the engine's register window, which must stay
    /// mapped for the lifetime of this object and be at least
    /// [`offsets::WINDOW_SIZE`] bytes long.
    pub unsafe fn new(base: *mut u32) -> Self {
        Self { base }
    }

    fn reg_ptr(&self, offset: u32) -> *mut u32 {
        debug_assert!(offset < offsets::WINDOW_SIZE && offset % 4 == 0);
        (self.base as *mut u8).wrapping_add(offset as usize) as *mut u32
    }
}

// SAFETY: the window is device memory; every access is a single volatile
// 32-bit load or store.
unsafe impl Send for RealMmio {}
unsafe impl Sync for RealMmio {}

impl Mmio for RealMmio {
    fn read32(&self, offset: u32) -> u32 {
        // SAFETY: see RealMmio::new
        unsafe { core::ptr::read_volatile(self.reg_ptr(offset)) }
    }

    fn write32(&self, offset: u32, val: u32) {
        // SAFETY: see RealMmio::new
        unsafe { core::ptr::write_volatile(self.reg_ptr(offset), val) }
    }
}

/// Typed view of the engine registers.
#[derive(Clone, Copy)]
pub struct RegisterBlock<'a> {
    mmio: &'a dyn Mmio,
}

impl<'a> RegisterBlock<'a> {
    pub fn new(mmio: &'a dyn Mmio) -> Self {
        Self { mmio }
    }

    pub fn src_status(&self) -> FifoStatus {
        FifoStatus(self.mmio.read32(offsets::SRC_STATUS))
    }

    pub fn dst_status(&self) -> FifoStatus {
        FifoStatus(self.mmio.read32(offsets::DST_STATUS))
    }

    /// Writes one source descriptor. The FIFO entry is committed by the
    /// second (address) word.
    pub fn write_src_desc(&self, ctrl: u32, addr: u32) {
        self.mmio.write32(offsets::SRC_DESC0, ctrl);
        self.mmio.write32(offsets::SRC_DESC1, addr);
    }

    /// Writes one destination descriptor. The FIFO entry is committed by the
    /// second (address) word.
    pub fn write_dst_desc(&self, ctrl: u32, addr: u32) {
        self.mmio.write32(offsets::DST_DESC0, ctrl);
        self.mmio.write32(offsets::DST_DESC1, addr);
    }

    pub fn ctrl_status(&self) -> CtrlStatus {
        CtrlStatus(self.mmio.read32(offsets::CTRL_STATUS))
    }

    pub fn write_ctrl_status(&self, val: CtrlStatus) {
        self.mmio.write32(offsets::CTRL_STATUS, val.0);
    }

    pub fn err_status(&self) -> ErrStatus {
        ErrStatus::from_bits_truncate(self.mmio.read32(offsets::ERR_STATUS))
    }

    /// Error status bits are write-one-to-clear.
    pub fn clear_err_status(&self) {
        self.mmio.write32(offsets::ERR_STATUS, ErrStatus::all().bits());
    }

    pub fn debug_arb(&self) -> DebugArb {
        DebugArb(self.mmio.read32(offsets::DEBUG_ARB))
    }

    pub fn write_debug_arb(&self, val: DebugArb) {
        self.mmio.write32(offsets::DEBUG_ARB, val.0);
    }

    pub fn swap_cfg(&self) -> SwapCfg {
        SwapCfg(self.mmio.read32(offsets::SWAP_CFG))
    }

    pub fn write_swap_cfg(&self, val: SwapCfg) {
        self.mmio.write32(offsets::SWAP_CFG, val.0);
    }

    pub fn write_otp_key_ctrl(&self, val: OtpKeyCtrl) {
        self.mmio.write32(offsets::OTP_KEY_CTRL, val.0);
    }
}
