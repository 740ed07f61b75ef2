/*++

Licensed under the Apache-2.0 license.

File Name:

    engine.rs

Abstract:

    File contains the engine instance, its lock, and the submission and
    completion protocol of a single operation.

--*/

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use hwcrypto_error::{HwCryptoError, HwCryptoResult};
use hwcrypto_registers::regs::{CtrlStatus, DebugArb, OtpKeyCtrl, SwapCfg};
use hwcrypto_registers::{Mmio, RegisterBlock};

use crate::config::EngineConfig;
use crate::descriptor::{DestinationDescriptor, SourceDescriptor};
use crate::dma::{DmaAddr, DmaDirection, DmaMapper, TransferBuffer};
use crate::registry::TransformHandle;
use crate::wait::{self, Clock};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Progress of the operation running on an instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OpPhase {
    #[default]
    Idle,
    BuildingCommand,
    Submitting,
    WaitingCompletion,
    Completed,
    TimedOut,
    HardwareFault,
}

#[derive(Debug, Default)]
struct InstanceState {
    needs_reset: bool,
    current: Option<TransformHandle>,
    phase: OpPhase,
    completed_ops: u64,
}

/// One hardware engine and the lock that serializes operations on it.
pub struct EngineInstance {
    id: usize,
    mmio: Arc<dyn Mmio>,
    state: Mutex<InstanceState>,
    holder: Mutex<Option<ThreadId>>,
}

impl EngineInstance {
    /// Wraps the engine behind `mmio` and brings it to a known state.
    pub(crate) fn new(id: usize, mmio: Arc<dyn Mmio>, config: &EngineConfig) -> Self {
        let instance = Self {
            id,
            mmio,
            state: Mutex::new(InstanceState::default()),
            holder: Mutex::new(None),
        };
        instance.configure(config);
        instance
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Takes the instance lock.
    ///
    /// Fails instead of deadlocking when the calling thread already holds it.
    pub fn lock(&self) -> HwCryptoResult<EngineLock<'_>> {
        let me = thread::current().id();
        if *lock(&self.holder) == Some(me) {
            return Err(HwCryptoError::DRIVER_REGISTRY_REENTRANT_ACQUIRE);
        }
        let state = lock(&self.state);
        *lock(&self.holder) = Some(me);
        Ok(EngineLock {
            instance: self,
            state,
        })
    }

    fn regs(&self) -> RegisterBlock<'_> {
        RegisterBlock::new(&*self.mmio)
    }

    /// Soft reset followed by clock, arbiter, swap and OTP key set-up.
    fn configure(&self, config: &EngineConfig) {
        let regs = self.regs();

        let mut ctrl = CtrlStatus::default();
        ctrl.set_soft_reset(true);
        regs.write_ctrl_status(ctrl);

        let mut arb = DebugArb::default();
        arb.set_clk_en(true);
        arb.set_arb_en(true);
        regs.write_debug_arb(arb);

        let mut swap = SwapCfg::default();
        swap.set_data_swap(config.data_swap);
        swap.set_burst_len(config.burst_len);
        regs.write_swap_cfg(swap);

        regs.write_otp_key_ctrl(OtpKeyCtrl::default());

        regs.clear_err_status();
        let mut ctrl = CtrlStatus::default();
        ctrl.set_cmd_ok(true);
        ctrl.set_err_int(true);
        regs.write_ctrl_status(ctrl);
    }
}

/// Exclusive access to an [`EngineInstance`]; released on drop.
pub struct EngineLock<'a> {
    instance: &'a EngineInstance,
    state: MutexGuard<'a, InstanceState>,
}

impl<'a> EngineLock<'a> {
    pub fn needs_reset(&self) -> bool {
        self.state.needs_reset
    }

    /// Transform whose operation is executing, if any.
    pub fn current(&self) -> Option<TransformHandle> {
        self.state.current
    }

    /// Operations that completed without error since the instance was
    /// created.
    pub fn completed_ops(&self) -> u64 {
        self.state.completed_ops
    }

    /// Soft-resets the engine and re-applies its configuration.
    pub fn reset(&mut self, config: &EngineConfig) {
        log::info!("[engine{}] reset", self.instance.id);
        self.instance.configure(config);
        self.state.needs_reset = false;
        self.state.phase = OpPhase::Idle;
    }

    /// Starts an operation on behalf of `handle`.
    pub fn session<'s>(
        &'s mut self,
        handle: TransformHandle,
        config: &'s EngineConfig,
        clock: &'s dyn Clock,
        mapper: &'s dyn DmaMapper,
        zero_pad: DmaAddr,
    ) -> HwCryptoResult<EngineSession<'s>> {
        if self.state.needs_reset {
            return Err(HwCryptoError::DRIVER_ENGINE_RESET_REQUIRED);
        }
        self.state.current = Some(handle);
        let mut session = EngineSession {
            id: self.instance.id,
            regs: self.instance.regs(),
            state: &mut *self.state,
            config,
            clock,
            mapper,
            zero_pad,
        };
        session.enter(OpPhase::BuildingCommand);
        Ok(session)
    }
}

impl Drop for EngineLock<'_> {
    fn drop(&mut self) {
        *lock(&self.instance.holder) = None;
    }
}

/// One operation on a locked engine.
pub struct EngineSession<'a> {
    id: usize,
    regs: RegisterBlock<'a>,
    state: &'a mut InstanceState,
    config: &'a EngineConfig,
    clock: &'a dyn Clock,
    mapper: &'a dyn DmaMapper,
    zero_pad: DmaAddr,
}

impl<'a> EngineSession<'a> {
    fn enter(&mut self, phase: OpPhase) {
        log::trace!("[engine{}] {:?} -> {:?}", self.id, self.state.phase, phase);
        self.state.phase = phase;
    }

    fn fail(&mut self, phase: OpPhase, err: HwCryptoError) -> HwCryptoError {
        self.enter(phase);
        if err.requires_reset() {
            self.state.needs_reset = true;
        }
        err
    }

    pub fn phase(&self) -> OpPhase {
        self.state.phase
    }

    /// Maps `buf` for the duration of the operation.
    pub fn map(&self, buf: Vec<u8>, dir: DmaDirection) -> HwCryptoResult<TransferBuffer<'a>> {
        TransferBuffer::map(self.mapper, buf, dir)
    }

    /// Maps a zeroed buffer of `len` bytes for the engine to write.
    pub fn map_output(&self, len: usize) -> HwCryptoResult<TransferBuffer<'a>> {
        TransferBuffer::zeroed(self.mapper, len)
    }

    /// Bus address of the shared zero-padding buffer.
    pub fn zero_pad(&self) -> DmaAddr {
        self.zero_pad
    }

    /// Clears the sticky completion and error bits left by the previous
    /// operation.
    pub fn clear_and_arm(&mut self) {
        self.regs.clear_err_status();
        let mut ctrl = CtrlStatus::default();
        ctrl.set_cmd_ok(true);
        ctrl.set_err_int(true);
        self.regs.write_ctrl_status(ctrl);
        self.enter(OpPhase::Submitting);
    }

    pub fn submit_source(&mut self, desc: &SourceDescriptor) -> HwCryptoResult<()> {
        let [ctrl, addr] = desc.encode()?;
        let regs = self.regs;
        if !wait::until_bounded(self.config.fifo_poll_limit, || {
            regs.src_status().empty_slots() != 0
        }) {
            log::warn!("[engine{}] source FIFO full", self.id);
            return Err(self.fail(
                OpPhase::TimedOut,
                HwCryptoError::DRIVER_ENGINE_FIFO_SUBMISSION_TIMEOUT,
            ));
        }
        log::debug!("[engine{}] src {ctrl:#010x} @ {addr:#010x}", self.id);
        regs.write_src_desc(ctrl, addr);
        Ok(())
    }

    pub fn submit_destination(&mut self, desc: &DestinationDescriptor) -> HwCryptoResult<()> {
        let [ctrl, addr] = desc.encode()?;
        let regs = self.regs;
        if !wait::until_bounded(self.config.fifo_poll_limit, || {
            regs.dst_status().empty_slots() != 0
        }) {
            log::warn!("[engine{}] destination FIFO full", self.id);
            return Err(self.fail(
                OpPhase::TimedOut,
                HwCryptoError::DRIVER_ENGINE_FIFO_SUBMISSION_TIMEOUT,
            ));
        }
        log::debug!("[engine{}] dst {ctrl:#010x} @ {addr:#010x}", self.id);
        regs.write_dst_desc(ctrl, addr);
        Ok(())
    }

    pub fn start(&mut self) {
        let mut ctrl = CtrlStatus::default();
        ctrl.set_start(true);
        self.regs.write_ctrl_status(ctrl);
        self.enter(OpPhase::WaitingCompletion);
    }

    /// Polls for the completion bit, then checks the error status.
    pub fn wait_completion(&mut self) -> HwCryptoResult<()> {
        let regs = self.regs;
        if !wait::until_deadline(
            self.clock,
            self.config.poll_interval,
            self.config.completion_timeout,
            || regs.ctrl_status().cmd_ok(),
        ) {
            log::warn!(
                "[engine{}] no completion after {:?}",
                self.id,
                self.config.completion_timeout
            );
            return Err(self.fail(
                OpPhase::TimedOut,
                HwCryptoError::DRIVER_ENGINE_HARDWARE_TIMEOUT,
            ));
        }

        let err = regs.err_status();
        if !err.is_empty() {
            log::error!("[engine{}] hardware error {:?}", self.id, err);
            return Err(self.fail(
                OpPhase::HardwareFault,
                HwCryptoError::DRIVER_ENGINE_HARDWARE_FAULT,
            ));
        }

        let mut ctrl = CtrlStatus::default();
        ctrl.set_cmd_ok(true);
        regs.write_ctrl_status(ctrl);
        self.state.completed_ops += 1;
        self.enter(OpPhase::Completed);
        Ok(())
    }

    /// Runs a full operation: arm, submit every descriptor, trigger and
    /// wait.
    pub fn run<I>(&mut self, src: I, dst: &[DestinationDescriptor]) -> HwCryptoResult<()>
    where
        I: IntoIterator<Item = SourceDescriptor>,
    {
        self.clear_and_arm();
        for desc in src {
            self.submit_source(&desc)?;
        }
        for desc in dst {
            self.submit_destination(desc)?;
        }
        self.start();
        self.wait_completion()
    }
}

impl Drop for EngineSession<'_> {
    fn drop(&mut self) {
        self.state.current = None;
        self.enter(OpPhase::Idle);
    }
}
