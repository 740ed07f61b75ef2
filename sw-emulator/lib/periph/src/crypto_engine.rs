/*++

Licensed under the Apache-2.0 license.

File Name:

    crypto_engine.rs

Abstract:

    File contains the emulated descriptor-based crypto engine: register
    window, source/destination descriptor FIFOs and the command executor.

--*/

use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hwcrypto_emu_bus::testing::Log;
use hwcrypto_emu_bus::{Bus, BusError, RvAddr, RvData, RvSize};
use hwcrypto_emu_crypto::{gcm_process, AesKey, AesMode, HashMode, SeqHash, AES_BLOCK_SIZE};
use hwcrypto_registers::enums::{CipherModeSel, CommandLength, EngineMode, HashModeSel, KeySizeSel};
use hwcrypto_registers::offsets;
use hwcrypto_registers::regs::{
    ClWord0, ClWord1, ClWord2, CtrlStatus, DebugArb, DstDescCtrl, ErrStatus, FifoStatus,
    OtpKeyCtrl, SrcDescCtrl, SwapCfg,
};
use hwcrypto_registers::CL_SIZE_BYTES;

use crate::SystemMemory;

/// Depth of each descriptor FIFO.
pub const FIFO_DEPTH: usize = 16;

#[derive(Default)]
struct Knobs {
    completion_delay: u32,
    never_complete: bool,
    stall_fifo: bool,
    inject_error: Option<ErrStatus>,
    started: u64,
}

/// Test-side handle on the fault and timing behavior of a [`CryptoEngine`].
///
/// Clones share the same settings.
#[derive(Clone, Default)]
pub struct EngineControl {
    knobs: Arc<Mutex<Knobs>>,
}

impl EngineControl {
    fn lock(&self) -> MutexGuard<'_, Knobs> {
        self.knobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of CTRL_STATUS reads after START before the completion bit
    /// is set.
    pub fn set_completion_delay(&self, reads: u32) {
        self.lock().completion_delay = reads;
    }

    /// Started operations never complete.
    pub fn set_never_complete(&self, never: bool) {
        self.lock().never_complete = never;
    }

    /// Descriptors stay in the FIFOs until START, so a full FIFO stays full.
    pub fn set_stall_fifo(&self, stall: bool) {
        self.lock().stall_fifo = stall;
    }

    /// Raises `err` on the completion of the next operation.
    pub fn inject_error(&self, err: ErrStatus) {
        self.lock().inject_error = Some(err);
    }

    /// Operations started since the engine was created.
    pub fn started(&self) -> u64 {
        self.lock().started
    }
}

/// Result of executing one command, applied when the completion bit sets.
struct Completion {
    writes: Vec<(u32, Vec<u8>)>,
    err: ErrStatus,
}

struct Running {
    countdown: Option<u32>,
    completion: Completion,
}

/// An emulated crypto engine.
pub struct CryptoEngine {
    memory: SystemMemory,
    control: EngineControl,
    log: Log,

    src_fifo: VecDeque<(u32, u32)>,
    dst_fifo: VecDeque<(u32, u32)>,
    src_latch: u32,
    dst_latch: u32,
    src_wr: u8,
    src_rd: u8,
    dst_wr: u8,
    dst_rd: u8,

    /// Descriptors the engine fetched from the FIFOs for the next command.
    src_pending: Vec<(u32, u32)>,
    dst_pending: Vec<(u32, u32)>,

    ctrl: CtrlStatus,
    err: ErrStatus,
    debug_arb: DebugArb,
    swap_cfg: SwapCfg,
    otp_key_ctrl: OtpKeyCtrl,

    running: Option<Running>,
}

impl CryptoEngine {
    pub fn new(memory: SystemMemory, control: EngineControl, log: Log) -> Self {
        Self {
            memory,
            control,
            log,
            src_fifo: VecDeque::with_capacity(FIFO_DEPTH),
            dst_fifo: VecDeque::with_capacity(FIFO_DEPTH),
            src_latch: 0,
            dst_latch: 0,
            src_wr: 0,
            src_rd: 0,
            dst_wr: 0,
            dst_rd: 0,
            src_pending: Vec::new(),
            dst_pending: Vec::new(),
            ctrl: CtrlStatus::default(),
            err: ErrStatus::empty(),
            debug_arb: DebugArb::default(),
            swap_cfg: SwapCfg::default(),
            otp_key_ctrl: OtpKeyCtrl::default(),
            running: None,
        }
    }

    pub fn control(&self) -> EngineControl {
        self.control.clone()
    }

    fn soft_reset(&mut self) {
        self.src_fifo.clear();
        self.dst_fifo.clear();
        self.src_pending.clear();
        self.dst_pending.clear();
        self.src_rd = self.src_wr;
        self.dst_rd = self.dst_wr;
        self.ctrl = CtrlStatus::default();
        self.err = ErrStatus::empty();
        self.running = None;
        let _ = writeln!(self.log.w(), "reset");
    }

    /// Moves queued descriptors into the fetch buffers, as the engine's
    /// prefetcher does while it waits for START.
    fn drain_fifos(&mut self) {
        if self.control.lock().stall_fifo {
            return;
        }
        self.fetch_all();
    }

    fn fetch_all(&mut self) {
        while let Some(desc) = self.src_fifo.pop_front() {
            self.src_pending.push(desc);
            self.src_rd = self.src_rd.wrapping_add(1);
        }
        while let Some(desc) = self.dst_fifo.pop_front() {
            self.dst_pending.push(desc);
            self.dst_rd = self.dst_rd.wrapping_add(1);
        }
    }

    fn fifo_status(fifo: &VecDeque<(u32, u32)>, rd: u8, wr: u8) -> FifoStatus {
        let mut status = FifoStatus::default();
        status.set_read_ptr(rd);
        status.set_write_ptr(wr);
        status.set_empty_slots((FIFO_DEPTH - fifo.len()) as u8);
        status
    }

    fn push_src(&mut self, addr: u32) {
        if self.src_fifo.len() == FIFO_DEPTH {
            self.err |= ErrStatus::FIFO_OVERFLOW;
            return;
        }
        let _ = writeln!(self.log.w(), "src {:#010x} {:#010x}", self.src_latch, addr);
        self.src_fifo.push_back((self.src_latch, addr));
        self.src_wr = self.src_wr.wrapping_add(1);
    }

    fn push_dst(&mut self, addr: u32) {
        if self.dst_fifo.len() == FIFO_DEPTH {
            self.err |= ErrStatus::FIFO_OVERFLOW;
            return;
        }
        let _ = writeln!(self.log.w(), "dst {:#010x} {:#010x}", self.dst_latch, addr);
        self.dst_fifo.push_back((self.dst_latch, addr));
        self.dst_wr = self.dst_wr.wrapping_add(1);
    }

    fn start(&mut self) {
        let _ = writeln!(self.log.w(), "start");
        self.fetch_all();
        let src = std::mem::take(&mut self.src_pending);
        let dst = std::mem::take(&mut self.dst_pending);

        let (countdown, inject) = {
            let mut knobs = self.control.lock();
            knobs.started += 1;
            let countdown = (!knobs.never_complete && self.debug_arb.clk_en())
                .then_some(knobs.completion_delay);
            (countdown, knobs.inject_error.take())
        };

        let executor = Executor {
            memory: &self.memory,
        };
        let mut completion = match executor.execute(&src, &dst) {
            Ok(writes) => Completion {
                writes,
                err: ErrStatus::empty(),
            },
            Err(err) => Completion {
                writes: Vec::new(),
                err,
            },
        };
        if let Some(err) = inject {
            completion.err |= err;
            completion.writes.clear();
        }
        self.running = Some(Running {
            countdown,
            completion,
        });
    }

    /// Advances a running command by one status read.
    fn tick(&mut self) {
        let due = match self.running.as_mut().and_then(|r| r.countdown.as_mut()) {
            None => false,
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
        };
        if due {
            if let Some(running) = self.running.take() {
                self.complete(running.completion);
            }
        }
    }

    fn complete(&mut self, mut completion: Completion) {
        for (addr, data) in &completion.writes {
            if !self.memory.write(*addr, data) {
                completion.err |= ErrStatus::DMA_WRITE;
            }
        }
        self.err |= completion.err;
        self.ctrl.set_cmd_ok(true);
        if !self.err.is_empty() {
            self.ctrl.set_err_int(true);
            self.ctrl
                .set_err_int_count(self.ctrl.err_int_count().wrapping_add(1));
        }
        let _ = writeln!(self.log.w(), "done {:#x}", completion.err.bits());
    }

    fn write_ctrl(&mut self, val: CtrlStatus) {
        if val.soft_reset() {
            self.soft_reset();
            return;
        }
        if val.cmd_ok() {
            self.ctrl.set_cmd_ok(false);
        }
        if val.err_int() {
            self.ctrl.set_err_int(false);
        }
        self.ctrl.set_int_en(val.int_en());
        if val.start() {
            self.start();
        }
    }
}

impl Bus for CryptoEngine {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            return Err(BusError::LoadAccessFault);
        }
        if addr % 4 != 0 {
            return Err(BusError::LoadAddrMisaligned);
        }
        let val = match addr {
            offsets::SRC_STATUS => {
                self.drain_fifos();
                Self::fifo_status(&self.src_fifo, self.src_rd, self.src_wr).0
            }
            offsets::DST_STATUS => {
                self.drain_fifos();
                Self::fifo_status(&self.dst_fifo, self.dst_rd, self.dst_wr).0
            }
            offsets::SRC_DESC0 => self.src_latch,
            offsets::DST_DESC0 => self.dst_latch,
            offsets::SRC_DESC1 | offsets::DST_DESC1 => 0,
            offsets::CTRL_STATUS => {
                self.tick();
                self.ctrl.0
            }
            offsets::DEBUG_ARB => self.debug_arb.0,
            offsets::ERR_STATUS => self.err.bits(),
            offsets::SWAP_CFG => self.swap_cfg.0,
            offsets::OTP_KEY_CTRL => self.otp_key_ctrl.0,
            _ => return Err(BusError::LoadAccessFault),
        };
        Ok(val)
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word {
            return Err(BusError::StoreAccessFault);
        }
        if addr % 4 != 0 {
            return Err(BusError::StoreAddrMisaligned);
        }
        match addr {
            offsets::SRC_DESC0 => self.src_latch = val,
            offsets::SRC_DESC1 => self.push_src(val),
            offsets::DST_DESC0 => self.dst_latch = val,
            offsets::DST_DESC1 => self.push_dst(val),
            offsets::CTRL_STATUS => self.write_ctrl(CtrlStatus(val)),
            offsets::DEBUG_ARB => self.debug_arb = DebugArb(val),
            offsets::ERR_STATUS => self.err.remove(ErrStatus::from_bits_truncate(val)),
            offsets::SWAP_CFG => self.swap_cfg = SwapCfg(val),
            offsets::OTP_KEY_CTRL => self.otp_key_ctrl = OtpKeyCtrl(val),
            offsets::SRC_STATUS | offsets::DST_STATUS => {}
            _ => return Err(BusError::StoreAccessFault),
        }
        Ok(())
    }
}

/// Decoded command descriptor and its memory image.
struct Command {
    word0: ClWord0,
    word1: ClWord1,
    word2: ClWord2,
    total_bits: u128,
    key: Vec<u8>,
    iv: Vec<u8>,
}

/// Data gathered from the data-phase source descriptors.
#[derive(Default)]
struct Gathered {
    aad: Vec<u8>,
    msg: Vec<u8>,
    auto_pad: bool,
}

struct Output {
    auth: bool,
    len: usize,
    addr: u32,
}

/// Byte count described by a block count and the size of the last block.
fn real_len(blocks: u32, last: u8) -> usize {
    let blocks = blocks as usize;
    match (blocks, last) {
        (0, _) => 0,
        (n, 0) => n * AES_BLOCK_SIZE,
        (n, last) => (n - 1) * AES_BLOCK_SIZE + last as usize,
    }
}

fn hash_mode(sel: HashModeSel) -> HashMode {
    match sel {
        HashModeSel::Md5 => HashMode::Md5,
        HashModeSel::Sha1 => HashMode::Sha1,
        HashModeSel::Sha224 => HashMode::Sha224,
        HashModeSel::Sha256 => HashMode::Sha256,
        HashModeSel::Sha384 => HashMode::Sha384,
        HashModeSel::Sha512 => HashMode::Sha512,
    }
}

struct Executor<'a> {
    memory: &'a SystemMemory,
}

impl Executor<'_> {
    /// Runs one command. Returns the memory writes of the destination
    /// descriptors, or the error status to raise.
    fn execute(
        &self,
        src: &[(u32, u32)],
        dst: &[(u32, u32)],
    ) -> Result<Vec<(u32, Vec<u8>)>, ErrStatus> {
        let (&(ctrl, addr), data) = src.split_first().ok_or(ErrStatus::INCOMPLETE_REQUEST)?;
        let head = SrcDescCtrl(ctrl);
        check_chain(src.iter().map(|&(c, _)| {
            let c = SrcDescCtrl(c);
            (c.first(), c.last())
        }))?;
        if !head.read_source() {
            return Err(ErrStatus::DESC_FORMAT);
        }
        let cmd = self.read_command(head, addr)?;
        let gathered = self.gather(data)?;
        let outputs = dst
            .iter()
            .map(|&(c, addr)| {
                let c = DstDescCtrl(c);
                Output {
                    auth: c.auth(),
                    len: if c.auth() { c.auth_len() as usize } else { c.cipher_len() as usize },
                    addr,
                }
            })
            .collect::<Vec<_>>();
        check_chain(dst.iter().map(|&(c, _)| {
            let c = DstDescCtrl(c);
            (c.first(), c.last())
        }))?;
        if dst.iter().any(|&(c, _)| !DstDescCtrl(c).write_source()) {
            return Err(ErrStatus::DESC_FORMAT);
        }

        let mode =
            EngineMode::try_from(cmd.word0.engine_mode()).map_err(|_| ErrStatus::CMD_DECODE)?;
        let results = match mode {
            EngineMode::CipherOnly | EngineMode::Mixed => cipher(&cmd, mode, &gathered)?,
            EngineMode::HashOnly => hash(&cmd, &gathered)?,
        };
        place(&outputs, results)
    }

    fn read_command(&self, head: SrcDescCtrl, addr: u32) -> Result<Command, ErrStatus> {
        let length =
            CommandLength::try_from(head.cmd_len_sel()).map_err(|_| ErrStatus::DESC_FORMAT)?;
        let key_len = head.key_len() as usize;
        let iv_len = head.iv_len() as usize;
        let consistent = match length {
            CommandLength::Data => false,
            CommandLength::Cl => key_len == 0 && iv_len == 0,
            CommandLength::ClKey => iv_len == 0,
            CommandLength::ClKeyIv => true,
        };
        if !consistent {
            return Err(ErrStatus::DESC_FORMAT);
        }

        let image = self
            .memory
            .read(addr, CL_SIZE_BYTES + key_len + iv_len)
            .ok_or(ErrStatus::DMA_READ)?;
        let mut words = [0u32; 7];
        for (word, chunk) in words.iter_mut().zip(image.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        let (key, iv) = image[CL_SIZE_BYTES..].split_at(key_len);
        Ok(Command {
            word0: ClWord0(words[0]),
            word1: ClWord1(words[1]),
            word2: ClWord2(words[2]),
            total_bits: u128::from(words[3])
                | u128::from(words[4]) << 32
                | u128::from(words[5]) << 64
                | u128::from(words[6]) << 96,
            key: key.to_vec(),
            iv: iv.to_vec(),
        })
    }

    fn gather(&self, data: &[(u32, u32)]) -> Result<Gathered, ErrStatus> {
        let mut gathered = Gathered::default();
        for &(ctrl, addr) in data {
            let ctrl = SrcDescCtrl(ctrl);
            if ctrl.cmd_len_sel() != u8::from(CommandLength::Data) || !ctrl.read_source() {
                return Err(ErrStatus::DESC_FORMAT);
            }
            let aad_len = ctrl.a2eo() as usize;
            let msg_len = ctrl.msg_len() as usize;
            if aad_len != 0 {
                let aad = self.memory.read(addr, aad_len).ok_or(ErrStatus::DMA_READ)?;
                gathered.aad.extend_from_slice(&aad);
            }
            if msg_len != 0 {
                let msg_addr = addr.checked_add(aad_len as u32).ok_or(ErrStatus::DMA_READ)?;
                let msg = self.memory.read(msg_addr, msg_len).ok_or(ErrStatus::DMA_READ)?;
                gathered.msg.extend_from_slice(&msg);
            }
            gathered.auto_pad |= ctrl.auto_pad();
        }
        Ok(gathered)
    }
}

/// Every chain starts with `first`, ends with `last`, and carries neither
/// flag anywhere else.
fn check_chain(flags: impl ExactSizeIterator<Item = (bool, bool)>) -> Result<(), ErrStatus> {
    let n = flags.len();
    if n == 0 {
        return Err(ErrStatus::INCOMPLETE_REQUEST);
    }
    for (i, (first, last)) in flags.enumerate() {
        if first != (i == 0) {
            return Err(ErrStatus::DESC_FORMAT);
        }
        if i == n - 1 && !last {
            return Err(ErrStatus::INCOMPLETE_REQUEST);
        }
        if last && i != n - 1 {
            return Err(ErrStatus::DESC_FORMAT);
        }
    }
    Ok(())
}

/// What the executor produced, in destination order.
struct Results {
    cipher: Option<Vec<u8>>,
    auth: Option<Vec<u8>>,
}

/// Matches results to destination descriptors.
fn place(outputs: &[Output], results: Results) -> Result<Vec<(u32, Vec<u8>)>, ErrStatus> {
    let mut expected = Vec::new();
    if let Some(cipher) = results.cipher {
        expected.push((false, cipher));
    }
    if let Some(auth) = results.auth {
        expected.push((true, auth));
    }
    if expected.len() != outputs.len() {
        return Err(ErrStatus::DESC_FORMAT);
    }
    expected
        .into_iter()
        .zip(outputs)
        .map(|((auth, data), out)| {
            if auth != out.auth {
                return Err(ErrStatus::DESC_FORMAT);
            }
            if data.len() != out.len {
                return Err(ErrStatus::LENGTH_MISMATCH);
            }
            Ok((out.addr, data))
        })
        .collect()
}

fn cipher(cmd: &Command, mode: EngineMode, data: &Gathered) -> Result<Results, ErrStatus> {
    let w0 = cmd.word0;
    if w0.engine_select() || w0.tdes_en() || w0.hmac_en() {
        return Err(ErrStatus::CMD_DECODE);
    }
    let sel = CipherModeSel::try_from(w0.cipher_mode()).map_err(|_| ErrStatus::CMD_DECODE)?;
    if (sel == CipherModeSel::Gcm) != (mode == EngineMode::Mixed) {
        return Err(ErrStatus::CMD_DECODE);
    }
    let key_len = match KeySizeSel::try_from(w0.key_size()).map_err(|_| ErrStatus::CMD_DECODE)? {
        KeySizeSel::Aes128 => 16,
        KeySizeSel::Aes192 => 24,
        KeySizeSel::Aes256 => 32,
    };
    let iv_len = if sel == CipherModeSel::Ecb { 0 } else { AES_BLOCK_SIZE };
    if cmd.key.len() != key_len || cmd.iv.len() != iv_len {
        return Err(ErrStatus::CMD_DECODE);
    }
    if data.auto_pad {
        return Err(ErrStatus::DESC_FORMAT);
    }

    let msg_blocks = cmd.word2.msg_blocks();
    let aad_blocks = u32::from(cmd.word2.aad_blocks());
    if data.msg.len() != msg_blocks as usize * AES_BLOCK_SIZE
        || data.aad.len() != aad_blocks as usize * AES_BLOCK_SIZE
    {
        return Err(ErrStatus::LENGTH_MISMATCH);
    }
    let msg_len = real_len(msg_blocks, cmd.word1.msg_last());
    let aad_len = real_len(aad_blocks, cmd.word1.aad_last());

    let mut iv = [0u8; AES_BLOCK_SIZE];
    iv[..cmd.iv.len()].copy_from_slice(&cmd.iv);

    if sel == CipherModeSel::Gcm {
        if w0.icv_len() as usize != hwcrypto_emu_crypto::GCM_TAG_SIZE {
            return Err(ErrStatus::CMD_DECODE);
        }
        let (mut out, tag) = gcm_process(
            &cmd.key,
            &iv,
            w0.encrypt(),
            &data.aad[..aad_len],
            &data.msg[..msg_len],
        )
        .ok_or(ErrStatus::CMD_DECODE)?;
        out.resize(data.msg.len(), 0);
        return Ok(Results {
            cipher: (msg_blocks != 0).then_some(out),
            auth: Some(tag.to_vec()),
        });
    }

    if aad_blocks != 0 {
        return Err(ErrStatus::LENGTH_MISMATCH);
    }
    let aes_mode = match sel {
        CipherModeSel::Ecb => AesMode::Ecb,
        CipherModeSel::Cbc => AesMode::Cbc,
        CipherModeSel::Cfb => AesMode::Cfb,
        CipherModeSel::Ofb => AesMode::Ofb,
        CipherModeSel::Ctr => AesMode::Ctr,
        CipherModeSel::Gcm => return Err(ErrStatus::CMD_DECODE),
    };
    let key = AesKey::new(&cmd.key).ok_or(ErrStatus::CMD_DECODE)?;
    let out = key.process(aes_mode, w0.encrypt(), &iv, &data.msg, msg_len);
    Ok(Results {
        cipher: (msg_blocks != 0).then_some(out),
        auth: None,
    })
}

fn hash(cmd: &Command, data: &Gathered) -> Result<Results, ErrStatus> {
    let w0 = cmd.word0;
    let sel = HashModeSel::try_from(w0.hash_mode()).map_err(|_| ErrStatus::CMD_DECODE)?;
    let mode = hash_mode(sel);
    let block = mode.block_size();
    if w0.icv_len() as usize != mode.state_size() {
        return Err(ErrStatus::CMD_DECODE);
    }
    if !data.aad.is_empty() {
        return Err(ErrStatus::DESC_FORMAT);
    }

    let hmac = w0.hmac_en();
    let pad_len = cmd.word2.hash_pad_blocks() as usize * AES_BLOCK_SIZE;
    if hmac && (cmd.key.len() != 2 * block || pad_len != 2 * block) {
        return Err(ErrStatus::CMD_DECODE);
    }
    if !hmac && !cmd.key.is_empty() {
        return Err(ErrStatus::CMD_DECODE);
    }
    let (ipad, opad) = cmd.key.split_at(cmd.key.len() / 2);

    let mut state = match cmd.iv.len() {
        0 => SeqHash::new(mode),
        _ => SeqHash::from_state(mode, &cmd.iv).ok_or(ErrStatus::CMD_DECODE)?,
    };
    if hmac && w0.seq_first() {
        state.compress(ipad);
    }

    let digest = if w0.seq_last() {
        let blocks = cmd.word2.msg_blocks();
        if data.msg.len() != blocks as usize * AES_BLOCK_SIZE {
            return Err(ErrStatus::LENGTH_MISMATCH);
        }
        let len = real_len(blocks, cmd.word1.msg_last());
        let inner = state.finish(&data.msg[..len], cmd.total_bits);
        if hmac {
            let inner = &inner[..mode.digest_size()];
            let mut outer = SeqHash::new(mode);
            outer.compress(opad);
            outer.finish(inner, ((block + inner.len()) * 8) as u128)
        } else {
            inner
        }
    } else {
        if data.msg.len() % block != 0 {
            return Err(ErrStatus::LENGTH_MISMATCH);
        }
        state.compress(&data.msg);
        state.digest_bytes()
    };
    Ok(Results {
        cipher: None,
        auth: Some(digest),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest;

    struct Harness {
        engine: CryptoEngine,
        memory: SystemMemory,
        log: Log,
    }

    impl Harness {
        fn new() -> Self {
            let memory = SystemMemory::new();
            let log = Log::new();
            let mut engine =
                CryptoEngine::new(memory.clone(), EngineControl::default(), log.clone());
            let mut arb = DebugArb::default();
            arb.set_clk_en(true);
            engine.write(RvSize::Word, offsets::DEBUG_ARB, arb.0).unwrap();
            Self { engine, memory, log }
        }

        fn place(&self, data: &[u8]) -> u32 {
            let addr = self.memory.alloc(data.len()).unwrap();
            assert!(self.memory.write(addr, data));
            addr
        }

        fn src(&mut self, ctrl: SrcDescCtrl, addr: u32) {
            self.engine.write(RvSize::Word, offsets::SRC_DESC0, ctrl.0).unwrap();
            self.engine.write(RvSize::Word, offsets::SRC_DESC1, addr).unwrap();
        }

        fn dst(&mut self, ctrl: DstDescCtrl, addr: u32) {
            self.engine.write(RvSize::Word, offsets::DST_DESC0, ctrl.0).unwrap();
            self.engine.write(RvSize::Word, offsets::DST_DESC1, addr).unwrap();
        }

        fn run(&mut self) -> (CtrlStatus, ErrStatus) {
            let mut start = CtrlStatus::default();
            start.set_start(true);
            self.engine.write(RvSize::Word, offsets::CTRL_STATUS, start.0).unwrap();
            let ctrl = CtrlStatus(self.engine.read(RvSize::Word, offsets::CTRL_STATUS).unwrap());
            let err = self.engine.read(RvSize::Word, offsets::ERR_STATUS).unwrap();
            (ctrl, ErrStatus::from_bits_truncate(err))
        }
    }

    fn command_image(
        w0: ClWord0,
        w1: ClWord1,
        w2: ClWord2,
        total_bits: u128,
        tail: &[u8],
    ) -> Vec<u8> {
        let words = [
            w0.0,
            w1.0,
            w2.0,
            total_bits as u32,
            (total_bits >> 32) as u32,
            (total_bits >> 64) as u32,
            (total_bits >> 96) as u32,
            0,
        ];
        let mut image: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        image.extend_from_slice(tail);
        image
    }

    fn cmd_desc(length: CommandLength, key_len: u16, iv_len: u8) -> SrcDescCtrl {
        let mut ctrl = SrcDescCtrl::default();
        ctrl.set_read_source(true);
        ctrl.set_first(true);
        ctrl.set_cmd_len_sel(length.into());
        ctrl.set_key_len(key_len);
        ctrl.set_iv_len(iv_len);
        ctrl
    }

    fn msg_desc(len: u16, last: bool) -> SrcDescCtrl {
        let mut ctrl = SrcDescCtrl::default();
        ctrl.set_read_source(true);
        ctrl.set_last(last);
        ctrl.set_msg_len(len);
        ctrl
    }

    fn out_desc(auth: bool, len: u32, first: bool, last: bool) -> DstDescCtrl {
        let mut ctrl = DstDescCtrl::default();
        ctrl.set_write_source(true);
        ctrl.set_first(first);
        ctrl.set_last(last);
        ctrl.set_auth(auth);
        if auth {
            ctrl.set_auth_len(len as u8);
        } else {
            ctrl.set_cipher_len(len);
        }
        ctrl
    }

    #[test]
    fn test_ecb_known_answer() {
        let mut h = Harness::new();
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let pt = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

        let mut w0 = ClWord0::default();
        w0.set_cipher_mode(CipherModeSel::Ecb.into());
        w0.set_encrypt(true);
        let mut w2 = ClWord2::default();
        w2.set_msg_blocks(1);
        let cmd = h.place(&command_image(w0, ClWord1::default(), w2, 0, &key));
        let input = h.place(&pt);
        let output = h.memory.alloc(16).unwrap();

        h.src(cmd_desc(CommandLength::ClKey, 16, 0), cmd);
        h.src(msg_desc(16, true), input);
        h.dst(out_desc(false, 16, true, true), output);
        let (ctrl, err) = h.run();
        assert!(ctrl.cmd_ok());
        assert!(err.is_empty());
        assert_eq!(
            hex::encode(h.memory.read(output, 16).unwrap()),
            "3ad77bb40d7a3660a89ecaf32466ef97"
        );
        assert_eq!(
            h.log.take().lines().filter(|l| l.starts_with("src")).count(),
            2
        );
    }

    #[test]
    fn test_sha256_terminal_with_auto_pad() {
        let mut h = Harness::new();
        let mut w0 = ClWord0::default();
        w0.set_engine_mode(EngineMode::HashOnly.into());
        w0.set_hash_mode(HashModeSel::Sha256.into());
        w0.set_seq_first(true);
        w0.set_seq_last(true);
        w0.set_icv_len(32);
        let mut w1 = ClWord1::default();
        w1.set_msg_last(3);
        let mut w2 = ClWord2::default();
        w2.set_msg_blocks(1);
        let cmd = h.place(&command_image(w0, w1, w2, 24, &[]));
        let mut padded = b"abc".to_vec();
        padded.resize(16, 0);
        let input = h.place(&padded);
        let output = h.memory.alloc(32).unwrap();

        h.src(cmd_desc(CommandLength::Cl, 0, 0), cmd);
        let mut data = msg_desc(16, true);
        data.set_auto_pad(true);
        h.src(data, input);
        h.dst(out_desc(true, 32, true, true), output);
        let (ctrl, err) = h.run();
        assert!(ctrl.cmd_ok());
        assert!(err.is_empty());
        assert_eq!(
            h.memory.read(output, 32).unwrap(),
            sha2::Sha256::digest(b"abc").to_vec()
        );
    }

    #[test]
    fn test_missing_last_is_incomplete() {
        let mut h = Harness::new();
        let cmd = h.place(&command_image(
            ClWord0::default(),
            ClWord1::default(),
            ClWord2::default(),
            0,
            &[0; 16],
        ));
        let output = h.memory.alloc(16).unwrap();
        h.src(cmd_desc(CommandLength::ClKey, 16, 0), cmd);
        h.dst(out_desc(false, 16, true, true), output);
        let (ctrl, err) = h.run();
        assert!(ctrl.cmd_ok());
        assert!(ctrl.err_int());
        assert_eq!(ctrl.err_int_count(), 1);
        assert_eq!(err, ErrStatus::INCOMPLETE_REQUEST);
    }

    #[test]
    fn test_unmapped_source_is_dma_read_error() {
        let mut h = Harness::new();
        let output = h.memory.alloc(16).unwrap();
        h.src(cmd_desc(CommandLength::Cl, 0, 0), 0x10);
        h.dst(out_desc(false, 16, true, true), output);
        let mut desc = cmd_desc(CommandLength::Cl, 0, 0);
        desc.set_first(false);
        desc.set_cmd_len_sel(0);
        desc.set_last(true);
        h.src(desc, 0x10);
        let (_, err) = h.run();
        assert_eq!(err, ErrStatus::DMA_READ);
    }

    #[test]
    fn test_fifo_overflow_when_stalled() {
        let mut h = Harness::new();
        h.engine.control().set_stall_fifo(true);
        for _ in 0..FIFO_DEPTH {
            h.src(msg_desc(16, false), 0);
        }
        let status = FifoStatus(h.engine.read(RvSize::Word, offsets::SRC_STATUS).unwrap());
        assert_eq!(status.empty_slots(), 0);
        h.src(msg_desc(16, false), 0);
        let err = h.engine.read(RvSize::Word, offsets::ERR_STATUS).unwrap();
        assert_eq!(ErrStatus::from_bits_truncate(err), ErrStatus::FIFO_OVERFLOW);

        // Error status is write-one-to-clear.
        h.engine
            .write(RvSize::Word, offsets::ERR_STATUS, ErrStatus::all().bits())
            .unwrap();
        assert_eq!(h.engine.read(RvSize::Word, offsets::ERR_STATUS).unwrap(), 0);
    }

    #[test]
    fn test_prefetch_frees_slots() {
        let mut h = Harness::new();
        for _ in 0..FIFO_DEPTH {
            h.src(msg_desc(16, false), 0);
        }
        let status = FifoStatus(h.engine.read(RvSize::Word, offsets::SRC_STATUS).unwrap());
        assert_eq!(status.empty_slots() as usize, FIFO_DEPTH);
        assert_eq!(status.read_ptr(), status.write_ptr());
    }

    #[test]
    fn test_completion_delay_and_never_complete() {
        let mut h = Harness::new();
        h.engine.control().set_completion_delay(2);
        h.run();
        let read_ctrl = |h: &mut Harness| {
            CtrlStatus(h.engine.read(RvSize::Word, offsets::CTRL_STATUS).unwrap())
        };
        // run() already consumed one read.
        assert!(!read_ctrl(&mut h).cmd_ok());
        assert!(read_ctrl(&mut h).cmd_ok());

        let mut h = Harness::new();
        h.engine.control().set_never_complete(true);
        let (ctrl, _) = h.run();
        assert!(!ctrl.cmd_ok());
        for _ in 0..100 {
            assert!(!read_ctrl(&mut h).cmd_ok());
        }
        assert_eq!(h.engine.control().started(), 1);
    }

    #[test]
    fn test_clock_gate_blocks_completion() {
        let mut h = Harness::new();
        h.engine.write(RvSize::Word, offsets::DEBUG_ARB, 0).unwrap();
        let (ctrl, _) = h.run();
        assert!(!ctrl.cmd_ok());
    }

    #[test]
    fn test_soft_reset_clears_state() {
        let mut h = Harness::new();
        h.engine.control().inject_error(ErrStatus::DMA_WRITE);
        let (ctrl, err) = h.run();
        assert!(ctrl.cmd_ok());
        assert!(err.contains(ErrStatus::DMA_WRITE));

        h.src(msg_desc(16, false), 0);
        let mut reset = CtrlStatus::default();
        reset.set_soft_reset(true);
        h.engine.write(RvSize::Word, offsets::CTRL_STATUS, reset.0).unwrap();
        assert_eq!(h.engine.read(RvSize::Word, offsets::CTRL_STATUS).unwrap(), 0);
        assert_eq!(h.engine.read(RvSize::Word, offsets::ERR_STATUS).unwrap(), 0);
        let status = FifoStatus(h.engine.read(RvSize::Word, offsets::SRC_STATUS).unwrap());
        assert_eq!(status.empty_slots() as usize, FIFO_DEPTH);
    }

    #[test]
    fn test_cmd_ok_write_one_to_clear() {
        let mut h = Harness::new();
        let (ctrl, _) = h.run();
        assert!(ctrl.cmd_ok());
        let mut clear = CtrlStatus::default();
        clear.set_cmd_ok(true);
        clear.set_err_int(true);
        h.engine.write(RvSize::Word, offsets::CTRL_STATUS, clear.0).unwrap();
        let ctrl = CtrlStatus(h.engine.read(RvSize::Word, offsets::CTRL_STATUS).unwrap());
        assert!(!ctrl.cmd_ok());
        assert!(!ctrl.err_int());
    }

    #[test]
    fn test_bus_rejects_bad_access() {
        let mut h = Harness::new();
        assert_eq!(
            h.engine.read(RvSize::Byte, offsets::CTRL_STATUS),
            Err(BusError::LoadAccessFault)
        );
        assert_eq!(h.engine.read(RvSize::Word, 0x0002), Err(BusError::LoadAddrMisaligned));
        assert_eq!(h.engine.write(RvSize::Word, 0x0800, 0), Err(BusError::StoreAccessFault));
    }
}
