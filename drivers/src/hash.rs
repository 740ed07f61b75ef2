/*++

Licensed under the Apache-2.0 license.

File Name:

    hash.rs

Abstract:

    File contains the MD5/SHA/HMAC front-end and the sequential hash state
    carried between engine calls.

--*/

use std::sync::Arc;

use hwcrypto_error::{HwCryptoError, HwCryptoResult};
use hwcrypto_registers::enums::HashModeSel;
use hwcrypto_registers::CL_SIZE_BYTES;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithms::{HashAlgorithm, HASH_BLOCK_MAX, HASH_STATE_MAX};
use crate::chunker::{plan_segments, SegmentSource, MSG_SEGMENT_MAX};
use crate::command::{CommandWord, HashTerminal};
use crate::descriptor::{DestinationDescriptor, SourceDescriptor, SourcePhase};
use crate::dma::DmaDirection;
use crate::registry::{EngineRegistry, TransformHandle};

const HMAC_IPAD: u8 = 0x36;
const HMAC_OPAD: u8 = 0x5c;

/// Identifies a [`HashExport`] image.
pub const HASH_EXPORT_MAGIC: u32 = 0x4843_5358;

const EXPORT_FLAG_FIRST: u32 = 1 << 0;
const EXPORT_FLAG_HMAC: u32 = 1 << 1;

/// Suspended state of a [`HashRequest`].
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct HashExport {
    pub magic: u32,
    pub algorithm: u32,
    pub flags: u32,
    pub carry_len: u32,
    pub total_len: u64,
    pub state_len: u32,
    pub reserved: u32,
    pub state: [u8; HASH_STATE_MAX],
    pub carry: [u8; HASH_BLOCK_MAX],
}

impl HashExport {
    /// Parses an image produced by [`HashRequest::export`].
    pub fn from_bytes(bytes: &[u8]) -> HwCryptoResult<Self> {
        Self::read_from_bytes(bytes).map_err(|_| HwCryptoError::DRIVER_HASH_INVALID_EXPORT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqState {
    /// Nothing flushed to the engine yet.
    Fresh,

    /// At least one intermediate state came back from the engine.
    Continuing,

    /// The terminal call is in flight.
    Finalizing,

    Done,

    /// An engine call failed; the request must be restarted.
    Aborted,
}

/// ipad followed by opad.
#[derive(Zeroize, ZeroizeOnDrop)]
struct HmacPads {
    bytes: [u8; 2 * HASH_BLOCK_MAX],
    len: usize,
}

/// A hash or HMAC transform bound to one engine instance.
pub struct HashContext {
    registry: Arc<EngineRegistry>,
    handle: TransformHandle,
    alg: HashAlgorithm,
    hmac: bool,
    pads: Option<HmacPads>,
}

impl HashContext {
    pub fn new(registry: &Arc<EngineRegistry>, alg: HashAlgorithm) -> Self {
        Self {
            registry: registry.clone(),
            handle: registry.new_handle(),
            alg,
            hmac: false,
            pads: None,
        }
    }

    /// An HMAC transform; [`HashContext::set_key`] must be called before use.
    pub fn new_hmac(registry: &Arc<EngineRegistry>, alg: HashAlgorithm) -> Self {
        let mut ctx = Self::new(registry, alg);
        ctx.hmac = true;
        ctx
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.alg
    }

    pub fn is_hmac(&self) -> bool {
        self.hmac
    }

    pub fn digest_size(&self) -> usize {
        self.alg.digest_size()
    }

    pub fn handle(&self) -> TransformHandle {
        self.handle
    }

    /// Derives the HMAC inner and outer pads from `key`. Keys longer than a
    /// block are hashed on the engine first.
    pub fn set_key(&mut self, key: &[u8]) -> HwCryptoResult<()> {
        if !self.hmac {
            return Err(HwCryptoError::DRIVER_HASH_INVALID_STATE);
        }
        let block = self.alg.block_size();
        let mut key_padded = [0u8; HASH_BLOCK_MAX];
        if key.len() > block {
            HashContext::new(&self.registry, self.alg).digest(key, &mut key_padded)?;
        } else {
            key_padded[..key.len()].copy_from_slice(key);
        }

        let mut pads = HmacPads {
            bytes: [0; 2 * HASH_BLOCK_MAX],
            len: 2 * block,
        };
        let (ipad, opad) = pads.bytes[..2 * block].split_at_mut(block);
        for ((i, o), k) in ipad.iter_mut().zip(opad.iter_mut()).zip(&key_padded[..block]) {
            *i = k ^ HMAC_IPAD;
            *o = k ^ HMAC_OPAD;
        }
        key_padded.zeroize();
        self.pads = Some(pads);
        Ok(())
    }

    /// ipad followed by opad; empty for plain hashes.
    fn pads(&self) -> HwCryptoResult<&[u8]> {
        match (&self.pads, self.hmac) {
            (_, false) => Ok(&[]),
            (Some(pads), true) => Ok(&pads.bytes[..pads.len]),
            (None, true) => Err(HwCryptoError::DRIVER_HASH_KEY_NOT_SET),
        }
    }

    pub fn init(&self) -> HwCryptoResult<HashRequest<'_>> {
        self.pads()?;
        Ok(HashRequest {
            ctx: self,
            seq: SeqState::Fresh,
            first: true,
            total_len: 0,
            state: self.alg.initial_state(),
            carry: [0; HASH_BLOCK_MAX],
            carry_len: 0,
        })
    }

    /// Resumes a request suspended by [`HashRequest::export`].
    pub fn import(&self, export: &HashExport) -> HwCryptoResult<HashRequest<'_>> {
        self.pads()?;
        let invalid = HwCryptoError::DRIVER_HASH_INVALID_EXPORT;
        let alg = u8::try_from(export.algorithm)
            .ok()
            .and_then(|sel| HashModeSel::try_from(sel).ok())
            .map(HashAlgorithm::from_sel)
            .ok_or(invalid)?;
        let first = export.flags & EXPORT_FLAG_FIRST != 0;
        let hmac = export.flags & EXPORT_FLAG_HMAC != 0;
        let carry_len = export.carry_len as usize;
        if export.magic != HASH_EXPORT_MAGIC
            || alg != self.alg
            || hmac != self.hmac
            || export.flags & !(EXPORT_FLAG_FIRST | EXPORT_FLAG_HMAC) != 0
            || export.reserved != 0
            || export.state_len as usize != alg.hw_digest_size()
            || carry_len > alg.block_size()
            || export.total_len < carry_len as u64
            || (first && export.total_len != carry_len as u64)
            || (!first && !whole_blocks(export.total_len - carry_len as u64, alg))
        {
            return Err(invalid);
        }
        Ok(HashRequest {
            ctx: self,
            seq: if first {
                SeqState::Fresh
            } else {
                SeqState::Continuing
            },
            first,
            total_len: export.total_len,
            state: export.state,
            carry: export.carry,
            carry_len,
        })
    }

    /// One-shot hash of `data`. Returns the digest size.
    pub fn digest(&self, data: &[u8], out: &mut [u8]) -> HwCryptoResult<usize> {
        self.init()?.finup(data, out)
    }

    /// Resets the engine this transform runs on after a timeout or fault.
    pub fn reset_engine(&self) -> HwCryptoResult<()> {
        self.registry.reset(self.handle)
    }
}

impl Drop for HashContext {
    fn drop(&mut self) {
        self.registry.unbind(self.handle);
    }
}

/// A continued request has fed at least one full block to the engine.
fn whole_blocks(fed: u64, alg: HashAlgorithm) -> bool {
    fed != 0 && fed % alg.block_size() as u64 == 0
}

/// One streaming hash computation.
pub struct HashRequest<'c> {
    ctx: &'c HashContext,
    seq: SeqState,
    first: bool,
    total_len: u64,
    /// Intermediate state in register-native order.
    state: [u8; HASH_STATE_MAX],
    carry: [u8; HASH_BLOCK_MAX],
    carry_len: usize,
}

impl HashRequest<'_> {
    pub fn seq_state(&self) -> SeqState {
        self.seq
    }

    /// Bytes accepted so far.
    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    fn check_open(&self) -> HwCryptoResult<()> {
        match self.seq {
            SeqState::Fresh | SeqState::Continuing => Ok(()),
            SeqState::Aborted => Err(HwCryptoError::DRIVER_HASH_ABORTED),
            SeqState::Finalizing | SeqState::Done => {
                Err(HwCryptoError::DRIVER_HASH_INVALID_STATE)
            }
        }
    }

    pub fn update(&mut self, data: &[u8]) -> HwCryptoResult<()> {
        self.check_open()?;
        let block = self.ctx.alg.block_size();
        let mut rest = data;
        while self.carry_len + rest.len() > block {
            let take = block - self.carry_len;
            self.carry[self.carry_len..block].copy_from_slice(&rest[..take]);
            self.carry_len = block;
            self.total_len += take as u64;
            rest = &rest[take..];
            self.flush(false)?;
        }
        self.carry[self.carry_len..self.carry_len + rest.len()].copy_from_slice(rest);
        self.carry_len += rest.len();
        self.total_len += rest.len() as u64;
        Ok(())
    }

    /// Feeds every entry of a scatter list.
    pub fn update_sg(&mut self, sg: &[&[u8]]) -> HwCryptoResult<()> {
        for entry in sg {
            self.update(entry)?;
        }
        Ok(())
    }

    /// Finishes the digest into `out`. Returns the digest size.
    pub fn finalize(&mut self, out: &mut [u8]) -> HwCryptoResult<usize> {
        self.check_open()?;
        let size = self.ctx.alg.digest_size();
        if out.len() < size {
            return Err(HwCryptoError::DRIVER_HASH_BUFFER_TOO_SMALL);
        }
        self.seq = SeqState::Finalizing;
        let digest = self.flush(true)?;
        out[..size].copy_from_slice(&digest[..size]);
        self.seq = SeqState::Done;
        self.state.zeroize();
        self.carry.zeroize();
        self.carry_len = 0;
        Ok(size)
    }

    pub fn finup(&mut self, data: &[u8], out: &mut [u8]) -> HwCryptoResult<usize> {
        self.update(data)?;
        self.finalize(out)
    }

    pub fn export(&self) -> HwCryptoResult<HashExport> {
        self.check_open()?;
        let alg = self.ctx.alg;
        let mut export = HashExport::new_zeroed();
        export.magic = HASH_EXPORT_MAGIC;
        export.algorithm = u8::from(alg.sel()).into();
        if self.first {
            export.flags |= EXPORT_FLAG_FIRST;
        }
        if self.ctx.hmac {
            export.flags |= EXPORT_FLAG_HMAC;
        }
        export.carry_len = self.carry_len as u32;
        export.total_len = self.total_len;
        export.state_len = alg.hw_digest_size() as u32;
        export.state = self.state;
        export.carry = self.carry;
        Ok(export)
    }

    /// Sends the carry buffer through one engine call. Any failure aborts
    /// the request.
    fn flush(&mut self, terminal: bool) -> HwCryptoResult<Vec<u8>> {
        match self.engine_call(terminal) {
            Ok(digest) => Ok(digest),
            Err(err) => {
                log::warn!("{:?}: hash aborted: {}", self.ctx.handle, err);
                self.seq = SeqState::Aborted;
                Err(err)
            }
        }
    }

    fn engine_call(&mut self, terminal: bool) -> HwCryptoResult<Vec<u8>> {
        let ctx = self.ctx;
        let alg = ctx.alg;
        let pads = ctx.pads()?;
        let data_len = self.carry_len;
        let digest_len = alg.hw_digest_size();
        let cmd = CommandWord::for_hash(
            alg,
            ctx.hmac,
            self.first,
            terminal.then_some(HashTerminal {
                data_len,
                total_len: self.total_len,
            }),
        )?;
        let state = &self.state[..digest_len];
        let data = &self.carry[..data_len];

        let digest = ctx.registry.with_engine(ctx.handle, |session| {
            let mut scratch = Vec::with_capacity(CL_SIZE_BYTES + pads.len() + state.len());
            scratch.extend_from_slice(&cmd.to_bytes());
            scratch.extend_from_slice(pads);
            scratch.extend_from_slice(state);
            let scratch = session.map(scratch, DmaDirection::ToDevice)?;
            let input = session.map(data.to_vec(), DmaDirection::ToDevice)?;
            let output = session.map_output(digest_len)?;

            let mut src = vec![SourceDescriptor::command(
                pads.len(),
                state.len(),
                scratch.addr(),
            )?];
            for seg in plan_segments(data_len, MSG_SEGMENT_MAX) {
                let addr = match seg.source {
                    SegmentSource::Data { offset } => input.addr().offset(offset)?,
                    SegmentSource::ZeroPad => session.zero_pad(),
                };
                let mut desc = SourceDescriptor::message(seg.len, addr)?;
                desc.last = seg.last;
                if let SourcePhase::Data { auto_pad, .. } = &mut desc.phase {
                    *auto_pad = terminal && seg.last;
                }
                src.push(desc);
            }
            if let [only] = src.as_mut_slice() {
                only.last = true;
            }

            let mut dst = DestinationDescriptor::auth(digest_len, output.addr())?;
            dst.first = true;
            dst.last = true;

            session.run(src, &[dst])?;
            drop(input);
            drop(scratch);
            Ok(output.into_inner())
        })?;

        if !terminal {
            self.state[..digest_len].copy_from_slice(&digest);
            alg.digest_to_state(&mut self.state[..digest_len]);
            self.first = false;
            self.carry_len = 0;
            self.seq = SeqState::Continuing;
        }
        Ok(digest)
    }
}

impl Drop for HashRequest<'_> {
    fn drop(&mut self) {
        self.state.zeroize();
        self.carry.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_layout() {
        assert_eq!(core::mem::size_of::<HashExport>(), 224);
        let mut export = HashExport::new_zeroed();
        export.magic = HASH_EXPORT_MAGIC;
        export.total_len = 0x0102;
        let bytes = export.as_bytes();
        assert_eq!(&bytes[..4], &HASH_EXPORT_MAGIC.to_ne_bytes());
        assert_eq!(&bytes[16..24], &0x0102u64.to_ne_bytes());
        let parsed = HashExport::from_bytes(bytes).unwrap();
        assert_eq!(parsed.total_len, 0x0102);
        assert_eq!(
            HashExport::from_bytes(&bytes[1..]).err(),
            Some(HwCryptoError::DRIVER_HASH_INVALID_EXPORT)
        );
    }
}
