/*++

Licensed under the Apache-2.0 license.

File Name:

    cipher.rs

Abstract:

    File contains the AES block cipher and AES-GCM front-end.

--*/

use std::sync::Arc;

use hwcrypto_error::{HwCryptoError, HwCryptoResult};
use hwcrypto_registers::CL_SIZE_BYTES;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algorithms::{CipherMode, AES_BLOCK_SIZE, GCM_IV_SIZE, GCM_TAG_SIZE};
use crate::chunker::{padded_len, plan_segments, SegmentSource, AAD_SEGMENT_MAX, MSG_SEGMENT_MAX};
use crate::command::{CommandWord, AAD_MAX};
use crate::descriptor::{DestinationDescriptor, SourceDescriptor};
use crate::dma::{DmaAddr, DmaDirection};
use crate::registry::{EngineRegistry, TransformHandle};
use crate::sg;

const AES_KEY_MAX: usize = 32;

/// Counter block tail appended to a 96-bit GCM nonce to form J0.
const GCM_J0_TAIL: [u8; 4] = [0, 0, 0, 1];

#[derive(Default, Zeroize, ZeroizeOnDrop)]
struct CipherKey {
    bytes: [u8; AES_KEY_MAX],
    len: usize,
}

impl CipherKey {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// An unauthenticated cipher request over scatter lists.
pub struct SkcipherRequest<'a, 'b> {
    pub iv: &'a [u8],
    pub src: &'a [&'a [u8]],
    pub dst: &'a mut [&'b mut [u8]],
    pub cryptlen: usize,
}

/// An AEAD request. `src` holds the associated data followed by the
/// plaintext (encrypt) or by the ciphertext and tag (decrypt). `dst` is laid
/// out the same way; its associated data region is left untouched.
/// `cryptlen` counts the tag on decrypt.
pub struct AeadRequest<'a, 'b> {
    pub iv: &'a [u8],
    pub src: &'a [&'a [u8]],
    pub dst: &'a mut [&'b mut [u8]],
    pub assoclen: usize,
    pub cryptlen: usize,
}

/// Parameters of one engine call.
struct CipherOp {
    encrypt: bool,
    iv: [u8; AES_BLOCK_SIZE],
    iv_len: usize,
    msg_len: usize,
    aad_len: usize,
}

/// An AES transform bound to one engine instance.
pub struct CipherContext {
    registry: Arc<EngineRegistry>,
    handle: TransformHandle,
    mode: CipherMode,
    key: CipherKey,
    auth_size: usize,
}

impl CipherContext {
    pub fn new(registry: &Arc<EngineRegistry>, mode: CipherMode) -> Self {
        Self {
            registry: registry.clone(),
            handle: registry.new_handle(),
            mode,
            key: CipherKey::default(),
            auth_size: if mode.is_aead() { GCM_TAG_SIZE } else { 0 },
        }
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn handle(&self) -> TransformHandle {
        self.handle
    }

    pub fn set_key(&mut self, key: &[u8]) -> HwCryptoResult<()> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_KEY_LENGTH);
        }
        self.key.zeroize();
        self.key.bytes[..key.len()].copy_from_slice(key);
        self.key.len = key.len();
        Ok(())
    }

    /// Only the full 16-byte GCM tag is supported.
    pub fn set_auth_size(&mut self, size: usize) -> HwCryptoResult<()> {
        if !self.mode.is_aead() {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_MODE);
        }
        if size != GCM_TAG_SIZE {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_AUTH_SIZE);
        }
        self.auth_size = size;
        Ok(())
    }

    pub fn auth_size(&self) -> usize {
        self.auth_size
    }

    /// Resets the engine this transform runs on after a timeout or fault.
    pub fn reset_engine(&self) -> HwCryptoResult<()> {
        self.registry.reset(self.handle)
    }

    pub fn encrypt(&self, req: SkcipherRequest<'_, '_>) -> HwCryptoResult<()> {
        self.skcipher(req, true)
    }

    pub fn decrypt(&self, req: SkcipherRequest<'_, '_>) -> HwCryptoResult<()> {
        self.skcipher(req, false)
    }

    /// Encrypts the linear buffer `input` into `output`.
    pub fn encrypt_slice(
        &self,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> HwCryptoResult<()> {
        self.encrypt(SkcipherRequest {
            iv,
            src: &[input],
            dst: &mut [output],
            cryptlen: input.len(),
        })
    }

    /// Decrypts the linear buffer `input` into `output`.
    pub fn decrypt_slice(
        &self,
        iv: &[u8],
        input: &[u8],
        output: &mut [u8],
    ) -> HwCryptoResult<()> {
        self.decrypt(SkcipherRequest {
            iv,
            src: &[input],
            dst: &mut [output],
            cryptlen: input.len(),
        })
    }

    fn skcipher(&self, req: SkcipherRequest<'_, '_>, encrypt: bool) -> HwCryptoResult<()> {
        self.check_key()?;
        if self.mode.is_aead() {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_MODE);
        }
        if req.cryptlen == 0 {
            return Err(HwCryptoError::DRIVER_CIPHER_EMPTY_MESSAGE);
        }
        if req.iv.len() != self.mode.iv_size() {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_IV_LENGTH);
        }
        if sg::total_len(req.src) < req.cryptlen || sg::total_len_mut(req.dst) < req.cryptlen {
            return Err(HwCryptoError::DRIVER_CIPHER_BUFFER_TOO_SMALL);
        }

        let mut op = CipherOp {
            encrypt,
            iv: [0; AES_BLOCK_SIZE],
            iv_len: req.iv.len(),
            msg_len: req.cryptlen,
            aad_len: 0,
        };
        op.iv[..req.iv.len()].copy_from_slice(req.iv);

        let mut input = vec![0; req.cryptlen];
        sg::copy_to_buffer(req.src, 0, &mut input);
        let output = self.process(&op, input)?;
        sg::copy_from_buffer(req.dst, 0, &output[..req.cryptlen]);
        Ok(())
    }

    pub fn aead_encrypt(&self, req: AeadRequest<'_, '_>) -> HwCryptoResult<()> {
        self.check_aead(&req)?;
        let payload = req.cryptlen;
        let total = req.assoclen + payload;
        if sg::total_len(req.src) < total || sg::total_len_mut(req.dst) < total + GCM_TAG_SIZE {
            return Err(HwCryptoError::DRIVER_CIPHER_BUFFER_TOO_SMALL);
        }

        let op = Self::gcm_op(req.iv, true, payload, req.assoclen)?;
        let mut input = vec![0; total];
        sg::copy_to_buffer(req.src, 0, &mut input);
        let output = self.process(&op, input)?;

        let tag_offset = padded_len(payload);
        sg::copy_from_buffer(req.dst, req.assoclen, &output[..payload]);
        sg::copy_from_buffer(
            req.dst,
            total,
            &output[tag_offset..tag_offset + GCM_TAG_SIZE],
        );
        Ok(())
    }

    pub fn aead_decrypt(&self, req: AeadRequest<'_, '_>) -> HwCryptoResult<()> {
        self.check_aead(&req)?;
        let payload = req
            .cryptlen
            .checked_sub(GCM_TAG_SIZE)
            .ok_or(HwCryptoError::DRIVER_CIPHER_BUFFER_TOO_SMALL)?;
        let total = req.assoclen + payload;
        if sg::total_len(req.src) < total + GCM_TAG_SIZE || sg::total_len_mut(req.dst) < total {
            return Err(HwCryptoError::DRIVER_CIPHER_BUFFER_TOO_SMALL);
        }

        let op = Self::gcm_op(req.iv, false, payload, req.assoclen)?;
        let mut input = vec![0; total];
        sg::copy_to_buffer(req.src, 0, &mut input);
        let mut expected = [0u8; GCM_TAG_SIZE];
        sg::copy_to_buffer(req.src, total, &mut expected);
        let output = self.process(&op, input)?;

        let tag_offset = padded_len(payload);
        let computed = &output[tag_offset..tag_offset + GCM_TAG_SIZE];
        let diff = computed
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            log::warn!("{:?}: GCM tag mismatch", self.handle);
            return Err(HwCryptoError::DRIVER_CIPHER_AUTH_TAG_MISMATCH);
        }
        sg::copy_from_buffer(req.dst, req.assoclen, &output[..payload]);
        Ok(())
    }

    fn check_key(&self) -> HwCryptoResult<()> {
        if self.key.len == 0 {
            return Err(HwCryptoError::DRIVER_CIPHER_KEY_NOT_SET);
        }
        Ok(())
    }

    fn check_aead(&self, req: &AeadRequest<'_, '_>) -> HwCryptoResult<()> {
        self.check_key()?;
        if !self.mode.is_aead() {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_MODE);
        }
        if req.iv.len() != GCM_IV_SIZE {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_IV_LENGTH);
        }
        if req.assoclen > AAD_MAX {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_AAD_LENGTH);
        }
        Ok(())
    }

    fn gcm_op(
        iv: &[u8],
        encrypt: bool,
        payload: usize,
        aad_len: usize,
    ) -> HwCryptoResult<CipherOp> {
        if payload == 0 && aad_len == 0 {
            return Err(HwCryptoError::DRIVER_CIPHER_EMPTY_MESSAGE);
        }
        let mut op = CipherOp {
            encrypt,
            iv: [0; AES_BLOCK_SIZE],
            iv_len: AES_BLOCK_SIZE,
            msg_len: payload,
            aad_len,
        };
        op.iv[..GCM_IV_SIZE].copy_from_slice(iv);
        op.iv[GCM_IV_SIZE..].copy_from_slice(&GCM_J0_TAIL);
        Ok(op)
    }

    /// Runs one engine call over `input` (associated data followed by the
    /// payload). Returns the padded payload output followed by the tag for
    /// GCM.
    fn process(&self, op: &CipherOp, input: Vec<u8>) -> HwCryptoResult<Vec<u8>> {
        let key = self.key.as_bytes();
        let cmd =
            CommandWord::for_cipher(self.mode, key.len(), op.encrypt, op.msg_len, op.aad_len)?;
        let tag_len = if self.mode.is_aead() { GCM_TAG_SIZE } else { 0 };
        let out_len = padded_len(op.msg_len) + tag_len;
        log::debug!(
            "{:?}: {:?} {} msg {} aad {}",
            self.handle,
            self.mode,
            if op.encrypt { "encrypt" } else { "decrypt" },
            op.msg_len,
            op.aad_len
        );

        self.registry.with_engine(self.handle, |session| {
            let mut scratch = Vec::with_capacity(CL_SIZE_BYTES + key.len() + op.iv_len);
            scratch.extend_from_slice(&cmd.to_bytes());
            scratch.extend_from_slice(key);
            scratch.extend_from_slice(&op.iv[..op.iv_len]);
            let scratch = session.map(scratch, DmaDirection::ToDevice)?;
            let input = session.map(input, DmaDirection::ToDevice)?;
            let output = session.map_output(out_len)?;

            let mut src = vec![SourceDescriptor::command(key.len(), op.iv_len, scratch.addr())?];
            let zero_pad = session.zero_pad();
            let segment_addr = |source: SegmentSource, base: usize| -> HwCryptoResult<DmaAddr> {
                match source {
                    SegmentSource::Data { offset } => input.addr().offset(base + offset),
                    SegmentSource::ZeroPad => Ok(zero_pad),
                }
            };
            for seg in plan_segments(op.aad_len, AAD_SEGMENT_MAX) {
                let mut desc = SourceDescriptor::aad(seg.len, segment_addr(seg.source, 0)?)?;
                desc.last = seg.last && op.msg_len == 0;
                src.push(desc);
            }
            for seg in plan_segments(op.msg_len, MSG_SEGMENT_MAX) {
                let mut desc =
                    SourceDescriptor::message(seg.len, segment_addr(seg.source, op.aad_len)?)?;
                desc.last = seg.last;
                src.push(desc);
            }

            let mut dst = Vec::with_capacity(2);
            if op.msg_len != 0 {
                dst.push(DestinationDescriptor::cipher(
                    padded_len(op.msg_len),
                    output.addr(),
                )?);
            }
            if tag_len != 0 {
                dst.push(DestinationDescriptor::auth(
                    tag_len,
                    output.addr().offset(padded_len(op.msg_len))?,
                )?);
            }
            if let Some(first) = dst.first_mut() {
                first.first = true;
            }
            if let Some(last) = dst.last_mut() {
                last.last = true;
            }

            session.run(src, &dst)?;
            drop(input);
            drop(scratch);
            Ok(output.into_inner())
        })
    }
}

impl Drop for CipherContext {
    fn drop(&mut self) {
        self.registry.unbind(self.handle);
    }
}
