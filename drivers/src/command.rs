/*++

Licensed under the Apache-2.0 license.

File Name:

    command.rs

Abstract:

    File contains the builder of the 32-byte command word (CL) that opens
    every engine request.

--*/

use hwcrypto_error::{HwCryptoError, HwCryptoResult};
use hwcrypto_registers::enums::{EngineMode, KeySizeSel};
use hwcrypto_registers::regs::{ClWord0, ClWord1, ClWord2};
use hwcrypto_registers::{
    CL_AAD_BLOCKS_MAX, CL_HASH_PAD_BLOCKS_MAX, CL_MSG_BLOCKS_MAX, CL_SIZE_BYTES, CL_SIZE_WORDS,
};

use crate::algorithms::{CipherMode, HashAlgorithm, GCM_TAG_SIZE};
use crate::chunker::DATA_ALIGN;

/// Largest AAD one authenticated call can carry.
pub const AAD_MAX: usize = CL_AAD_BLOCKS_MAX as usize * DATA_ALIGN;

/// Lengths of the terminal call of a sequential hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTerminal {
    /// Bytes submitted with this call.
    pub data_len: usize,

    /// Bytes hashed over the whole sequence, this call included.
    pub total_len: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandWord {
    pub word0: ClWord0,
    pub word1: ClWord1,
    pub word2: ClWord2,

    /// Message length in bits; only meaningful on a terminal hash call.
    pub total_bits: u128,
}

impl CommandWord {
    /// Command word of a cipher request over `msg_len` payload bytes and
    /// `aad_len` bytes of associated data.
    pub fn for_cipher(
        mode: CipherMode,
        key_len: usize,
        encrypt: bool,
        msg_len: usize,
        aad_len: usize,
    ) -> HwCryptoResult<Self> {
        let key_size = match key_len {
            16 => KeySizeSel::Aes128,
            24 => KeySizeSel::Aes192,
            32 => KeySizeSel::Aes256,
            _ => return Err(HwCryptoError::DRIVER_CIPHER_INVALID_KEY_LENGTH),
        };
        if aad_len > AAD_MAX {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_AAD_LENGTH);
        }
        if aad_len != 0 && !mode.is_aead() {
            return Err(HwCryptoError::DRIVER_CIPHER_INVALID_MODE);
        }

        let mut cmd = Self::default();
        cmd.word0.set_cipher_mode(mode.sel().into());
        cmd.word0.set_encrypt(encrypt);
        cmd.word0.set_key_size(key_size.into());
        cmd.set_msg_len(msg_len)?;
        if mode.is_aead() {
            cmd.word0.set_engine_mode(EngineMode::Mixed.into());
            cmd.word0.set_icv_len(GCM_TAG_SIZE as u8);
            cmd.word1.set_aad_last((aad_len % DATA_ALIGN) as u8);
            cmd.word2
                .set_aad_blocks(aad_len.div_ceil(DATA_ALIGN) as u8);
        } else {
            cmd.word0.set_engine_mode(EngineMode::CipherOnly.into());
        }
        Ok(cmd)
    }

    /// Command word of one call in a sequential hash. `terminal` is set on
    /// the call that finishes the digest.
    pub fn for_hash(
        alg: HashAlgorithm,
        hmac: bool,
        first: bool,
        terminal: Option<HashTerminal>,
    ) -> HwCryptoResult<Self> {
        let mut cmd = Self::default();
        cmd.word0.set_hash_mode(alg.sel().into());
        cmd.word0.set_hmac_en(hmac);
        cmd.word0.set_seq_first(first);
        cmd.word0.set_seq_last(terminal.is_some());
        cmd.word0.set_engine_mode(EngineMode::HashOnly.into());
        cmd.word0.set_icv_len(alg.hw_digest_size() as u8);

        match alg {
            HashAlgorithm::Md5 => {}
            HashAlgorithm::Sha1 | HashAlgorithm::Sha224 | HashAlgorithm::Sha256 => {
                cmd.word1.set_digest_byte_swap(true);
            }
            HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => {
                cmd.word1.set_digest_byte_swap(true);
                cmd.word1.set_digest_word_swap(true);
            }
        }

        if hmac {
            let pad_blocks = 2 * alg.block_size() / DATA_ALIGN;
            if pad_blocks > CL_HASH_PAD_BLOCKS_MAX as usize {
                return Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW);
            }
            cmd.word2.set_hash_pad_blocks(pad_blocks as u8);
        }

        if let Some(terminal) = terminal {
            cmd.set_msg_len(terminal.data_len)?;
            let mut bits = u128::from(terminal.total_len) * 8;
            if hmac {
                bits += alg.block_size() as u128 * 8;
            }
            cmd.total_bits = bits;
        }
        Ok(cmd)
    }

    fn set_msg_len(&mut self, len: usize) -> HwCryptoResult<()> {
        let blocks = len.div_ceil(DATA_ALIGN);
        if blocks > CL_MSG_BLOCKS_MAX as usize {
            return Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW);
        }
        self.word2.set_msg_blocks(blocks as u32);
        self.word1.set_msg_last((len % DATA_ALIGN) as u8);
        Ok(())
    }

    pub fn to_words(&self) -> [u32; CL_SIZE_WORDS] {
        let bits = self.total_bits;
        [
            self.word0.0,
            self.word1.0,
            self.word2.0,
            bits as u32,
            (bits >> 32) as u32,
            (bits >> 64) as u32,
            (bits >> 96) as u32,
            0,
        ]
    }

    pub fn from_words(words: &[u32; CL_SIZE_WORDS]) -> Self {
        Self {
            word0: ClWord0(words[0]),
            word1: ClWord1(words[1]),
            word2: ClWord2(words[2]),
            total_bits: u128::from(words[3])
                | u128::from(words[4]) << 32
                | u128::from(words[5]) << 64
                | u128::from(words[6]) << 96,
        }
    }

    /// Memory image the engine fetches: little-endian words.
    pub fn to_bytes(&self) -> [u8; CL_SIZE_BYTES] {
        let mut bytes = [0u8; CL_SIZE_BYTES];
        for (word, chunk) in self.to_words().iter().zip(bytes.chunks_exact_mut(4)) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}
