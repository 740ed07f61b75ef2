/*++

Licensed under the Apache-2.0 license.

File Name:

    block_modes.rs

Abstract:

    File contains the AES-128/192/256 ECB, CBC, CFB, OFB and CTR datapath.

--*/

use aes::cipher::generic_array::GenericArray;
use aes::{Aes128, Aes192, Aes256};
use cipher::consts::U16;
use cipher::{
    BlockCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, BlockSizeUser,
    InnerIvInit, KeyInit, KeyIvInit, StreamCipher,
};

pub const AES_BLOCK_SIZE: usize = 16;

type Block = [u8; AES_BLOCK_SIZE];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AesMode {
    Ecb,
    Cbc,
    Cfb,
    Ofb,
    Ctr,
}

enum Cipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

/// An expanded AES key of any supported size.
pub struct AesKey {
    key: Vec<u8>,
    cipher: Cipher,
}

impl AesKey {
    /// Returns None unless `key` is 16, 24 or 32 bytes long.
    pub fn new(key: &[u8]) -> Option<Self> {
        let cipher = match key.len() {
            16 => Cipher::Aes128(Aes128::new_from_slice(key).ok()?),
            24 => Cipher::Aes192(Aes192::new_from_slice(key).ok()?),
            32 => Cipher::Aes256(Aes256::new_from_slice(key).ok()?),
            _ => return None,
        };
        Some(Self {
            key: key.to_vec(),
            cipher,
        })
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn encrypt_block(&self, block: &mut Block) {
        let block = GenericArray::from_mut_slice(block);
        match &self.cipher {
            Cipher::Aes128(c) => c.encrypt_block(block),
            Cipher::Aes192(c) => c.encrypt_block(block),
            Cipher::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn keystream_block(&self, input: &Block) -> Block {
        let mut block = *input;
        self.encrypt_block(&mut block);
        block
    }

    /// Runs `mode` over the 16-byte aligned stream `data`, of which the first
    /// `len` bytes are message. The output has the length of `data`; bytes
    /// past `len` carry no meaning.
    ///
    /// A trailing partial block in ECB and CBC is processed with residual
    /// block termination: it is XORed with the encryption of the previous
    /// ciphertext block (the IV for CBC, or zero for ECB, when there is no
    /// previous block), so ciphertext length equals message length.
    pub fn process(
        &self,
        mode: AesMode,
        encrypt: bool,
        iv: &Block,
        data: &[u8],
        len: usize,
    ) -> Vec<u8> {
        debug_assert!(data.len() % AES_BLOCK_SIZE == 0 && len <= data.len());
        let mut out = data.to_vec();
        let full = len / AES_BLOCK_SIZE;
        match mode {
            AesMode::Ecb | AesMode::Cbc => {
                let body = full * AES_BLOCK_SIZE;
                if mode == AesMode::Cbc {
                    self.cbc_apply(encrypt, iv, &mut out[..body]);
                } else {
                    self.ecb_apply(encrypt, &mut out[..body]);
                }
                if len % AES_BLOCK_SIZE != 0 {
                    // Last ciphertext block, whichever side of the cipher it
                    // sits on.
                    let prev = match (full, encrypt) {
                        (0, _) if mode == AesMode::Cbc => *iv,
                        (0, _) => [0; AES_BLOCK_SIZE],
                        (_, true) => to_block(&out[body - AES_BLOCK_SIZE..body]),
                        (_, false) => to_block(&data[body - AES_BLOCK_SIZE..body]),
                    };
                    let ks = self.keystream_block(&prev);
                    let tail = &mut out[body..len];
                    tail.iter_mut().zip(ks.iter()).for_each(|(b, k)| *b ^= k);
                }
            }
            AesMode::Cfb => {
                let mut feedback = *iv;
                for chunk in out.chunks_exact_mut(AES_BLOCK_SIZE) {
                    let input = to_block(chunk);
                    let ks = self.keystream_block(&feedback);
                    chunk.iter_mut().zip(ks.iter()).for_each(|(b, k)| *b ^= k);
                    feedback = if encrypt { to_block(chunk) } else { input };
                }
            }
            AesMode::Ofb => {
                let mut ks = *iv;
                for chunk in out.chunks_mut(AES_BLOCK_SIZE) {
                    self.encrypt_block(&mut ks);
                    chunk.iter_mut().zip(ks.iter()).for_each(|(b, k)| *b ^= k);
                }
            }
            AesMode::Ctr => self.ctr_apply(iv, &mut out),
        }
        out[len..].fill(0);
        out
    }

    fn ecb_apply(&self, encrypt: bool, buf: &mut [u8]) {
        for chunk in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(chunk);
            match (&self.cipher, encrypt) {
                (Cipher::Aes128(c), true) => c.encrypt_block(block),
                (Cipher::Aes128(c), false) => c.decrypt_block(block),
                (Cipher::Aes192(c), true) => c.encrypt_block(block),
                (Cipher::Aes192(c), false) => c.decrypt_block(block),
                (Cipher::Aes256(c), true) => c.encrypt_block(block),
                (Cipher::Aes256(c), false) => c.decrypt_block(block),
            }
        }
    }

    fn cbc_apply(&self, encrypt: bool, iv: &Block, buf: &mut [u8]) {
        match &self.cipher {
            Cipher::Aes128(c) => cbc_blocks(c, encrypt, iv, buf),
            Cipher::Aes192(c) => cbc_blocks(c, encrypt, iv, buf),
            Cipher::Aes256(c) => cbc_blocks(c, encrypt, iv, buf),
        }
    }

    fn ctr_apply(&self, iv: &Block, buf: &mut [u8]) {
        let key = self.key.as_slice();
        let iv = GenericArray::from_slice(iv);
        match &self.cipher {
            Cipher::Aes128(_) => {
                let key = GenericArray::from_slice(key);
                ctr::Ctr128BE::<Aes128>::new(key, iv).apply_keystream(buf)
            }
            Cipher::Aes192(_) => {
                let key = GenericArray::from_slice(key);
                ctr::Ctr128BE::<Aes192>::new(key, iv).apply_keystream(buf)
            }
            Cipher::Aes256(_) => {
                let key = GenericArray::from_slice(key);
                ctr::Ctr128BE::<Aes256>::new(key, iv).apply_keystream(buf)
            }
        }
    }
}

fn to_block(chunk: &[u8]) -> Block {
    let mut block = [0; AES_BLOCK_SIZE];
    block.copy_from_slice(chunk);
    block
}

/// CBC over whole blocks of `buf`.
fn cbc_blocks<C>(cipher: &C, encrypt: bool, iv: &Block, buf: &mut [u8])
where
    C: BlockCipher + BlockEncryptMut + BlockDecryptMut + BlockSizeUser<BlockSize = U16> + Clone,
{
    let iv = GenericArray::from_slice(iv);
    if encrypt {
        let mut enc = cbc::Encryptor::<C>::inner_iv_init(cipher.clone(), iv);
        for chunk in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
            enc.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
    } else {
        let mut dec = cbc::Decryptor::<C>::inner_iv_init(cipher.clone(), iv);
        for chunk in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
            dec.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
    }
}
