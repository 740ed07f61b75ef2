/*++

Licensed under the Apache-2.0 license.

File Name:

    hash.rs

Abstract:

    File contains a resumable Merkle-Damgard hash core with injectable
    intermediate state, used by the emulated engine for MD5, SHA-1 and the
    SHA-2 family.

--*/

use sha2::digest::consts::{U128, U64};
use sha2::digest::generic_array::GenericArray;

use crate::md5::{md5_compress, MD5_IV};
use crate::sha1::{sha1_compress, SHA1_IV};

const SHA224_IV: [u32; 8] = [
    0xc1059ed8, 0x367cd507, 0x3070dd17, 0xf70e5939, 0xffc00b31, 0x68581511, 0x64f98fa7, 0xbefa4fa4,
];

const SHA256_IV: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

const SHA384_IV: [u64; 8] = [
    0xcbbb9d5dc1059ed8,
    0x629a292a367cd507,
    0x9159015a3070dd17,
    0x152fecd8f70e5939,
    0x67332667ffc00b31,
    0x8eb44a8768581511,
    0xdb0c2e0d64f98fa7,
    0x47b5481dbefa4fa4,
];

const SHA512_IV: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashMode {
    pub fn block_size(self) -> usize {
        match self {
            HashMode::Sha384 | HashMode::Sha512 => 128,
            _ => 64,
        }
    }

    /// Real digest length of the algorithm.
    pub fn digest_size(self) -> usize {
        match self {
            HashMode::Md5 => 16,
            HashMode::Sha1 => 20,
            HashMode::Sha224 => 28,
            HashMode::Sha256 => 32,
            HashMode::Sha384 => 48,
            HashMode::Sha512 => 64,
        }
    }

    /// Length of the full chaining state, which is what the engine writes
    /// out and accepts back.
    pub fn state_size(self) -> usize {
        match self {
            HashMode::Sha224 => 32,
            HashMode::Sha384 => 64,
            other => other.digest_size(),
        }
    }

    fn length_field_size(self) -> usize {
        match self {
            HashMode::Sha384 | HashMode::Sha512 => 16,
            _ => 8,
        }
    }
}

#[derive(Clone)]
enum Chain {
    Md5([u32; 4]),
    Sha1([u32; 5]),
    Sha256([u32; 8]),
    Sha512([u64; 8]),
}

/// A hash computation that can be fed whole blocks, paused and resumed from
/// an exported chaining state.
#[derive(Clone)]
pub struct SeqHash {
    mode: HashMode,
    chain: Chain,
}

impl SeqHash {
    pub fn new(mode: HashMode) -> Self {
        let chain = match mode {
            HashMode::Md5 => Chain::Md5(MD5_IV),
            HashMode::Sha1 => Chain::Sha1(SHA1_IV),
            HashMode::Sha224 => Chain::Sha256(SHA224_IV),
            HashMode::Sha256 => Chain::Sha256(SHA256_IV),
            HashMode::Sha384 => Chain::Sha512(SHA384_IV),
            HashMode::Sha512 => Chain::Sha512(SHA512_IV),
        };
        Self { mode, chain }
    }

    /// Resumes from a chaining state stored as little-endian words.
    ///
    /// Returns None when `state` is not exactly [`HashMode::state_size`]
    /// bytes long.
    pub fn from_state(mode: HashMode, state: &[u8]) -> Option<Self> {
        if state.len() != mode.state_size() {
            return None;
        }
        let mut hash = Self::new(mode);
        match &mut hash.chain {
            Chain::Md5(words) => load_le32(words, state),
            Chain::Sha1(words) => load_le32(words, state),
            Chain::Sha256(words) => load_le32(words, state),
            Chain::Sha512(words) => {
                for (word, chunk) in words.iter_mut().zip(state.chunks_exact(8)) {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(chunk);
                    *word = u64::from_le_bytes(bytes);
                }
            }
        }
        Some(hash)
    }

    pub fn mode(&self) -> HashMode {
        self.mode
    }

    /// Folds whole blocks into the chaining state. Trailing bytes short of
    /// a block are ignored.
    pub fn compress(&mut self, data: &[u8]) {
        let block_size = self.mode.block_size();
        for block in data.chunks_exact(block_size) {
            match &mut self.chain {
                Chain::Md5(state) => {
                    let mut buf = [0u8; 64];
                    buf.copy_from_slice(block);
                    md5_compress(state, &buf);
                }
                Chain::Sha1(state) => {
                    let mut buf = [0u8; 64];
                    buf.copy_from_slice(block);
                    sha1_compress(state, &buf);
                }
                Chain::Sha256(state) => {
                    let block: GenericArray<u8, U64> = GenericArray::clone_from_slice(block);
                    sha2::compress256(state, &[block]);
                }
                Chain::Sha512(state) => {
                    let block: GenericArray<u8, U128> = GenericArray::clone_from_slice(block);
                    sha2::compress512(state, &[block]);
                }
            }
        }
    }

    /// Hashes `tail`, appends the padding for a message of `total_bits`
    /// bits and returns the chaining state in digest byte order.
    pub fn finish(mut self, tail: &[u8], total_bits: u128) -> Vec<u8> {
        let block_size = self.mode.block_size();
        let whole = tail.len() - tail.len() % block_size;
        self.compress(&tail[..whole]);

        let mut last = tail[whole..].to_vec();
        last.push(0x80);
        let len_size = self.mode.length_field_size();
        while last.len() % block_size != block_size - len_size {
            last.push(0);
        }
        match self.mode {
            HashMode::Md5 => last.extend_from_slice(&(total_bits as u64).to_le_bytes()),
            HashMode::Sha384 | HashMode::Sha512 => {
                last.extend_from_slice(&total_bits.to_be_bytes())
            }
            _ => last.extend_from_slice(&(total_bits as u64).to_be_bytes()),
        }
        self.compress(&last);
        self.digest_bytes()
    }

    /// Chaining state in digest byte order, untruncated.
    pub fn digest_bytes(&self) -> Vec<u8> {
        match &self.chain {
            Chain::Md5(words) => words.iter().flat_map(|w| w.to_le_bytes()).collect(),
            Chain::Sha1(words) => words.iter().flat_map(|w| w.to_be_bytes()).collect(),
            Chain::Sha256(words) => words.iter().flat_map(|w| w.to_be_bytes()).collect(),
            Chain::Sha512(words) => words.iter().flat_map(|w| w.to_be_bytes()).collect(),
        }
    }
}

fn load_le32(words: &mut [u32], bytes: &[u8]) {
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Digest;

    const MODES: [HashMode; 6] = [
        HashMode::Md5,
        HashMode::Sha1,
        HashMode::Sha224,
        HashMode::Sha256,
        HashMode::Sha384,
        HashMode::Sha512,
    ];

    fn reference(mode: HashMode, data: &[u8]) -> Vec<u8> {
        match mode {
            HashMode::Md5 => ::md5::Md5::digest(data).to_vec(),
            HashMode::Sha1 => ::sha1::Sha1::digest(data).to_vec(),
            HashMode::Sha224 => sha2::Sha224::digest(data).to_vec(),
            HashMode::Sha256 => sha2::Sha256::digest(data).to_vec(),
            HashMode::Sha384 => sha2::Sha384::digest(data).to_vec(),
            HashMode::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }

    fn one_shot(mode: HashMode, data: &[u8]) -> Vec<u8> {
        let mut digest = SeqHash::new(mode).finish(data, data.len() as u128 * 8);
        digest.truncate(mode.digest_size());
        digest
    }

    #[test]
    fn test_abc() {
        assert_eq!(
            hex::encode(one_shot(HashMode::Md5, b"abc")),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            hex::encode(one_shot(HashMode::Sha256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_matches_reference_across_lengths() {
        let data: Vec<u8> = (0..300u32).map(|i| (i * 7 + 3) as u8).collect();
        for mode in MODES {
            for len in [0, 1, 55, 56, 63, 64, 111, 112, 127, 128, 129, 300] {
                assert_eq!(
                    one_shot(mode, &data[..len]),
                    reference(mode, &data[..len]),
                    "{mode:?} len {len}"
                );
            }
        }
    }

    #[test]
    fn test_resume_from_exported_state() {
        let data: Vec<u8> = (0..=255u8).cycle().take(640).collect();
        for mode in MODES {
            let block = mode.block_size();
            let mut first = SeqHash::new(mode);
            first.compress(&data[..2 * block]);

            // Digest byte order back to little-endian words.
            let mut state = first.digest_bytes();
            if mode != HashMode::Md5 {
                let word = if block == 128 { 8 } else { 4 };
                for chunk in state.chunks_exact_mut(word) {
                    chunk.reverse();
                }
            }

            let resumed = SeqHash::from_state(mode, &state).unwrap();
            let mut digest = resumed.finish(&data[2 * block..], data.len() as u128 * 8);
            digest.truncate(mode.digest_size());
            assert_eq!(digest, reference(mode, &data), "{mode:?}");
        }
    }

    #[test]
    fn test_from_state_rejects_bad_length() {
        assert!(SeqHash::from_state(HashMode::Sha224, &[0; 28]).is_none());
        assert!(SeqHash::from_state(HashMode::Sha224, &[0; 32]).is_some());
    }
}
