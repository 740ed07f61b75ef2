/*++

Licensed under the Apache-2.0 license.

File Name:

    algorithms.rs

Abstract:

    File contains the supported cipher modes and hash algorithms, and the
    algorithm table handed to the registration layer.

--*/

use hwcrypto_registers::enums::{CipherModeSel, HashModeSel};

use crate::hash::HashExport;

pub const AES_BLOCK_SIZE: usize = 16;

/// Nonce length of a GCM request; the counter tail is appended by the driver.
pub const GCM_IV_SIZE: usize = 12;

pub const GCM_TAG_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    Ecb,
    Cbc,
    Cfb,
    Ofb,
    Ctr,
    Gcm,
}

impl CipherMode {
    pub(crate) fn sel(self) -> CipherModeSel {
        match self {
            CipherMode::Ecb => CipherModeSel::Ecb,
            CipherMode::Cbc => CipherModeSel::Cbc,
            CipherMode::Cfb => CipherModeSel::Cfb,
            CipherMode::Ofb => CipherModeSel::Ofb,
            CipherMode::Ctr => CipherModeSel::Ctr,
            CipherMode::Gcm => CipherModeSel::Gcm,
        }
    }

    /// IV length the caller supplies for this mode.
    pub fn iv_size(self) -> usize {
        match self {
            CipherMode::Ecb => 0,
            CipherMode::Gcm => GCM_IV_SIZE,
            _ => AES_BLOCK_SIZE,
        }
    }

    pub fn is_aead(self) -> bool {
        self == CipherMode::Gcm
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

const MD5_IV: [u32; 4] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476];

const SHA1_IV: [u32; 5] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476, 0xc3d2e1f0];

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

/// Size of the largest intermediate state the engine exchanges.
pub const HASH_STATE_MAX: usize = 64;

/// Largest hash block size.
pub const HASH_BLOCK_MAX: usize = 128;

impl HashAlgorithm {
    pub(crate) fn sel(self) -> HashModeSel {
        match self {
            HashAlgorithm::Md5 => HashModeSel::Md5,
            HashAlgorithm::Sha1 => HashModeSel::Sha1,
            HashAlgorithm::Sha224 => HashModeSel::Sha224,
            HashAlgorithm::Sha256 => HashModeSel::Sha256,
            HashAlgorithm::Sha384 => HashModeSel::Sha384,
            HashAlgorithm::Sha512 => HashModeSel::Sha512,
        }
    }

    pub(crate) fn from_sel(sel: HashModeSel) -> Self {
        match sel {
            HashModeSel::Md5 => HashAlgorithm::Md5,
            HashModeSel::Sha1 => HashAlgorithm::Sha1,
            HashModeSel::Sha224 => HashAlgorithm::Sha224,
            HashModeSel::Sha256 => HashAlgorithm::Sha256,
            HashModeSel::Sha384 => HashAlgorithm::Sha384,
            HashModeSel::Sha512 => HashAlgorithm::Sha512,
        }
    }

    pub fn block_size(self) -> usize {
        match self {
            HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => 128,
            _ => 64,
        }
    }

    /// Digest size returned to the caller.
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Digest size the engine writes, which is also the size of the
    /// intermediate state. SHA224 and SHA384 are transferred untruncated.
    pub fn hw_digest_size(self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 32,
            HashAlgorithm::Sha384 => 64,
            other => other.digest_size(),
        }
    }

    /// Width of one state word in bytes.
    pub fn word_size(self) -> usize {
        match self {
            HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => 8,
            _ => 4,
        }
    }

    /// Initial hash value in register-native (little-endian word) order.
    pub fn initial_state(self) -> [u8; HASH_STATE_MAX] {
        let mut state = [0u8; HASH_STATE_MAX];
        match self {
            HashAlgorithm::Md5 => words_le(&MD5_IV, &mut state),
            HashAlgorithm::Sha1 => words_le(&SHA1_IV, &mut state),
            HashAlgorithm::Sha224 => words_le(&SHA224_IV, &mut state),
            HashAlgorithm::Sha256 => words_le(&SHA256_IV, &mut state),
            HashAlgorithm::Sha384 => dwords_le(&SHA384_IV, &mut state),
            HashAlgorithm::Sha512 => dwords_le(&SHA512_IV, &mut state),
        }
        state
    }

    /// Converts a digest as written by the engine into the register-native
    /// state order the engine expects when the digest is injected back as
    /// an initial value. MD5 digests are already in that order.
    pub fn digest_to_state(self, digest: &mut [u8]) {
        if self == HashAlgorithm::Md5 {
            return;
        }
        for word in digest.chunks_exact_mut(self.word_size()) {
            word.reverse();
        }
    }
}

fn words_le(words: &[u32], out: &mut [u8]) {
    for (word, chunk) in words.iter().zip(out.chunks_exact_mut(4)) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

fn dwords_le(words: &[u64], out: &mut [u8]) {
    for (word, chunk) in words.iter().zip(out.chunks_exact_mut(8)) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Priority the registration layer assigns to every algorithm below.
pub const ALGORITHM_PRIORITY: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherAlgorithmInfo {
    pub name: &'static str,
    pub driver_name: &'static str,
    pub block_size: usize,
    pub min_key_size: usize,
    pub max_key_size: usize,
    pub iv_size: usize,
    /// Tag size for AEAD algorithms, zero otherwise.
    pub max_auth_size: usize,
    pub mode: CipherMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashAlgorithmInfo {
    pub name: &'static str,
    pub driver_name: &'static str,
    pub algorithm: HashAlgorithm,
    pub hmac: bool,
    pub digest_size: usize,
    pub block_size: usize,
    /// Size of the image produced by export.
    pub state_size: usize,
}

const fn aes(
    name: &'static str,
    driver_name: &'static str,
    block_size: usize,
    iv_size: usize,
    max_auth_size: usize,
    mode: CipherMode,
) -> CipherAlgorithmInfo {
    CipherAlgorithmInfo {
        name,
        driver_name,
        block_size,
        min_key_size: 16,
        max_key_size: 32,
        iv_size,
        max_auth_size,
        mode,
    }
}

pub const CIPHER_ALGORITHMS: &[CipherAlgorithmInfo] = &[
    aes("ecb(aes)", "hwcrypto-ecb-aes", AES_BLOCK_SIZE, 0, 0, CipherMode::Ecb),
    aes("cbc(aes)", "hwcrypto-cbc-aes", AES_BLOCK_SIZE, 16, 0, CipherMode::Cbc),
    aes("cfb(aes)", "hwcrypto-cfb-aes", 1, 16, 0, CipherMode::Cfb),
    aes("ofb(aes)", "hwcrypto-ofb-aes", 1, 16, 0, CipherMode::Ofb),
    aes("ctr(aes)", "hwcrypto-ctr-aes", 1, 16, 0, CipherMode::Ctr),
    aes("gcm(aes)", "hwcrypto-gcm-aes", 1, GCM_IV_SIZE, GCM_TAG_SIZE, CipherMode::Gcm),
];

const fn hash(
    name: &'static str,
    driver_name: &'static str,
    algorithm: HashAlgorithm,
    hmac: bool,
    digest_size: usize,
    block_size: usize,
) -> HashAlgorithmInfo {
    HashAlgorithmInfo {
        name,
        driver_name,
        algorithm,
        hmac,
        digest_size,
        block_size,
        state_size: core::mem::size_of::<HashExport>(),
    }
}

pub const HASH_ALGORITHMS: &[HashAlgorithmInfo] = &[
    hash("md5", "hwcrypto-md5", HashAlgorithm::Md5, false, 16, 64),
    hash("sha1", "hwcrypto-sha1", HashAlgorithm::Sha1, false, 20, 64),
    hash("sha224", "hwcrypto-sha224", HashAlgorithm::Sha224, false, 28, 64),
    hash("sha256", "hwcrypto-sha256", HashAlgorithm::Sha256, false, 32, 64),
    hash("sha384", "hwcrypto-sha384", HashAlgorithm::Sha384, false, 48, 128),
    hash("sha512", "hwcrypto-sha512", HashAlgorithm::Sha512, false, 64, 128),
    hash("hmac(md5)", "hwcrypto-hmac-md5", HashAlgorithm::Md5, true, 16, 64),
    hash("hmac(sha1)", "hwcrypto-hmac-sha1", HashAlgorithm::Sha1, true, 20, 64),
    hash("hmac(sha224)", "hwcrypto-hmac-sha224", HashAlgorithm::Sha224, true, 28, 64),
    hash("hmac(sha256)", "hwcrypto-hmac-sha256", HashAlgorithm::Sha256, true, 32, 64),
    hash("hmac(sha384)", "hwcrypto-hmac-sha384", HashAlgorithm::Sha384, true, 48, 128),
    hash("hmac(sha512)", "hwcrypto-hmac-sha512", HashAlgorithm::Sha512, true, 64, 128),
];

pub fn find_cipher(name: &str) -> Option<&'static CipherAlgorithmInfo> {
    CIPHER_ALGORITHMS.iter().find(|info| info.name == name)
}

pub fn find_hash(name: &str) -> Option<&'static HashAlgorithmInfo> {
    HASH_ALGORITHMS.iter().find(|info| info.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_algorithms() {
        for info in HASH_ALGORITHMS {
            assert_eq!(info.digest_size, info.algorithm.digest_size(), "{}", info.name);
            assert_eq!(info.block_size, info.algorithm.block_size(), "{}", info.name);
        }
        for info in CIPHER_ALGORITHMS {
            assert_eq!(info.iv_size, info.mode.iv_size(), "{}", info.name);
        }
        assert_eq!(find_hash("hmac(sha384)").unwrap().algorithm, HashAlgorithm::Sha384);
        assert_eq!(find_cipher("gcm(aes)").unwrap().max_auth_size, 16);
        assert!(find_cipher("xts(aes)").is_none());
    }

    #[test]
    fn test_initial_state_is_little_endian() {
        let state = HashAlgorithm::Sha256.initial_state();
        assert_eq!(&state[..4], &[0x67, 0xe6, 0x09, 0x6a]);
        let state = HashAlgorithm::Sha512.initial_state();
        assert_eq!(&state[..8], &[0x08, 0xc9, 0xbc, 0xf3, 0x67, 0xe6, 0x09, 0x6a]);
        let state = HashAlgorithm::Md5.initial_state();
        assert_eq!(&state[..4], &[0x01, 0x23, 0x45, 0x67]);
    }

    #[test]
    fn test_digest_to_state() {
        let mut digest = [0x6a, 0x09, 0xe6, 0x67, 1, 2, 3, 4];
        HashAlgorithm::Sha256.digest_to_state(&mut digest);
        assert_eq!(digest, [0x67, 0xe6, 0x09, 0x6a, 4, 3, 2, 1]);

        let mut digest = [1, 2, 3, 4, 5, 6, 7, 8];
        HashAlgorithm::Sha512.digest_to_state(&mut digest);
        assert_eq!(digest, [8, 7, 6, 5, 4, 3, 2, 1]);

        let mut digest = [1, 2, 3, 4];
        HashAlgorithm::Md5.digest_to_state(&mut digest);
        assert_eq!(digest, [1, 2, 3, 4]);
    }
}
