/*++

Licensed under the Apache-2.0 license.

File Name:

    gcm.rs

Abstract:

    File contains the AES-GCM datapath for 128, 192 and 256-bit keys.

--*/

use aes::Aes192;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};

pub const GCM_NONCE_SIZE: usize = 12;
pub const GCM_TAG_SIZE: usize = 16;

/// Counter block tail of a J0 derived from a 96-bit nonce.
const J0_TAIL: [u8; 4] = [0, 0, 0, 1];

type Aes192Gcm = AesGcm<Aes192, U12>;

enum Gcm {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl Gcm {
    fn new(key: &[u8]) -> Option<Self> {
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).ok().map(Gcm::Aes128),
            24 => Aes192Gcm::new_from_slice(key).ok().map(Gcm::Aes192),
            32 => Aes256Gcm::new_from_slice(key).ok().map(Gcm::Aes256),
            _ => None,
        }
    }

    /// Encrypts `buf` in place and returns the tag over the result.
    fn seal(
        &self,
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buf: &mut [u8],
    ) -> Option<[u8; GCM_TAG_SIZE]> {
        let nonce = Nonce::from_slice(nonce);
        let tag = match self {
            Gcm::Aes128(c) => c.encrypt_in_place_detached(nonce, aad, buf),
            Gcm::Aes192(c) => c.encrypt_in_place_detached(nonce, aad, buf),
            Gcm::Aes256(c) => c.encrypt_in_place_detached(nonce, aad, buf),
        }
        .ok()?;
        Some(tag.into())
    }
}

/// Runs GCM over `data` with the pre-counter block `j0`.
///
/// On encrypt `data` is plaintext; on decrypt it is ciphertext. Either way
/// the output is the opposite text plus the tag computed over the
/// ciphertext. Tag verification is the caller's job.
///
/// Returns None for an unsupported key size or a J0 not derived from a
/// 96-bit nonce.
pub fn gcm_process(
    key: &[u8],
    j0: &[u8; 16],
    encrypt: bool,
    aad: &[u8],
    data: &[u8],
) -> Option<(Vec<u8>, [u8; GCM_TAG_SIZE])> {
    if j0[GCM_NONCE_SIZE..] != J0_TAIL {
        return None;
    }
    let gcm = Gcm::new(key)?;
    let mut nonce = [0u8; GCM_NONCE_SIZE];
    nonce.copy_from_slice(&j0[..GCM_NONCE_SIZE]);

    let mut out = data.to_vec();
    let tag = gcm.seal(&nonce, aad, &mut out)?;
    if encrypt {
        return Some((out, tag));
    }
    // CTR keystream is symmetric: `out` now holds the plaintext. Sealing it
    // again reproduces the ciphertext and the tag over it.
    let mut ciphertext = out.clone();
    let tag = gcm.seal(&nonce, aad, &mut ciphertext)?;
    Some((out, tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn j0(nonce: &[u8]) -> [u8; 16] {
        let mut j0 = [0u8; 16];
        j0[..12].copy_from_slice(nonce);
        j0[12..].copy_from_slice(&J0_TAIL);
        j0
    }

    #[test]
    fn test_gcm_known_answer() {
        // GCM test case 2 (McGrew and Viega): zero key, zero nonce, one
        // zero block.
        let (ct, tag) = gcm_process(&[0; 16], &j0(&[0; 12]), true, &[], &[0; 16]).unwrap();
        assert_eq!(hex::encode(ct), "0388dace60b6a392f328c2b971b2fe78");
        assert_eq!(hex::encode(tag), "ab6e47d42cec13bdf53a67b21257bddf");
    }

    #[test]
    fn test_decrypt_reproduces_tag() {
        for key_len in [16, 24, 32] {
            let key = vec![0x11; key_len];
            let aad = b"header";
            let (ct, tag) = gcm_process(&key, &j0(&[3; 12]), true, aad, b"attack at dawn").unwrap();
            let (pt, tag2) = gcm_process(&key, &j0(&[3; 12]), false, aad, &ct).unwrap();
            assert_eq!(pt, b"attack at dawn");
            assert_eq!(tag, tag2);
        }
    }

    #[test]
    fn test_rejects_non_nonce_j0() {
        let mut bad = j0(&[0; 12]);
        bad[15] = 2;
        assert!(gcm_process(&[0; 16], &bad, true, &[], &[0; 16]).is_none());
    }
}
