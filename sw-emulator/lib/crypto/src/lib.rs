/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the crypto engine emulator's cipher and hash
    datapaths.

--*/

mod block_modes;
mod gcm;
mod hash;
mod md5;
mod sha1;

pub use block_modes::{AesKey, AesMode, AES_BLOCK_SIZE};
pub use gcm::{gcm_process, GCM_NONCE_SIZE, GCM_TAG_SIZE};
pub use hash::{HashMode, SeqHash};
