/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Register map, command word and descriptor bit layouts of the descriptor
    based crypto engine.

--*/
#![cfg_attr(not(test), no_std)]

pub mod enums;
mod mmio;
pub mod regs;

pub use mmio::{Mmio, RealMmio, RegisterBlock};

/// Byte offsets of the engine registers.
pub mod offsets {
    pub const SRC_STATUS: u32 = 0x0000;
    pub const SRC_DESC0: u32 = 0x0004;
    pub const SRC_DESC1: u32 = 0x0008;
    pub const CTRL_STATUS: u32 = 0x0010;
    pub const DEBUG_ARB: u32 = 0x0018;
    pub const ERR_STATUS: u32 = 0x001C;
    pub const SWAP_CFG: u32 = 0x0030;
    pub const OTP_KEY_CTRL: u32 = 0x0034;
    pub const DST_STATUS: u32 = 0x1000;
    pub const DST_DESC0: u32 = 0x1004;
    pub const DST_DESC1: u32 = 0x1008;

    /// Size of the register window.
    pub const WINDOW_SIZE: u32 = 0x2000;
}

/// Size of the command word in bytes.
pub const CL_SIZE_BYTES: usize = 32;

/// Size of the command word in 32-bit words.
pub const CL_SIZE_WORDS: usize = CL_SIZE_BYTES / 4;

/// Largest message length a single source descriptor can carry.
pub const SRC_MSG_LEN_MAX: u32 = (1 << 14) - 1;

/// Largest AAD byte count a single source descriptor can carry.
pub const SRC_A2EO_MAX: u32 = (1 << 5) - 1;

/// Largest key (or HMAC pad array) length in a command descriptor.
pub const SRC_KEY_LEN_MAX: u32 = (1 << 9) - 1;

/// Largest IV (or hash state) length in a command descriptor.
pub const SRC_IV_LEN_MAX: u32 = (1 << 7) - 1;

/// Largest cipher output length a destination descriptor can carry.
pub const DST_CIPHER_LEN_MAX: u32 = (1 << 24) - 1;

/// Largest digest/tag length a destination descriptor can carry.
pub const DST_AUTH_LEN_MAX: u32 = (1 << 8) - 1;

/// Largest AAD block count the command word can carry.
pub const CL_AAD_BLOCKS_MAX: u32 = (1 << 6) - 1;

/// Largest hash-pad block count the command word can carry.
pub const CL_HASH_PAD_BLOCKS_MAX: u32 = (1 << 6) - 1;

/// Largest message block count the command word can carry.
pub const CL_MSG_BLOCKS_MAX: u32 = (1 << 20) - 1;
