/*++

Licensed under the Apache-2.0 license.

File Name:

    regs.rs

Abstract:

    Bit layouts of the engine registers, the command word (CL) and the
    source/destination descriptor control words.

--*/

use bitfield::{bitfield, BitRange, BitRangeMut};

bitfield! {
    /// Source or destination FIFO status
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct FifoStatus(u32);

    pub u8, read_ptr, set_read_ptr: 7, 0;
    pub u8, write_ptr, set_write_ptr: 15, 8;

    /// Number of descriptor slots the engine can still accept
    pub u8, empty_slots, set_empty_slots: 23, 16;
}

bitfield! {
    /// Reset, trigger and interrupt status register
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct CtrlStatus(u32);

    pub soft_reset, set_soft_reset: 0;
    pub start, set_start: 1;
    pub int_en, set_int_en: 2;

    /// Sticky, write one to clear
    pub cmd_ok, set_cmd_ok: 4;

    /// Sticky, write one to clear
    pub err_int, set_err_int: 5;
    pub u8, err_int_count, set_err_int_count: 15, 8;
}

bitfield! {
    /// Debug, arbiter and clock-enable register
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DebugArb(u32);

    pub clk_en, set_clk_en: 0;
    pub arb_en, set_arb_en: 1;
    pub u8, debug_sel, set_debug_sel: 7, 4;
}

bitfield! {
    /// Data swap, endianness and burst configuration
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct SwapCfg(u32);

    pub data_swap, set_data_swap: 0;
    pub desc_swap, set_desc_swap: 1;
    pub u8, burst_len, set_burst_len: 7, 4;
}

bitfield! {
    /// OTP key control
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct OtpKeyCtrl(u32);

    pub use_otp_key, set_use_otp_key: 0;
}

bitflags::bitflags! {
    /// Sticky error status bits, write one to clear
    pub struct ErrStatus: u32 {
        const DESC_FORMAT = 1 << 0;
        const CMD_DECODE = 1 << 1;
        const DMA_READ = 1 << 2;
        const DMA_WRITE = 1 << 3;
        const LENGTH_MISMATCH = 1 << 4;
        const FIFO_OVERFLOW = 1 << 5;
        const INCOMPLETE_REQUEST = 1 << 6;
    }
}

bitfield! {
    /// Command word, word 0: operation selection
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct ClWord0(u32);

    pub u8, cipher_mode, set_cipher_mode: 3, 0;

    /// 0 = AES, 1 = DES
    pub engine_select, set_engine_select: 4;
    pub encrypt, set_encrypt: 5;
    pub u8, key_size, set_key_size: 7, 6;
    pub tdes_en, set_tdes_en: 8;
    pub tdes_keying, set_tdes_keying: 9;
    pub hmac_en, set_hmac_en: 10;
    pub u8, hash_mode, set_hash_mode: 13, 11;
    pub seq_first, set_seq_first: 14;
    pub seq_last, set_seq_last: 15;
    pub seq_no_writeback, set_seq_no_writeback: 16;
    pub u8, engine_mode, set_engine_mode: 18, 17;
    pub u8, icv_len, set_icv_len: 31, 24;
}

bitfield! {
    /// Command word, word 1: last partial sizes and swap control
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct ClWord1(u32);

    pub u8, aad_last, set_aad_last: 3, 0;
    pub u8, msg_last, set_msg_last: 7, 4;
    pub u8, hash_pad_last, set_hash_pad_last: 11, 8;
    pub key_byte_swap, set_key_byte_swap: 16;
    pub iv_byte_swap, set_iv_byte_swap: 17;
    pub data_in_byte_swap, set_data_in_byte_swap: 18;
    pub data_out_byte_swap, set_data_out_byte_swap: 19;
    pub digest_byte_swap, set_digest_byte_swap: 20;
    pub digest_word_swap, set_digest_word_swap: 21;
    pub state_byte_swap, set_state_byte_swap: 22;
    pub state_word_swap, set_state_word_swap: 23;
}

bitfield! {
    /// Command word, word 2: total lengths in 16-byte blocks
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct ClWord2(u32);

    pub u8, aad_blocks, set_aad_blocks: 5, 0;
    pub u8, hash_pad_blocks, set_hash_pad_blocks: 11, 6;
    pub u32, msg_blocks, set_msg_blocks: 31, 12;
}

bitfield! {
    /// Source descriptor control word.
    ///
    /// Bits 5 and up have two layouts: the command phase (cmd_len_sel != 0)
    /// carries key and IV lengths, the data phase carries auto-pad, the AAD
    /// byte count and the message length.
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct SrcDescCtrl(u32);

    pub read_source, set_read_source: 0;
    pub first, set_first: 1;
    pub last, set_last: 2;
    pub u8, cmd_len_sel, set_cmd_len_sel: 4, 3;

    pub u16, key_len, set_key_len: 13, 5;
    pub u8, iv_len, set_iv_len: 20, 14;

    pub auto_pad, set_auto_pad: 5;
    pub u8, a2eo, set_a2eo: 10, 6;
    pub u16, msg_len, set_msg_len: 31, 18;
}

bitfield! {
    /// Destination descriptor control word.
    ///
    /// Cipher output uses a 24-bit length, digest/tag output an 8-bit one.
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct DstDescCtrl(u32);

    pub write_source, set_write_source: 0;
    pub first, set_first: 1;
    pub last, set_last: 2;
    pub auth, set_auth: 3;
    pub u32, cipher_len, set_cipher_len: 31, 8;
    pub u8, auth_len, set_auth_len: 15, 8;
}
