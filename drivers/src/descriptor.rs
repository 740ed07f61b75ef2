/*++

Licensed under the Apache-2.0 license.

File Name:

    descriptor.rs

Abstract:

    File contains the encoder and decoder of source and destination
    descriptors.

--*/

use hwcrypto_error::{HwCryptoError, HwCryptoResult};
use hwcrypto_registers::enums::CommandLength;
use hwcrypto_registers::regs::{DstDescCtrl, SrcDescCtrl};
use hwcrypto_registers::{
    DST_AUTH_LEN_MAX, DST_CIPHER_LEN_MAX, SRC_A2EO_MAX, SRC_IV_LEN_MAX, SRC_KEY_LEN_MAX,
    SRC_MSG_LEN_MAX,
};

use crate::dma::DmaAddr;

/// Bits of a command-phase source control word no field covers.
const SRC_CMD_RESERVED: u32 = !((1 << 21) - 1);

/// Bits of a data-phase source control word no field covers.
const SRC_DATA_RESERVED: u32 = ((1 << 18) - 1) & !((1 << 11) - 1);

const DST_CIPHER_RESERVED: u32 = 0xf0;

const DST_AUTH_RESERVED: u32 = 0xffff_00f0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    /// The command word, optionally followed by a key and an IV.
    Command {
        length: CommandLength,
        key_len: u16,
        iv_len: u8,
    },

    /// AAD and/or message bytes.
    Data {
        auto_pad: bool,
        aad_len: u8,
        msg_len: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub read_source: bool,
    pub first: bool,
    pub last: bool,
    pub phase: SourcePhase,
    pub addr: DmaAddr,
}

impl SourceDescriptor {
    /// The descriptor that opens every request.
    pub fn command(key_len: usize, iv_len: usize, addr: DmaAddr) -> HwCryptoResult<Self> {
        let length = match (key_len, iv_len) {
            (0, 0) => CommandLength::Cl,
            (_, 0) => CommandLength::ClKey,
            _ => CommandLength::ClKeyIv,
        };
        Ok(Self {
            read_source: true,
            first: true,
            last: false,
            phase: SourcePhase::Command {
                length,
                key_len: field(key_len, SRC_KEY_LEN_MAX)?,
                iv_len: field(iv_len, SRC_IV_LEN_MAX)?,
            },
            addr,
        })
    }

    pub fn aad(len: usize, addr: DmaAddr) -> HwCryptoResult<Self> {
        Ok(Self::data_phase(field(len, SRC_A2EO_MAX)?, 0, addr))
    }

    pub fn message(len: usize, addr: DmaAddr) -> HwCryptoResult<Self> {
        Ok(Self::data_phase(0, field(len, SRC_MSG_LEN_MAX)?, addr))
    }

    fn data_phase(aad_len: u8, msg_len: u16, addr: DmaAddr) -> Self {
        Self {
            read_source: true,
            first: false,
            last: false,
            phase: SourcePhase::Data {
                auto_pad: false,
                aad_len,
                msg_len,
            },
            addr,
        }
    }

    /// Packs the descriptor into its control and address words.
    pub fn encode(&self) -> HwCryptoResult<[u32; 2]> {
        let mut ctrl = SrcDescCtrl::default();
        ctrl.set_read_source(self.read_source);
        ctrl.set_first(self.first);
        ctrl.set_last(self.last);
        match self.phase {
            SourcePhase::Command {
                length,
                key_len,
                iv_len,
            } => {
                if length == CommandLength::Data {
                    return Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW);
                }
                ctrl.set_cmd_len_sel(length.into());
                ctrl.set_key_len(field(key_len.into(), SRC_KEY_LEN_MAX)?);
                ctrl.set_iv_len(field(iv_len.into(), SRC_IV_LEN_MAX)?);
            }
            SourcePhase::Data {
                auto_pad,
                aad_len,
                msg_len,
            } => {
                ctrl.set_cmd_len_sel(CommandLength::Data.into());
                ctrl.set_auto_pad(auto_pad);
                ctrl.set_a2eo(field(aad_len.into(), SRC_A2EO_MAX)?);
                ctrl.set_msg_len(field(msg_len.into(), SRC_MSG_LEN_MAX)?);
            }
        }
        Ok([ctrl.0, self.addr.0])
    }

    /// Unpacks a descriptor, rejecting words with reserved bits set.
    pub fn decode(words: [u32; 2]) -> HwCryptoResult<Self> {
        let ctrl = SrcDescCtrl(words[0]);
        let length = CommandLength::try_from(ctrl.cmd_len_sel())
            .map_err(|_| HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)?;
        let phase = if length == CommandLength::Data {
            if words[0] & SRC_DATA_RESERVED != 0 {
                return Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW);
            }
            SourcePhase::Data {
                auto_pad: ctrl.auto_pad(),
                aad_len: ctrl.a2eo(),
                msg_len: ctrl.msg_len(),
            }
        } else {
            if words[0] & SRC_CMD_RESERVED != 0 {
                return Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW);
            }
            SourcePhase::Command {
                length,
                key_len: ctrl.key_len(),
                iv_len: ctrl.iv_len(),
            }
        };
        Ok(Self {
            read_source: ctrl.read_source(),
            first: ctrl.first(),
            last: ctrl.last(),
            phase,
            addr: DmaAddr(words[1]),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    /// Cipher output of `len` bytes.
    Cipher { len: u32 },

    /// Digest or authentication tag of `len` bytes.
    Auth { len: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationDescriptor {
    pub write_source: bool,
    pub first: bool,
    pub last: bool,
    pub kind: DestinationKind,
    pub addr: DmaAddr,
}

impl DestinationDescriptor {
    pub fn cipher(len: usize, addr: DmaAddr) -> HwCryptoResult<Self> {
        Ok(Self {
            write_source: true,
            first: false,
            last: false,
            kind: DestinationKind::Cipher {
                len: field(len, DST_CIPHER_LEN_MAX)?,
            },
            addr,
        })
    }

    pub fn auth(len: usize, addr: DmaAddr) -> HwCryptoResult<Self> {
        Ok(Self {
            write_source: true,
            first: false,
            last: false,
            kind: DestinationKind::Auth {
                len: field(len, DST_AUTH_LEN_MAX)?,
            },
            addr,
        })
    }

    pub fn encode(&self) -> HwCryptoResult<[u32; 2]> {
        let mut ctrl = DstDescCtrl::default();
        ctrl.set_write_source(self.write_source);
        ctrl.set_first(self.first);
        ctrl.set_last(self.last);
        match self.kind {
            DestinationKind::Cipher { len } => {
                ctrl.set_cipher_len(field(len as usize, DST_CIPHER_LEN_MAX)?);
            }
            DestinationKind::Auth { len } => {
                ctrl.set_auth(true);
                ctrl.set_auth_len(len);
            }
        }
        Ok([ctrl.0, self.addr.0])
    }

    pub fn decode(words: [u32; 2]) -> HwCryptoResult<Self> {
        let ctrl = DstDescCtrl(words[0]);
        let (kind, reserved) = if ctrl.auth() {
            (
                DestinationKind::Auth {
                    len: ctrl.auth_len(),
                },
                DST_AUTH_RESERVED,
            )
        } else {
            (
                DestinationKind::Cipher {
                    len: ctrl.cipher_len(),
                },
                DST_CIPHER_RESERVED,
            )
        };
        if words[0] & reserved != 0 {
            return Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW);
        }
        Ok(Self {
            write_source: ctrl.write_source(),
            first: ctrl.first(),
            last: ctrl.last(),
            kind,
            addr: DmaAddr(words[1]),
        })
    }
}

/// Narrows `val` into a field whose largest value is `max`.
fn field<T: TryFrom<usize>>(val: usize, max: u32) -> HwCryptoResult<T> {
    if val > max as usize {
        return Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW);
    }
    T::try_from(val).map_err(|_| HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptor() {
        let desc = SourceDescriptor::command(32, 16, DmaAddr(0x8000)).unwrap();
        assert_eq!(
            desc.encode().unwrap(),
            [0b1 | 0b10 | (3 << 3) | (32 << 5) | (16 << 14), 0x8000]
        );
        let desc = SourceDescriptor::command(16, 0, DmaAddr(0)).unwrap();
        assert_eq!(
            desc.phase,
            SourcePhase::Command {
                length: CommandLength::ClKey,
                key_len: 16,
                iv_len: 0,
            }
        );
        let desc = SourceDescriptor::command(0, 0, DmaAddr(0)).unwrap();
        assert_eq!(desc.encode().unwrap()[0], 0b11 | (1 << 3));
    }

    #[test]
    fn test_data_descriptor() {
        let mut desc = SourceDescriptor::message(16368, DmaAddr(0x40)).unwrap();
        desc.last = true;
        if let SourcePhase::Data { auto_pad, .. } = &mut desc.phase {
            *auto_pad = true;
        }
        assert_eq!(
            desc.encode().unwrap(),
            [0b1 | 0b100 | (1 << 5) | (16368 << 18), 0x40]
        );
        let desc = SourceDescriptor::aad(16, DmaAddr(0x50)).unwrap();
        assert_eq!(desc.encode().unwrap(), [0b1 | (16 << 6), 0x50]);
    }

    #[test]
    fn test_field_overflow() {
        assert_eq!(
            SourceDescriptor::message(1 << 14, DmaAddr(0)),
            Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)
        );
        assert_eq!(
            SourceDescriptor::aad(32, DmaAddr(0)),
            Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)
        );
        assert_eq!(
            SourceDescriptor::command(512, 0, DmaAddr(0)),
            Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)
        );
        assert_eq!(
            DestinationDescriptor::auth(256, DmaAddr(0)),
            Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)
        );
        let desc = SourceDescriptor {
            read_source: true,
            first: false,
            last: false,
            phase: SourcePhase::Command {
                length: CommandLength::Cl,
                key_len: 0,
                iv_len: 200,
            },
            addr: DmaAddr(0),
        };
        assert_eq!(
            desc.encode(),
            Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)
        );
    }

    #[test]
    fn test_source_decode_matches_encode() {
        let mut descs = vec![
            SourceDescriptor::command(64, 64, DmaAddr(0x1234_5670)).unwrap(),
            SourceDescriptor::aad(7, DmaAddr(0x10)).unwrap(),
            SourceDescriptor::message(15, DmaAddr(0x20)).unwrap(),
        ];
        descs[2].last = true;
        for desc in descs {
            let words = desc.encode().unwrap();
            assert_eq!(SourceDescriptor::decode(words), Ok(desc));
        }
        // Data phase with bits 11..17 set.
        assert!(SourceDescriptor::decode([1 << 12, 0]).is_err());
        // Command phase with a bit above the IV length set.
        assert!(SourceDescriptor::decode([(1 << 3) | (1 << 25), 0]).is_err());
    }

    #[test]
    fn test_destination_codec() {
        let mut desc = DestinationDescriptor::cipher(0xab_cdef, DmaAddr(0x9000)).unwrap();
        desc.first = true;
        assert_eq!(desc.encode().unwrap(), [0xabcd_ef03, 0x9000]);
        assert_eq!(DestinationDescriptor::decode([0xabcd_ef03, 0x9000]), Ok(desc));

        let mut desc = DestinationDescriptor::auth(64, DmaAddr(0xa000)).unwrap();
        desc.last = true;
        assert_eq!(desc.encode().unwrap(), [0x0000_400d, 0xa000]);
        assert_eq!(DestinationDescriptor::decode([0x0000_400d, 0xa000]), Ok(desc));

        assert!(DestinationDescriptor::decode([0x0001_4009, 0]).is_err());
    }
}
