/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error type shared by the crypto engine driver crates.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Crypto engine error type.
///
/// The upper 16 bits identify the component raising the error, the lower 16
/// bits the condition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HwCryptoError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: HwCryptoError = HwCryptoError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl HwCryptoError {
    /// Create an error; intended to only be used from const contexts, as we
    /// don't want runtime panics if val is zero. The preferred way to get a
    /// HwCryptoError from a u32 is `HwCryptoError::try_from()`.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("HwCryptoError cannot be 0"),
        }
    }

    define_error_constants![
        (
            DRIVER_CIPHER_INVALID_KEY_LENGTH,
            0x0001_0001,
            "Cipher Error: key length is not 128, 192 or 256 bits"
        ),
        (
            DRIVER_CIPHER_INVALID_AAD_LENGTH,
            0x0001_0002,
            "Cipher Error: associated data exceeds 1008 bytes"
        ),
        (
            DRIVER_CIPHER_EMPTY_MESSAGE,
            0x0001_0003,
            "Cipher Error: zero-length message"
        ),
        (
            DRIVER_CIPHER_INVALID_IV_LENGTH,
            0x0001_0004,
            "Cipher Error: IV length does not match the cipher mode"
        ),
        (
            DRIVER_CIPHER_INVALID_AUTH_SIZE,
            0x0001_0005,
            "Cipher Error: authentication tag size is not 16 bytes"
        ),
        (
            DRIVER_CIPHER_KEY_NOT_SET,
            0x0001_0006,
            "Cipher Error: operation requested before a key was set"
        ),
        (
            DRIVER_CIPHER_BUFFER_TOO_SMALL,
            0x0001_0007,
            "Cipher Error: scatter list shorter than the request"
        ),
        (
            DRIVER_CIPHER_AUTH_TAG_MISMATCH,
            0x0001_0008,
            "Cipher Error: authentication tag mismatch"
        ),
        (
            DRIVER_CIPHER_INVALID_MODE,
            0x0001_0009,
            "Cipher Error: request kind does not match the cipher mode"
        ),
        (
            DRIVER_HASH_ABORTED,
            0x0002_0001,
            "Hash Error: streaming computation aborted by an earlier failure"
        ),
        (
            DRIVER_HASH_INVALID_STATE,
            0x0002_0002,
            "Hash Error: request is not in a state that accepts this call"
        ),
        (
            DRIVER_HASH_INVALID_EXPORT,
            0x0002_0003,
            "Hash Error: exported state is malformed or for another algorithm"
        ),
        (
            DRIVER_HASH_BUFFER_TOO_SMALL,
            0x0002_0004,
            "Hash Error: result buffer shorter than the digest"
        ),
        (
            DRIVER_HASH_KEY_NOT_SET,
            0x0002_0005,
            "Hash Error: HMAC operation requested before a key was set"
        ),
        (
            DRIVER_ENGINE_FIFO_SUBMISSION_TIMEOUT,
            0x0003_0001,
            "Engine Error: descriptor FIFO stayed full"
        ),
        (
            DRIVER_ENGINE_HARDWARE_TIMEOUT,
            0x0003_0002,
            "Engine Error: completion bit never set"
        ),
        (
            DRIVER_ENGINE_HARDWARE_FAULT,
            0x0003_0003,
            "Engine Error: error status set on completion"
        ),
        (
            DRIVER_ENGINE_RESET_REQUIRED,
            0x0003_0004,
            "Engine Error: engine faulted and must be reset before reuse"
        ),
        (
            DRIVER_DMA_BUFFER_ALLOCATION_FAILED,
            0x0004_0001,
            "DMA Error: device-visible buffer could not be mapped"
        ),
        (
            DRIVER_REGISTRY_ENGINE_UNAVAILABLE,
            0x0005_0001,
            "Registry Error: no engine instance registered"
        ),
        (
            DRIVER_REGISTRY_REENTRANT_ACQUIRE,
            0x0005_0002,
            "Registry Error: engine already held by the calling thread"
        ),
        (
            DRIVER_DESCRIPTOR_FIELD_OVERFLOW,
            0x0006_0001,
            "Descriptor Error: field value does not fit its bit width"
        ),
    ];

    /// Returns true for the errors caused by the engine not answering in time.
    pub fn is_timeout(&self) -> bool {
        *self == Self::DRIVER_ENGINE_HARDWARE_TIMEOUT
            || *self == Self::DRIVER_ENGINE_FIFO_SUBMISSION_TIMEOUT
    }

    /// Returns true for the errors after which the engine must be reset.
    pub fn requires_reset(&self) -> bool {
        self.is_timeout() || *self == Self::DRIVER_ENGINE_HARDWARE_FAULT
    }
}

impl From<core::num::NonZeroU32> for crate::HwCryptoError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::HwCryptoError(val)
    }
}

impl From<HwCryptoError> for core::num::NonZeroU32 {
    fn from(val: HwCryptoError) -> Self {
        val.0
    }
}

impl From<HwCryptoError> for u32 {
    fn from(val: HwCryptoError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for HwCryptoError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(HwCryptoError(val)),
            Err(err) => Err(err),
        }
    }
}

impl core::fmt::Display for HwCryptoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "crypto engine error {:#010x}", self.0.get())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HwCryptoError {}

pub type HwCryptoResult<T> = Result<T, HwCryptoError>;
