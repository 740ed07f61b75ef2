/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the descriptor-based crypto engine driver.

--*/

pub mod algorithms;
mod chunker;
mod cipher;
mod command;
mod config;
mod descriptor;
mod dma;
mod engine;
mod hash;
mod registry;
pub mod sg;
mod wait;

pub use algorithms::{
    find_cipher, find_hash, CipherAlgorithmInfo, CipherMode, HashAlgorithm, HashAlgorithmInfo,
    CIPHER_ALGORITHMS, HASH_ALGORITHMS,
};
pub use chunker::{
    pad_len, padded_len, plan_segments, Segment, SegmentPlan, SegmentSource, AAD_SEGMENT_MAX,
    DATA_ALIGN, MSG_SEGMENT_MAX,
};
pub use cipher::{AeadRequest, CipherContext, SkcipherRequest};
pub use command::{CommandWord, HashTerminal, AAD_MAX};
pub use config::EngineConfig;
pub use descriptor::{DestinationDescriptor, DestinationKind, SourceDescriptor, SourcePhase};
pub use dma::{DmaAddr, DmaDirection, DmaMapper, TransferBuffer, ZeroPad};
pub use engine::{EngineInstance, EngineLock, EngineSession, OpPhase};
pub use hash::{HashContext, HashExport, HashRequest, SeqState, HASH_EXPORT_MAGIC};
pub use hwcrypto_error::{HwCryptoError, HwCryptoResult};
pub use registry::{EngineRegistry, TransformHandle};
pub use wait::{until_bounded, until_deadline, Clock, SystemClock};
