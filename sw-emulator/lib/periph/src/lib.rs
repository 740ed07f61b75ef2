/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the crypto engine emulator peripheral library.

--*/

mod crypto_engine;
mod memory;

pub use crypto_engine::{CryptoEngine, EngineControl, FIFO_DEPTH};
pub use memory::SystemMemory;
