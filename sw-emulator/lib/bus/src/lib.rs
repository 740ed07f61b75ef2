/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the crypto engine emulator bus library.

--*/
mod bus;
pub mod testing;

pub use crate::bus::{Bus, BusError, RvAddr, RvData, RvSize};
