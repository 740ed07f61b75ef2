/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains definition of the Bus trait.

--*/

/// Bus data width
pub type RvData = u32;

/// Bus address width
pub type RvAddr = u32;

/// Size of a bus access
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum RvSize {
    Byte = 1,
    HalfWord = 2,
    Word = 4,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusError {
    /// Load address misaligned
    LoadAddrMisaligned,

    /// Load access fault
    LoadAccessFault,

    /// Store address misaligned
    StoreAddrMisaligned,

    /// Store access fault
    StoreAccessFault,
}

/// Represents an abstract register bus.
///
/// Reads take `&mut self` because reading a status register may advance the
/// device (FIFO draining, completion countdown).
pub trait Bus {
    /// Read data of specified size from given address
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError>;

    /// Write data of specified size to given address
    ///
    /// # Error
    ///
    /// * `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError>;
}
