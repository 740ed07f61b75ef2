/*++

Licensed under the Apache-2.0 license.

File Name:

    dma.rs

Abstract:

    File contains the DMA mapping interface and the device-visible transfer
    buffers used by a single engine operation.

--*/

use std::sync::Arc;

use hwcrypto_error::{HwCryptoError, HwCryptoResult};
use zeroize::Zeroize;

use crate::chunker::DATA_ALIGN;

/// Bus address of a mapped buffer as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DmaAddr(pub u32);

impl DmaAddr {
    /// Address `offset` bytes past `self`.
    pub fn offset(self, offset: usize) -> HwCryptoResult<DmaAddr> {
        u32::try_from(offset)
            .ok()
            .and_then(|offset| self.0.checked_add(offset))
            .map(DmaAddr)
            .ok_or(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)
    }
}

impl From<DmaAddr> for u32 {
    fn from(addr: DmaAddr) -> u32 {
        addr.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    /// The engine reads the buffer.
    ToDevice,

    /// The engine writes the buffer.
    FromDevice,

    Bidirectional,
}

/// Platform DMA map/unmap service.
pub trait DmaMapper: Send + Sync {
    /// Makes `buf` visible to the engine. For [`DmaDirection::ToDevice`] and
    /// [`DmaDirection::Bidirectional`] the contents are transferred.
    fn map(&self, buf: &[u8], dir: DmaDirection) -> HwCryptoResult<DmaAddr>;

    /// Releases a mapping. For [`DmaDirection::FromDevice`] and
    /// [`DmaDirection::Bidirectional`] the device-written contents are copied
    /// back into `buf`.
    fn unmap(&self, addr: DmaAddr, buf: &mut [u8], dir: DmaDirection);
}

/// A host buffer mapped for one engine operation.
///
/// The mapping is released when the buffer is dropped, whatever path the
/// operation leaves by. Contents are zeroized after unmap because the
/// command scratch carries key material.
pub struct TransferBuffer<'a> {
    mapper: &'a dyn DmaMapper,
    buf: Vec<u8>,
    addr: DmaAddr,
    dir: DmaDirection,
}

impl<'a> TransferBuffer<'a> {
    pub fn map(
        mapper: &'a dyn DmaMapper,
        buf: Vec<u8>,
        dir: DmaDirection,
    ) -> HwCryptoResult<Self> {
        let addr = mapper.map(&buf, dir)?;
        Ok(Self {
            mapper,
            buf,
            addr,
            dir,
        })
    }

    /// Allocates and maps a zero-filled buffer the engine will write to.
    pub fn zeroed(mapper: &'a dyn DmaMapper, len: usize) -> HwCryptoResult<Self> {
        Self::map(mapper, vec![0; len], DmaDirection::FromDevice)
    }

    pub fn addr(&self) -> DmaAddr {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Unmaps the buffer and hands back what the engine wrote.
    pub fn into_inner(mut self) -> Vec<u8> {
        self.mapper.unmap(self.addr, &mut self.buf, self.dir);
        let buf = core::mem::take(&mut self.buf);
        core::mem::forget(self);
        buf
    }
}

impl Drop for TransferBuffer<'_> {
    fn drop(&mut self) {
        self.mapper.unmap(self.addr, &mut self.buf, self.dir);
        self.buf.zeroize();
    }
}

/// The shared, read-only buffer of zeros that padding segments point at.
pub struct ZeroPad {
    mapper: Arc<dyn DmaMapper>,
    buf: [u8; DATA_ALIGN],
    addr: DmaAddr,
}

impl ZeroPad {
    pub fn new(mapper: Arc<dyn DmaMapper>) -> HwCryptoResult<Self> {
        let buf = [0u8; DATA_ALIGN];
        let addr = mapper.map(&buf, DmaDirection::ToDevice)?;
        Ok(Self { mapper, buf, addr })
    }

    pub fn addr(&self) -> DmaAddr {
        self.addr
    }
}

impl Drop for ZeroPad {
    fn drop(&mut self) {
        self.mapper
            .unmap(self.addr, &mut self.buf, DmaDirection::ToDevice);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeMapper;
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(DmaAddr(0x100).offset(0x10), Ok(DmaAddr(0x110)));
        assert_eq!(
            DmaAddr(u32::MAX).offset(1),
            Err(HwCryptoError::DRIVER_DESCRIPTOR_FIELD_OVERFLOW)
        );
    }

    #[test]
    fn test_transfer_buffer_unmaps_on_drop() {
        let mapper = FakeMapper::default();
        {
            let buf =
                TransferBuffer::map(&mapper, vec![1, 2, 3], DmaDirection::ToDevice).unwrap();
            assert_eq!(buf.len(), 3);
            assert_eq!(mapper.live.lock().unwrap().len(), 1);
        }
        assert!(mapper.live.lock().unwrap().is_empty());
    }

    #[test]
    fn test_into_inner_copies_back() {
        let mapper = FakeMapper::default();
        let buf = TransferBuffer::zeroed(&mapper, 4).unwrap();
        mapper
            .live
            .lock()
            .unwrap()
            .insert(buf.addr().0, vec![9, 8, 7, 6]);
        assert_eq!(buf.into_inner(), vec![9, 8, 7, 6]);
        assert!(mapper.live.lock().unwrap().is_empty());
    }

    #[test]
    fn test_map_failure() {
        let mapper = FakeMapper::default();
        *mapper.fail.lock().unwrap() = true;
        assert_eq!(
            TransferBuffer::zeroed(&mapper, 16).err(),
            Some(HwCryptoError::DRIVER_DMA_BUFFER_ALLOCATION_FAILED)
        );
    }
}
