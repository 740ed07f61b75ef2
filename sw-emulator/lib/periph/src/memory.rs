/*++

Licensed under the Apache-2.0 license.

File Name:

    memory.rs

Abstract:

    File contains the emulated system memory the engine reaches by DMA.

--*/

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Bus address of the first region handed out.
const MEMORY_BASE: u32 = 0x8000_0000;

/// Region alignment; also the unmapped gap left after every region.
const REGION_ALIGN: u32 = 64;

#[derive(Default)]
struct MemoryInner {
    regions: BTreeMap<u32, Vec<u8>>,
    next: u32,
    /// Allocations to let through before the next one fails.
    fail_after: Option<u32>,
}

impl MemoryInner {
    /// Region holding `[addr, addr + len)`, with the offset of `addr` in it.
    fn region(&mut self, addr: u32, len: usize) -> Option<(&mut Vec<u8>, usize)> {
        let (&base, region) = self.regions.range_mut(..=addr).next_back()?;
        let offset = (addr - base) as usize;
        if offset.checked_add(len)? > region.len() {
            return None;
        }
        Some((region, offset))
    }
}

/// Device-visible memory shared between the engine and the DMA mapper.
///
/// Clones share the same memory. Accesses outside an allocated region fail,
/// which the engine reports as a DMA error.
#[derive(Clone, Default)]
pub struct SystemMemory {
    inner: Arc<Mutex<MemoryInner>>,
}

impl SystemMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a zeroed region of `len` bytes and returns its address.
    pub fn alloc(&self, len: usize) -> Option<u32> {
        let mut inner = self.lock();
        if let Some(remaining) = inner.fail_after.as_mut() {
            if *remaining == 0 {
                inner.fail_after = None;
                return None;
            }
            *remaining -= 1;
        }
        let addr = if inner.next == 0 { MEMORY_BASE } else { inner.next };
        let size = u32::try_from(len.max(1)).ok()?;
        let span = size.checked_next_multiple_of(REGION_ALIGN)?;
        inner.next = addr.checked_add(span)?.checked_add(REGION_ALIGN)?;
        inner.regions.insert(addr, vec![0; len]);
        Some(addr)
    }

    /// Releases the region starting at `addr`, returning its contents.
    pub fn free(&self, addr: u32) -> Option<Vec<u8>> {
        self.lock().regions.remove(&addr)
    }

    pub fn read(&self, addr: u32, len: usize) -> Option<Vec<u8>> {
        let mut inner = self.lock();
        let (region, offset) = inner.region(addr, len)?;
        Some(region[offset..offset + len].to_vec())
    }

    /// Returns false when `[addr, addr + data.len())` is not inside one
    /// allocated region.
    pub fn write(&self, addr: u32, data: &[u8]) -> bool {
        let mut inner = self.lock();
        match inner.region(addr, data.len()) {
            Some((region, offset)) => {
                region[offset..offset + data.len()].copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Makes an allocation fail after `successes` more succeed.
    pub fn fail_alloc_after(&self, successes: u32) {
        self.lock().fail_after = Some(successes);
    }

    /// Number of allocated regions.
    pub fn live_regions(&self) -> usize {
        self.lock().regions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_read_write_free() {
        let mem = SystemMemory::new();
        let a = mem.alloc(20).unwrap();
        let b = mem.alloc(1).unwrap();
        assert_eq!(a % REGION_ALIGN, 0);
        assert!(b >= a + 20 + REGION_ALIGN);
        assert_eq!(mem.read(a, 20), Some(vec![0; 20]));

        assert!(mem.write(a + 4, &[1, 2, 3]));
        assert_eq!(mem.read(a + 3, 5), Some(vec![0, 1, 2, 3, 0]));
        assert_eq!(mem.live_regions(), 2);

        assert_eq!(mem.free(a).unwrap()[4..7], [1, 2, 3]);
        assert_eq!(mem.live_regions(), 1);
        assert_eq!(mem.read(a, 1), None);
    }

    #[test]
    fn test_out_of_bounds() {
        let mem = SystemMemory::new();
        let a = mem.alloc(16).unwrap();
        assert_eq!(mem.read(a + 8, 9), None);
        assert!(!mem.write(a + 16, &[0]));
        assert!(!mem.write(a - 1, &[0]));
        assert_eq!(mem.read(a + 16, 0), Some(vec![]));
    }

    #[test]
    fn test_fail_alloc_after() {
        let mem = SystemMemory::new();
        mem.fail_alloc_after(1);
        assert!(mem.alloc(4).is_some());
        assert!(mem.alloc(4).is_none());
        assert!(mem.alloc(4).is_some());
        assert_eq!(mem.live_regions(), 2);
    }
}
