// Licensed under the Apache-2.0 license

//! Copies between scatter lists and linear buffers.

/// Total length of a scatter list.
pub fn total_len(sg: &[&[u8]]) -> usize {
    sg.iter().map(|entry| entry.len()).sum()
}

/// Total length of a writable scatter list.
pub fn total_len_mut(sg: &[&mut [u8]]) -> usize {
    sg.iter().map(|entry| entry.len()).sum()
}

/// Copies `buf.len()` bytes starting `skip` bytes into `sg` into `buf`.
///
/// Returns the number of bytes copied, which is short only when the list
/// ends first.
pub fn copy_to_buffer(sg: &[&[u8]], mut skip: usize, buf: &mut [u8]) -> usize {
    let mut copied = 0;
    for entry in sg {
        if copied == buf.len() {
            break;
        }
        if skip >= entry.len() {
            skip -= entry.len();
            continue;
        }
        let src = &entry[skip..];
        skip = 0;
        let n = src.len().min(buf.len() - copied);
        buf[copied..copied + n].copy_from_slice(&src[..n]);
        copied += n;
    }
    copied
}

/// Copies `buf` into `sg` starting `skip` bytes into the list.
///
/// Returns the number of bytes copied, which is short only when the list
/// ends first.
pub fn copy_from_buffer(sg: &mut [&mut [u8]], mut skip: usize, buf: &[u8]) -> usize {
    let mut copied = 0;
    for entry in sg.iter_mut() {
        if copied == buf.len() {
            break;
        }
        if skip >= entry.len() {
            skip -= entry.len();
            continue;
        }
        let dst = &mut entry[skip..];
        skip = 0;
        let n = dst.len().min(buf.len() - copied);
        dst[..n].copy_from_slice(&buf[copied..copied + n]);
        copied += n;
    }
    copied
}
