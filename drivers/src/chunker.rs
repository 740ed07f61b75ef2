/*++

Licensed under the Apache-2.0 license.

File Name:

    chunker.rs

Abstract:

    File contains the planner that splits AAD and message streams into
    descriptor-sized segments and pads them to the engine's 16-byte unit.

--*/

use core::iter::FusedIterator;

/// The engine consumes data in units of this many bytes.
pub const DATA_ALIGN: usize = 16;

/// Largest message segment one source descriptor carries. The 14-bit length
/// field is rounded down to a multiple of [`DATA_ALIGN`].
pub const MSG_SEGMENT_MAX: usize = 16368;

/// AAD travels one 16-byte unit per descriptor.
pub const AAD_SEGMENT_MAX: usize = DATA_ALIGN;

/// Bytes of zero padding needed to bring `len` to a multiple of
/// [`DATA_ALIGN`].
pub fn pad_len(len: usize) -> usize {
    (DATA_ALIGN - len % DATA_ALIGN) % DATA_ALIGN
}

/// `len` rounded up to a multiple of [`DATA_ALIGN`].
pub fn padded_len(len: usize) -> usize {
    len + pad_len(len)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSource {
    /// Caller data starting at this offset into the stream.
    Data { offset: usize },

    /// The shared zero-padding buffer.
    ZeroPad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub source: SegmentSource,
    pub len: usize,

    /// Set on the final segment of the stream only.
    pub last: bool,
}

/// Lazy segment sequence returned by [`plan_segments`].
#[derive(Debug)]
pub struct SegmentPlan {
    total: usize,
    cap: usize,
    offset: usize,
    pad: usize,
}

/// Splits a stream of `total_len` bytes into segments of at most `unit_cap`
/// bytes, followed by one zero-pad segment when the stream is not 16-byte
/// aligned. An empty stream yields no segments.
pub fn plan_segments(total_len: usize, unit_cap: usize) -> SegmentPlan {
    debug_assert!(unit_cap > 0 && unit_cap % DATA_ALIGN == 0);
    SegmentPlan {
        total: total_len,
        cap: unit_cap.max(DATA_ALIGN),
        offset: 0,
        pad: pad_len(total_len),
    }
}

impl Iterator for SegmentPlan {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.offset < self.total {
            let offset = self.offset;
            let len = (self.total - offset).min(self.cap);
            self.offset += len;
            return Some(Segment {
                source: SegmentSource::Data { offset },
                len,
                last: self.offset == self.total && self.pad == 0,
            });
        }
        if self.pad != 0 {
            let len = core::mem::take(&mut self.pad);
            return Some(Segment {
                source: SegmentSource::ZeroPad,
                len,
                last: true,
            });
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.offset;
        let n = remaining.div_ceil(self.cap) + usize::from(self.pad != 0);
        (n, Some(n))
    }
}

impl ExactSizeIterator for SegmentPlan {}

impl FusedIterator for SegmentPlan {}
