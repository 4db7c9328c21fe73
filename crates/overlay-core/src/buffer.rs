// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Non-owning byte buffer with adjustable logical bounds.
//!
//! `ByteBuffer` is a window `[start, end)` over a backing byte slice of
//! capacity `C`, with `0 <= start <= end <= C`. All reads and writes are
//! relative to `start`. Checked mutators fail rather than violate the
//! invariant; `_unchecked` variants assume the caller already verified the
//! bounds (for hot paths that have already passed a framing check).

/// A view over a mutable byte range with adjustable logical bounds.
///
/// Borrows the backing storage; it must not outlive the slice it was built
/// from.
pub struct ByteBuffer<'a> {
    buf: &'a mut [u8],
    start: usize,
    end: usize,
}

macro_rules! impl_uint_accessors {
    ($width:expr, $ty:ty, $read:ident, $read_le:ident, $read_be:ident,
     $read_unchecked:ident, $read_le_unchecked:ident, $read_be_unchecked:ident,
     $write:ident, $write_le:ident, $write_be:ident,
     $write_unchecked:ident, $write_le_unchecked:ident, $write_be_unchecked:ident) => {
        /// Read a native-endian (host order) value. Intended only for
        /// same-host usage.
        pub fn $read(&self, pos: usize) -> Option<$ty> {
            if pos + $width > self.size() {
                return None;
            }
            Some(self.$read_unchecked(pos))
        }

        /// `_unchecked` variant: caller must guarantee `pos + width <= size()`.
        pub fn $read_unchecked(&self, pos: usize) -> $ty {
            let mut bytes = [0u8; $width];
            bytes.copy_from_slice(&self.buf[self.start + pos..self.start + pos + $width]);
            <$ty>::from_ne_bytes(bytes)
        }

        /// Read a little-endian value, converting to host order.
        pub fn $read_le(&self, pos: usize) -> Option<$ty> {
            if pos + $width > self.size() {
                return None;
            }
            Some(self.$read_le_unchecked(pos))
        }

        pub fn $read_le_unchecked(&self, pos: usize) -> $ty {
            let mut bytes = [0u8; $width];
            bytes.copy_from_slice(&self.buf[self.start + pos..self.start + pos + $width]);
            <$ty>::from_le_bytes(bytes)
        }

        /// Read a big-endian value, converting to host order.
        pub fn $read_be(&self, pos: usize) -> Option<$ty> {
            if pos + $width > self.size() {
                return None;
            }
            Some(self.$read_be_unchecked(pos))
        }

        pub fn $read_be_unchecked(&self, pos: usize) -> $ty {
            let mut bytes = [0u8; $width];
            bytes.copy_from_slice(&self.buf[self.start + pos..self.start + pos + $width]);
            <$ty>::from_be_bytes(bytes)
        }

        /// Write a native-endian (host order) value. Returns `false` without
        /// writing if it would overflow the window.
        #[must_use]
        pub fn $write(&mut self, pos: usize, value: $ty) -> bool {
            if pos + $width > self.size() {
                return false;
            }
            self.$write_unchecked(pos, value);
            true
        }

        pub fn $write_unchecked(&mut self, pos: usize, value: $ty) {
            let bytes = value.to_ne_bytes();
            self.buf[self.start + pos..self.start + pos + $width].copy_from_slice(&bytes);
        }

        #[must_use]
        pub fn $write_le(&mut self, pos: usize, value: $ty) -> bool {
            if pos + $width > self.size() {
                return false;
            }
            self.$write_le_unchecked(pos, value);
            true
        }

        pub fn $write_le_unchecked(&mut self, pos: usize, value: $ty) {
            let bytes = value.to_le_bytes();
            self.buf[self.start + pos..self.start + pos + $width].copy_from_slice(&bytes);
        }

        #[must_use]
        pub fn $write_be(&mut self, pos: usize, value: $ty) -> bool {
            if pos + $width > self.size() {
                return false;
            }
            self.$write_be_unchecked(pos, value);
            true
        }

        pub fn $write_be_unchecked(&mut self, pos: usize, value: $ty) {
            let bytes = value.to_be_bytes();
            self.buf[self.start + pos..self.start + pos + $width].copy_from_slice(&bytes);
        }
    };
}

impl<'a> ByteBuffer<'a> {
    /// Construct a buffer covering the whole of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        let end = buf.len();
        Self { buf, start: 0, end }
    }

    /// Start of the current window.
    pub fn data(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Mutable access to the current window.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.start..self.end]
    }

    /// Length of the current window.
    pub fn size(&self) -> usize {
        self.end - self.start
    }

    /// Backing capacity, irrespective of the current window.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    // ----- bounds mutators -----

    /// Move `start` forward by `num` bytes (consumes front bytes). Fails if
    /// `start + num > end`.
    #[must_use]
    pub fn cover(&mut self, num: usize) -> bool {
        if self.start + num > self.end {
            return false;
        }
        self.cover_unchecked(num);
        true
    }

    pub fn cover_unchecked(&mut self, num: usize) {
        self.start += num;
    }

    /// Move `start` backward by `num` bytes. Fails if `num > start`.
    #[must_use]
    pub fn uncover(&mut self, num: usize) -> bool {
        if num > self.start {
            return false;
        }
        self.uncover_unchecked(num);
        true
    }

    pub fn uncover_unchecked(&mut self, num: usize) {
        self.start -= num;
    }

    /// Move `end` backward by `num` bytes. Fails if `num > size()`.
    #[must_use]
    pub fn truncate(&mut self, num: usize) -> bool {
        if num > self.size() {
            return false;
        }
        self.truncate_unchecked(num);
        true
    }

    pub fn truncate_unchecked(&mut self, num: usize) {
        self.end -= num;
    }

    /// Move `end` forward by `num` bytes. Fails if `end + num > capacity()`.
    #[must_use]
    pub fn expand(&mut self, num: usize) -> bool {
        if self.end + num > self.buf.len() {
            return false;
        }
        self.expand_unchecked(num);
        true
    }

    pub fn expand_unchecked(&mut self, num: usize) {
        self.end += num;
    }

    // ----- arbitrary reads/writes -----

    /// Read `out.len()` bytes starting at `pos`. Fails if `pos + out.len() >
    /// size()`.
    #[must_use]
    pub fn read(&self, pos: usize, out: &mut [u8]) -> bool {
        if pos + out.len() > self.size() {
            return false;
        }
        self.read_unchecked(pos, out);
        true
    }

    pub fn read_unchecked(&self, pos: usize, out: &mut [u8]) {
        out.copy_from_slice(&self.buf[self.start + pos..self.start + pos + out.len()]);
    }

    /// Write `data` starting at `pos`. Fails if `pos + data.len() > size()`.
    #[must_use]
    pub fn write(&mut self, pos: usize, data: &[u8]) -> bool {
        if pos + data.len() > self.size() {
            return false;
        }
        self.write_unchecked(pos, data);
        true
    }

    pub fn write_unchecked(&mut self, pos: usize, data: &[u8]) {
        self.buf[self.start + pos..self.start + pos + data.len()].copy_from_slice(data);
    }

    impl_uint_accessors!(
        1,
        u8,
        read_uint8,
        read_uint8_le,
        read_uint8_be,
        read_uint8_unchecked,
        read_uint8_le_unchecked,
        read_uint8_be_unchecked,
        write_uint8,
        write_uint8_le,
        write_uint8_be,
        write_uint8_unchecked,
        write_uint8_le_unchecked,
        write_uint8_be_unchecked
    );
    impl_uint_accessors!(
        2,
        u16,
        read_uint16,
        read_uint16_le,
        read_uint16_be,
        read_uint16_unchecked,
        read_uint16_le_unchecked,
        read_uint16_be_unchecked,
        write_uint16,
        write_uint16_le,
        write_uint16_be,
        write_uint16_unchecked,
        write_uint16_le_unchecked,
        write_uint16_be_unchecked
    );
    impl_uint_accessors!(
        4,
        u32,
        read_uint32,
        read_uint32_le,
        read_uint32_be,
        read_uint32_unchecked,
        read_uint32_le_unchecked,
        read_uint32_be_unchecked,
        write_uint32,
        write_uint32_le,
        write_uint32_be,
        write_uint32_unchecked,
        write_uint32_le_unchecked,
        write_uint32_be_unchecked
    );
    impl_uint_accessors!(
        8,
        u64,
        read_uint64,
        read_uint64_le,
        read_uint64_be,
        read_uint64_unchecked,
        read_uint64_le_unchecked,
        read_uint64_be_unchecked,
        write_uint64,
        write_uint64_le,
        write_uint64_be,
        write_uint64_unchecked,
        write_uint64_le_unchecked,
        write_uint64_be_unchecked
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_uncover_truncate_expand_respect_bounds() {
        let mut backing = [0u8; 16];
        let mut buf = ByteBuffer::new(&mut backing);
        assert_eq!(buf.size(), 16);

        assert!(buf.cover(4));
        assert_eq!(buf.size(), 12);
        assert!(!buf.cover(13)); // would push start past end
        assert_eq!(buf.size(), 12);

        assert!(buf.truncate(4));
        assert_eq!(buf.size(), 8);
        assert!(!buf.truncate(9));

        assert!(buf.uncover(4));
        assert_eq!(buf.size(), 12);
        assert!(!buf.uncover(100));

        assert!(buf.expand(4));
        assert_eq!(buf.size(), 16);
        assert!(!buf.expand(1)); // would push end past capacity
    }

    #[test]
    fn unchecked_variants_match_checked_under_satisfying_preconditions() {
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        let mut wa = ByteBuffer::new(&mut a);
        let mut wb = ByteBuffer::new(&mut b);

        assert!(wa.cover(2));
        wb.cover_unchecked(2);
        assert!(wa.expand(1));
        wb.expand_unchecked(1);
        assert!(wa.truncate(1));
        wb.truncate_unchecked(1);
        assert!(wa.uncover(1));
        wb.uncover_unchecked(1);

        assert_eq!(wa.size(), wb.size());
    }

    #[test]
    fn integer_round_trip_every_width_and_endianness() {
        let mut backing = [0u8; 64];
        let mut buf = ByteBuffer::new(&mut backing);

        assert!(buf.write_uint8(0, 0xAB));
        assert_eq!(buf.read_uint8(0), Some(0xAB));

        assert!(buf.write_uint16_le(2, 0xCAFE));
        assert_eq!(buf.read_uint16_le(2), Some(0xCAFE));

        assert!(buf.write_uint16_be(4, 0xCAFE));
        assert_eq!(buf.read_uint16_be(4), Some(0xCAFE));

        assert!(buf.write_uint32_le(8, 0xDEAD_BEEF));
        assert_eq!(buf.read_uint32_le(8), Some(0xDEAD_BEEF));

        assert!(buf.write_uint32_be(16, 0xDEAD_BEEF));
        assert_eq!(buf.read_uint32_be(16), Some(0xDEAD_BEEF));

        assert!(buf.write_uint64_le(24, 0x0123_4567_89AB_CDEF));
        assert_eq!(buf.read_uint64_le(24), Some(0x0123_4567_89AB_CDEF));

        assert!(buf.write_uint64_be(40, 0x0123_4567_89AB_CDEF));
        assert_eq!(buf.read_uint64_be(40), Some(0x0123_4567_89AB_CDEF));
    }

    #[test]
    fn endianness_distinction_for_non_palindromic_values() {
        let mut backing = [0u8; 8];
        let mut buf = ByteBuffer::new(&mut backing);

        assert!(buf.write_uint16_le(0, 0xCAFE));
        assert_ne!(buf.read_uint16_be(0), Some(0xCAFE));

        assert!(buf.write_uint32_le(0, 0xDEAD_BEEF));
        assert_ne!(buf.read_uint32_be(0), Some(0xDEAD_BEEF));

        assert!(buf.write_uint64_le(0, 0x0102_0304_0506_0708));
        assert_ne!(buf.read_uint64_be(0), Some(0x0102_0304_0506_0708));
    }

    #[test]
    fn bounds_checked_read_write_report_failure_without_mutating() {
        let mut backing = [0u8; 4];
        let mut buf = ByteBuffer::new(&mut backing);
        assert!(!buf.write_uint32_le(1, 1)); // pos + 4 > size(4)
        assert_eq!(buf.read_uint32_le(1), None);

        let mut out = [0u8; 2];
        assert!(!buf.read(3, &mut out));
        assert!(!buf.write(3, &[1, 2]));
    }
}
