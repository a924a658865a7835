// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-device address cursor and residual buffer that give bulk reads
//! one-byte granularity above an endpoint-sized transport.

use std::collections::VecDeque;

/// `{start, end, pread, pwrite}` with the invariant
/// `start <= pread <= end + 1` and `start <= pwrite <= end + 1`.
///
/// Reset on every `set_address`; the "+1" in the invariant is the state
/// right after the last byte in range has been consumed.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub(crate) struct AddressCursor {
    pub start: u32,
    pub end: u32,
    pub pread: u32,
    pub pwrite: u32,
    /// Whether `set_address` has ever been called. Distinguishes "window
    /// set to start at address 0" from "no window established yet".
    pub addressed: bool,
}

impl AddressCursor {
    pub fn reset(&mut self, start: u32, end: u32) {
        self.start = start;
        self.end = end;
        self.pread = start;
        self.pwrite = start;
        self.addressed = true;
    }

    /// Whether a `read_bulk(where, n)` call can continue from the current
    /// cursor without a fresh `set_address`.
    pub fn covers_read(&self, where_: u32, n: u32) -> bool {
        if n == 0 {
            return true;
        }
        let last = match where_.checked_add(n - 1) {
            Some(v) => v,
            None => return false,
        };
        self.pread == where_ && self.end >= last
    }

    /// Whether a `write_bulk(where, n)` call can continue from the current
    /// cursor without a fresh `set_address`.
    pub fn covers_write(&self, where_: u32, n: u32) -> bool {
        if n == 0 {
            return true;
        }
        let last = match where_.checked_add(n - 1) {
            Some(v) => v,
            None => return false,
        };
        self.pwrite == where_ && self.end >= last
    }
}

/// Bytes received from the last bulk-in that the caller did not ask for,
/// preserved until the next bulk call. Backed by a `VecDeque` since the
/// host crate has an allocator and the endpoint size is only known at
/// runtime (unlike the device side, which is fixed-size and `no_std`).
#[derive(Debug, Default)]
pub(crate) struct Residual(VecDeque<u8>);

impl Residual {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Drain up to `dst.len()` bytes into `dst`, returning how many were
    /// written.
    pub fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.0.len());
        for slot in dst.iter_mut().take(n) {
            *slot = self.0.pop_front().expect("checked len above");
        }
        n
    }

    pub fn fill(&mut self, bytes: &[u8]) {
        self.0.extend(bytes.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_sets_cursors_to_start() {
        let mut cursor = AddressCursor::default();
        cursor.reset(0xFFE00000, 0xFFFFFFFF);
        assert_eq!(cursor.pread, 0xFFE00000);
        assert_eq!(cursor.pwrite, 0xFFE00000);
        assert_eq!(cursor.start, 0xFFE00000);
        assert_eq!(cursor.end, 0xFFFFFFFF);
    }

    #[test]
    fn covers_read_requires_exact_continuation() {
        let mut cursor = AddressCursor::default();
        cursor.reset(0x1000, 0x1FFF);
        assert!(cursor.covers_read(0x1000, 0x10));
        assert!(!cursor.covers_read(0x1001, 0x10));
        assert!(!cursor.covers_read(0x1000, 0x1001)); // exceeds `end`
    }

    #[test]
    fn residual_drains_fifo() {
        let mut residual = Residual::default();
        residual.fill(&[1, 2, 3, 4, 5]);
        let mut dst = [0u8; 3];
        assert_eq!(residual.drain_into(&mut dst), 3);
        assert_eq!(dst, [1, 2, 3]);
        assert_eq!(residual.len(), 2);
    }
}
