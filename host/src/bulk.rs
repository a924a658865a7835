// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bulk read/write fan-out algorithm: queued concurrent asynchronous
//! transfers, endpoint-granular packing, and the residual buffer that
//! gives `read_bulk` one-byte granularity above an endpoint-sized
//! transport.

use log::warn;
use qiprog_protocol::{ErrorKind, DEFAULT_TIMEOUT_MS, MAX_CONCURRENT_TRANSFERS};
use qiprog_transport::{BulkToken, HostTransport};

use crate::device::Device;
use crate::error::{Error, Result};

impl<T: HostTransport> Device<T> {
    /// Read `dst.len()` bytes starting at `where_`, delivered to the
    /// caller in strictly increasing address order.
    ///
    /// Internally this may fan out to up to [`MAX_CONCURRENT_TRANSFERS`]
    /// asynchronous bulk-in transfers; each writes into a disjoint slice
    /// of `dst`, and the call does not return until every in-flight
    /// transfer has drained.
    pub fn read_bulk(&mut self, where_: u32, dst: &mut [u8]) -> Result<()> {
        let n = dst.len();
        if n == 0 {
            return Ok(());
        }

        if !self.cursor.covers_read(where_, n as u32) {
            let end = where_
                .checked_add(n as u32 - 1)
                .ok_or_else(|| Error::new(ErrorKind::Arg))?;
            self.set_address(where_, end)?;
        }

        let mut offset = 0usize;
        let mut remaining = n;

        if !self.residual.is_empty() {
            let taken = self.residual.drain_into(&mut dst[offset..]);
            offset += taken;
            remaining -= taken;
            self.cursor.pread += taken as u32;
            if remaining == 0 || !self.residual.is_empty() {
                return Ok(());
            }
        }

        let ep_in = self.ep_in_size();
        let range = (remaining / ep_in) * ep_in;
        if range > 0 {
            self.fanout_bulk_in(&mut dst[offset..offset + range])?;
            offset += range;
            remaining -= range;
            self.cursor.pread += range as u32;
        }

        let left = remaining;
        if left != 0 {
            let mut packet = vec![0u8; ep_in];
            let ep = self.ep_bulk_in();
            let handle = self.handle.as_mut().ok_or_else(|| Error::new(ErrorKind::Arg))?;
            let received = self
                .transport
                .borrow_mut()
                .bulk_in(handle, ep, &mut packet, DEFAULT_TIMEOUT_MS)
                .map_err(Error::new)?;
            if received != ep_in {
                warn!("short bulk-in packet: wanted {ep_in}, got {received}");
                return Err(Error::new(ErrorKind::Generic));
            }
            dst[offset..offset + left].copy_from_slice(&packet[..left]);
            self.residual.fill(&packet[left..received]);
            // Only the bytes actually delivered to `dst` advance the
            // cursor; the rest is cached in `residual`, which a later call
            // continuing this same address sequence will drain from
            // instead of re-fetching.
            self.cursor.pread += left as u32;
        }

        Ok(())
    }

    /// Write `src` starting at `where_`. Unlike `read_bulk`, a non-aligned
    /// tail is sent as-is with its true length; there is no write-side
    /// residual.
    pub fn write_bulk(&mut self, where_: u32, src: &[u8]) -> Result<()> {
        let n = src.len();
        if n == 0 {
            return Ok(());
        }

        if !self.cursor.covers_write(where_, n as u32) {
            let end = where_
                .checked_add(n as u32 - 1)
                .ok_or_else(|| Error::new(ErrorKind::Arg))?;
            self.set_address(where_, end)?;
        }

        let ep_out = self.ep_out_size();
        let range = (n / ep_out) * ep_out;
        let mut offset = 0usize;
        if range > 0 {
            self.fanout_bulk_out(&src[offset..offset + range])?;
            offset += range;
            self.cursor.pwrite += range as u32;
        }

        let left = n - offset;
        if left != 0 {
            let token = self.next_token();
            let ep = self.ep_bulk_out();
            let handle = self.handle.as_mut().ok_or_else(|| Error::new(ErrorKind::Arg))?;
            // The tail is sent with its true (possibly short) length; the
            // transport is trusted not to coalesce or pad it.
            self.transport
                .borrow_mut()
                .submit_bulk_out(handle, ep, src[offset..].to_vec(), token, DEFAULT_TIMEOUT_MS);
            let mut done = false;
            let mut failed = None;
            while !done {
                self.transport.borrow_mut().poll_events(handle, &mut |event| {
                    if event.actual_length != left {
                        warn!("short bulk-out tail: wanted {left}, sent {}", event.actual_length);
                        failed = Some(ErrorKind::Generic);
                    }
                    if let Err(e) = event.status {
                        warn!("bulk-out tail transport error: {e}");
                        failed = Some(e);
                    }
                    done = true;
                });
            }
            self.cursor.pwrite += left as u32;
            if let Some(e) = failed {
                return Err(Error::new(e));
            }
        }

        Ok(())
    }

    /// Queue `dst.len() / ep_in` asynchronous bulk-in transfers, each
    /// exactly `ep_in` bytes, writing into disjoint chunks of `dst`.
    /// Maintains at most [`MAX_CONCURRENT_TRANSFERS`] in flight, refilling
    /// the queue as each completes, and does not return until every
    /// transfer (submitted or still to be submitted) has resolved.
    fn fanout_bulk_in(&mut self, dst: &mut [u8]) -> Result<()> {
        let ep_in = self.ep_in_size();
        let total_transfers = dst.len() / ep_in;
        if total_transfers == 0 {
            return Ok(());
        }

        // Reserved up front, before `handle` below borrows `self`: token
        // `i` is `tokens[0] + i`, so a completion's index can be recovered
        // without keeping a separate token-to-index map around.
        let tokens: Vec<BulkToken> = (0..total_transfers).map(|_| self.next_token()).collect();
        let token_base = tokens[0].0;

        let ep = self.ep_bulk_in();
        let handle = self.handle.as_mut().ok_or_else(|| Error::new(ErrorKind::Arg))?;
        let queue_depth = total_transfers.min(MAX_CONCURRENT_TRANSFERS);

        let mut chunks: Vec<Option<&mut [u8]>> = Vec::with_capacity(total_transfers);
        let mut rest = dst;
        for _ in 0..total_transfers {
            let (chunk, remainder) = rest.split_at_mut(ep_in);
            chunks.push(Some(chunk));
            rest = remainder;
        }

        let mut next_to_submit = 0usize;
        let mut active = 0usize;
        let mut failed = false;
        let transport = &self.transport;

        while next_to_submit < queue_depth {
            let buf = vec![0u8; ep_in];
            transport.borrow_mut().submit_bulk_in(handle, ep, buf, tokens[next_to_submit], DEFAULT_TIMEOUT_MS);
            next_to_submit += 1;
            active += 1;
        }

        while active > 0 {
            let mut completed = Vec::new();
            transport.borrow_mut().poll_events(handle, &mut |event| {
                completed.push(event);
            });
            for event in completed {
                let idx = event.token.0.wrapping_sub(token_base) as usize;
                active -= 1;
                if event.actual_length != ep_in || event.status.is_err() {
                    warn!("bulk-in transfer {idx} failed: actual_length={}", event.actual_length);
                    failed = true;
                } else if let Some(slot) = chunks.get_mut(idx).and_then(Option::take) {
                    slot.copy_from_slice(&event.buffer[..ep_in]);
                }

                if !failed && next_to_submit < total_transfers {
                    let buf = vec![0u8; ep_in];
                    transport.borrow_mut().submit_bulk_in(handle, ep, buf, tokens[next_to_submit], DEFAULT_TIMEOUT_MS);
                    next_to_submit += 1;
                    active += 1;
                }
            }
        }

        if failed {
            Err(Error::new(ErrorKind::Generic))
        } else {
            Ok(())
        }
    }

    /// Mirror of [`Self::fanout_bulk_in`] for writes: queues
    /// `src.len() / ep_out` asynchronous bulk-out transfers.
    fn fanout_bulk_out(&mut self, src: &[u8]) -> Result<()> {
        let ep_out = self.ep_out_size();
        let total_transfers = src.len() / ep_out;
        if total_transfers == 0 {
            return Ok(());
        }

        let tokens: Vec<BulkToken> = (0..total_transfers).map(|_| self.next_token()).collect();

        let ep = self.ep_bulk_out();
        let handle = self.handle.as_mut().ok_or_else(|| Error::new(ErrorKind::Arg))?;
        let queue_depth = total_transfers.min(MAX_CONCURRENT_TRANSFERS);
        let transport = &self.transport;

        let mut next_to_submit = 0usize;
        let mut active = 0usize;
        let mut failed = false;

        while next_to_submit < queue_depth {
            let chunk = src[next_to_submit * ep_out..(next_to_submit + 1) * ep_out].to_vec();
            transport.borrow_mut().submit_bulk_out(handle, ep, chunk, tokens[next_to_submit], DEFAULT_TIMEOUT_MS);
            next_to_submit += 1;
            active += 1;
        }

        while active > 0 {
            let mut completed = Vec::new();
            transport.borrow_mut().poll_events(handle, &mut |event| {
                completed.push(event);
            });
            for event in completed {
                active -= 1;
                if event.actual_length != ep_out || event.status.is_err() {
                    warn!("bulk-out transfer {} failed: actual_length={}", event.token.0, event.actual_length);
                    failed = true;
                }
                if !failed && next_to_submit < total_transfers {
                    let chunk = src[next_to_submit * ep_out..(next_to_submit + 1) * ep_out].to_vec();
                    transport.borrow_mut().submit_bulk_out(handle, ep, chunk, tokens[next_to_submit], DEFAULT_TIMEOUT_MS);
                    next_to_submit += 1;
                    active += 1;
                }
            }
        }

        if failed {
            Err(Error::new(ErrorKind::Generic))
        } else {
            Ok(())
        }
    }
}
