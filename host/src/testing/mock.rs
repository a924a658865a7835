// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-process [`HostTransport`] for unit and property tests. Models one
//! candidate device whose chip contents are `addr & 0xFF` for every byte,
//! matching the reference mock described alongside this protocol's test
//! scenarios.

use std::collections::VecDeque;

use qiprog_protocol::{wire, Request};
use qiprog_transport::{BulkEvent, BulkToken, HostTransport, TransportResult};

/// Opaque candidate handed back by [`MockTransport::enumerate`]; there is
/// only ever one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MockCandidate(u8);

/// Opaque open handle; closing it is a no-op beyond bookkeeping.
pub struct MockHandle(u8);

struct PendingIn {
    token: BulkToken,
    addr: u32,
    len: usize,
}

struct PendingOut {
    token: BulkToken,
    len: usize,
}

/// A transport whose bulk-in data is synthesized from an address counter
/// rather than backed by any real chip: byte `n` of the stream is
/// `(start_addr + n) as u8`.
pub struct MockTransport {
    ep_in: u16,
    ep_out: u16,
    open: bool,
    next_read_addr: u32,
    pending_in: VecDeque<PendingIn>,
    pending_out: VecDeque<PendingOut>,
    /// Every byte written via a control or bulk OUT transfer, in order.
    pub written: Vec<u8>,
    /// Number of control transfers issued, for assertions that a call
    /// reached the wire at all.
    pub control_transfers: usize,
}

impl MockTransport {
    pub fn new(ep_in: u16, ep_out: u16) -> Self {
        MockTransport {
            ep_in,
            ep_out,
            open: false,
            next_read_addr: 0,
            pending_in: VecDeque::new(),
            pending_out: VecDeque::new(),
            written: Vec::new(),
            control_transfers: 0,
        }
    }

    /// Convenience used by tests: enumerate and open the one candidate
    /// this mock ever produces.
    pub fn open_first(&mut self) -> TransportResult<MockHandle> {
        self.open(MockCandidate(0))
    }

    /// Set the address the next synthesized bulk-in read will start from.
    /// Mirrors what a real device would do on `SetAddress`.
    pub fn seek(&mut self, addr: u32) {
        self.next_read_addr = addr;
    }

    fn synth(addr: u32, len: usize, dst: &mut [u8]) {
        for (i, slot) in dst.iter_mut().take(len).enumerate() {
            *slot = addr.wrapping_add(i as u32) as u8;
        }
    }
}

impl HostTransport for MockTransport {
    type Candidate = MockCandidate;
    type Handle = MockHandle;

    fn enumerate(&mut self, _vendor: u16, _product: u16, visit: &mut dyn FnMut(Self::Candidate)) {
        visit(MockCandidate(0));
    }

    fn open(&mut self, candidate: Self::Candidate) -> TransportResult<Self::Handle> {
        self.open = true;
        Ok(MockHandle(candidate.0))
    }

    fn close(&mut self, _handle: Self::Handle) {
        self.open = false;
    }

    fn control_in(
        &mut self,
        _handle: &mut Self::Handle,
        _b_request: u8,
        w_value: u16,
        w_index: u16,
        buf: &mut [u8],
        _timeout_ms: u32,
    ) -> TransportResult<usize> {
        self.control_transfers += 1;
        let addr = ((w_value as u32) << 16) | w_index as u32;
        Self::synth(addr, buf.len(), buf);
        Ok(buf.len())
    }

    fn control_out(
        &mut self,
        _handle: &mut Self::Handle,
        b_request: u8,
        _w_value: u16,
        _w_index: u16,
        buf: &[u8],
        _timeout_ms: u32,
    ) -> TransportResult<()> {
        self.control_transfers += 1;
        self.written.extend_from_slice(buf);
        // Mirrors a real device resetting its read cursor on SET_ADDRESS,
        // so tests can exercise `read_bulk` at an arbitrary starting
        // address instead of only address 0.
        if Request::from_u8(b_request) == Some(Request::SetAddress) && buf.len() >= wire::ADDRESS_RANGE_WIRE_LEN {
            let range = wire::decode_address(buf);
            self.seek(range.start);
        }
        Ok(())
    }

    fn bulk_in(
        &mut self,
        _handle: &mut Self::Handle,
        _ep: u8,
        buf: &mut [u8],
        _timeout_ms: u32,
    ) -> TransportResult<usize> {
        Self::synth(self.next_read_addr, buf.len(), buf);
        self.next_read_addr = self.next_read_addr.wrapping_add(buf.len() as u32);
        Ok(buf.len())
    }

    fn submit_bulk_in(
        &mut self,
        _handle: &mut Self::Handle,
        _ep: u8,
        buf: Vec<u8>,
        token: BulkToken,
        _timeout_ms: u32,
    ) {
        let addr = self.next_read_addr;
        let len = buf.len();
        self.next_read_addr = self.next_read_addr.wrapping_add(len as u32);
        self.pending_in.push_back(PendingIn { token, addr, len });
    }

    fn submit_bulk_out(
        &mut self,
        _handle: &mut Self::Handle,
        _ep: u8,
        buf: Vec<u8>,
        token: BulkToken,
        _timeout_ms: u32,
    ) {
        let len = buf.len();
        self.written.extend_from_slice(&buf);
        self.pending_out.push_back(PendingOut { token, len });
    }

    fn poll_events(&mut self, _handle: &mut Self::Handle, visit: &mut dyn FnMut(BulkEvent)) {
        while let Some(pending) = self.pending_in.pop_front() {
            let mut buffer = vec![0u8; pending.len];
            Self::synth(pending.addr, pending.len, &mut buffer);
            visit(BulkEvent {
                token: pending.token,
                actual_length: buffer.len(),
                buffer,
                status: Ok(()),
            });
        }
        while let Some(pending) = self.pending_out.pop_front() {
            visit(BulkEvent {
                token: pending.token,
                buffer: Vec::new(),
                actual_length: pending.len,
                status: Ok(()),
            });
        }
    }

    fn max_packet_size(&mut self, _handle: &mut Self::Handle, ep: u8) -> u16 {
        if ep & 0x80 != 0 {
            self.ep_in
        } else {
            self.ep_out
        }
    }
}
