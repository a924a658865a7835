// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The capability both sides of QiProg consume from their environment:
//! a way to move control and bulk transfers across whatever link actually
//! carries them.
//!
//! Neither trait here names USB, or any other concrete stack, on purpose.
//! The reference binding (USB control transfers on EP0, bulk on EP1 IN/OUT)
//! lives entirely in the numeric conventions of `qiprog-protocol` and in
//! whatever backend a caller plugs in. This mirrors the way `drv/spi-api`
//! separates the `SpiServer` capability from any particular SPI controller.

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use qiprog_protocol::ErrorKind;

pub type TransportResult<T> = Result<T, ErrorKind>;

/// Correlates a submitted asynchronous bulk transfer with its completion
/// event. The host driver assigns these; a transport only needs to echo
/// the token back in [`BulkEvent`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BulkToken(pub u32);

/// Outcome of one previously-submitted asynchronous bulk transfer.
///
/// The submitted buffer comes back with the event rather than being
/// written through a borrowed reference: real async USB stacks hand
/// ownership of the DMA-able buffer to the kernel/host-controller driver
/// for the lifetime of the transfer and return it on completion, and
/// modeling that transfer of ownership here avoids pinning a borrow across
/// however the transport chooses to suspend.
pub struct BulkEvent {
    pub token: BulkToken,
    pub buffer: Vec<u8>,
    /// Bytes actually transferred. A value other than the submitted
    /// buffer's length (short packet) is reported as-is; the caller
    /// decides whether that is a failure.
    pub actual_length: usize,
    pub status: TransportResult<()>,
}

/// Host-side transport capability: enumerate candidate devices, open/close
/// them, issue synchronous control transfers, and run a fan-out of
/// asynchronous bulk transfers.
///
/// Implementations are expected to wrap a concrete async USB library (e.g.
/// `nusb`); this trait only prescribes the shape the host driver needs.
pub trait HostTransport {
    /// Opaque identifier produced by [`Self::enumerate`] and consumed by
    /// [`Self::open`].
    type Candidate: Copy;
    /// Opaque handle to an open device.
    type Handle;

    /// Invoke `visit` once per transport-level device whose vendor/product
    /// identifiers match. Not finding any device is not an error.
    fn enumerate(&mut self, vendor: u16, product: u16, visit: &mut dyn FnMut(Self::Candidate));

    fn open(&mut self, candidate: Self::Candidate) -> TransportResult<Self::Handle>;
    fn close(&mut self, handle: Self::Handle);

    /// Synchronous control IN transfer; returns the number of bytes
    /// written into `buf`.
    fn control_in(
        &mut self,
        handle: &mut Self::Handle,
        b_request: u8,
        w_value: u16,
        w_index: u16,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> TransportResult<usize>;

    /// Synchronous control OUT transfer.
    fn control_out(
        &mut self,
        handle: &mut Self::Handle,
        b_request: u8,
        w_value: u16,
        w_index: u16,
        buf: &[u8],
        timeout_ms: u32,
    ) -> TransportResult<()>;

    /// One synchronous bulk-in packet, used for the unaligned tail of
    /// `read_bulk`. Returns the number of bytes received.
    fn bulk_in(
        &mut self,
        handle: &mut Self::Handle,
        ep: u8,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> TransportResult<usize>;

    /// Queue an asynchronous bulk-in transfer of exactly `buf.len()` bytes.
    /// Ownership of `buf` moves to the transport until it is returned in a
    /// [`BulkEvent`] tagged with `token`.
    fn submit_bulk_in(
        &mut self,
        handle: &mut Self::Handle,
        ep: u8,
        buf: Vec<u8>,
        token: BulkToken,
        timeout_ms: u32,
    );

    /// Queue an asynchronous bulk-out transfer of `buf`.
    fn submit_bulk_out(
        &mut self,
        handle: &mut Self::Handle,
        ep: u8,
        buf: Vec<u8>,
        token: BulkToken,
        timeout_ms: u32,
    );

    /// Drain whatever asynchronous bulk completions are presently
    /// available, invoking `visit` once per event. May return having
    /// delivered zero events; the caller is expected to call this in a
    /// loop until it has seen every token it is waiting on.
    fn poll_events(&mut self, handle: &mut Self::Handle, visit: &mut dyn FnMut(BulkEvent));

    /// Maximum payload size of one packet on `ep`.
    fn max_packet_size(&mut self, handle: &mut Self::Handle, ep: u8) -> u16;
}

/// Device-side transport capability: push and pull single packets without
/// any framing of their own.
///
/// Both methods treat transfers as atomic packets; short-packet
/// coalescing is forbidden, matching [`HostTransport`]'s contract.
pub trait DeviceTransport {
    /// Attempt to send one packet. `0` means the transport cannot accept a
    /// packet right now (try again on a later tick); any value other than
    /// `0` or `buf.len()` is a transport error.
    fn send_packet(&mut self, buf: &[u8]) -> usize;

    /// Attempt to receive one packet into `buf`. `0` means no packet is
    /// available right now.
    fn recv_packet(&mut self, buf: &mut [u8]) -> usize;

    /// Maximum packet size the stack will deliver to [`Self::recv_packet`].
    fn max_rx_packet(&self) -> u16;
    /// Maximum packet size the stack will accept in [`Self::send_packet`].
    fn max_tx_packet(&self) -> u16;
}
