// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The programmer-side control-request and bulk-event dispatcher.

use qiprog_protocol::{commands, wire, CommandStep, EraseCmd, EraseSize, EraseSubcmd, ErrorKind, Request, WriteCmd, WriteSubcmd, MAX_COMMAND_STEPS, SCRATCH_BUF_LEN};
use qiprog_transport::DeviceTransport;

use crate::bus_driver::BusDriver;
use crate::diag::{Event as DiagEvent, RingBuf};
use crate::task_ring::TaskRing;

/// Number of recent events kept in a [`Translator`]'s diagnostic ring.
const DIAG_LEN: usize = 16;

pub type Result<T> = core::result::Result<T, ErrorKind>;

/// The device-local mirror of the host's address cursor: where the next
/// bulk send/receive should continue from. There is no residual buffer on
/// this side: `handle_events` always reads/writes whole packets.
#[derive(Default, Copy, Clone)]
struct AddressWindow {
    end: u32,
    pread: u32,
    pwrite: u32,
    /// Whether `SET_ADDRESS` has ever been received. Without this, a
    /// window that legitimately starts at address 0 would be
    /// indistinguishable from "never established" (both leave `pread ==
    /// end == 0`).
    established: bool,
}

/// The programmer-side endpoint of the protocol: owns the active backend,
/// the control-reply scratch buffer, the outbound task ring, and the
/// current address window.
///
/// `'a` is the lifetime of the active [`BusDriver`]; swapping backends
/// (`change_device`) requires a new borrow, which is the no-alloc
/// equivalent of replacing a vtable pointer.
pub struct Translator<'a> {
    current: Option<&'a mut dyn BusDriver>,
    scratch: [u8; SCRATCH_BUF_LEN],
    ring: TaskRing,
    window: AddressWindow,
    /// Recent control-request and task-ring activity, inspectable by a
    /// debugger without a live log stream.
    pub diag: RingBuf<DIAG_LEN>,
}

impl<'a> Translator<'a> {
    pub fn new() -> Self {
        Translator {
            current: None,
            scratch: [0u8; SCRATCH_BUF_LEN],
            ring: TaskRing::new(),
            window: AddressWindow::default(),
            diag: RingBuf::new(),
        }
    }

    /// Close the previous backend (if any), install `new`, and open it.
    /// This is the runtime hook for swapping bus drivers: the firmware
    /// integrator decides which concrete backend a `SET_BUS` selects and
    /// calls this, since the mapping from bus mask to backend is a
    /// board-specific wiring concern this crate does not catalog.
    pub fn change_device(&mut self, new: &'a mut dyn BusDriver) {
        if let Some(old) = self.current.take() {
            old.close();
        }
        new.open();
        self.current = Some(new);
        self.window = AddressWindow::default();
        self.diag.push(DiagEvent::DeviceSwapped);
    }

    fn driver(&mut self) -> Result<&mut (dyn BusDriver + 'a)> {
        self.current.as_deref_mut().ok_or(ErrorKind::Arg)
    }

    /// Dispatch one control request. `data` is the OUT data stage (empty
    /// for IN requests); the returned slice is the IN reply to send back
    /// (empty for OUT requests and for replies with no payload).
    ///
    /// An unrecognized `b_request`, or any request received with no active
    /// backend, returns `Err(ErrorKind::Arg)`; the transport is expected to
    /// turn that into a STALL, matching the reference device's default
    /// "unhandled code" behavior.
    ///
    /// Every call is recorded in [`Self::diag`], win or lose.
    pub fn handle_control(
        &mut self,
        b_request: u8,
        w_value: u16,
        w_index: u16,
        data: &[u8],
    ) -> Result<&[u8]> {
        let result = self.dispatch(b_request, w_value, w_index, data);
        self.diag.push(DiagEvent::ControlRequest { b_request, ok: result.is_ok() });
        result.map(|len| &self.scratch[..len])
    }

    /// Does the actual work of [`Self::handle_control`], returning the
    /// length of the reply left in `self.scratch` rather than a slice, so
    /// the diagnostic push above isn't fighting a borrow tied to the
    /// returned reply.
    fn dispatch(&mut self, b_request: u8, w_value: u16, w_index: u16, data: &[u8]) -> Result<usize> {
        let req = Request::from_u8(b_request).ok_or(ErrorKind::Arg)?;

        // SET_ADDRESS updates this translator's own window in addition to
        // (not instead of) the active backend, since bulk send/receive
        // accounting lives here, not in the backend.
        if let Request::SetAddress = req {
            let range = wire::decode_address(data);
            self.driver()?.set_address(range.start, range.end)?;
            self.window = AddressWindow {
                end: range.end,
                pread: range.start,
                pwrite: range.start,
                established: true,
            };
            return Ok(0);
        }

        let drv = self.driver()?;

        match req {
            Request::GetCapabilities => {
                let caps = drv.get_capabilities();
                wire::pack_capabilities(&caps, &mut self.scratch[..wire::CAPABILITIES_WIRE_LEN]);
                Ok(wire::CAPABILITIES_WIRE_LEN)
            }
            Request::SetBus => {
                // The reference device reserves this code but the core
                // does not own a bus-mask-to-backend mapping; pass-through
                // is limited to argument validation, per the preferred
                // resolution for unhandled codes.
                let mask = ((w_value as u32) << 16) | w_index as u32;
                if mask == 0 {
                    return Err(ErrorKind::Arg);
                }
                Ok(0)
            }
            Request::SetClock => {
                drv.set_clock(wire::get_u32(data))?;
                Ok(0)
            }
            Request::ReadDeviceId => {
                let ids = drv.read_chip_id();
                wire::pack_chip_ids(&ids, &mut self.scratch[..wire::CHIP_IDS_WIRE_LEN]);
                Ok(wire::CHIP_IDS_WIRE_LEN)
            }
            Request::SetChipSize => {
                drv.set_chip_size(w_index as u8, wire::get_u32(data))?;
                Ok(0)
            }
            Request::SetAddress => unreachable!("handled above"),
            Request::SetEraseSize => {
                let n = data.len() / commands::ERASE_SIZE_ENTRY_LEN;
                if n == 0 || n > MAX_COMMAND_STEPS {
                    return Err(ErrorKind::Arg);
                }
                let mut sizes = [EraseSize { erase_type: 0, size: 0 }; MAX_COMMAND_STEPS];
                commands::unpack_erase_sizes(data, &mut sizes[..n]);
                drv.set_erase_size(w_index as u8, &sizes[..n])?;
                Ok(0)
            }
            Request::SetEraseCommand => {
                if data.len() == commands::FIXED_COMMAND_LEN {
                    let cmd = EraseCmd(data[0]);
                    let subcmd = EraseSubcmd(data[1]);
                    let flags = wire::get_u16(&data[2..4]);
                    drv.set_erase_command(w_index as u8, cmd, subcmd, flags)?;
                } else {
                    let n = decode_custom_command_len(data)?;
                    let mut steps = [CommandStep { addr: 0, data: 0 }; MAX_COMMAND_STEPS];
                    commands::unpack_command_steps(data, &mut steps[..n]);
                    drv.set_custom_erase_command(w_index as u8, &steps[..n])?;
                }
                Ok(0)
            }
            Request::SetWriteCommand => {
                if data.len() == commands::FIXED_COMMAND_LEN {
                    let cmd = WriteCmd(data[0]);
                    let subcmd = WriteSubcmd(data[1]);
                    drv.set_write_command(w_index as u8, cmd, subcmd)?;
                } else {
                    let n = decode_custom_command_len(data)?;
                    let mut steps = [CommandStep { addr: 0, data: 0 }; MAX_COMMAND_STEPS];
                    commands::unpack_command_steps(data, &mut steps[..n]);
                    drv.set_custom_write_command(w_index as u8, &steps[..n])?;
                }
                Ok(0)
            }
            Request::SetSpiTiming => {
                drv.set_spi_timing(w_value, wire::get_u32(data))?;
                Ok(0)
            }
            Request::Read8 => {
                let addr = ((w_value as u32) << 16) | w_index as u32;
                self.scratch[0] = drv.read8(addr)?;
                Ok(1)
            }
            Request::Read16 => {
                let addr = ((w_value as u32) << 16) | w_index as u32;
                wire::put_u16(drv.read16(addr)?, &mut self.scratch[..2]);
                Ok(2)
            }
            Request::Read32 => {
                let addr = ((w_value as u32) << 16) | w_index as u32;
                wire::put_u32(drv.read32(addr)?, &mut self.scratch[..4]);
                Ok(4)
            }
            Request::Write8 => {
                let addr = ((w_value as u32) << 16) | w_index as u32;
                drv.write8(addr, data[0])?;
                Ok(0)
            }
            Request::Write16 => {
                let addr = ((w_value as u32) << 16) | w_index as u32;
                drv.write16(addr, wire::get_u16(data))?;
                Ok(0)
            }
            Request::Write32 => {
                let addr = ((w_value as u32) << 16) | w_index as u32;
                drv.write32(addr, wire::get_u32(data))?;
                Ok(0)
            }
            Request::SetVdd => {
                drv.set_vdd(w_index)?;
                Ok(0)
            }
        }
    }

    /// One tick of the device-side event loop. Called continuously by
    /// firmware; must never block.
    ///
    /// Drives the outbound task ring (§4.4 steps 1-4) and, symmetrically,
    /// drains one inbound packet per tick into the active backend's
    /// `write_stream`. The reference event loop only narrates the
    /// outward-streaming half, but `write_bulk` on the host side has
    /// nowhere to land without a receive-side counterpart.
    pub fn handle_events(&mut self, transport: &mut impl DeviceTransport) {
        match self.ring.try_send(transport) {
            Some(len) => self.diag.push(DiagEvent::TaskSent { len }),
            None => self.fill_next_send_task(transport.max_tx_packet()),
        }
        self.recv_one_packet(transport);
    }

    fn fill_next_send_task(&mut self, max_tx_packet: u16) {
        if !self.window.established || self.window.pread > self.window.end {
            return;
        }
        let Some(drv) = self.current.as_deref_mut() else { return };
        let remaining = self.window.end.wrapping_sub(self.window.pread).wrapping_add(1);
        if remaining == 0 {
            return;
        }
        let want = (remaining as usize).min(max_tx_packet as usize).min(SCRATCH_BUF_LEN);
        if want == 0 {
            return;
        }
        let mut buf = [0u8; SCRATCH_BUF_LEN];
        drv.read_stream(self.window.pread, &mut buf[..want]);
        if self.ring.fill(&buf[..want]) {
            self.window.pread = self.window.pread.wrapping_add(want as u32);
        } else {
            self.diag.push(DiagEvent::TaskBackpressure);
        }
    }

    fn recv_one_packet(&mut self, transport: &mut impl DeviceTransport) {
        if !self.window.established || self.window.pwrite > self.window.end {
            return;
        }
        let Some(drv) = self.current.as_deref_mut() else { return };
        let mut buf = [0u8; SCRATCH_BUF_LEN];
        let max = (transport.max_rx_packet() as usize).min(SCRATCH_BUF_LEN);
        let received = transport.recv_packet(&mut buf[..max]);
        if received == 0 {
            return;
        }
        if drv.write_stream(self.window.pwrite, &buf[..received]).is_ok() {
            self.window.pwrite = self.window.pwrite.wrapping_add(received as u32);
        }
    }
}

impl<'a> Default for Translator<'a> {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_custom_command_len(data: &[u8]) -> Result<usize> {
    if data.len() < commands::CUSTOM_COMMAND_HEADER_LEN {
        return Err(ErrorKind::Arg);
    }
    let n = data[0] as usize;
    if n == 0
        || n > MAX_COMMAND_STEPS
        || data.len() != commands::CUSTOM_COMMAND_HEADER_LEN + n * commands::COMMAND_STEP_LEN
    {
        return Err(ErrorKind::Arg);
    }
    Ok(n)
}
